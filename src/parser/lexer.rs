//! Lexer (tokenizer) for C source code
//!
//! Converts raw source text into a stream of [`Token`]s consumed by the parser.
//! The lexer is an [`Iterator`]; [`Lexer::tokenize`] collects it into the
//! vector the parser indexes.
//!
//! # Preprocessor
//!
//! `#define` and `#undef` are honoured through the [`MacroTable`]; every other
//! directive (`#include`, `#ifdef`, `#pragma`, ...) is skipped up to the end of
//! its line, including backslash continuations.

use super::ast::SourceLocation;
use super::macros::MacroTable;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Token variants produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral {
        value: u64,
        unsigned: bool,
        long: bool,
        /// Decimal literals without suffix never become unsigned
        decimal: bool,
    },
    FloatLiteral {
        value: f64,
        /// `f`/`F` suffix
        single: bool,
    },
    CharLiteral(u8),
    StringLiteral(Vec<u8>),

    // Identifiers
    Ident(String),

    // Type keywords
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
    Struct,
    Union,
    Enum,
    Typedef,

    // Storage classes and qualifiers
    Static,
    Extern,
    Auto,
    Register,
    Const,
    Volatile,

    // Statement keywords
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Goto,
    Sizeof,
    Null,

    // Arithmetic
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %

    // Comparison
    EqEq,  // ==
    NotEq, // !=
    Lt,    // <
    Le,    // <=
    Gt,    // >
    Ge,    // >=

    // Logical
    AndAnd, // &&
    OrOr,   // ||
    Bang,   // !

    // Bitwise
    Amp,   // &
    Pipe,  // |
    Caret, // ^
    Tilde, // ~
    LtLt,  // <<
    GtGt,  // >>

    // Assignment
    Eq,        // =
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    PercentEq, // %=
    AmpEq,     // &=
    PipeEq,    // |=
    CaretEq,   // ^=
    LtLtEq,    // <<=
    GtGtEq,    // >>=

    // Increment/Decrement
    PlusPlus,   // ++
    MinusMinus, // --

    // Member access
    Dot,   // .
    Arrow, // ->

    Ellipsis, // ...

    // Ternary
    Question, // ?
    Colon,    // :

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Semicolon, // ;
    Comma,     // ,

    Eof,
}

impl TokenKind {
    fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "void" => TokenKind::Void,
            "char" => TokenKind::Char,
            "short" => TokenKind::Short,
            "int" => TokenKind::Int,
            "long" => TokenKind::Long,
            "float" => TokenKind::Float,
            "double" => TokenKind::Double,
            "signed" => TokenKind::Signed,
            "unsigned" => TokenKind::Unsigned,
            "struct" => TokenKind::Struct,
            "union" => TokenKind::Union,
            "enum" => TokenKind::Enum,
            "typedef" => TokenKind::Typedef,
            "static" => TokenKind::Static,
            "extern" => TokenKind::Extern,
            "auto" => TokenKind::Auto,
            "register" => TokenKind::Register,
            "const" => TokenKind::Const,
            "volatile" => TokenKind::Volatile,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "goto" => TokenKind::Goto,
            "sizeof" => TokenKind::Sizeof,
            "NULL" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }
}

/// A token with its source text and position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, location: SourceLocation) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            location,
        }
    }

    /// Same token, reported at a different position (used by macro expansion).
    pub fn relocated(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Eof => write!(f, "end of file"),
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::IntLiteral { .. } | TokenKind::FloatLiteral { .. } => {
                write!(f, "number {}", self.lexeme)
            }
            TokenKind::CharLiteral(_) => write!(f, "character literal {}", self.lexeme),
            TokenKind::StringLiteral(_) => write!(f, "string literal {}", self.lexeme),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}

/// Lexer error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{character}' at {location}")]
    UnexpectedCharacter {
        character: char,
        location: SourceLocation,
    },

    #[error("unterminated {what} starting at {location}")]
    Unterminated {
        what: &'static str,
        location: SourceLocation,
    },

    #[error("malformed {what} '{text}' at {location}")]
    MalformedLiteral {
        what: &'static str,
        text: String,
        location: SourceLocation,
    },

    #[error("unknown escape sequence '\\{sequence}' at {location}")]
    UnknownEscape {
        sequence: char,
        location: SourceLocation,
    },

    #[error("malformed preprocessor directive at {location}: {message}")]
    Directive {
        message: String,
        location: SourceLocation,
    },

    #[error("macro '{name}' expects {expected} argument(s) but got {found} at {location}")]
    MacroArity {
        name: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },
}

impl LexError {
    pub fn location(&self) -> SourceLocation {
        match self {
            LexError::UnexpectedCharacter { location, .. }
            | LexError::Unterminated { location, .. }
            | LexError::MalformedLiteral { location, .. }
            | LexError::UnknownEscape { location, .. }
            | LexError::Directive { location, .. }
            | LexError::MacroArity { location, .. } => *location,
        }
    }
}

/// Lexer for C source code
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    macros: MacroTable,
    /// Expanded tokens waiting to be yielded
    pending: VecDeque<Token>,
    /// Raw token read ahead while checking for a macro call
    lookahead: Option<Token>,
    finished: bool,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self::with_macros(input, MacroTable::new())
    }

    /// Create a lexer that starts with previously defined macros.
    pub fn with_macros(input: &str, macros: MacroTable) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            macros,
            pending: VecDeque::new(),
            lookahead: None,
            finished: false,
        }
    }

    /// Tokenize the entire input, ending with an `Eof` token.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        self.collect()
    }

    /// Macros defined so far, for chaining a prelude into user source.
    pub fn into_macros(self) -> MacroTable {
        self.macros
    }

    /// Next token before macro expansion
    fn next_raw(&mut self) -> Result<Token, LexError> {
        if let Some(token) = self.lookahead.take() {
            return Ok(token);
        }

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                return Ok(Token::new(TokenKind::Eof, "", self.current_location()));
            }

            if self.peek() == Some('#') {
                self.preprocessor_directive()?;
                continue;
            }

            return self.next_token();
        }
    }

    /// Expand a macro invocation whose name token has just been read.
    fn expand_invocation(&mut self, name_token: Token, name: &str) -> Result<(), LexError> {
        let at = name_token.location;
        let mut invocation = vec![name_token];

        if self.macros.is_function_like(name) {
            let next = self.next_raw()?;
            if next.kind != TokenKind::LParen {
                // Plain identifier use of a function-like macro name
                self.lookahead = Some(next);
                self.pending.extend(invocation);
                return Ok(());
            }
            invocation.push(next);
            let mut depth = 0usize;
            loop {
                let token = self.next_raw()?;
                match token.kind {
                    TokenKind::LParen => depth += 1,
                    TokenKind::RParen if depth == 0 => {
                        invocation.push(token);
                        break;
                    }
                    TokenKind::RParen => depth -= 1,
                    TokenKind::Eof => {
                        return Err(LexError::Unterminated {
                            what: "macro invocation",
                            location: at,
                        })
                    }
                    _ => {}
                }
                invocation.push(token);
            }
        }

        let expanded = self.macros.expand(invocation, at)?;
        self.pending.extend(expanded);
        Ok(())
    }

    /// Get next token
    fn next_token(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let loc = self.current_location();
        let ch = self.advance().ok_or(LexError::Unterminated {
            what: "input",
            location: loc,
        })?;

        let kind = match ch {
            // String literals
            '"' => self.string_literal(loc)?,

            // Character literals
            '\'' => self.char_literal(loc)?,

            // Numeric literals
            '0'..='9' => self.number_literal(start, loc)?,
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.number_literal(start, loc)?
            }

            // Identifiers and keywords
            'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(start),

            // Operators and punctuation
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusEq
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => self.with_eq(TokenKind::StarEq, TokenKind::Star),
            '/' => self.with_eq(TokenKind::SlashEq, TokenKind::Slash),
            '%' => self.with_eq(TokenKind::PercentEq, TokenKind::Percent),
            '=' => self.with_eq(TokenKind::EqEq, TokenKind::Eq),
            '!' => self.with_eq(TokenKind::NotEq, TokenKind::Bang),
            '^' => self.with_eq(TokenKind::CaretEq, TokenKind::Caret),
            '<' => {
                if self.eat('<') {
                    self.with_eq(TokenKind::LtLtEq, TokenKind::LtLt)
                } else {
                    self.with_eq(TokenKind::Le, TokenKind::Lt)
                }
            }
            '>' => {
                if self.eat('>') {
                    self.with_eq(TokenKind::GtGtEq, TokenKind::GtGt)
                } else {
                    self.with_eq(TokenKind::Ge, TokenKind::Gt)
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::AndAnd
                } else {
                    self.with_eq(TokenKind::AmpEq, TokenKind::Amp)
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::OrOr
                } else {
                    self.with_eq(TokenKind::PipeEq, TokenKind::Pipe)
                }
            }
            '.' => {
                if self.peek() == Some('.') && self.peek_ahead(1) == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '~' => TokenKind::Tilde,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,

            _ => {
                return Err(LexError::UnexpectedCharacter {
                    character: ch,
                    location: loc,
                })
            }
        };

        let lexeme: String = self.input[start..self.position].iter().collect();
        Ok(Token::new(kind, lexeme, loc))
    }

    fn with_eq(&mut self, with: TokenKind, without: TokenKind) -> TokenKind {
        if self.eat('=') {
            with
        } else {
            without
        }
    }

    /// Parse string literal (opening quote already consumed)
    fn string_literal(&mut self, loc: SourceLocation) -> Result<TokenKind, LexError> {
        let mut bytes = Vec::new();

        while let Some(ch) = self.peek() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(TokenKind::StringLiteral(bytes));
                }
                '\n' => break,
                '\\' => {
                    self.advance();
                    bytes.push(self.escape_sequence(loc, "string literal")?);
                }
                _ => {
                    self.advance();
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }

        Err(LexError::Unterminated {
            what: "string literal",
            location: loc,
        })
    }

    /// Parse character literal (opening quote already consumed)
    fn char_literal(&mut self, loc: SourceLocation) -> Result<TokenKind, LexError> {
        let value = match self.peek() {
            None | Some('\n') => {
                return Err(LexError::Unterminated {
                    what: "character literal",
                    location: loc,
                })
            }
            Some('\'') => {
                return Err(LexError::MalformedLiteral {
                    what: "character literal",
                    text: "''".to_string(),
                    location: loc,
                })
            }
            Some('\\') => {
                self.advance();
                self.escape_sequence(loc, "character literal")?
            }
            Some(ch) => {
                self.advance();
                if ch.is_ascii() {
                    ch as u8
                } else {
                    return Err(LexError::MalformedLiteral {
                        what: "character literal",
                        text: ch.to_string(),
                        location: loc,
                    });
                }
            }
        };

        match self.peek() {
            Some('\'') => {
                self.advance();
                Ok(TokenKind::CharLiteral(value))
            }
            None | Some('\n') => Err(LexError::Unterminated {
                what: "character literal",
                location: loc,
            }),
            Some(_) => {
                let mut text = String::from("'");
                while let Some(ch) = self.peek() {
                    if ch == '\'' || ch == '\n' {
                        break;
                    }
                    text.push(ch);
                    self.advance();
                }
                self.eat('\'');
                Err(LexError::MalformedLiteral {
                    what: "character literal",
                    text,
                    location: loc,
                })
            }
        }
    }

    /// Decode one escape sequence; the backslash has been consumed.
    fn escape_sequence(&mut self, start: SourceLocation, what: &'static str) -> Result<u8, LexError> {
        let loc = self.current_location();
        let escaped = self.advance().ok_or(LexError::Unterminated {
            what,
            location: start,
        })?;

        let value = match escaped {
            'n' => b'\n',
            't' => b'\t',
            'r' => b'\r',
            'a' => 0x07,
            'b' => 0x08,
            'f' => 0x0c,
            'v' => 0x0b,
            '\\' => b'\\',
            '\'' => b'\'',
            '"' => b'"',
            '?' => b'?',
            '0'..='7' => {
                let mut value = escaped as u32 - '0' as u32;
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ '0'..='7') => {
                            value = value * 8 + (d as u32 - '0' as u32);
                            self.advance();
                        }
                        _ => break,
                    }
                }
                u8::try_from(value).map_err(|_| LexError::MalformedLiteral {
                    what: "octal escape",
                    text: format!("\\{:o}", value),
                    location: loc,
                })?
            }
            'x' => {
                let mut digits = String::new();
                while let Some(d) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                    digits.push(d);
                    self.advance();
                }
                u8::from_str_radix(&digits, 16).map_err(|_| LexError::MalformedLiteral {
                    what: "hex escape",
                    text: format!("\\x{}", digits),
                    location: loc,
                })?
            }
            other => {
                return Err(LexError::UnknownEscape {
                    sequence: other,
                    location: loc,
                })
            }
        };
        Ok(value)
    }

    /// Parse numeric literal starting at `start` (first character consumed)
    fn number_literal(&mut self, start: usize, loc: SourceLocation) -> Result<TokenKind, LexError> {
        let first = self.input[start];

        // Hexadecimal
        if first == '0' && matches!(self.peek(), Some('x') | Some('X')) {
            self.advance();
            let digits = self.take_while(|c| c.is_ascii_hexdigit());
            let value = u64::from_str_radix(&digits, 16).map_err(|_| self.malformed(start, loc))?;
            let (unsigned, long) = self.integer_suffix(start, loc)?;
            return Ok(TokenKind::IntLiteral {
                value,
                unsigned,
                long,
                decimal: false,
            });
        }

        let mut integer_part = String::new();
        if first != '.' {
            integer_part.push(first);
            integer_part.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        let is_float = first == '.'
            || self.peek() == Some('.')
            || matches!(self.peek(), Some('e') | Some('E'));

        if !is_float {
            let radix = if integer_part.len() > 1 && integer_part.starts_with('0') {
                8
            } else {
                10
            };
            let value =
                u64::from_str_radix(&integer_part, radix).map_err(|_| self.malformed(start, loc))?;
            let (unsigned, long) = self.integer_suffix(start, loc)?;
            return Ok(TokenKind::IntLiteral {
                value,
                unsigned,
                long,
                decimal: radix == 10,
            });
        }

        let mut fraction = String::new();
        if first == '.' {
            fraction.push_str(&self.take_while(|c| c.is_ascii_digit()));
        } else if self.eat('.') {
            fraction.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        let mut exponent = String::from("0");
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.advance();
            let mut exp = String::new();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                exp.push(sign);
                self.advance();
            }
            let digits = self.take_while(|c| c.is_ascii_digit());
            if digits.is_empty() {
                return Err(self.malformed(start, loc));
            }
            exp.push_str(&digits);
            exponent = exp;
        }

        let single = match self.peek() {
            Some('f') | Some('F') => {
                self.advance();
                true
            }
            Some('l') | Some('L') => {
                self.advance();
                false
            }
            _ => false,
        };
        if self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(self.malformed(start, loc));
        }

        let normalized = format!(
            "{}.{}e{}",
            if integer_part.is_empty() { "0" } else { &integer_part },
            if fraction.is_empty() { "0" } else { &fraction },
            exponent
        );
        let value = normalized
            .parse::<f64>()
            .map_err(|_| self.malformed(start, loc))?;

        Ok(TokenKind::FloatLiteral { value, single })
    }

    /// Consume `u`/`l` suffixes in any order and case.
    fn integer_suffix(&mut self, start: usize, loc: SourceLocation) -> Result<(bool, bool), LexError> {
        let mut unsigned = false;
        let mut long = false;
        while let Some(ch) = self.peek() {
            match ch {
                'u' | 'U' if !unsigned => unsigned = true,
                'l' | 'L' => long = true,
                _ => break,
            }
            self.advance();
        }
        if self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            return Err(self.malformed(start, loc));
        }
        Ok((unsigned, long))
    }

    fn malformed(&mut self, start: usize, loc: SourceLocation) -> LexError {
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        LexError::MalformedLiteral {
            what: "number",
            text: self.input[start..self.position].iter().collect(),
            location: loc,
        }
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self, start: usize) -> TokenKind {
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let ident: String = self.input[start..self.position].iter().collect();
        TokenKind::keyword(&ident).unwrap_or(TokenKind::Ident(ident))
    }

    /// Handle a `#` line. `#define`/`#undef` update the macro table.
    fn preprocessor_directive(&mut self) -> Result<(), LexError> {
        let loc = self.current_location();
        self.advance(); // skip '#'
        self.skip_directive_whitespace()?;

        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        match name.as_str() {
            "define" => self.define_directive(loc),
            "undef" => {
                self.skip_directive_whitespace()?;
                let target = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                if target.is_empty() {
                    return Err(LexError::Directive {
                        message: "expected macro name after #undef".to_string(),
                        location: loc,
                    });
                }
                self.macros.undefine(&target);
                self.skip_rest_of_line();
                Ok(())
            }
            _ => {
                log::trace!("skipping directive #{} at {}", name, loc);
                self.skip_rest_of_line();
                Ok(())
            }
        }
    }

    fn define_directive(&mut self, loc: SourceLocation) -> Result<(), LexError> {
        self.skip_directive_whitespace()?;
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(LexError::Directive {
                message: "expected macro name after #define".to_string(),
                location: loc,
            });
        }

        // Function-like only when '(' immediately follows the name
        let params = if self.peek() == Some('(') {
            self.advance();
            let mut params = Vec::new();
            loop {
                self.skip_directive_whitespace()?;
                match self.peek() {
                    Some(')') => {
                        self.advance();
                        break;
                    }
                    Some(',') if !params.is_empty() => {
                        self.advance();
                    }
                    Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                        params.push(self.take_while(|c| c.is_ascii_alphanumeric() || c == '_'));
                    }
                    _ => {
                        return Err(LexError::Directive {
                            message: format!("malformed parameter list for macro '{}'", name),
                            location: loc,
                        })
                    }
                }
            }
            Some(params)
        } else {
            None
        };

        let mut body = Vec::new();
        loop {
            self.skip_directive_whitespace()?;
            if self.is_at_end() || self.peek() == Some('\n') {
                break;
            }
            body.push(self.next_token()?);
        }

        self.macros.define(name, params, body);
        Ok(())
    }

    /// Skip blanks, comments and line continuations without leaving the line
    fn skip_directive_whitespace(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('\\') if self.continuation_follows() => {
                    self.skip_continuation();
                }
                Some('/') if self.peek_ahead(1) == Some('*') => self.skip_block_comment()?,
                Some('/') if self.peek_ahead(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn continuation_follows(&self) -> bool {
        match self.peek_ahead(1) {
            Some('\n') => true,
            Some('\r') => self.peek_ahead(2) == Some('\n'),
            _ => false,
        }
    }

    fn skip_continuation(&mut self) {
        self.advance(); // '\'
        if self.peek() == Some('\r') {
            self.advance();
        }
        self.advance(); // '\n'
    }

    /// Skip to the end of a directive line, honouring continuations
    fn skip_rest_of_line(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\\' && self.continuation_follows() {
                self.skip_continuation();
                continue;
            }
            self.advance();
            if ch == '\n' {
                break;
            }
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') | Some('\x0c') | Some('\x0b') => {
                    self.advance();
                }
                Some('\\') if self.continuation_follows() => self.skip_continuation(),
                Some('/') => {
                    if self.peek_ahead(1) == Some('/') {
                        self.skip_line_comment();
                    } else if self.peek_ahead(1) == Some('*') {
                        self.skip_block_comment()?;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Skip single-line comment (// ...)
    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            self.advance();
            if ch == '\n' {
                break;
            }
        }
    }

    /// Skip multi-line comment (/* ... */)
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start_loc = self.current_location();
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(LexError::Unterminated {
            what: "block comment",
            location: start_loc,
        })
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(ch) = self.peek().filter(|c| pred(*c)) {
            taken.push(ch);
            self.advance();
        }
        taken
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    /// Check if at end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get current source location
    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(Ok(token));
            }
            if self.finished {
                return None;
            }

            let token = match self.next_raw() {
                Ok(token) => token,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            match &token.kind {
                TokenKind::Eof => {
                    self.finished = true;
                    return Some(Ok(token));
                }
                TokenKind::Ident(name) if self.macros.contains(name) => {
                    let name = name.clone();
                    if let Err(e) = self.expand_invocation(token, &name) {
                        self.finished = true;
                        return Some(Err(e));
                    }
                }
                _ => return Some(Ok(token)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = kinds("int main() { return 0; }");

        assert_eq!(tokens[0], TokenKind::Int);
        assert!(matches!(tokens[1], TokenKind::Ident(ref s) if s == "main"));
        assert_eq!(tokens[2], TokenKind::LParen);
        assert_eq!(tokens[3], TokenKind::RParen);
        assert_eq!(tokens[4], TokenKind::LBrace);
        assert_eq!(tokens[5], TokenKind::Return);
        assert!(matches!(tokens[6], TokenKind::IntLiteral { value: 0, .. }));
        assert_eq!(tokens[7], TokenKind::Semicolon);
        assert_eq!(tokens[8], TokenKind::RBrace);
        assert_eq!(tokens[9], TokenKind::Eof);
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("++ -- += -= == != && || <<= >>= &= |= ^= -> ...");

        assert_eq!(
            tokens,
            vec![
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::LtLtEq,
                TokenKind::GtGtEq,
                TokenKind::AmpEq,
                TokenKind::PipeEq,
                TokenKind::CaretEq,
                TokenKind::Arrow,
                TokenKind::Ellipsis,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let tokens = kinds("int x; // comment\nint y; /* block\ncomment */ int z;");

        assert_eq!(tokens[0], TokenKind::Int);
        assert!(matches!(tokens[1], TokenKind::Ident(ref s) if s == "x"));
        assert_eq!(tokens[3], TokenKind::Int);
        assert!(matches!(tokens[4], TokenKind::Ident(ref s) if s == "y"));
        assert_eq!(tokens[6], TokenKind::Int);
        assert!(matches!(tokens[7], TokenKind::Ident(ref s) if s == "z"));
    }

    #[test]
    fn test_string_literal_escapes() {
        let tokens = kinds(r#""hello\n\tworld\101\x42\0""#);
        assert_eq!(
            tokens[0],
            TokenKind::StringLiteral(b"hello\n\tworldAB\0".to_vec())
        );
    }

    #[test]
    fn test_char_literals() {
        let tokens = kinds(r"'a' '\n' '\0' '\'' '\\' '\377'");
        assert_eq!(tokens[0], TokenKind::CharLiteral(b'a'));
        assert_eq!(tokens[1], TokenKind::CharLiteral(b'\n'));
        assert_eq!(tokens[2], TokenKind::CharLiteral(0));
        assert_eq!(tokens[3], TokenKind::CharLiteral(b'\''));
        assert_eq!(tokens[4], TokenKind::CharLiteral(b'\\'));
        assert_eq!(tokens[5], TokenKind::CharLiteral(0xff));
    }

    #[test]
    fn test_integer_literals() {
        let tokens = kinds("42 052 0x2A 42u 42L 0xffffffffUL");
        assert!(matches!(tokens[0], TokenKind::IntLiteral { value: 42, decimal: true, .. }));
        assert!(matches!(tokens[1], TokenKind::IntLiteral { value: 42, decimal: false, .. }));
        assert!(matches!(tokens[2], TokenKind::IntLiteral { value: 42, decimal: false, .. }));
        assert!(matches!(tokens[3], TokenKind::IntLiteral { value: 42, unsigned: true, long: false, .. }));
        assert!(matches!(tokens[4], TokenKind::IntLiteral { value: 42, unsigned: false, long: true, .. }));
        assert!(matches!(
            tokens[5],
            TokenKind::IntLiteral { value: 0xffff_ffff, unsigned: true, long: true, .. }
        ));
    }

    #[test]
    fn test_float_literals() {
        let tokens = kinds("1.5 .5 1e3 2.5f 3. 1.0e-2");
        assert_eq!(tokens[0], TokenKind::FloatLiteral { value: 1.5, single: false });
        assert_eq!(tokens[1], TokenKind::FloatLiteral { value: 0.5, single: false });
        assert_eq!(tokens[2], TokenKind::FloatLiteral { value: 1000.0, single: false });
        assert_eq!(tokens[3], TokenKind::FloatLiteral { value: 2.5, single: true });
        assert_eq!(tokens[4], TokenKind::FloatLiteral { value: 3.0, single: false });
        assert_eq!(tokens[5], TokenKind::FloatLiteral { value: 0.01, single: false });
    }

    #[test]
    fn test_member_access_is_not_float() {
        let tokens = kinds("pt.x");
        assert_eq!(tokens[1], TokenKind::Dot);
    }

    #[test]
    fn test_keywords_and_null() {
        let tokens = kinds("unsigned long static extern NULL typedef union enum");
        assert_eq!(
            &tokens[..8],
            &[
                TokenKind::Unsigned,
                TokenKind::Long,
                TokenKind::Static,
                TokenKind::Extern,
                TokenKind::Null,
                TokenKind::Typedef,
                TokenKind::Union,
                TokenKind::Enum,
            ]
        );
    }

    #[test]
    fn test_preprocessor_skip() {
        let tokens = kinds("#include <stdio.h>\n#ifdef X\nint x;\n#endif");
        assert_eq!(tokens[0], TokenKind::Int);
        assert!(matches!(tokens[1], TokenKind::Ident(ref s) if s == "x"));
    }

    #[test]
    fn test_locations() {
        let tokens = Lexer::new("int\n  x;").tokenize().unwrap();
        assert_eq!(tokens[0].location, SourceLocation::new(1, 1));
        assert_eq!(tokens[1].location, SourceLocation::new(2, 3));
        assert_eq!(tokens[1].lexeme, "x");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert!(matches!(err, LexError::Unterminated { what: "string literal", .. }));
    }

    #[test]
    fn test_unterminated_comment() {
        let err = Lexer::new("int /* never closed").tokenize().unwrap_err();
        assert!(matches!(err, LexError::Unterminated { what: "block comment", .. }));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("int @x;").tokenize().unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '@',
                location: SourceLocation::new(1, 5)
            }
        );
    }

    #[test]
    fn test_malformed_number() {
        assert!(matches!(
            Lexer::new("int x = 09;").tokenize().unwrap_err(),
            LexError::MalformedLiteral { .. }
        ));
        assert!(matches!(
            Lexer::new("1e+").tokenize().unwrap_err(),
            LexError::MalformedLiteral { .. }
        ));
    }

    #[test]
    fn test_lexer_is_lazy_iterator() {
        let mut lexer = Lexer::new("a b");
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Ident(_), .. }))));
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Ident(_), .. }))));
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Eof, .. }))));
        assert!(lexer.next().is_none());
    }
}
