//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including the error type, token helpers, and the main parse entry point.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, and coordination
//! - `declarations`: specifiers, declarators, initializers, struct/enum/typedef
//! - `statements`: Parsing statements (if, while, for, etc.)
//! - `expressions`: Parsing expressions with one method per precedence level
//!
//! Parser methods are split across multiple files using `impl Parser` blocks.
//! Parsing stops at the first error.

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, Token, TokenKind};
use crate::parser::prelude::tokenize_with_prelude;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Parser error type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}, found {found} at {location}")]
pub struct ParseError {
    pub message: String,
    /// Description of the offending token
    pub found: String,
    /// What would have been accepted instead
    pub expected: Vec<String>,
    pub location: SourceLocation,
}

/// Recursive descent parser for the C subset
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    /// typedef name -> aliased type
    pub(crate) typedefs: FxHashMap<String, Type>,
    /// enumerator -> folded value
    pub(crate) enum_constants: FxHashMap<String, i64>,
    pub(crate) structs: Vec<StructDef>,
    pub(crate) next_literal_id: NodeId,
    pub(crate) anonymous_tags: usize,
}

impl Parser {
    /// Lex `source` (after the built-in prelude) and prepare to parse it.
    pub fn new(source: &str) -> Result<Self, LexError> {
        let tokens = tokenize_with_prelude(source)?;
        Ok(Self::from_tokens(tokens))
    }

    /// Parse an already tokenized stream. The last token must be `Eof`.
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let location = tokens.last().map(|t| t.location).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", location));
        }
        Self {
            tokens,
            position: 0,
            typedefs: FxHashMap::default(),
            enum_constants: FxHashMap::default(),
            structs: Vec::new(),
            next_literal_id: 0,
            anonymous_tags: 0,
        }
    }

    /// Parse the entire program (top-level declarations)
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();

        while !self.is_at_end() {
            let items = self.parse_external_declaration()?;
            program.items.extend(items);
        }

        program.structs = std::mem::take(&mut self.structs);
        log::debug!(
            "parsed {} top-level items, {} struct definitions",
            program.items.len(),
            program.structs.len()
        );
        Ok(program)
    }

    // ===== Helper methods =====

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn check_ahead(&self, n: usize, kind: &TokenKind) -> bool {
        self.peek_ahead(n)
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn previous_location(&self) -> SourceLocation {
        self.previous().location
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().location
    }

    /// Error at the current token
    pub(crate) fn error(&self, message: impl Into<String>, expected: &[&str]) -> ParseError {
        ParseError {
            message: message.into(),
            found: self.peek().to_string(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            location: self.current_location(),
        }
    }

    /// Error for a construct that is recognized but deliberately unsupported
    pub(crate) fn unsupported(&self, what: &str, location: SourceLocation) -> ParseError {
        ParseError {
            message: format!("{} are not supported", what),
            found: self.peek().to_string(),
            expected: Vec::new(),
            location,
        }
    }

    pub(crate) fn expect_token(&mut self, kind: &TokenKind, symbol: &str, ctx: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}' {}", symbol, ctx), &[symbol]))
        }
    }

    pub(crate) fn expect_lparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::LParen, "(", ctx)
    }

    pub(crate) fn expect_rparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::RParen, ")", ctx)
    }

    pub(crate) fn expect_lbrace(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::LBrace, "{", ctx)
    }

    pub(crate) fn expect_rbrace(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::RBrace, "}", ctx)
    }

    pub(crate) fn expect_semicolon(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::Semicolon, ";", ctx)
    }

    pub(crate) fn expect_identifier(&mut self, ctx: &str) -> Result<String, ParseError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(format!("Expected identifier {}", ctx), &["identifier"]))
        }
    }

    pub(crate) fn next_literal_id(&mut self) -> NodeId {
        let id = self.next_literal_id;
        self.next_literal_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source).unwrap().parse_program().unwrap()
    }

    #[test]
    fn test_parse_simple_function() {
        let program = parse("int main() { return 0; }");

        assert_eq!(program.items.len(), 1);
        match &program.items[0] {
            Item::Function(def) => {
                assert_eq!(def.name, "main");
                assert!(def.params.is_empty());
                assert_eq!(def.return_type, Type::Int);
                assert_eq!(def.body.len(), 1);
            }
            other => panic!("Expected function definition, got {:?}", other),
        }
    }

    #[test]
    fn test_implicit_int_main() {
        let program = parse("main() { return 0; }");
        let main = program.function("main").unwrap();
        assert_eq!(main.return_type, Type::Int);
    }

    #[test]
    fn test_parse_struct() {
        let program = parse("struct point { int x; int y; };");

        assert!(program.items.is_empty());
        let point = program.structs.iter().find(|s| s.name == "point").unwrap();
        assert_eq!(point.fields.len(), 2);
        assert!(!point.is_union);
    }

    #[test]
    fn test_prototype_and_globals() {
        let program = parse("int getline(char s[], int lim);\nint max, len = 3;\nchar line[100];");
        assert!(matches!(&program.items[0], Item::Prototype(p) if p.name == "getline"));
        match &program.items[1] {
            Item::Globals(decls) => {
                assert_eq!(decls.len(), 2);
                assert!(decls[1].init.is_some());
            }
            other => panic!("Expected globals, got {:?}", other),
        }
        match &program.items[2] {
            Item::Globals(decls) => assert_eq!(decls[0].ty, Type::Char.array_of(Some(100))),
            other => panic!("Expected globals, got {:?}", other),
        }
    }

    #[test]
    fn test_error_reports_found_token() {
        let err = Parser::new("int main() { return 0 }")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert_eq!(err.found, "'}'");
        assert_eq!(err.expected, vec![";".to_string()]);
        assert_eq!(err.location.line, 1);
    }
}
