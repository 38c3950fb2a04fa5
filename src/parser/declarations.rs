//! Declaration parsing implementation
//!
//! Handles everything that introduces a name:
//!
//! - Declaration specifiers: storage class, qualifiers, type keywords
//!   (`unsigned long`, `short int`, ...), typedef names, inline
//!   `struct`/`union`/`enum` definitions
//! - Declarators: pointers, arrays, parenthesised declarators (`(*p)[N]`)
//!   and function parameter lists
//! - Initializers: expressions and (nested) brace lists
//! - Top-level items: function definitions, prototypes, globals, typedefs
//!
//! # Grammar
//!
//! ```text
//! external_decl ::= specifiers ( ";" | init_declarator ("," init_declarator)* ";"
//!                              | declarator compound_statement )
//! declarator    ::= "*"* ( identifier | "(" declarator ")" ) suffix*
//! suffix        ::= "[" constant? "]" | "(" params ")"
//! initializer   ::= assignment | "{" initializer ("," initializer)* ","? "}"
//! ```

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

/// Result of parsing declaration specifiers
#[derive(Debug, Clone)]
pub(crate) struct DeclSpec {
    pub ty: Type,
    pub storage: StorageClass,
    pub is_const: bool,
    pub is_typedef: bool,
}

/// A parsed declarator, before it is turned into a variable or function
#[derive(Debug, Clone)]
pub(crate) struct Declarator {
    pub name: Option<String>,
    pub ty: Type,
    /// Present when the declarator declares a function
    pub params: Option<Vec<Param>>,
    pub variadic: bool,
    pub location: SourceLocation,
}

enum Suffix {
    Array(Option<usize>),
    Function(Vec<Param>, bool),
}

/// One declarator of a local or global declaration
pub(crate) enum InitDeclarator {
    Variable(Declaration),
    Function(FunctionDecl),
}

#[derive(Default)]
struct TypeKeywords {
    void: bool,
    char: bool,
    short: bool,
    int: bool,
    long: usize,
    float: bool,
    double: bool,
    signed: bool,
    unsigned: bool,
}

impl TypeKeywords {
    fn any(&self) -> bool {
        self.void
            || self.char
            || self.short
            || self.int
            || self.long > 0
            || self.float
            || self.double
            || self.signed
            || self.unsigned
    }

    fn resolve(&self) -> Option<Type> {
        let ty = if self.void {
            Type::Void
        } else if self.char {
            if self.unsigned {
                Type::UChar
            } else {
                Type::Char
            }
        } else if self.float {
            Type::Float
        } else if self.double {
            Type::Double
        } else if self.short {
            if self.unsigned {
                Type::UShort
            } else {
                Type::Short
            }
        } else if self.long > 0 {
            if self.unsigned {
                Type::ULong
            } else {
                Type::Long
            }
        } else if self.int || self.signed || self.unsigned {
            if self.unsigned {
                Type::UInt
            } else {
                Type::Int
            }
        } else {
            return None;
        };
        Some(ty)
    }
}

impl Parser {
    /// Whether the current token can begin a declaration
    pub(crate) fn is_declaration_start(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Void
            | TokenKind::Char
            | TokenKind::Short
            | TokenKind::Int
            | TokenKind::Long
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Signed
            | TokenKind::Unsigned
            | TokenKind::Struct
            | TokenKind::Union
            | TokenKind::Enum
            | TokenKind::Typedef
            | TokenKind::Static
            | TokenKind::Extern
            | TokenKind::Auto
            | TokenKind::Register
            | TokenKind::Const
            | TokenKind::Volatile => true,
            TokenKind::Ident(name) => self.typedefs.contains_key(name),
            _ => false,
        }
    }

    /// Whether the token `n` places ahead can begin a type name (casts, sizeof)
    pub(crate) fn is_type_name_ahead(&self, n: usize) -> bool {
        match self.peek_ahead(n).map(|t| &t.kind) {
            Some(
                TokenKind::Void
                | TokenKind::Char
                | TokenKind::Short
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Signed
                | TokenKind::Unsigned
                | TokenKind::Struct
                | TokenKind::Union
                | TokenKind::Enum
                | TokenKind::Const
                | TokenKind::Volatile,
            ) => true,
            Some(TokenKind::Ident(name)) => self.typedefs.contains_key(name),
            _ => false,
        }
    }

    /// Parse a top-level declaration; may yield several items or none.
    pub(crate) fn parse_external_declaration(&mut self) -> Result<Vec<Item>, ParseError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(Vec::new());
        }

        let spec = if self.is_declaration_start() {
            self.parse_decl_specifiers()?
        } else if matches!(self.peek().kind, TokenKind::Ident(_))
            && self.check_ahead(1, &TokenKind::LParen)
        {
            // K&R style `main() { ... }` with implicit int
            DeclSpec {
                ty: Type::Int,
                storage: StorageClass::Auto,
                is_const: false,
                is_typedef: false,
            }
        } else {
            return Err(self.error("Expected declaration", &["type specifier"]));
        };

        // `struct point { ... };` or `enum { A, B };`
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(Vec::new());
        }

        if spec.is_typedef {
            self.parse_typedef_declarators(&spec)?;
            return Ok(Vec::new());
        }

        let first = self.parse_declarator(spec.ty.clone(), false)?;

        if first.params.is_some() && self.check(&TokenKind::LBrace) {
            return Ok(vec![Item::Function(self.parse_function_body(first)?)]);
        }

        let mut items = Vec::new();
        let mut globals = Vec::new();
        let mut declarator = first;
        loop {
            match self.finish_init_declarator(&spec, declarator)? {
                InitDeclarator::Variable(decl) => globals.push(decl),
                InitDeclarator::Function(proto) => {
                    if !globals.is_empty() {
                        items.push(Item::Globals(std::mem::take(&mut globals)));
                    }
                    items.push(Item::Prototype(proto));
                }
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
            declarator = self.parse_declarator(spec.ty.clone(), false)?;
        }
        self.expect_semicolon("after declaration")?;

        if !globals.is_empty() {
            items.push(Item::Globals(globals));
        }
        Ok(items)
    }

    /// Parse a function body after its declarator
    fn parse_function_body(&mut self, declarator: Declarator) -> Result<FunctionDef, ParseError> {
        let location = declarator.location;
        let name = declarator.name.ok_or_else(|| self.error("Expected function name", &["identifier"]))?;
        if declarator.variadic {
            return Err(self.unsupported("variadic function definitions", location));
        }
        let params = declarator.params.unwrap_or_default();
        if let Some(unnamed) = params.iter().find(|p| p.name.is_none()) {
            return Err(ParseError {
                message: format!("Parameter of '{}' needs a name", name),
                found: unnamed.ty.to_string(),
                expected: vec!["identifier".to_string()],
                location: unnamed.location,
            });
        }

        self.expect_lbrace("before function body")?;
        let body = self.parse_block_statements()?;
        self.expect_rbrace("after function body")?;

        Ok(FunctionDef {
            name,
            return_type: declarator.ty,
            params,
            body,
            location,
            frame_size: 0,
        })
    }

    /// Parse the declarators of a local declaration statement (after the specifiers)
    pub(crate) fn parse_local_declaration(&mut self, spec: DeclSpec) -> Result<Vec<Declaration>, ParseError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(Vec::new());
        }
        if spec.is_typedef {
            self.parse_typedef_declarators(&spec)?;
            return Ok(Vec::new());
        }

        let mut decls = Vec::new();
        loop {
            let declarator = self.parse_declarator(spec.ty.clone(), false)?;
            // Block-scope prototypes such as `double atof(char []);` add nothing at runtime
            if let InitDeclarator::Variable(decl) = self.finish_init_declarator(&spec, declarator)? {
                decls.push(decl);
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_semicolon("after declaration")?;
        Ok(decls)
    }

    fn finish_init_declarator(&mut self, spec: &DeclSpec, declarator: Declarator) -> Result<InitDeclarator, ParseError> {
        let location = declarator.location;
        let name = declarator
            .name
            .ok_or_else(|| self.error("Expected declarator name", &["identifier"]))?;

        if let Some(params) = declarator.params {
            return Ok(InitDeclarator::Function(FunctionDecl {
                name,
                return_type: declarator.ty,
                params,
                location,
            }));
        }

        let init = if self.match_token(&TokenKind::Eq) {
            Some(self.parse_initializer()?)
        } else {
            None
        };

        Ok(InitDeclarator::Variable(Declaration {
            name,
            ty: declarator.ty,
            storage: spec.storage,
            is_const: spec.is_const,
            init,
            location,
            binding: None,
        }))
    }

    fn parse_typedef_declarators(&mut self, spec: &DeclSpec) -> Result<(), ParseError> {
        loop {
            let declarator = self.parse_declarator(spec.ty.clone(), false)?;
            if declarator.params.is_some() {
                return Err(self.unsupported("function typedefs", declarator.location));
            }
            let name = declarator
                .name
                .ok_or_else(|| self.error("Expected typedef name", &["identifier"]))?;
            log::trace!("typedef {} = {}", name, declarator.ty);
            self.typedefs.insert(name, declarator.ty);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_semicolon("after typedef")
    }

    /// Parse declaration specifiers: storage class, qualifiers and the base type
    pub(crate) fn parse_decl_specifiers(&mut self) -> Result<DeclSpec, ParseError> {
        let start = self.current_location();
        let mut keywords = TypeKeywords::default();
        let mut named: Option<Type> = None;
        let mut storage = StorageClass::Auto;
        let mut is_const = false;
        let mut is_typedef = false;
        let mut saw_storage = false;

        loop {
            match &self.peek().kind {
                TokenKind::Typedef => is_typedef = true,
                TokenKind::Static => {
                    storage = StorageClass::Static;
                    saw_storage = true;
                }
                TokenKind::Extern => {
                    storage = StorageClass::Extern;
                    saw_storage = true;
                }
                TokenKind::Auto | TokenKind::Register => saw_storage = true,
                TokenKind::Const => is_const = true,
                TokenKind::Volatile => {}
                TokenKind::Void => keywords.void = true,
                TokenKind::Char => keywords.char = true,
                TokenKind::Short => keywords.short = true,
                TokenKind::Int => keywords.int = true,
                TokenKind::Long => keywords.long += 1,
                TokenKind::Float => keywords.float = true,
                TokenKind::Double => keywords.double = true,
                TokenKind::Signed => keywords.signed = true,
                TokenKind::Unsigned => keywords.unsigned = true,
                TokenKind::Struct | TokenKind::Union if named.is_none() => {
                    let is_union = self.peek().kind == TokenKind::Union;
                    self.advance();
                    named = Some(self.parse_struct_specifier(is_union)?);
                    continue;
                }
                TokenKind::Enum if named.is_none() => {
                    self.advance();
                    self.parse_enum_specifier()?;
                    named = Some(Type::Int);
                    continue;
                }
                TokenKind::Ident(name) if named.is_none() && !keywords.any() => {
                    match self.typedefs.get(name) {
                        Some(ty) => named = Some(ty.clone()),
                        None => break,
                    }
                }
                _ => break,
            }
            self.advance();
        }

        let ty = match named {
            Some(ty) => {
                if keywords.any() {
                    return Err(ParseError {
                        message: "Conflicting type specifiers".to_string(),
                        found: self.previous().to_string(),
                        expected: Vec::new(),
                        location: start,
                    });
                }
                ty
            }
            None => match keywords.resolve() {
                Some(ty) => ty,
                // `static x;`, `const n = 4;`: implicit int
                None if saw_storage || is_const || is_typedef => Type::Int,
                None => return Err(self.error("Expected type specifier", &["type specifier"])),
            },
        };

        Ok(DeclSpec {
            ty,
            storage,
            is_const,
            is_typedef,
        })
    }

    /// Parse `struct`/`union` tag and optional body; the keyword is consumed.
    fn parse_struct_specifier(&mut self, is_union: bool) -> Result<Type, ParseError> {
        let location = self.previous_location();
        let tag = if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        };

        if !self.check(&TokenKind::LBrace) {
            return match tag {
                Some(tag) => Ok(Type::Struct(tag)),
                None => Err(self.error("Expected struct tag or '{'", &["identifier", "{"])),
            };
        }

        let name = tag.unwrap_or_else(|| {
            self.anonymous_tags += 1;
            format!("__anon_{}", self.anonymous_tags)
        });

        self.expect_lbrace("after struct name")?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let spec = self.parse_decl_specifiers()?;
            loop {
                let declarator = self.parse_declarator(spec.ty.clone(), false)?;
                if self.check(&TokenKind::Colon) {
                    return Err(self.unsupported("bit-fields", self.current_location()));
                }
                if declarator.params.is_some() {
                    return Err(self.unsupported("function members", declarator.location));
                }
                let field_name = declarator
                    .name
                    .ok_or_else(|| self.error("Expected field name", &["identifier"]))?;
                fields.push(Field {
                    name: field_name,
                    ty: declarator.ty,
                    location: declarator.location,
                });
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_semicolon("after struct field")?;
        }
        self.expect_rbrace("after struct fields")?;

        self.structs.push(StructDef {
            name: name.clone(),
            fields,
            is_union,
            location,
        });
        Ok(Type::Struct(name))
    }

    /// Parse `enum` tag and optional enumerator list; the keyword is consumed.
    fn parse_enum_specifier(&mut self) -> Result<(), ParseError> {
        if let TokenKind::Ident(_) = self.peek().kind {
            self.advance();
        }
        if !self.match_token(&TokenKind::LBrace) {
            return Ok(());
        }

        let mut next_value = 0i64;
        while !self.check(&TokenKind::RBrace) {
            let name = self.expect_identifier("in enumerator list")?;
            if self.match_token(&TokenKind::Eq) {
                let expr = self.parse_conditional()?;
                next_value = self.fold_constant(&expr).ok_or_else(|| ParseError {
                    message: format!("Value of enumerator '{}' is not an integer constant", name),
                    found: self.previous().to_string(),
                    expected: Vec::new(),
                    location: expr.location,
                })?;
            }
            self.enum_constants.insert(name, next_value);
            next_value = next_value.wrapping_add(1);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_rbrace("after enumerator list")
    }

    /// Parse a declarator applied to `base`. With `allow_abstract` the name may be omitted.
    pub(crate) fn parse_declarator(&mut self, base: Type, allow_abstract: bool) -> Result<Declarator, ParseError> {
        let mut ty = base;
        while self.match_token(&TokenKind::Star) {
            ty = ty.pointer_to();
            while self.match_token(&TokenKind::Const) || self.match_token(&TokenKind::Volatile) {}
        }

        let location = self.current_location();

        // Parenthesised declarator: `(*p)[N]`. Its suffixes bind first, so skip
        // the inner part, read the suffixes, then come back for the inner part.
        let nested = self.check(&TokenKind::LParen)
            && (self.check_ahead(1, &TokenKind::Star) || self.check_ahead(1, &TokenKind::LParen));
        if nested {
            let inner_start = self.position + 1;
            self.skip_balanced_parens()?;
            let suffixes = self.parse_declarator_suffixes()?;
            if suffixes.iter().any(|s| matches!(s, Suffix::Function(..))) {
                return Err(self.unsupported("function pointers", location));
            }
            let outer = apply_array_suffixes(ty, suffixes);
            let resume = self.position;
            self.position = inner_start;
            let inner = self.parse_declarator(outer, allow_abstract)?;
            if inner.params.is_some() {
                return Err(self.unsupported("function pointers", location));
            }
            self.expect_rparen("after declarator")?;
            self.position = resume;
            return Ok(inner);
        }

        let name = if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Some(name)
        } else if allow_abstract {
            None
        } else {
            return Err(self.error("Expected identifier in declarator", &["identifier", "*", "("]));
        };

        let mut suffixes = self.parse_declarator_suffixes()?;
        let mut params = None;
        let mut variadic = false;
        if let Some(Suffix::Function(..)) = suffixes.first() {
            if let Suffix::Function(p, v) = suffixes.remove(0) {
                params = Some(p);
                variadic = v;
            }
        }
        if suffixes.iter().any(|s| matches!(s, Suffix::Function(..))) {
            return Err(self.unsupported("function pointers", location));
        }
        if params.is_some() && !suffixes.is_empty() {
            return Err(self.error("Function cannot return an array", &[]));
        }

        Ok(Declarator {
            name,
            ty: apply_array_suffixes(ty, suffixes),
            params,
            variadic,
            location,
        })
    }

    fn parse_declarator_suffixes(&mut self) -> Result<Vec<Suffix>, ParseError> {
        let mut suffixes = Vec::new();
        loop {
            if self.match_token(&TokenKind::LBracket) {
                if self.match_token(&TokenKind::RBracket) {
                    suffixes.push(Suffix::Array(None));
                    continue;
                }
                let expr = self.parse_conditional()?;
                let size = self.fold_constant(&expr).ok_or_else(|| ParseError {
                    message: "Array size must be an integer constant expression".to_string(),
                    found: self.previous().to_string(),
                    expected: Vec::new(),
                    location: expr.location,
                })?;
                let size = usize::try_from(size).map_err(|_| ParseError {
                    message: format!("Array size {} is negative", size),
                    found: self.previous().to_string(),
                    expected: Vec::new(),
                    location: expr.location,
                })?;
                self.expect_token(&TokenKind::RBracket, "]", "after array size")?;
                suffixes.push(Suffix::Array(Some(size)));
            } else if self.match_token(&TokenKind::LParen) {
                let (params, variadic) = self.parse_parameter_list()?;
                self.expect_rparen("after parameters")?;
                suffixes.push(Suffix::Function(params, variadic));
            } else {
                return Ok(suffixes);
            }
        }
    }

    /// Skip a balanced `( ... )` group starting at the current token
    fn skip_balanced_parens(&mut self) -> Result<(), ParseError> {
        let start = self.current_location();
        let mut depth = 0usize;
        loop {
            match self.peek().kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                TokenKind::Eof => {
                    return Err(ParseError {
                        message: "Unbalanced parentheses in declarator".to_string(),
                        found: "end of file".to_string(),
                        expected: vec![")".to_string()],
                        location: start,
                    })
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Parse parameter list (the '(' is consumed): `(void)`, `()`, or `type name, ...`
    pub(crate) fn parse_parameter_list(&mut self) -> Result<(Vec<Param>, bool), ParseError> {
        let mut params = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok((params, false));
        }

        // Special case: (void) means no parameters in C
        if self.check(&TokenKind::Void) && self.check_ahead(1, &TokenKind::RParen) {
            self.advance();
            return Ok((params, false));
        }

        loop {
            if self.match_token(&TokenKind::Ellipsis) {
                return Ok((params, true));
            }
            if !self.is_declaration_start() {
                if let TokenKind::Ident(_) = self.peek().kind {
                    return Err(self.unsupported("old-style parameter declarations", self.current_location()));
                }
                return Err(self.error("Expected parameter declaration", &["type specifier"]));
            }

            let spec = self.parse_decl_specifiers()?;
            let declarator = self.parse_declarator(spec.ty, true)?;
            if declarator.params.is_some() {
                return Err(self.unsupported("function pointers", declarator.location));
            }
            params.push(Param {
                name: declarator.name,
                // Array parameters are pointers
                ty: declarator.ty.decay(),
                location: declarator.location,
                slot: None,
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok((params, false))
    }

    /// Parse a type name as used by casts and `sizeof`: specifiers plus abstract declarator
    pub(crate) fn parse_type_name(&mut self) -> Result<Type, ParseError> {
        let spec = self.parse_decl_specifiers()?;
        let declarator = self.parse_declarator(spec.ty, true)?;
        if declarator.name.is_some() {
            return Err(ParseError {
                message: "Unexpected identifier in type name".to_string(),
                found: self.previous().to_string(),
                expected: vec![")".to_string()],
                location: declarator.location,
            });
        }
        if declarator.params.is_some() {
            return Err(self.unsupported("function types", declarator.location));
        }
        Ok(declarator.ty)
    }

    /// Parse an initializer: an assignment expression or a brace list
    pub(crate) fn parse_initializer(&mut self) -> Result<Initializer, ParseError> {
        if self.match_token(&TokenKind::LBrace) {
            let location = self.previous_location();
            let mut items = Vec::new();
            while !self.check(&TokenKind::RBrace) {
                if self.check(&TokenKind::Dot) || self.check(&TokenKind::LBracket) {
                    return Err(self.unsupported("designated initializers", self.current_location()));
                }
                items.push(self.parse_initializer()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_rbrace("after initializer list")?;
            Ok(Initializer::List(items, location))
        } else {
            Ok(Initializer::Expr(self.parse_assignment()?))
        }
    }

    /// Fold an integer constant expression. `None` when it is not constant.
    pub(crate) fn fold_constant(&self, expr: &Expr) -> Option<i64> {
        match &expr.kind {
            ExprKind::IntLiteral(value) => Some(*value),
            ExprKind::Unary { op, operand } => {
                let value = self.fold_constant(operand)?;
                match op {
                    UnOp::Neg => Some(value.wrapping_neg()),
                    UnOp::Plus => Some(value),
                    UnOp::BitNot => Some(!value),
                    UnOp::Not => Some((value == 0) as i64),
                    _ => None,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.fold_constant(left)?;
                let r = self.fold_constant(right)?;
                match op {
                    BinOp::Add => Some(l.wrapping_add(r)),
                    BinOp::Sub => Some(l.wrapping_sub(r)),
                    BinOp::Mul => Some(l.wrapping_mul(r)),
                    BinOp::Div => l.checked_div(r),
                    BinOp::Mod => l.checked_rem(r),
                    BinOp::Shl => u32::try_from(r).ok().and_then(|r| l.checked_shl(r)),
                    BinOp::Shr => u32::try_from(r).ok().and_then(|r| l.checked_shr(r)),
                    BinOp::BitAnd => Some(l & r),
                    BinOp::BitOr => Some(l | r),
                    BinOp::BitXor => Some(l ^ r),
                    BinOp::Eq => Some((l == r) as i64),
                    BinOp::Ne => Some((l != r) as i64),
                    BinOp::Lt => Some((l < r) as i64),
                    BinOp::Le => Some((l <= r) as i64),
                    BinOp::Gt => Some((l > r) as i64),
                    BinOp::Ge => Some((l >= r) as i64),
                    BinOp::And => Some((l != 0 && r != 0) as i64),
                    BinOp::Or => Some((l != 0 || r != 0) as i64),
                }
            }
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.fold_constant(condition)? != 0 {
                    self.fold_constant(then_expr)
                } else {
                    self.fold_constant(else_expr)
                }
            }
            ExprKind::Cast { target, expr } if target.is_integer() => self.fold_constant(expr),
            ExprKind::SizeofType { target, .. } => primitive_size(target).map(|s| s as i64),
            _ => None,
        }
    }
}

/// Apply array suffixes innermost-last: `a[2][3]` is an array of 2 arrays of 3.
fn apply_array_suffixes(base: Type, suffixes: Vec<Suffix>) -> Type {
    suffixes.into_iter().rev().fold(base, |ty, suffix| match suffix {
        Suffix::Array(len) => ty.array_of(len),
        Suffix::Function(..) => ty,
    })
}

/// Size of a type whose layout does not depend on struct definitions
fn primitive_size(ty: &Type) -> Option<usize> {
    match ty {
        Type::Float => Some(4),
        Type::Double | Type::Pointer(_) => Some(8),
        Type::Array(elem, Some(len)) => primitive_size(elem).map(|s| s * len),
        other => other.integer_width(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals(source: &str) -> Vec<Declaration> {
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        program
            .items
            .into_iter()
            .filter_map(|item| match item {
                Item::Globals(decls) => Some(decls),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_array_of_pointers() {
        let decls = globals("#define MAXLINES 5000\nchar *lineptr[MAXLINES];");
        assert_eq!(decls[0].ty, Type::char_pointer().array_of(Some(5000)));
    }

    #[test]
    fn test_pointer_to_array() {
        let decls = globals("int (*p)[13];");
        assert_eq!(decls[0].ty, Type::Int.array_of(Some(13)).pointer_to());
    }

    #[test]
    fn test_multidimensional_array() {
        let decls = globals("static char daytab[2][13];");
        assert_eq!(
            decls[0].ty,
            Type::Char.array_of(Some(13)).array_of(Some(2))
        );
        assert_eq!(decls[0].storage, StorageClass::Static);
    }

    #[test]
    fn test_type_keyword_combinations() {
        let decls = globals("unsigned u; unsigned long ul; long int l; short s; unsigned char uc; long long ll;");
        let types: Vec<_> = decls.iter().map(|d| d.ty.clone()).collect();
        assert_eq!(
            types,
            vec![Type::UInt, Type::ULong, Type::Long, Type::Short, Type::UChar, Type::Long]
        );
    }

    #[test]
    fn test_typedef_and_prelude_types() {
        let decls = globals("typedef struct tnode *Treeptr;\nTreeptr root; size_t n; FILE *fp;");
        assert_eq!(decls[0].ty, Type::Struct("tnode".into()).pointer_to());
        assert_eq!(decls[1].ty, Type::ULong);
        assert_eq!(decls[2].ty, Type::Struct("__krun_file".into()).pointer_to());
    }

    #[test]
    fn test_enum_constants_fold() {
        let decls = globals("enum months { JAN = 1, FEB, MAR };\nint a[MAR * 2];");
        assert_eq!(decls[0].ty, Type::Int.array_of(Some(6)));
    }

    #[test]
    fn test_anonymous_struct_and_union() {
        let program = Parser::new("struct { int tag; union { int i; float f; } u; } v;")
            .unwrap()
            .parse_program()
            .unwrap();
        let union_def = program.structs.iter().find(|s| s.is_union).unwrap();
        assert_eq!(union_def.fields.len(), 2);
        assert!(program.structs.iter().any(|s| s.name.starts_with("__anon_") && !s.is_union));
    }

    #[test]
    fn test_brace_initializer() {
        let decls = globals("int days[] = { 31, 28, 31, };");
        match &decls[0].init {
            Some(Initializer::List(items, _)) => assert_eq!(items.len(), 3),
            other => panic!("Expected initializer list, got {:?}", other),
        }
        assert_eq!(decls[0].ty, Type::Int.array_of(None));
    }

    #[test]
    fn test_array_parameter_decays() {
        let program = Parser::new("int strlen2(char s[]) { return 0; }")
            .unwrap()
            .parse_program()
            .unwrap();
        let f = program.function("strlen2").unwrap();
        assert_eq!(f.params[0].ty, Type::char_pointer());
    }

    #[test]
    fn test_function_pointer_rejected() {
        let err = Parser::new("int (*cmp)(void *, void *);")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert!(err.message.contains("function pointers"));
    }

    #[test]
    fn test_bitfield_rejected() {
        let err = Parser::new("struct flags { unsigned int is_keyword : 1; };")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert!(err.message.contains("bit-fields"));
    }

    #[test]
    fn test_non_constant_array_size() {
        let err = Parser::new("int n; int a[n];").unwrap().parse_program().unwrap_err();
        assert!(err.message.contains("constant"));
    }
}
