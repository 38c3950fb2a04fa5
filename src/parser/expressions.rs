//! Expression parsing implementation
//!
//! One method per C precedence level, lowest first:
//!
//! ```text
//! comma → assignment → conditional → || → && → | → ^ → & → equality
//!       → relational → shift → additive → multiplicative → cast → unary
//!       → postfix → primary
//! ```
//!
//! Assignment and the conditional operator are right-associative; every
//! binary level is left-associative. Literals get their C type here (the
//! resolver types everything else), enum constants fold to integer literals
//! and adjacent string literals are concatenated.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse expression (top-level entry point, includes the comma operator)
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_assignment()?;

        while self.match_token(&TokenKind::Comma) {
            let loc = self.previous_location();
            let right = self.parse_assignment()?;
            left = Expr::new(
                ExprKind::Comma {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }

        Ok(left)
    }

    /// Parse assignment or conditional (right-associative)
    pub(crate) fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_conditional()?;

        let loc = self.current_location();
        if self.match_token(&TokenKind::Eq) {
            let rhs = self.parse_assignment()?;
            return Ok(Expr::new(
                ExprKind::Assign {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                loc,
            ));
        }

        let compound_op = match self.peek().kind {
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            TokenKind::PercentEq => Some(BinOp::Mod),
            TokenKind::AmpEq => Some(BinOp::BitAnd),
            TokenKind::PipeEq => Some(BinOp::BitOr),
            TokenKind::CaretEq => Some(BinOp::BitXor),
            TokenKind::LtLtEq => Some(BinOp::Shl),
            TokenKind::GtGtEq => Some(BinOp::Shr),
            _ => None,
        };

        if let Some(op) = compound_op {
            self.advance();
            let rhs = self.parse_assignment()?;
            return Ok(Expr::new(
                ExprKind::CompoundAssign {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                loc,
            ));
        }

        Ok(lhs)
    }

    /// Parse conditional: condition ? then_expr : else_expr
    pub(crate) fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_logical_or()?;

        if self.match_token(&TokenKind::Question) {
            let loc = self.previous_location();
            let then_expr = self.parse_expression()?;
            self.expect_token(&TokenKind::Colon, ":", "in conditional expression")?;
            let else_expr = self.parse_conditional()?;

            return Ok(Expr::new(
                ExprKind::Ternary {
                    condition: Box::new(condition),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                loc,
            ));
        }

        Ok(condition)
    }

    /// Parse one left-associative binary level
    fn parse_binary_level(
        &mut self,
        operators: &[(TokenKind, BinOp)],
        next: fn(&mut Parser) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;

        'outer: loop {
            for (kind, op) in operators {
                if self.match_token(kind) {
                    let loc = self.previous_location();
                    let right = next(self)?;
                    left = Expr::new(
                        ExprKind::Binary {
                            op: *op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        loc,
                    );
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    /// Parse logical OR (||)
    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::OrOr, BinOp::Or)], Parser::parse_logical_and)
    }

    /// Parse logical AND (&&)
    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::AndAnd, BinOp::And)], Parser::parse_bitwise_or)
    }

    /// Parse bitwise OR (|)
    fn parse_bitwise_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::Pipe, BinOp::BitOr)], Parser::parse_bitwise_xor)
    }

    /// Parse bitwise XOR (^)
    fn parse_bitwise_xor(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::Caret, BinOp::BitXor)], Parser::parse_bitwise_and)
    }

    /// Parse bitwise AND (&)
    fn parse_bitwise_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::Amp, BinOp::BitAnd)], Parser::parse_equality)
    }

    /// Parse equality (== !=)
    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::NotEq, BinOp::Ne)],
            Parser::parse_relational,
        )
    }

    /// Parse relational (< <= > >=)
    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::Le, BinOp::Le),
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::Ge, BinOp::Ge),
            ],
            Parser::parse_shift,
        )
    }

    /// Parse shift (<< >>)
    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[(TokenKind::LtLt, BinOp::Shl), (TokenKind::GtGt, BinOp::Shr)],
            Parser::parse_additive,
        )
    }

    /// Parse additive (+ -)
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
            Parser::parse_multiplicative,
        )
    }

    /// Parse multiplicative (* / %)
    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Mod),
            ],
            Parser::parse_cast,
        )
    }

    /// Parse cast: (type) expr
    fn parse_cast(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::LParen) && self.is_type_name_ahead(1) {
            let loc = self.current_location();
            self.advance();
            let target = self.parse_type_name()?;
            self.expect_rparen("after cast type")?;
            if self.check(&TokenKind::LBrace) {
                return Err(self.unsupported("compound literals", loc));
            }
            let expr = self.parse_cast()?;
            return Ok(Expr::new(
                ExprKind::Cast {
                    target,
                    expr: Box::new(expr),
                },
                loc,
            ));
        }

        self.parse_unary()
    }

    /// Parse unary operators (prefix)
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();

        let op = match self.peek().kind {
            TokenKind::PlusPlus => Some(UnOp::PreInc),
            TokenKind::MinusMinus => Some(UnOp::PreDec),
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Tilde => Some(UnOp::BitNot),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::Amp => Some(UnOp::AddrOf),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            // ++/-- bind to a unary operand; the rest take a cast expression
            let operand = if matches!(op, UnOp::PreInc | UnOp::PreDec) {
                self.parse_unary()?
            } else {
                self.parse_cast()?
            };
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                loc,
            ));
        }

        if self.match_token(&TokenKind::Sizeof) {
            if self.check(&TokenKind::LParen) && self.is_type_name_ahead(1) {
                self.advance();
                let target = self.parse_type_name()?;
                self.expect_rparen("after sizeof type")?;
                return Ok(Expr::new(ExprKind::SizeofType { target, size: None }, loc));
            }
            let expr = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::SizeofExpr {
                    expr: Box::new(expr),
                    size: None,
                },
                loc,
            ));
        }

        self.parse_postfix()
    }

    /// Parse postfix operators: [] () . -> ++ --
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            let loc = self.current_location();
            if self.match_token(&TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect_token(&TokenKind::RBracket, "]", "after array index")?;
                expr = Expr::new(
                    ExprKind::Index {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    loc,
                );
            } else if self.match_token(&TokenKind::LParen) {
                let name = match expr.kind {
                    ExprKind::Ident { name, .. } => name,
                    _ => return Err(self.unsupported("calls through function pointers", loc)),
                };
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_assignment()?);
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect_rparen("after function arguments")?;
                expr = Expr::new(
                    ExprKind::Call {
                        name,
                        args,
                        target: None,
                    },
                    expr.location,
                );
            } else if self.match_token(&TokenKind::Dot) {
                let member = self.expect_identifier("after '.'")?;
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        member,
                        offset: None,
                    },
                    loc,
                );
            } else if self.match_token(&TokenKind::Arrow) {
                let member = self.expect_identifier("after '->'")?;
                expr = Expr::new(
                    ExprKind::PointerMember {
                        object: Box::new(expr),
                        member,
                        offset: None,
                    },
                    loc,
                );
            } else if self.match_token(&TokenKind::PlusPlus) {
                expr = Expr::new(
                    ExprKind::Unary {
                        op: UnOp::PostInc,
                        operand: Box::new(expr),
                    },
                    loc,
                );
            } else if self.match_token(&TokenKind::MinusMinus) {
                expr = Expr::new(
                    ExprKind::Unary {
                        op: UnOp::PostDec,
                        operand: Box::new(expr),
                    },
                    loc,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    /// Parse primary expressions: literals, identifiers, parenthesised expressions
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let kind = self.peek().kind.clone();

        match kind {
            TokenKind::IntLiteral {
                value,
                unsigned,
                long,
                decimal,
            } => {
                self.advance();
                let ty = integer_literal_type(value, unsigned, long, decimal);
                Ok(Expr::typed(ExprKind::IntLiteral(value as i64), ty, loc))
            }
            TokenKind::FloatLiteral { value, single } => {
                self.advance();
                if single {
                    Ok(Expr::typed(
                        ExprKind::FloatLiteral(value as f32 as f64),
                        Type::Float,
                        loc,
                    ))
                } else {
                    Ok(Expr::typed(ExprKind::FloatLiteral(value), Type::Double, loc))
                }
            }
            TokenKind::CharLiteral(byte) => {
                self.advance();
                // Plain char is signed: '\377' is -1
                Ok(Expr::typed(ExprKind::IntLiteral(byte as i8 as i64), Type::Int, loc))
            }
            TokenKind::StringLiteral(_) => {
                let mut bytes = Vec::new();
                while let TokenKind::StringLiteral(part) = &self.peek().kind {
                    bytes.extend_from_slice(part);
                    self.advance();
                }
                let ty = Type::Char.array_of(Some(bytes.len() + 1));
                let id = self.next_literal_id();
                Ok(Expr::typed(ExprKind::StringLiteral { bytes, id }, ty, loc))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::typed(ExprKind::Null, Type::void_pointer(), loc))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if let Some(value) = self.enum_constants.get(&name) {
                    return Ok(Expr::typed(ExprKind::IntLiteral(*value), Type::Int, loc));
                }
                Ok(Expr::new(ExprKind::Ident { name, binding: None }, loc))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_rparen("after expression")?;
                Ok(expr)
            }
            _ => Err(self.error("Expected expression", &["expression"])),
        }
    }
}

/// Type of an integer constant following C11 6.4.4.1
fn integer_literal_type(value: u64, unsigned: bool, long: bool, decimal: bool) -> Type {
    let fits_int = value <= i32::MAX as u64;
    let fits_uint = value <= u32::MAX as u64;
    let fits_long = value <= i64::MAX as u64;

    match (unsigned, long) {
        (false, false) if fits_int => Type::Int,
        (false, false) if !decimal && fits_uint => Type::UInt,
        (false, _) if fits_long => Type::Long,
        (true, false) if fits_uint => Type::UInt,
        _ => Type::ULong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::Lexer;

    fn expr(source: &str) -> Expr {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let mut parser = Parser::from_tokens(tokens);
        parser.parse_expression().unwrap()
    }

    fn binary(expr: &Expr) -> (BinOp, &Expr, &Expr) {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => (*op, left, right),
            other => panic!("Expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let e = expr("1 + 2 * 3");
        let (op, left, right) = binary(&e);
        assert_eq!(op, BinOp::Add);
        assert!(matches!(left.kind, ExprKind::IntLiteral(1)));
        assert_eq!(binary(right).0, BinOp::Mul);
    }

    #[test]
    fn test_left_associativity() {
        let e = expr("10 - 4 - 3");
        let (op, left, _) = binary(&e);
        assert_eq!(op, BinOp::Sub);
        assert_eq!(binary(left).0, BinOp::Sub);
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let e = expr("a = b = 3");
        match e.kind {
            ExprKind::Assign { rhs, .. } => assert!(matches!(rhs.kind, ExprKind::Assign { .. })),
            other => panic!("Expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_comma_is_lowest() {
        let e = expr("i = 0, j = 1");
        assert!(matches!(e.kind, ExprKind::Comma { .. }));
    }

    #[test]
    fn test_conditional_binds_below_logical_or() {
        let e = expr("a || b ? c : d");
        match e.kind {
            ExprKind::Ternary { condition, .. } => assert_eq!(binary(&condition).0, BinOp::Or),
            other => panic!("Expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_shift_below_additive() {
        let e = expr("1 << 2 + 3");
        let (op, _, right) = binary(&e);
        assert_eq!(op, BinOp::Shl);
        assert_eq!(binary(right).0, BinOp::Add);
    }

    #[test]
    fn test_postfix_binds_tighter_than_deref() {
        let e = expr("*p++");
        match e.kind {
            ExprKind::Unary { op: UnOp::Deref, operand } => {
                assert!(matches!(operand.kind, ExprKind::Unary { op: UnOp::PostInc, .. }))
            }
            other => panic!("Expected dereference, got {:?}", other),
        }
    }

    #[test]
    fn test_cast_and_sizeof() {
        let e = expr("(double) n / sizeof(int)");
        let (op, left, right) = binary(&e);
        assert_eq!(op, BinOp::Div);
        assert!(matches!(left.kind, ExprKind::Cast { target: Type::Double, .. }));
        assert!(matches!(right.kind, ExprKind::SizeofType { target: Type::Int, .. }));
    }

    #[test]
    fn test_member_chain() {
        let e = expr("p->next.val");
        match e.kind {
            ExprKind::Member { object, member, .. } => {
                assert_eq!(member, "val");
                assert!(matches!(object.kind, ExprKind::PointerMember { .. }));
            }
            other => panic!("Expected member access, got {:?}", other),
        }
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        let e = expr("\"hello, \" \"world\"");
        match e.kind {
            ExprKind::StringLiteral { bytes, .. } => assert_eq!(bytes, b"hello, world"),
            other => panic!("Expected string literal, got {:?}", other),
        }
        assert_eq!(e.ty, Some(Type::Char.array_of(Some(13))));
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(expr("42").ty, Some(Type::Int));
        assert_eq!(expr("3000000000").ty, Some(Type::Long));
        assert_eq!(expr("0xffffffff").ty, Some(Type::UInt));
        assert_eq!(expr("10UL").ty, Some(Type::ULong));
        assert_eq!(expr("'a'").ty, Some(Type::Int));
        assert_eq!(expr("1.5f").ty, Some(Type::Float));
        assert_eq!(expr("NULL").ty, Some(Type::void_pointer()));
    }

    #[test]
    fn test_call_arguments_use_assignment_level() {
        let e = expr("f(a, b = 2)");
        match e.kind {
            ExprKind::Call { name, args, .. } => {
                assert_eq!(name, "f");
                assert_eq!(args.len(), 2);
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }
}
