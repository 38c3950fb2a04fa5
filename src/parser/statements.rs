//! Statement parsing implementation
//!
//! This module handles parsing of all C statement types:
//!
//! - Local declarations: `int x = 42, *p;`, `static int count;`
//! - Control flow: `if`, `while`, `for`, `do-while`, `switch`
//! - Jump statements: `return`, `break`, `continue`
//! - Compound statements: `{ ... }`
//! - Expression and empty statements
//!
//! # Grammar
//!
//! ```text
//! statement ::= declaration | if_stmt | while_stmt | for_stmt
//!             | do_while_stmt | switch_stmt | return_stmt
//!             | break_stmt | continue_stmt | block | expr_stmt | ";"
//! ```
//!
//! `goto` and labels are rejected with a parse error.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse block statements (inside braces, excluding the braces themselves)
    pub(crate) fn parse_block_statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(statements)
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();

        match self.peek().kind {
            TokenKind::Return => {
                self.advance();
                self.parse_return_statement()
            }
            TokenKind::If => {
                self.advance();
                self.parse_if_statement()
            }
            TokenKind::While => {
                self.advance();
                self.parse_while_statement()
            }
            TokenKind::Do => {
                self.advance();
                self.parse_do_while_statement()
            }
            TokenKind::For => {
                self.advance();
                self.parse_for_statement()
            }
            TokenKind::Switch => {
                self.advance();
                self.parse_switch_statement()
            }
            TokenKind::Break => {
                self.advance();
                self.expect_semicolon("after 'break'")?;
                Ok(Stmt::Break { location: loc })
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_semicolon("after 'continue'")?;
                Ok(Stmt::Continue { location: loc })
            }
            TokenKind::Goto => Err(self.unsupported("goto statements", loc)),
            TokenKind::Case | TokenKind::Default => {
                Err(self.error("Case label outside of a switch body", &[]))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::Empty { location: loc })
            }
            TokenKind::LBrace => {
                self.advance();
                let statements = self.parse_block_statements()?;
                self.expect_rbrace("after block")?;
                Ok(Stmt::Block {
                    statements,
                    location: loc,
                })
            }
            TokenKind::Ident(_) if self.check_ahead(1, &TokenKind::Colon) => {
                Err(self.unsupported("labels", loc))
            }
            _ if self.is_declaration_start() => {
                let spec = self.parse_decl_specifiers()?;
                let decls = self.parse_local_declaration(spec)?;
                if decls.is_empty() {
                    Ok(Stmt::Empty { location: loc })
                } else {
                    Ok(Stmt::Declaration(decls))
                }
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect_semicolon("after expression")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Parse return statement
    fn parse_return_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        let expr = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.expect_semicolon("after return value")?;

        Ok(Stmt::Return { expr, location: loc })
    }

    /// Parse if statement
    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'if'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after if condition")?;

        let then_branch = Box::new(self.parse_statement()?);

        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            location: loc,
        })
    }

    /// Parse while statement
    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after while condition")?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::While {
            condition,
            body,
            location: loc,
        })
    }

    /// Parse do-while statement
    fn parse_do_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        let body = Box::new(self.parse_statement()?);

        self.expect_token(&TokenKind::While, "while", "after do body")?;
        self.expect_lparen("after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after do-while condition")?;
        self.expect_semicolon("after do-while")?;

        Ok(Stmt::DoWhile {
            body,
            condition,
            location: loc,
        })
    }

    /// Parse for statement
    fn parse_for_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'for'")?;

        // Init (optional): a declaration consumes its own ';'
        let init = if self.match_token(&TokenKind::Semicolon) {
            None
        } else if self.is_declaration_start() {
            let spec = self.parse_decl_specifiers()?;
            let decls = self.parse_local_declaration(spec)?;
            Some(Box::new(Stmt::Declaration(decls)))
        } else {
            let expr = self.parse_expression()?;
            self.expect_semicolon("after for init")?;
            Some(Box::new(Stmt::Expr(expr)))
        };

        // Condition (optional)
        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon("after for condition")?;

        // Increment (optional)
        let increment = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_rparen("after for clauses")?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::For {
            init,
            condition,
            increment,
            body,
            location: loc,
        })
    }

    /// Parse switch statement. Case labels must sit directly in the switch body.
    fn parse_switch_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'switch'")?;
        let expr = self.parse_expression()?;
        self.expect_rparen("after switch expression")?;
        self.expect_lbrace("before switch body")?;

        let mut cases = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Case) {
                let case_loc = self.previous_location();
                let value = self.parse_conditional()?;
                let folded = self.fold_constant(&value).ok_or_else(|| ParseError {
                    message: "Case label is not an integer constant".to_string(),
                    found: self.previous().to_string(),
                    expected: Vec::new(),
                    location: value.location,
                })?;
                self.expect_token(&TokenKind::Colon, ":", "after case value")?;

                let statements = self.parse_case_statements()?;
                cases.push(CaseNode::Case {
                    value: Expr::typed(ExprKind::IntLiteral(folded), Type::Long, value.location),
                    statements,
                    location: case_loc,
                });
            } else if self.match_token(&TokenKind::Default) {
                let default_loc = self.previous_location();
                self.expect_token(&TokenKind::Colon, ":", "after 'default'")?;

                let statements = self.parse_case_statements()?;
                cases.push(CaseNode::Default {
                    statements,
                    location: default_loc,
                });
            } else {
                return Err(self.error(
                    "Expected 'case' or 'default' in switch body",
                    &["case", "default"],
                ));
            }
        }

        self.expect_rbrace("after switch body")?;

        Ok(Stmt::Switch {
            expr,
            cases,
            location: loc,
        })
    }

    fn parse_case_statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Case)
            && !self.check(&TokenKind::Default)
            && !self.check(&TokenKind::RBrace)
            && !self.is_at_end()
        {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }
}
