//! C source code parser
//!
//! This module transforms C source text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (source text → tokens), with [`macros`] expansion
//! - [`prelude`]: standard header types and constants lexed ahead of user code
//! - [`parse`]: the [`Parser`](parse::Parser) and its error type (tokens → AST)
//! - [`ast`]: AST node definitions
//!
//! # Supported C Subset
//!
//! - Types: all integer types, `float`, `double`, pointers, arrays (including
//!   multi-dimensional), structs, unions, enums, typedefs
//! - Statements: declarations, all loops, `if`, `switch`, `break`, `continue`, `return`
//! - Expressions: the full C operator set including compound assignment,
//!   casts, `sizeof` and the comma operator
//! - Preprocessor: `#define`/`#undef`; other directives are skipped
//! - No function pointers, bit-fields, `goto` or designated initializers
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser, one method per precedence level.
//! No external parser generator dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod macros;
pub mod parse;
pub mod prelude;
mod statements;

pub use parse::{ParseError, Parser};
