//! C interpreter execution engine
//!
//! This module provides the core execution logic:
//! - [`engine`]: the [`Interpreter`](engine::Interpreter), call frames and storage access
//! - [`errors`]: runtime error types
//! - [`builtins`]: the C library functions programs may call
//! - [`format`]: the `printf` family's formatting
//!
//! # Execution Model
//!
//! The interpreter walks the resolved AST one statement at a time. Every
//! object, local or global, lives in [`Memory`](crate::memory::Memory):
//! variables are blocks bound to frame slots and reads and writes go through
//! its checked API. Statement and expression execution are split across
//! [`statements`], [`loops`], [`jumps`], [`expressions`] and [`ops`] as
//! `impl Interpreter` blocks.

pub mod builtins;
pub mod constants;
pub mod engine;
pub mod errors;
mod expressions;
mod files;
pub mod format;
mod jumps;
mod loops;
mod ops;
mod statements;
mod strings;
pub mod terminal;
