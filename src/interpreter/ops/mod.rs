//! Operators, split by kind; everything here is `impl Interpreter`

pub mod access;
pub mod assign;
pub mod binary;
pub mod unary;
