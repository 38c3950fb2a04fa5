//! Crate-level error type
//!
//! Each phase of a run stops at its first error; [`Error`] carries that error
//! unchanged together with the phase it came from.

use crate::interpreter::errors::RuntimeError;
use crate::parser::ast::SourceLocation;
use crate::parser::lexer::LexError;
use crate::parser::ParseError;
use crate::resolver::ResolveError;
use std::fmt;
use thiserror::Error;

/// The pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lex,
    Parse,
    Resolve,
    Runtime,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lex => "lex",
            Phase::Parse => "parse",
            Phase::Resolve => "resolve",
            Phase::Runtime => "runtime",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn phase(&self) -> Phase {
        match self {
            Error::Lex(_) => Phase::Lex,
            Error::Parse(_) => Phase::Parse,
            Error::Resolve(_) => Phase::Resolve,
            Error::Runtime(_) => Phase::Runtime,
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Error::Lex(e) => Some(e.location()),
            Error::Parse(e) => Some(e.location),
            Error::Resolve(e) => e.location(),
            Error::Runtime(e) => e.location(),
        }
    }
}
