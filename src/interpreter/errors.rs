//! Runtime error types for the C interpreter
//!
//! This module defines [`RuntimeError`], which represents every failure that
//! can occur while a resolved program runs (as opposed to lex, parse or
//! resolve errors, which stop a program before it starts).
//!
//! All runtime errors are fatal: they halt execution. Output written before
//! the error stays available to the caller.

use crate::memory::MemoryError;
use crate::parser::ast::SourceLocation;
use thiserror::Error;

/// Runtime errors that can occur during execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A checked memory access failed (NULL, out of bounds, released, read-only,
    /// uninitialized, bad `free`, heap exhausted)
    #[error("{source} at {location}")]
    Memory {
        source: MemoryError,
        location: SourceLocation,
    },

    /// Division or remainder by zero
    #[error("{operation} by zero at {location}")]
    DivisionByZero {
        operation: &'static str,
        location: SourceLocation,
    },

    /// Signed overflow under the trapping overflow policy
    #[error("signed overflow in '{operation}' on {ty} at {location}")]
    IntegerOverflow {
        operation: String,
        ty: String,
        location: SourceLocation,
    },

    /// Call depth limit reached
    #[error("call depth limit of {limit} exceeded calling '{function}' at {location}")]
    StackOverflow {
        function: String,
        limit: usize,
        location: SourceLocation,
    },

    /// A call reached the interpreter without a body to run
    #[error("undefined function '{name}' at {location}")]
    UndefinedFunction {
        name: String,
        location: SourceLocation,
    },

    /// An identifier reached the interpreter without a resolved binding
    #[error("unresolved symbol '{name}' at {location}")]
    UnresolvedSymbol {
        name: String,
        location: SourceLocation,
    },

    /// Bad `printf`-family format string
    #[error("invalid format string: {message} at {location}")]
    InvalidFormat {
        message: String,
        location: SourceLocation,
    },

    /// A built-in was handed an argument it cannot work with
    #[error("{function}: {message} at {location}")]
    InvalidArgument {
        function: &'static str,
        message: String,
        location: SourceLocation,
    },

    /// Construct outside the supported subset
    #[error("unsupported: {message} at {location}")]
    Unsupported {
        message: String,
        location: SourceLocation,
    },

    /// No `main` to run
    #[error("no main() function found")]
    NoMainFunction,

    /// `exit()` was called; unwinds to the top of the run
    #[error("exit({code})")]
    Exit { code: i32 },
}

impl RuntimeError {
    pub(crate) fn memory(source: MemoryError, location: SourceLocation) -> Self {
        RuntimeError::Memory { source, location }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            RuntimeError::Memory { location, .. }
            | RuntimeError::DivisionByZero { location, .. }
            | RuntimeError::IntegerOverflow { location, .. }
            | RuntimeError::StackOverflow { location, .. }
            | RuntimeError::UndefinedFunction { location, .. }
            | RuntimeError::UnresolvedSymbol { location, .. }
            | RuntimeError::InvalidFormat { location, .. }
            | RuntimeError::InvalidArgument { location, .. }
            | RuntimeError::Unsupported { location, .. } => Some(*location),
            RuntimeError::NoMainFunction | RuntimeError::Exit { .. } => None,
        }
    }

    /// Short name of the operation that failed
    pub fn tag(&self) -> &'static str {
        match self {
            RuntimeError::Memory { source, .. } => match source {
                MemoryError::Null | MemoryError::Unmapped { .. } => "dereference",
                MemoryError::OutOfBounds { .. } => "bounds",
                MemoryError::Released { .. } => "use-after-release",
                MemoryError::ReadOnly { .. } => "write",
                MemoryError::Uninitialized { .. } => "uninitialized",
                MemoryError::DoubleFree { .. } | MemoryError::InvalidFree { .. } => "free",
                MemoryError::OutOfMemory { .. } => "allocation",
            },
            RuntimeError::DivisionByZero { .. } => "division",
            RuntimeError::IntegerOverflow { .. } => "overflow",
            RuntimeError::StackOverflow { .. } => "stack",
            RuntimeError::UndefinedFunction { .. } | RuntimeError::UnresolvedSymbol { .. } => "symbol",
            RuntimeError::InvalidFormat { .. } => "format",
            RuntimeError::InvalidArgument { .. } => "argument",
            RuntimeError::Unsupported { .. } => "unsupported",
            RuntimeError::NoMainFunction => "entry",
            RuntimeError::Exit { .. } => "exit",
        }
    }
}

/// Attach a source location to memory results
pub(crate) trait AtLocation<T> {
    fn at(self, location: SourceLocation) -> Result<T, RuntimeError>;
}

impl<T> AtLocation<T> for Result<T, MemoryError> {
    fn at(self, location: SourceLocation) -> Result<T, RuntimeError> {
        self.map_err(|source| RuntimeError::memory(source, location))
    }
}
