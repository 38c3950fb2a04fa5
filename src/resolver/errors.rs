//! Resolution error types
//!
//! A [`ResolveError`] is raised for programs that parse but cannot be given a
//! meaning: unknown names, arity mismatches, incompatible operand types,
//! assignments to things that cannot be assigned.

use crate::parser::ast::{SourceLocation, Type};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("undeclared identifier '{name}' at {location}")]
    UndeclaredIdentifier {
        name: String,
        location: SourceLocation,
    },

    #[error("call to undefined function '{name}' at {location}")]
    UndefinedFunction {
        name: String,
        location: SourceLocation,
    },

    #[error("'{name}' expects {expected} argument(s) but {found} were given at {location}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },

    #[error("redeclaration of '{name}' at {location}")]
    Redeclaration {
        name: String,
        location: SourceLocation,
    },

    #[error("{message} at {location}")]
    TypeMismatch {
        message: String,
        location: SourceLocation,
    },

    #[error("{what} is not assignable at {location}")]
    NotAssignable {
        what: String,
        location: SourceLocation,
    },

    #[error("assignment to const variable '{name}' at {location}")]
    ConstAssignment {
        name: String,
        location: SourceLocation,
    },

    #[error("incomplete type '{ty}' at {location}")]
    IncompleteType { ty: Type, location: SourceLocation },

    #[error("'{ty}' has no member named '{member}' at {location}")]
    UnknownMember {
        ty: Type,
        member: String,
        location: SourceLocation,
    },

    #[error("invalid initializer: {message} at {location}")]
    InvalidInitializer {
        message: String,
        location: SourceLocation,
    },

    #[error("'{keyword}' outside of {context} at {location}")]
    MisplacedJump {
        keyword: &'static str,
        context: &'static str,
        location: SourceLocation,
    },

    #[error("duplicate case value {value} at {location}")]
    DuplicateCase { value: i64, location: SourceLocation },

    #[error("program defines no 'main' function")]
    MissingMain,
}

impl ResolveError {
    pub(crate) fn mismatch(message: impl Into<String>, location: SourceLocation) -> Self {
        ResolveError::TypeMismatch {
            message: message.into(),
            location,
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            ResolveError::UndeclaredIdentifier { location, .. }
            | ResolveError::UndefinedFunction { location, .. }
            | ResolveError::ArgumentCount { location, .. }
            | ResolveError::Redeclaration { location, .. }
            | ResolveError::TypeMismatch { location, .. }
            | ResolveError::NotAssignable { location, .. }
            | ResolveError::ConstAssignment { location, .. }
            | ResolveError::IncompleteType { location, .. }
            | ResolveError::UnknownMember { location, .. }
            | ResolveError::InvalidInitializer { location, .. }
            | ResolveError::MisplacedJump { location, .. }
            | ResolveError::DuplicateCase { location, .. } => Some(*location),
            ResolveError::MissingMain => None,
        }
    }
}
