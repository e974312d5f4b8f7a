use crate::lexer;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Result type for compiling and evaluating queries.
pub type Result<T> = std::result::Result<T, QueryError>;

/// The category of a `QueryError`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// The query text does not conform to the grammar.
    Syntax,
    /// A field, index or predicate match does not exist in the document.
    NotFound,
    /// A segment was applied to a value of the wrong JSON type.
    TypeMismatch,
    /// A wildcard was used with a single target operation, or `iter_items` was given a query
    /// without exactly one wildcard.
    UnsupportedOperation,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::TypeMismatch => write!(f, "type mismatch"),
            ErrorKind::UnsupportedOperation => write!(f, "unsupported operation"),
        }
    }
}

/// Error type for compiling and evaluating queries.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error("{kind}: {message}{}", .position.map(|p| format!(" (at offset {p})")).unwrap_or_default())]
pub struct QueryError {
    pub kind: ErrorKind,
    /// Byte offset in the query text, when the failure can be tied to one.
    pub position: Option<usize>,
    pub message: String,
}

impl QueryError {
    pub(crate) fn new(kind: ErrorKind, position: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            message: message.into(),
        }
    }

    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, Some(position), message)
    }

    pub(crate) fn not_found(position: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, Some(position), message)
    }

    pub(crate) fn type_mismatch(position: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, Some(position), message)
    }

    pub(crate) fn unsupported(position: Option<usize>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, position, message)
    }
}

impl From<lexer::Error> for QueryError {
    fn from(e: lexer::Error) -> Self {
        QueryError::syntax(e.position() as usize, e.to_string())
    }
}
