//! Error taxonomy for the compilation pipeline.
//!
//! Each stage has its own error type; `CompileError` is what the driver sees.
//! Every stage fails fast on the first problem it detects.

use thiserror::Error;

/// Malformed token: bad escape, unterminated string, invalid number,
/// mixed indentation, unexpected character.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        LexError {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Grammar violation: missing expected token, unrecognized statement or
/// expression start.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Declaration, scope, or type violation found while walking the AST.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct SemanticError {
    pub message: String,
}

impl SemanticError {
    pub fn new(message: impl Into<String>) -> Self {
        SemanticError {
            message: message.into(),
        }
    }
}

/// A node or instruction reached a traversal branch with no handler. This is
/// a bug in stage composition, not a user error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        InternalError {
            message: message.into(),
        }
    }
}

impl From<std::fmt::Error> for InternalError {
    fn from(_: std::fmt::Error) -> Self {
        InternalError::new("formatting failure while emitting assembly")
    }
}

/// Top-level error the driver reports. The stage prefix in the message is
/// what users see before the pipeline stops.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("error while lexing: {0}")]
    Lex(#[from] LexError),
    #[error("error while parsing: {0}")]
    Parse(#[from] ParseError),
    #[error("error while analyzing: {0}")]
    Semantic(#[from] SemanticError),
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
