use thiserror::Error;

/// Errors produced by model parsing and validation routines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown role value {0}")]
    UnknownRole(i16),
    #[error("unknown token type {0}")]
    UnknownTokenType(String),
    #[error("order must be ASC or DESC")]
    InvalidSortDirection,
    #[error("invalid order term: {0}")]
    InvalidSortTerm(String),
    #[error("{0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
