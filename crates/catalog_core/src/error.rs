use shared::{
    error::{ApiError, ErrorCode},
    protocol::DecodeError,
};
use thiserror::Error;

/// Failure raised by a [`crate::transport::CatalogTransport`] before any decoding happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request could not complete: {0}")]
    Network(String),
    #[error("server rejected request: {0}")]
    Status(#[from] ApiError),
    #[error("response body is not valid JSON: {0}")]
    InvalidBody(String),
}

/// User-visible failure of a catalog read. Empty results are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Failed to fetch apps: {0}")]
    Transport(String),
    #[error("Unexpected data format from API: {0}")]
    UnexpectedFormat(String),
    #[error("App not found: {0}")]
    NotFound(String),
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }

    pub fn is_unexpected_format(&self) -> bool {
        matches!(self, FetchError::UnexpectedFormat(_))
    }
}

impl From<TransportError> for FetchError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Network(detail) => FetchError::Transport(detail),
            TransportError::Status(api) if api.code == ErrorCode::NotFound => {
                FetchError::NotFound(api.message)
            }
            TransportError::Status(api) => FetchError::Transport(api.to_string()),
            TransportError::InvalidBody(detail) => FetchError::UnexpectedFormat(detail),
        }
    }
}

impl From<DecodeError> for FetchError {
    fn from(value: DecodeError) -> Self {
        match value {
            DecodeError::Rejected(message) => FetchError::Transport(message),
            other => FetchError::UnexpectedFormat(other.to_string()),
        }
    }
}

/// Invalid user input for a query mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid minimum rating `{0}`: expected a number between 0 and 5")]
    InvalidMinRating(String),
    #[error("page size must be at least 1")]
    ZeroPageSize,
}
