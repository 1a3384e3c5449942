//! Cache error types.

use refugio_client::ClientError;

/// Failure of a cache read or mutation.
///
/// The coordinator never interprets the wrapped client error; it only needs
/// to know that the call failed. Cloneable so that every reader coalesced
/// onto one fetch receives the same failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Cached value does not match the requested type: {0}")]
    Serde(String),

    #[error("Background cache task did not complete: {0}")]
    TaskAborted(String),
}

impl CacheError {
    /// The underlying client error, if the network call failed.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::Client(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskAborted(err.to_string())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
