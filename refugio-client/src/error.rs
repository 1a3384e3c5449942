//! Error types for the request pipeline.

use refugio_core::ApiError;

/// No HTTP response was obtained.
///
/// Transport failures are always propagated to the caller and never retried
/// by the executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Failed to build request: {0}")]
    Request(String),
    #[error("Failed to read response body: {0}")]
    Body(String),
    #[error("Invalid header value for {name}")]
    InvalidHeader { name: &'static str },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::Request(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Connect(err.to_string())
        }
    }
}

/// The identity provider could not produce a credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("No signed-in user")]
    SignedOut,
    #[error("Credential refresh failed: {0}")]
    RefreshFailed(String),
}

/// Failure of one logical API call.
///
/// Cloneable so that several readers coalesced onto one fetch can all
/// receive the same failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// The classified backend failure, if this error carries one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result alias for API calls.
pub type ClientResult<T> = Result<T, ClientError>;
