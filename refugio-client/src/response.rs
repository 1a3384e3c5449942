//! Buffered HTTP responses and their interpretation.

use bytes::Bytes;
use refugio_core::ApiError;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// A complete HTTP response with its body buffered.
///
/// Failure statuses are ordinary values here; the call site decides how to
/// interpret them.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Convenience constructor for a JSON body.
    pub fn json_body(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status, HeaderMap::new(), value.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body regardless of status.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Classify a failure response. Returns `None` for success statuses.
    pub fn error(&self) -> Option<ApiError> {
        if self.is_success() {
            None
        } else {
            Some(ApiError::from_response(self.status.as_u16(), &self.body))
        }
    }

    /// Decode a success body, or classify the failure.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        match self.error() {
            Some(err) => Err(ClientError::Api(err)),
            None => self.json(),
        }
    }

    /// Like [`ApiResponse::into_json`], but a 404 yields `Ok(None)`.
    ///
    /// Used by fetch-one call sites where a missing entity is a normal
    /// outcome rather than a failure.
    pub fn into_optional_json<T: DeserializeOwned>(self) -> Result<Option<T>, ClientError> {
        if self.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.into_json().map(Some)
    }

    /// Accept any success status and discard the body.
    pub fn into_empty(self) -> Result<(), ClientError> {
        match self.error() {
            Some(err) => Err(ClientError::Api(err)),
            None => Ok(()),
        }
    }
}
