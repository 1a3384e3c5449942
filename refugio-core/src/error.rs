//! Error taxonomy for failed backend responses.
//!
//! The backend answers failures with a JSON object of the shape
//! `{ "error": string, "details"?: { field: [messages] } }`. [`ApiError`]
//! classifies the HTTP status and carries whatever the caller needs to render
//! the failure: field-level validation messages, or the conflicting entity of
//! a scheduling overlap. Formatting for display happens at the call site.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Message surfaced for every 403, regardless of the body.
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action";

/// Message surfaced for every 5xx, regardless of the body.
pub const SERVER_ERROR_MESSAGE: &str = "The server encountered an error, please try again later";

/// Field name -> validation messages.
pub type ValidationDetails = BTreeMap<String, Vec<String>>;

/// JSON error object returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationDetails>,
    /// Any other top-level fields (e.g. the conflicting entity of a 409).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorBody {
    /// Parse an error body, tolerating empty or non-JSON payloads.
    pub fn parse(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => parsed,
            Err(_) => Self {
                error: String::from_utf8_lossy(body).trim().to_string(),
                ..Self::default()
            },
        }
    }

    /// The entity embedded in a conflict response.
    ///
    /// Prefers an explicit `conflict` field; otherwise the single extra field
    /// if exactly one is present.
    pub fn conflicting_entity(&self) -> Option<Value> {
        if let Some(value) = self.extra.get("conflict") {
            return Some(value.clone());
        }
        if self.extra.len() == 1 {
            return self.extra.values().next().cloned();
        }
        None
    }

    fn message_or(&self, fallback: &str) -> String {
        if self.error.trim().is_empty() {
            fallback.to_string()
        } else {
            self.error.clone()
        }
    }
}

/// Category of a failed response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiErrorKind {
    /// 400: request rejected, with optional field-level messages.
    Validation { details: ValidationDetails },
    /// 401 that survived the single credential refresh.
    Authentication,
    /// 403.
    Authorization,
    /// 404.
    NotFound,
    /// 409, with the conflicting entity when the backend embeds one.
    Conflict { conflicting: Option<Value> },
    /// 5xx.
    Server,
    /// Any other non-success status.
    Unexpected,
}

/// A well-formed failure response from the backend.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("HTTP {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    /// Classify a failure response by status code and body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed = ErrorBody::parse(body);
        let (kind, message) = match status {
            400 => (
                ApiErrorKind::Validation {
                    details: parsed.details.clone().unwrap_or_default(),
                },
                parsed.message_or("Request validation failed"),
            ),
            401 => (
                ApiErrorKind::Authentication,
                parsed.message_or("Authentication required"),
            ),
            403 => (ApiErrorKind::Authorization, FORBIDDEN_MESSAGE.to_string()),
            404 => (ApiErrorKind::NotFound, parsed.message_or("Resource not found")),
            409 => (
                ApiErrorKind::Conflict {
                    conflicting: parsed.conflicting_entity(),
                },
                parsed.message_or("Conflict with an existing resource"),
            ),
            500..=599 => (ApiErrorKind::Server, SERVER_ERROR_MESSAGE.to_string()),
            _ => (
                ApiErrorKind::Unexpected,
                parsed.message_or(&format!("Unexpected response status {}", status)),
            ),
        };
        Self {
            status,
            kind,
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ApiErrorKind::NotFound)
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Authentication)
    }

    /// Field-level validation messages, if this is a 400.
    pub fn validation_details(&self) -> Option<&ValidationDetails> {
        match &self.kind {
            ApiErrorKind::Validation { details } => Some(details),
            _ => None,
        }
    }

    /// The conflicting entity, if this is a 409 that embedded one.
    pub fn conflicting(&self) -> Option<&Value> {
        match &self.kind {
            ApiErrorKind::Conflict { conflicting } => conflicting.as_ref(),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_details_surface_verbatim() {
        let body = json!({
            "error": "Invalid data",
            "details": { "start_date": ["must be in the future"] }
        });
        let err = ApiError::from_response(400, body.to_string().as_bytes());
        assert_eq!(err.message, "Invalid data");
        let details = err.validation_details().unwrap();
        assert_eq!(details["start_date"], vec!["must be in the future".to_string()]);
    }

    #[test]
    fn test_forbidden_uses_fixed_message() {
        let body = json!({ "error": "user u1 is not owner of renovation n4" });
        let err = ApiError::from_response(403, body.to_string().as_bytes());
        assert_eq!(err.kind, ApiErrorKind::Authorization);
        assert_eq!(err.message, FORBIDDEN_MESSAGE);
    }

    #[test]
    fn test_conflict_carries_embedded_entity() {
        let body = json!({
            "error": "Overlapping renovation",
            "conflict": { "id": "n1", "refuge_id": "r9" }
        });
        let err = ApiError::from_response(409, body.to_string().as_bytes());
        assert_eq!(err.conflicting(), Some(&json!({ "id": "n1", "refuge_id": "r9" })));
    }

    #[test]
    fn test_conflict_falls_back_to_single_extra_field() {
        let body = json!({
            "error": "Overlapping renovation",
            "overlapping_renovation": { "id": "n2" }
        });
        let err = ApiError::from_response(409, body.to_string().as_bytes());
        assert_eq!(err.conflicting(), Some(&json!({ "id": "n2" })));
    }

    #[test]
    fn test_server_error_is_generic() {
        let err = ApiError::from_response(502, b"<html>bad gateway</html>");
        assert_eq!(err.kind, ApiErrorKind::Server);
        assert_eq!(err.message, SERVER_ERROR_MESSAGE);
    }

    #[test]
    fn test_non_json_body_becomes_message() {
        let err = ApiError::from_response(404, b"no such refuge");
        assert!(err.is_not_found());
        assert_eq!(err.message, "no such refuge");
    }

    #[test]
    fn test_empty_body_uses_fallback() {
        let err = ApiError::from_response(418, b"");
        assert_eq!(err.kind, ApiErrorKind::Unexpected);
        assert!(err.message.contains("418"));
    }
}
