//! Request descriptors.
//!
//! An [`ApiRequest`] is plain data so the executor can replay it verbatim on
//! the retry attempt; multipart uploads keep their file bytes in memory until
//! the transport turns them into a form.

use refugio_core::{Credential, UploadFile};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

use crate::error::TransportError;

/// One field of a multipart payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartField {
    Text { name: String, value: String },
    File { name: String, file: UploadFile },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file: UploadFile) -> Self {
        Self::File {
            name: name.into(),
            file,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart(Vec<MultipartField>),
}

/// Options controlling authentication handling for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Do not attach a credential (public endpoints).
    pub skip_auth: bool,
    /// Do not refresh-and-retry on 401.
    pub skip_retry: bool,
}

impl ExecuteOptions {
    pub fn public() -> Self {
        Self {
            skip_auth: true,
            skip_retry: false,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            skip_auth: false,
            skip_retry: true,
        }
    }
}

/// A logical request, relative to the configured base URL unless `path` is
/// already absolute.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body. Serialization happens eagerly so the body can be
    /// replayed on retry.
    pub fn json<B: serde::Serialize + ?Sized>(mut self, body: &B) -> Result<Self, serde_json::Error> {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = Some(RequestBody::Multipart(fields));
        self
    }
}

/// A request resolved against the base URL with its credential attached,
/// ready for the transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl PreparedRequest {
    pub fn build(
        request: &ApiRequest,
        url: &str,
        credential: Option<&Credential>,
    ) -> Result<Self, TransportError> {
        let mut headers = request.headers.clone();
        if let Some(credential) = credential {
            let value = HeaderValue::from_str(&credential.bearer_header())
                .map_err(|_| TransportError::InvalidHeader {
                    name: "authorization",
                })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(Self {
            method: request.method.clone(),
            url: url.to_string(),
            headers,
            query: request.query.clone(),
            body: request.body.clone(),
        })
    }

    /// The bearer token attached to this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepared_request_attaches_bearer() {
        let request = ApiRequest::get("/users/u1/");
        let credential = Credential::new("tok-1");
        let prepared =
            PreparedRequest::build(&request, "https://api.test/users/u1/", Some(&credential))
                .unwrap();
        assert_eq!(prepared.bearer_token(), Some("tok-1"));
    }

    #[test]
    fn test_prepared_request_without_credential_has_no_header() {
        let request = ApiRequest::get("/refuges/");
        let prepared = PreparedRequest::build(&request, "https://api.test/refuges/", None).unwrap();
        assert!(prepared.bearer_token().is_none());
        assert!(prepared.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_token_is_reported_not_panicked() {
        let request = ApiRequest::get("/users/u1/");
        let credential = Credential::new("bad\ntoken");
        let err = PreparedRequest::build(&request, "https://api.test/users/u1/", Some(&credential))
            .unwrap_err();
        assert_eq!(err, TransportError::InvalidHeader { name: "authorization" });
    }

    #[test]
    fn test_json_body_is_serialized_eagerly() {
        let request = ApiRequest::post("/doubts/d1/answers/")
            .json(&serde_json::json!({ "message": "Yes, there is water" }))
            .unwrap();
        assert!(matches!(request.body, Some(RequestBody::Json(_))));
    }
}
