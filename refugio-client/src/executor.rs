//! Authenticated request executor.
//!
//! Every outbound call goes through [`AuthenticatedRequestExecutor::execute`],
//! which attaches the bearer credential and recovers from an expired
//! credential with at most one refresh-and-retry cycle.

use reqwest::StatusCode;
use std::sync::Arc;

use refugio_core::Credential;

use crate::error::TransportError;
use crate::identity::IdentityProvider;
use crate::request::{ApiRequest, ExecuteOptions, PreparedRequest};
use crate::response::ApiResponse;
use crate::transport::Transport;

/// Position of a logical call in its retry budget.
///
/// There is no transition out of `Retried`, so a call can never reach the
/// refresh branch twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retried,
}

impl Attempt {
    /// The attempt that follows a rejected credential, if any remains.
    pub fn next(self) -> Option<Attempt> {
        match self {
            Attempt::First => Some(Attempt::Retried),
            Attempt::Retried => None,
        }
    }
}

/// Executes requests with credential attachment and transparent recovery
/// from a single 401.
///
/// The executor holds no credential between calls. Concurrent calls that hit
/// a 401 each force their own refresh.
#[derive(Clone)]
pub struct AuthenticatedRequestExecutor {
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityProvider>,
    base_url: String,
}

impl AuthenticatedRequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: Arc<dyn IdentityProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            identity,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute one logical request.
    ///
    /// Returns the final HTTP response, which may itself be a failure
    /// status: the retried response if a retry happened (even a second 401),
    /// otherwise the original one. Only a missing response is an `Err`.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        options: ExecuteOptions,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.resolve_url(&request.path);
        let mut credential = if options.skip_auth {
            None
        } else {
            self.credential(false).await
        };
        let mut attempt = Attempt::First;

        loop {
            let prepared = PreparedRequest::build(request, &url, credential.as_ref())?;
            tracing::debug!(
                method = %prepared.method,
                url = %prepared.url,
                ?attempt,
                authenticated = credential.is_some(),
                "Sending request"
            );
            let response = self.transport.send(&prepared).await?;

            if response.status() != StatusCode::UNAUTHORIZED
                || options.skip_auth
                || options.skip_retry
            {
                return Ok(response);
            }

            let Some(next) = attempt.next() else {
                tracing::warn!(url = %url, "Credential rejected after refresh");
                return Ok(response);
            };

            match self.credential(true).await {
                Some(fresh) => {
                    tracing::info!(url = %url, "Credential rejected, retrying with refreshed credential");
                    credential = Some(fresh);
                    attempt = next;
                }
                None => {
                    tracing::warn!(url = %url, "Credential refresh produced nothing, returning 401");
                    return Ok(response);
                }
            }
        }
    }

    async fn credential(&self, force_refresh: bool) -> Option<Credential> {
        match self.identity.credential(force_refresh).await {
            Ok(Some(credential)) => Some(credential),
            Ok(None) => {
                tracing::debug!(force_refresh, "No credential available");
                None
            }
            Err(err) => {
                tracing::warn!(force_refresh, error = %err, "Identity provider failed");
                None
            }
        }
    }

    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl std::fmt::Debug for AuthenticatedRequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedRequestExecutor")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IdentityError;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // Replays queued statuses and records what was sent.
    #[derive(Default)]
    struct QueuedTransport {
        statuses: Mutex<VecDeque<StatusCode>>,
        sent: Mutex<Vec<PreparedRequest>>,
    }

    impl QueuedTransport {
        fn with(statuses: &[StatusCode]) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn tokens(&self) -> Vec<Option<String>> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.bearer_token().map(str::to_string))
                .collect()
        }
    }

    #[async_trait]
    impl Transport for QueuedTransport {
        async fn send(&self, request: &PreparedRequest) -> Result<ApiResponse, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::Connect("no scripted response".into()))?;
            Ok(ApiResponse::new(status, HeaderMap::new(), "{}"))
        }
    }

    // Hands out "tok-N", bumping N on every forced refresh.
    #[derive(Default)]
    struct CountingIdentity {
        generation: Mutex<u32>,
        refreshes: Mutex<u32>,
        fail_refresh: bool,
    }

    #[async_trait]
    impl IdentityProvider for CountingIdentity {
        async fn credential(&self, force_refresh: bool) -> Result<Option<Credential>, IdentityError> {
            if force_refresh {
                *self.refreshes.lock().unwrap() += 1;
                if self.fail_refresh {
                    return Err(IdentityError::RefreshFailed("revoked".into()));
                }
                *self.generation.lock().unwrap() += 1;
            }
            let generation = *self.generation.lock().unwrap();
            Ok(Some(Credential::new(format!("tok-{}", generation))))
        }
    }

    fn executor(
        transport: Arc<QueuedTransport>,
        identity: Arc<CountingIdentity>,
    ) -> AuthenticatedRequestExecutor {
        AuthenticatedRequestExecutor::new(transport, identity, "https://api.test/")
    }

    #[test]
    fn test_attempt_has_single_transition() {
        assert_eq!(Attempt::First.next(), Some(Attempt::Retried));
        assert_eq!(Attempt::Retried.next(), None);
    }

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let transport = QueuedTransport::with(&[StatusCode::OK]);
        let identity = Arc::new(CountingIdentity::default());
        let exec = executor(transport.clone(), identity.clone());

        let response = exec
            .execute(&ApiRequest::get("/users/u1/"), ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.tokens(), vec![Some("tok-0".to_string())]);
        assert_eq!(*identity.refreshes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_401_refreshes_and_retries_once() {
        let transport = QueuedTransport::with(&[StatusCode::UNAUTHORIZED, StatusCode::OK]);
        let identity = Arc::new(CountingIdentity::default());
        let exec = executor(transport.clone(), identity.clone());

        let response = exec
            .execute(&ApiRequest::get("/users/u1/"), ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            transport.tokens(),
            vec![Some("tok-0".to_string()), Some("tok-1".to_string())]
        );
        assert_eq!(*identity.refreshes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_double_401_stops_after_two_attempts() {
        let transport = QueuedTransport::with(&[
            StatusCode::UNAUTHORIZED,
            StatusCode::UNAUTHORIZED,
            StatusCode::OK,
        ]);
        let identity = Arc::new(CountingIdentity::default());
        let exec = executor(transport.clone(), identity.clone());

        let response = exec
            .execute(&ApiRequest::get("/users/u1/"), ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
        assert_eq!(*identity.refreshes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_skip_retry_returns_first_401() {
        let transport = QueuedTransport::with(&[StatusCode::UNAUTHORIZED, StatusCode::OK]);
        let identity = Arc::new(CountingIdentity::default());
        let exec = executor(transport.clone(), identity.clone());

        let response = exec
            .execute(&ApiRequest::get("/users/u1/"), ExecuteOptions::no_retry())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        assert_eq!(*identity.refreshes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_skip_auth_sends_no_credential() {
        let transport = QueuedTransport::with(&[StatusCode::OK]);
        let identity = Arc::new(CountingIdentity::default());
        let exec = executor(transport.clone(), identity.clone());

        exec.execute(&ApiRequest::get("/refuges/"), ExecuteOptions::public())
            .await
            .unwrap();

        assert_eq!(transport.tokens(), vec![None]);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_401() {
        let transport = QueuedTransport::with(&[StatusCode::UNAUTHORIZED, StatusCode::OK]);
        let identity = Arc::new(CountingIdentity {
            fail_refresh: true,
            ..CountingIdentity::default()
        });
        let exec = executor(transport.clone(), identity.clone());

        let response = exec
            .execute(&ApiRequest::get("/users/u1/"), ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = QueuedTransport::with(&[]);
        let identity = Arc::new(CountingIdentity::default());
        let exec = executor(transport, identity.clone());

        let err = exec
            .execute(&ApiRequest::get("/users/u1/"), ExecuteOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connect(_)));
        assert_eq!(*identity.refreshes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_url_resolution() {
        let transport = QueuedTransport::with(&[StatusCode::OK, StatusCode::OK]);
        let identity = Arc::new(CountingIdentity::default());
        let exec = executor(transport.clone(), identity);

        exec.execute(&ApiRequest::get("refuges/"), ExecuteOptions::public())
            .await
            .unwrap();
        exec.execute(
            &ApiRequest::get("https://cdn.test/media/x.jpg"),
            ExecuteOptions::public(),
        )
        .await
        .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].url, "https://api.test/refuges/");
        assert_eq!(sent[1].url, "https://cdn.test/media/x.jpg");
    }
}
