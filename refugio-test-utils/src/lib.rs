//! Refugio Test Utilities
//!
//! Shared test infrastructure for the Refugio workspace:
//! - Scripted transport and identity provider for driving the executor
//! - Proptest generators for keys and identifiers
//! - JSON fixtures matching the backend representations
//! - Assertions over API failures

// Re-export core types for convenience
pub use refugio_core::{
    cache_key, ApiError, ApiErrorKind, CacheKey, Credential, EntityIdType, ExperienceId, MediaId,
    RefugeId, RenovationId, UserId,
};

use async_trait::async_trait;
use refugio_client::{
    ApiResponse, AuthenticatedRequestExecutor, IdentityError, IdentityProvider, PreparedRequest,
    RefugioApi, Transport, TransportError,
};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, Notify};

pub const TEST_BASE_URL: &str = "https://api.test/api";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// SCRIPTED TRANSPORT
// ============================================================================

struct ScriptedReply {
    outcome: Result<ApiResponse, TransportError>,
    gate: Option<oneshot::Receiver<()>>,
}

struct Route {
    method: Method,
    path: String,
    response: ApiResponse,
}

/// Releases a gated scripted response. Dropping the gate also releases it.
#[derive(Debug)]
pub struct Gate {
    sender: oneshot::Sender<()>,
}

impl Gate {
    pub fn open(self) {
        let _ = self.sender.send(());
    }
}

/// Transport that replays scripted responses and records every request.
///
/// Routes registered with [`ScriptedTransport::route`] answer every matching
/// request; anything else consumes the next queued reply in FIFO order. An
/// empty queue answers with a connect error.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<ScriptedReply>>,
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<PreparedRequest>>,
    arrived: Notify,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response with the given status and JSON body.
    pub fn push(&self, status: u16, body: Value) {
        self.push_response(json_response(status, &body));
    }

    /// Queue a body-less response (e.g. 204).
    pub fn push_empty(&self, status: u16) {
        self.push_response(empty_response(status));
    }

    pub fn push_response(&self, response: ApiResponse) {
        lock(&self.queue).push_back(ScriptedReply {
            outcome: Ok(response),
            gate: None,
        });
    }

    pub fn push_error(&self, error: TransportError) {
        lock(&self.queue).push_back(ScriptedReply {
            outcome: Err(error),
            gate: None,
        });
    }

    /// Queue a response that is held back until the returned gate opens.
    pub fn push_gated(&self, status: u16, body: Value) -> Gate {
        self.push_gated_outcome(Ok(json_response(status, &body)))
    }

    pub fn push_gated_outcome(&self, outcome: Result<ApiResponse, TransportError>) -> Gate {
        let (sender, receiver) = oneshot::channel();
        lock(&self.queue).push_back(ScriptedReply {
            outcome,
            gate: Some(receiver),
        });
        Gate { sender }
    }

    /// Answer every `method` request whose URL ends with `path`.
    pub fn route(&self, method: Method, path: impl Into<String>, status: u16, body: Value) {
        lock(&self.routes).push(Route {
            method,
            path: path.into(),
            response: json_response(status, &body),
        });
    }

    pub fn requests(&self) -> Vec<PreparedRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of recorded requests whose URL ends with `path`.
    pub fn count_for(&self, method: &Method, path: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|request| &request.method == method && request.url.ends_with(path))
            .count()
    }

    /// Wait until at least `count` requests have reached the transport.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.arrived.notified();
            if self.request_count() >= count {
                return;
            }
            notified.await;
        }
    }

    fn next_reply(&self, request: &PreparedRequest) -> ScriptedReply {
        let routed = lock(&self.routes)
            .iter()
            .find(|route| route.method == request.method && request.url.ends_with(&route.path))
            .map(|route| route.response.clone());
        if let Some(response) = routed {
            return ScriptedReply {
                outcome: Ok(response),
                gate: None,
            };
        }
        lock(&self.queue).pop_front().unwrap_or_else(|| ScriptedReply {
            outcome: Err(TransportError::Connect(format!(
                "no scripted response for {} {}",
                request.method, request.url
            ))),
            gate: None,
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<ApiResponse, TransportError> {
        let reply = self.next_reply(request);
        lock(&self.requests).push(request.clone());
        self.arrived.notify_waiters();
        if let Some(gate) = reply.gate {
            let _ = gate.await;
        }
        reply.outcome
    }
}

pub fn json_response(status: u16, body: &Value) -> ApiResponse {
    ApiResponse::json_body(status_code(status), body)
}

pub fn empty_response(status: u16) -> ApiResponse {
    ApiResponse::new(status_code(status), Default::default(), Vec::new())
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// ============================================================================
// SCRIPTED IDENTITY PROVIDER
// ============================================================================

/// Outcome of one forced refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Token(String),
    SignedOut,
    Fail(String),
}

/// Identity provider that counts calls per `force_refresh` flag.
///
/// A forced refresh consumes the next scripted [`RefreshOutcome`]; a new
/// token becomes the cached credential. With nothing scripted the current
/// token is served again.
#[derive(Debug, Default)]
pub struct ScriptedIdentityProvider {
    current: Mutex<Option<String>>,
    refreshes: Mutex<VecDeque<RefreshOutcome>>,
    cached_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl ScriptedIdentityProvider {
    pub fn new(token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Some(token.into())),
            ..Self::default()
        })
    }

    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_refresh(&self, outcome: RefreshOutcome) {
        lock(&self.refreshes).push_back(outcome);
    }

    /// Calls made with `force_refresh = false`.
    pub fn cached_calls(&self) -> usize {
        self.cached_calls.load(Ordering::SeqCst)
    }

    /// Calls made with `force_refresh = true`.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentityProvider {
    async fn credential(&self, force_refresh: bool) -> Result<Option<Credential>, IdentityError> {
        if !force_refresh {
            self.cached_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(lock(&self.current).clone().map(Credential::new));
        }

        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = lock(&self.refreshes).pop_front();
        let mut current = lock(&self.current);
        match outcome {
            None => Ok(current.clone().map(Credential::new)),
            Some(RefreshOutcome::Token(token)) => {
                *current = Some(token.clone());
                Ok(Some(Credential::new(token)))
            }
            Some(RefreshOutcome::SignedOut) => {
                *current = None;
                Ok(None)
            }
            Some(RefreshOutcome::Fail(reason)) => Err(IdentityError::RefreshFailed(reason)),
        }
    }
}

// ============================================================================
// WIRING
// ============================================================================

/// Executor over the given scripted collaborators, rooted at [`TEST_BASE_URL`].
pub fn scripted_executor(
    transport: &Arc<ScriptedTransport>,
    identity: &Arc<ScriptedIdentityProvider>,
) -> AuthenticatedRequestExecutor {
    let transport: Arc<dyn Transport> = transport.clone();
    let identity: Arc<dyn IdentityProvider> = identity.clone();
    AuthenticatedRequestExecutor::new(transport, identity, TEST_BASE_URL)
}

pub fn scripted_api(
    transport: &Arc<ScriptedTransport>,
    identity: &Arc<ScriptedIdentityProvider>,
) -> RefugioApi {
    RefugioApi::new(scripted_executor(transport, identity))
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Generate one key segment.
    pub fn arb_segment() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}"
    }

    /// Generate a non-empty cache key rooted at one of the entity roots.
    pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
        (
            prop_oneof![
                Just("users"),
                Just("refuges"),
                Just("media"),
                Just("experiences"),
                Just("renovations"),
                Just("doubts"),
            ],
            prop::collection::vec(arb_segment(), 0..3),
        )
            .prop_map(|(root, rest)| {
                std::iter::once(root.to_string())
                    .chain(rest)
                    .collect::<CacheKey>()
            })
    }

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        "u[0-9]{1,4}".prop_map(UserId::new)
    }

    pub fn arb_refuge_id() -> impl Strategy<Value = RefugeId> {
        "r[0-9]{1,4}".prop_map(RefugeId::new)
    }

    /// Generate a list of distinct refuge ids.
    pub fn arb_refuge_ids() -> impl Strategy<Value = Vec<RefugeId>> {
        prop::collection::btree_set("r[0-9]{1,3}", 0..6)
            .prop_map(|ids| ids.into_iter().map(RefugeId::new).collect())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use serde_json::{json, Value};

    pub fn user_json(uid: &str, favourites: &[&str], visited: &[&str]) -> Value {
        json!({
            "uid": uid,
            "username": format!("user-{uid}"),
            "email": format!("{uid}@example.org"),
            "language": "ca",
            "favourite_refuges": favourites,
            "visited_refuges": visited,
            "uploaded_photos_count": 0,
        })
    }

    pub fn refuge_json(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "coordinates": { "latitude": 42.6, "longitude": 1.1 },
            "altitude": 2200,
            "capacity": 30,
            "region": "Pallars",
            "media_count": 0,
            "visitors_count": 0,
        })
    }

    pub fn media_json(key: &str, refuge_id: &str, creator_uid: &str, experience_id: Option<&str>) -> Value {
        json!({
            "key": key,
            "url": format!("https://media.test/{key}.jpg"),
            "refuge_id": refuge_id,
            "creator_uid": creator_uid,
            "experience_id": experience_id,
            "content_type": "image/jpeg",
        })
    }

    pub fn experience_json(id: &str, refuge_id: &str, creator_uid: &str, media_ids: &[&str]) -> Value {
        json!({
            "id": id,
            "refuge_id": refuge_id,
            "creator_uid": creator_uid,
            "comment": "Great views from the hut",
            "media_ids": media_ids,
        })
    }

    pub fn renovation_json(id: &str, refuge_id: &str, creator_uid: &str, participants: &[&str]) -> Value {
        json!({
            "id": id,
            "refuge_id": refuge_id,
            "creator_uid": creator_uid,
            "ini_date": "2026-07-01",
            "fin_date": "2026-07-05",
            "description": "Replace the roof panels",
            "participants_uids": participants,
        })
    }

    pub fn doubt_json(id: &str, refuge_id: &str, creator_uid: &str) -> Value {
        json!({
            "id": id,
            "refuge_id": refuge_id,
            "creator_uid": creator_uid,
            "message": "Is there water near the refuge?",
            "answers": [],
            "answers_count": 0,
        })
    }

    pub fn answer_json(id: &str, doubt_id: &str, creator_uid: &str) -> Value {
        json!({
            "id": id,
            "doubt_id": doubt_id,
            "creator_uid": creator_uid,
            "message": "Yes, a spring 100m north",
        })
    }

    pub fn error_json(message: &str) -> Value {
        json!({ "error": message })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    use refugio_client::ClientError;

    /// Assert that a client call failed with an API error of the given status.
    pub fn assert_api_status<T: std::fmt::Debug>(result: &Result<T, ClientError>, status: u16) {
        match result {
            Err(ClientError::Api(error)) => assert_eq!(
                error.status, status,
                "Expected status {}, got {:?}",
                status, error
            ),
            other => panic!("Expected API error with status {}, got {:?}", status, other),
        }
    }

    pub fn assert_transport_error<T: std::fmt::Debug>(result: &Result<T, ClientError>) {
        assert!(
            matches!(result, Err(ClientError::Transport(_))),
            "Expected transport error, got {:?}",
            result
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_take_precedence_over_queue() {
        let transport = ScriptedTransport::new();
        let identity = ScriptedIdentityProvider::new("tok-0");
        transport.route(Method::GET, "/users/u1/", 200, fixtures::user_json("u1", &[], &[]));
        transport.push(500, fixtures::error_json("boom"));

        let executor = scripted_executor(&transport, &identity);
        let request = refugio_client::ApiRequest::get("/users/u1/");
        let response = executor
            .execute(&request, Default::default())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.count_for(&Method::GET, "/users/u1/"), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_is_a_transport_error() {
        let transport = ScriptedTransport::new();
        let identity = ScriptedIdentityProvider::new("tok-0");
        let executor = scripted_executor(&transport, &identity);
        let result = executor
            .execute(&refugio_client::ApiRequest::get("/refuges/"), Default::default())
            .await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_identity_refresh_script() {
        let identity = ScriptedIdentityProvider::new("tok-0");
        identity.push_refresh(RefreshOutcome::Token("tok-1".into()));
        identity.push_refresh(RefreshOutcome::Fail("revoked".into()));

        let first = identity.credential(true).await.unwrap().unwrap();
        assert_eq!(first.expose(), "tok-1");
        let cached = identity.credential(false).await.unwrap().unwrap();
        assert_eq!(cached.expose(), "tok-1");
        assert!(identity.credential(true).await.is_err());
        assert_eq!(identity.refresh_calls(), 2);
        assert_eq!(identity.cached_calls(), 1);
    }

    #[test]
    fn test_fixtures_deserialize() {
        let user: refugio_core::User =
            serde_json::from_value(fixtures::user_json("u1", &["r1"], &[])).unwrap();
        assert_eq!(user.favourite_refuges, vec![RefugeId::new("r1")]);
        let _: refugio_core::Refuge = serde_json::from_value(fixtures::refuge_json("r1", "Amitges")).unwrap();
        let _: refugio_core::MediaItem =
            serde_json::from_value(fixtures::media_json("m1", "r1", "u1", Some("e1"))).unwrap();
        let _: refugio_core::Renovation =
            serde_json::from_value(fixtures::renovation_json("v1", "r1", "u1", &[])).unwrap();
        let doubt: refugio_core::Doubt =
            serde_json::from_value(fixtures::doubt_json("d1", "r1", "u1")).unwrap();
        assert_eq!(doubt.answers_count, 0);
    }
}
