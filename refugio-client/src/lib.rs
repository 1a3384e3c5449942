//! Refugio Client - Authenticated Request Pipeline
//!
//! Wraps every outbound HTTP call to the Refugio backend: attaches the bearer
//! credential, refreshes it once on a 401, and exposes typed per-entity REST
//! wrappers on top.

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod identity;
pub mod request;
pub mod response;
pub mod telemetry;
pub mod transport;

pub use api::RefugioApi;
pub use config::{AuthConfig, CacheSettings, ClientConfig, ConfigError, LoggingConfig};
pub use error::{ClientError, ClientResult, IdentityError, TransportError};
pub use executor::{Attempt, AuthenticatedRequestExecutor};
pub use identity::{IdentityProvider, StaticIdentityProvider};
pub use request::{ApiRequest, ExecuteOptions, MultipartField, PreparedRequest, RequestBody};
pub use response::ApiResponse;
pub use telemetry::{init_tracing, TelemetryError};
pub use transport::{ReqwestTransport, Transport};
