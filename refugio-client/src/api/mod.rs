//! Thin per-entity REST wrappers.
//!
//! Each method builds one [`ApiRequest`], runs it through the
//! [`AuthenticatedRequestExecutor`] and interprets the response. Public
//! refuge reads skip authentication; everything else is authenticated.

mod doubts;
mod experiences;
mod media;
mod refuges;
mod renovations;
mod users;

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::executor::AuthenticatedRequestExecutor;
use crate::identity::IdentityProvider;
use crate::request::{ApiRequest, ExecuteOptions, MultipartField};
use crate::response::ApiResponse;
use crate::transport::ReqwestTransport;

/// Typed facade over the backend REST surface.
#[derive(Clone, Debug)]
pub struct RefugioApi {
    executor: AuthenticatedRequestExecutor,
}

impl RefugioApi {
    pub fn new(executor: AuthenticatedRequestExecutor) -> Self {
        Self { executor }
    }

    /// Build the production stack: reqwest transport with the configured
    /// timeout, talking to `api_base_url`.
    pub fn from_config(
        config: &ClientConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        let executor =
            AuthenticatedRequestExecutor::new(Arc::new(transport), identity, &config.api_base_url);
        Ok(Self::new(executor))
    }

    pub fn executor(&self) -> &AuthenticatedRequestExecutor {
        &self.executor
    }

    async fn send(&self, request: ApiRequest, options: ExecuteOptions) -> ClientResult<ApiResponse> {
        Ok(self.executor.execute(&request, options).await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        self.send(request, ExecuteOptions::default())
            .await?
            .into_json()
    }

    async fn get_public_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        self.send(request, ExecuteOptions::public())
            .await?
            .into_json()
    }

    async fn send_json<T, B>(&self, request: ApiRequest, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let request = request.json(body).map_err(ClientError::from)?;
        self.send(request, ExecuteOptions::default())
            .await?
            .into_json()
    }

    async fn send_multipart<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        fields: Vec<MultipartField>,
    ) -> ClientResult<T> {
        self.send(request.multipart(fields), ExecuteOptions::default())
            .await?
            .into_json()
    }

    async fn send_empty(&self, request: ApiRequest) -> ClientResult<()> {
        self.send(request, ExecuteOptions::default())
            .await?
            .into_empty()
    }
}
