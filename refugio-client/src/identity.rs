//! Identity provider seam.
//!
//! The identity provider owns the credential and its refresh routine. The
//! executor only asks for the current credential before each request and for
//! a forced refresh after an observed 401.

use async_trait::async_trait;
use refugio_core::Credential;

use crate::error::IdentityError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the current credential, or `None` when nobody is signed in.
    ///
    /// With `force_refresh` the provider must obtain a new credential from
    /// its issuer instead of serving a cached one.
    async fn credential(&self, force_refresh: bool) -> Result<Option<Credential>, IdentityError>;
}

/// Serves a fixed token. A forced refresh returns the same token, so a
/// rejected static token surfaces as a 401 after one retry.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    credential: Option<Credential>,
}

impl StaticIdentityProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Some(Credential::new(token)),
        }
    }

    /// A provider with no signed-in user.
    pub fn anonymous() -> Self {
        Self { credential: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn credential(&self, _force_refresh: bool) -> Result<Option<Credential>, IdentityError> {
        Ok(self.credential.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_serves_token() {
        let provider = StaticIdentityProvider::new("tok");
        let credential = provider.credential(false).await.unwrap().unwrap();
        assert_eq!(credential.expose(), "tok");
        let refreshed = provider.credential(true).await.unwrap().unwrap();
        assert_eq!(refreshed, credential);
    }

    #[tokio::test]
    async fn test_anonymous_provider_has_no_credential() {
        let provider = StaticIdentityProvider::anonymous();
        assert!(provider.credential(false).await.unwrap().is_none());
    }
}
