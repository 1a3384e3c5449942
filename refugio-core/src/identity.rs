//! Identity types for Refugio entities and the bearer credential.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Common behaviour of the strongly-typed entity identifiers.
///
/// Backend identifiers are opaque strings; the newtypes only exist so that a
/// refuge id can never be passed where a user id is expected.
pub trait EntityIdType: Clone + Eq + std::hash::Hash + fmt::Display {
    /// Borrow the raw identifier.
    fn as_str(&self) -> &str;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl EntityIdType for $name {
            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a user account (the identity provider's subject).
    UserId
);
entity_id!(
    /// Identifier of a mountain refuge.
    RefugeId
);
entity_id!(
    /// Identifier of an uploaded photo or video attached to a refuge.
    MediaId
);
entity_id!(
    /// Identifier of a user experience (a dated report with attached media).
    ExperienceId
);
entity_id!(
    /// Identifier of a scheduled renovation.
    RenovationId
);
entity_id!(
    /// Identifier of a question asked about a refuge.
    DoubtId
);
entity_id!(
    /// Identifier of an answer to a doubt.
    AnswerId
);

// ============================================================================
// CREDENTIAL
// ============================================================================

/// Opaque bearer token issued by the identity provider.
///
/// The token is never parsed or inspected. It is held in a [`SecretString`]
/// so it cannot leak through `Debug` output or logs.
#[derive(Clone)]
pub struct Credential {
    token: SecretString,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    /// Expose the raw token. Only the transport layer should need this.
    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}
