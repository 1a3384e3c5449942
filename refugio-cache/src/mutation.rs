//! Mutation descriptors.
//!
//! A [`Mutation`] lists the keys it touches optimistically, how each key's
//! provisional and reconciled values are computed, the parameters its
//! invalidation edges need, and optional lifecycle callbacks for the screen
//! that issued it. The network call itself is passed separately to
//! [`crate::OptimisticCacheCoordinator::mutate`].

use refugio_core::{CacheKey, MutationKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CacheError;
use crate::invalidation::{EdgeParam, EdgeParams};

type ProvisionalFn = Box<dyn FnOnce(Option<Value>) -> Result<Option<Value>, CacheError> + Send>;
type ReconcileFn<R> =
    Box<dyn FnOnce(&R, Option<Value>) -> Result<Option<Value>, CacheError> + Send>;

/// One optimistically updated key.
pub(crate) struct AffectedKey<R> {
    pub(crate) key: CacheKey,
    pub(crate) provisional: ProvisionalFn,
    pub(crate) reconcile: ReconcileFn<R>,
}

/// Description of one mutation producing a server result of type `R`.
pub struct Mutation<R> {
    pub(crate) kind: MutationKind,
    pub(crate) params: EdgeParams,
    pub(crate) affected: Vec<AffectedKey<R>>,
    pub(crate) on_success: Option<Box<dyn FnOnce(&R) + Send>>,
    pub(crate) on_error: Option<Box<dyn FnOnce(&CacheError) + Send>>,
}

impl<R: 'static> Mutation<R> {
    pub fn new(kind: MutationKind) -> Self {
        Self {
            kind,
            params: EdgeParams::new(),
            affected: Vec::new(),
            on_success: None,
            on_error: None,
        }
    }

    /// Supply an identifier for the invalidation edges of this kind.
    pub fn param(mut self, param: EdgeParam, value: impl ToString) -> Self {
        self.params.insert(param, value.to_string());
        self
    }

    /// Supply an identifier only when it is known.
    pub fn param_opt(self, param: EdgeParam, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(param, value),
            None => self,
        }
    }

    /// Update `key` optimistically.
    ///
    /// `provisional` receives the cached value (if any) and returns the value
    /// to show until the server answers; `None` leaves the key untouched.
    /// `reconcile` maps the server result and the current value to the
    /// authoritative value; `None` keeps the provisional value but marks it
    /// invalidated so the next read refetches it.
    pub fn affect<T, P, C>(mut self, key: CacheKey, provisional: P, reconcile: C) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
        P: FnOnce(Option<T>) -> Option<T> + Send + 'static,
        C: FnOnce(&R, Option<T>) -> Option<T> + Send + 'static,
    {
        let provisional_key = key.clone();
        let reconcile_key = key.clone();
        self.affected.push(AffectedKey {
            key,
            provisional: Box::new(move |current| {
                encode(provisional(decode(&provisional_key, current)))
            }),
            reconcile: Box::new(move |result, current| {
                encode(reconcile(result, decode(&reconcile_key, current)))
            }),
        });
        self
    }

    /// Invoked with the server result after a successful reconcile.
    pub fn on_success(mut self, callback: impl FnOnce(&R) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Invoked with the failure after the rollback.
    pub fn on_error(mut self, callback: impl FnOnce(&CacheError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn params(&self) -> &EdgeParams {
        &self.params
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.affected.iter().map(|affected| &affected.key)
    }
}

impl<R> std::fmt::Debug for Mutation<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field(
                "keys",
                &self.affected.iter().map(|a| a.key.to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn decode<T: DeserializeOwned>(key: &CacheKey, value: Option<Value>) -> Option<T> {
    let value = value?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "Cached value has an unexpected shape");
            None
        }
    }
}

fn encode<T: Serialize>(value: Option<T>) -> Result<Option<Value>, CacheError> {
    value
        .map(|value| serde_json::to_value(value).map_err(CacheError::from))
        .transpose()
}
