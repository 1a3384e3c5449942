//! Per-entity cache policies.
//!
//! Each submodule owns the key layout of one entity kind and the read and
//! mutation helpers that wire [`RefugioApi`] calls through the
//! [`OptimisticCacheCoordinator`]:
//!
//! | Module        | Key families                                               |
//! |---------------|------------------------------------------------------------|
//! | `users`       | `users/{detail,favourites,visited,media,renovations}/{uid}` |
//! | `refuges`     | `refuges/detail/{id}`, `refuges/list`, `refuges/search/..` |
//! | `media`       | `media/refuge/{id}`                                        |
//! | `experiences` | `experiences/refuge/{id}`                                  |
//! | `renovations` | `renovations/{list,detail/{id},refuge/{id}}`               |
//! | `doubts`      | `doubts/refuge/{id}`                                       |

pub mod doubts;
pub mod experiences;
pub mod media;
pub mod refuges;
pub mod renovations;
pub mod users;

use refugio_client::{ClientResult, RefugioApi};
use refugio_core::CacheKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

use crate::coordinator::OptimisticCacheCoordinator;
use crate::entry::{ReadConfig, ReadOutcome};
use crate::error::CacheResult;
use crate::mutation::Mutation;

/// The coordinator paired with the API it fetches from.
#[derive(Debug, Clone)]
pub struct EntityStore {
    cache: OptimisticCacheCoordinator,
    api: RefugioApi,
}

impl EntityStore {
    pub fn new(cache: OptimisticCacheCoordinator, api: RefugioApi) -> Self {
        Self { cache, api }
    }

    pub fn cache(&self) -> &OptimisticCacheCoordinator {
        &self.cache
    }

    pub fn api(&self) -> &RefugioApi {
        &self.api
    }

    async fn read_with<T, F, Fut>(&self, key: CacheKey, fetch: F) -> CacheResult<ReadOutcome<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(RefugioApi) -> Fut,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let api = self.api.clone();
        self.cache
            .read(key, ReadConfig::default(), move || fetch(api))
            .await
    }

    /// Issue `mutation` now; the returned future reports its outcome.
    fn mutate_with<R, F, Fut>(
        &self,
        mutation: Mutation<R>,
        call: F,
    ) -> impl Future<Output = CacheResult<R>> + Send + 'static
    where
        R: Send + 'static,
        F: FnOnce(RefugioApi) -> Fut + Send + 'static,
        Fut: Future<Output = ClientResult<R>> + Send + 'static,
    {
        let api = self.api.clone();
        self.cache.mutate(mutation, move || call(api))
    }
}

/// Apply `patch` to a cached user detail, if one is cached.
fn patch_detail<T>(current: Option<Option<T>>, patch: impl FnOnce(&mut T)) -> Option<Option<T>> {
    current.map(|detail| {
        detail.map(|mut value| {
            patch(&mut value);
            value
        })
    })
}
