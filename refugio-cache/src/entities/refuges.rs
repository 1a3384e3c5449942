//! Refuge keys and reads. Refuges are read-only from the client; their
//! cached views are invalidated by media and experience mutations.

use refugio_core::{cache_key, CacheKey, EntityIdType, Refuge, RefugeId, RefugeQuery};

use super::EntityStore;
use crate::entry::ReadOutcome;
use crate::error::CacheResult;

pub fn refuge_detail(refuge_id: &RefugeId) -> CacheKey {
    cache_key!["refuges", "detail", refuge_id.as_str()]
}

pub fn refuges_list() -> CacheKey {
    cache_key!["refuges", "list"]
}

/// Key of one search. An empty query is the plain list.
pub fn refuges_search(query: &RefugeQuery) -> CacheKey {
    if query.is_empty() {
        return refuges_list();
    }
    cache_key![
        "refuges",
        "search",
        query.name.as_deref().unwrap_or_default(),
        query.region.as_deref().unwrap_or_default(),
        query.page.map(|page| page.to_string()).unwrap_or_default()
    ]
}

impl EntityStore {
    /// Idle until the refuge id is known; `None` when it does not exist.
    pub async fn read_refuge(&self, refuge_id: Option<&RefugeId>) -> CacheResult<ReadOutcome<Option<Refuge>>> {
        let Some(refuge_id) = refuge_id.cloned() else {
            return Ok(ReadOutcome::Idle);
        };
        self.read_with(refuge_detail(&refuge_id), move |api| async move {
            api.get_refuge(&refuge_id).await
        })
        .await
    }

    pub async fn read_refuges(&self, query: &RefugeQuery) -> CacheResult<ReadOutcome<Vec<Refuge>>> {
        let query = query.clone();
        self.read_with(refuges_search(&query), move |api| async move {
            api.list_refuges(&query).await
        })
        .await
    }
}
