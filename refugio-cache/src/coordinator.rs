//! The optimistic cache coordinator.
//!
//! One coordinator owns the cache for a process (or a test). Readers get a
//! cached value or share one in-flight fetch per key; mutations run the
//! snapshot, provisional write, network call, then reconcile-or-rollback
//! cycle, serialized per key by the [`MutationQueue`].
//!
//! All cache state sits behind one `std::sync::Mutex` that is never held
//! across an `.await`. Fetches and mutations run as spawned tasks so that a
//! caller going away never leaves a half-finished write behind.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use refugio_client::ClientError;
use refugio_core::{CacheKey, MutationKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::config::CacheConfig;
use crate::entry::{
    CacheEntry, CacheEvent, CacheRead, FetchStatus, QuerySnapshot, QueryStatus, ReadConfig,
    ReadOutcome, Staleness,
};
use crate::error::{CacheError, CacheResult};
use crate::invalidation::{EdgeParams, InvalidationTable};
use crate::mutation::{AffectedKey, Mutation};
use crate::queue::MutationQueue;

type SharedFetch = Shared<BoxFuture<'static, CacheResult<Value>>>;
type Reconciler<R> = (
    CacheKey,
    Box<dyn FnOnce(&R, Option<Value>) -> CacheResult<Option<Value>> + Send>,
);

// ============================================================================
// STATE
// ============================================================================

struct InFlightFetch {
    id: u64,
    shared: SharedFetch,
    /// Set when the key was invalidated while this fetch was running.
    invalidated: bool,
}

#[derive(Default)]
struct ObserverSlot {
    active: usize,
    released_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    fetches: HashMap<CacheKey, InFlightFetch>,
    failures: HashMap<CacheKey, CacheError>,
    /// Keys holding a mutation snapshot, with the number of holders.
    mutating: HashMap<CacheKey, usize>,
    observers: HashMap<CacheKey, ObserverSlot>,
    next_fetch_id: u64,
}

impl CacheState {
    fn is_mutating(&self, key: &CacheKey) -> bool {
        self.mutating.contains_key(key)
    }

    fn hold(&mut self, key: &CacheKey) {
        *self.mutating.entry(key.clone()).or_insert(0) += 1;
    }

    fn release(&mut self, key: &CacheKey) {
        if let Some(holders) = self.mutating.get_mut(key) {
            *holders -= 1;
            if *holders == 0 {
                self.mutating.remove(key);
            }
        }
    }
}

/// Mutation holds taken by one mutation.
///
/// Keys still held when this is dropped belong to a mutation that panicked
/// or whose task was aborted; they are released and invalidated so the key
/// is neither pinned against refetch nor against eviction.
struct Holds {
    inner: Arc<Inner>,
    keys: Vec<CacheKey>,
}

impl Holds {
    fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            keys: Vec::new(),
        }
    }

    fn hold(&mut self, state: &mut CacheState, key: &CacheKey) {
        state.hold(key);
        self.keys.push(key.clone());
    }

    fn release_all(&mut self, state: &mut CacheState) {
        for key in self.keys.drain(..) {
            state.release(&key);
        }
    }
}

impl Drop for Holds {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let abandoned = self.keys.len();
        for key in self.keys.drain(..) {
            state.release(&key);
            if let Some(entry) = state.entries.get_mut(&key) {
                if entry.invalidate() {
                    self.inner.emit(CacheEvent::Invalidated { key });
                }
            }
        }
        tracing::warn!(keys = abandoned, "Mutation abandoned, held keys released");
    }
}

struct Inner {
    config: CacheConfig,
    table: InvalidationTable,
    state: Mutex<CacheState>,
    queue: Arc<MutationQueue>,
    events: broadcast::Sender<CacheEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn start_fetch<T, Fut>(
        self: &Arc<Self>,
        state: &mut CacheState,
        key: CacheKey,
        fetch: Fut,
    ) -> SharedFetch
    where
        T: Serialize + Send + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let id = state.next_fetch_id;
        state.next_fetch_id += 1;

        let task_inner = Arc::clone(self);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = match fetch.await {
                Ok(value) => serde_json::to_value(value).map_err(CacheError::from),
                Err(err) => Err(CacheError::from(err)),
            };
            task_inner.finish_fetch(&task_key, id, &result);
            result
        });

        let abandon_inner = Arc::clone(self);
        let abandon_key = key.clone();
        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    let err = CacheError::from(join_err);
                    abandon_inner.finish_fetch(&abandon_key, id, &Err(err.clone()));
                    Err(err)
                }
            }
        }
        .boxed()
        .shared();

        state.fetches.insert(
            key,
            InFlightFetch {
                id,
                shared: shared.clone(),
                invalidated: false,
            },
        );
        shared
    }

    fn finish_fetch(&self, key: &CacheKey, id: u64, result: &CacheResult<Value>) {
        let mut guard = self.lock();
        let state = &mut *guard;

        let invalidated = match state.fetches.get(key) {
            Some(fetch) if fetch.id == id => fetch.invalidated,
            _ => {
                tracing::trace!(key = %key, "Fetch was detached, result not stored");
                return;
            }
        };
        state.fetches.remove(key);

        match result {
            Ok(value) => {
                if state.is_mutating(key) {
                    tracing::debug!(key = %key, "Key under mutation, keeping provisional value");
                    return;
                }
                state.entries.insert(
                    key.clone(),
                    CacheEntry::with_state(value.clone(), Utc::now(), invalidated),
                );
                state.failures.remove(key);
                self.emit(CacheEvent::Fetched { key: key.clone() });
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Fetch failed");
                state.failures.insert(key.clone(), err.clone());
                self.emit(CacheEvent::FetchFailed { key: key.clone() });
            }
        }
    }

    /// Mark every entry and in-flight fetch under `prefix` invalidated.
    fn invalidate_matching(&self, state: &mut CacheState, prefix: &CacheKey) -> usize {
        let mut matched = 0;
        for (key, entry) in state.entries.iter_mut() {
            if key.starts_with(prefix) {
                matched += 1;
                if entry.invalidate() {
                    self.emit(CacheEvent::Invalidated { key: key.clone() });
                }
            }
        }
        for (key, fetch) in state.fetches.iter_mut() {
            if key.starts_with(prefix) {
                fetch.invalidated = true;
            }
        }
        matched
    }

    async fn run_mutation<R, F, Fut>(
        self: Arc<Self>,
        mutation: Mutation<R>,
        mutation_fn: F,
    ) -> CacheResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, ClientError>>,
    {
        let Mutation {
            kind,
            params,
            affected,
            on_success,
            on_error,
        } = mutation;

        // Snapshot and provisional write happen under one lock, so no other
        // task observes a state between the two.
        let mut holds = Holds::new(Arc::clone(&self));
        let mut snapshots = Vec::with_capacity(affected.len());
        let mut reconcilers: Vec<Reconciler<R>> = Vec::with_capacity(affected.len());
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let now = Utc::now();
            for AffectedKey {
                key,
                provisional,
                reconcile,
            } in affected
            {
                let snapshot = state.entries.get(&key).cloned();
                if state.fetches.remove(&key).is_some() {
                    tracing::trace!(key = %key, "Detached in-flight fetch of mutated key");
                }
                holds.hold(state, &key);

                match provisional(snapshot.as_ref().map(|entry| entry.value().clone())) {
                    Ok(Some(value)) => {
                        let invalidated = snapshot.as_ref().is_some_and(CacheEntry::is_invalidated);
                        state
                            .entries
                            .insert(key.clone(), CacheEntry::with_state(value, now, invalidated));
                        self.emit(CacheEvent::Provisional { key: key.clone() });
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "Provisional value not applied");
                    }
                }

                snapshots.push((key.clone(), snapshot));
                reconcilers.push((key, reconcile));
            }
        }
        tracing::debug!(mutation = %kind, keys = snapshots.len(), "Mutation started");

        match mutation_fn().await {
            Ok(result) => {
                self.reconcile(kind, &params, &result, reconcilers, &mut holds);
                if let Some(callback) = on_success {
                    callback(&result);
                }
                Ok(result)
            }
            Err(err) => {
                let err = CacheError::from(err);
                self.rollback(kind, snapshots, &err, &mut holds);
                if let Some(callback) = on_error {
                    callback(&err);
                }
                Err(err)
            }
        }
    }

    fn reconcile<R>(
        &self,
        kind: MutationKind,
        params: &EdgeParams,
        result: &R,
        reconcilers: Vec<Reconciler<R>>,
        holds: &mut Holds,
    ) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let now = Utc::now();
        let mut reconciled = 0;

        for (key, reconcile) in reconcilers {
            let current = state.entries.get(&key).map(|entry| entry.value().clone());
            match reconcile(result, current) {
                Ok(Some(value)) => {
                    state
                        .entries
                        .insert(key.clone(), CacheEntry::with_state(value, now, false));
                    state.failures.remove(&key);
                    reconciled += 1;
                    self.emit(CacheEvent::Reconciled { key: key.clone() });
                }
                outcome => {
                    if let Err(err) = outcome {
                        tracing::warn!(key = %key, error = %err, "Reconciled value not applied");
                    }
                    if let Some(entry) = state.entries.get_mut(&key) {
                        if entry.invalidate() {
                            self.emit(CacheEvent::Invalidated { key: key.clone() });
                        }
                    }
                }
            }
        }

        let prefixes = self.table.resolve(kind, params);
        let mut invalidated = 0;
        for prefix in &prefixes {
            invalidated += self.invalidate_matching(state, prefix);
        }

        holds.release_all(state);
        tracing::debug!(
            mutation = %kind,
            reconciled,
            edges = prefixes.len(),
            invalidated,
            "Mutation reconciled"
        );
    }

    fn rollback(
        &self,
        kind: MutationKind,
        snapshots: Vec<(CacheKey, Option<CacheEntry>)>,
        err: &CacheError,
        holds: &mut Holds,
    ) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let restored = snapshots.len();

        // Reverse order so a key listed twice ends at its first snapshot.
        for (key, snapshot) in snapshots.into_iter().rev() {
            match snapshot {
                Some(entry) => {
                    state.entries.insert(key.clone(), entry);
                }
                None => {
                    state.entries.remove(&key);
                }
            }
            self.emit(CacheEvent::RolledBack { key });
        }
        holds.release_all(state);
        tracing::warn!(
            mutation = %kind,
            keys = restored,
            error = %err,
            "Mutation failed, snapshots restored"
        );
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Keyed cache of server-owned values with optimistic mutations.
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct OptimisticCacheCoordinator {
    inner: Arc<Inner>,
}

impl Default for OptimisticCacheCoordinator {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl OptimisticCacheCoordinator {
    /// Create a coordinator with the default invalidation table.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_table(config, InvalidationTable::default())
    }

    pub fn with_table(config: CacheConfig, table: InvalidationTable) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                table,
                state: Mutex::new(CacheState::default()),
                queue: MutationQueue::new(),
                events,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn table(&self) -> &InvalidationTable {
        &self.inner.table
    }

    // === Reads ===

    /// Read `key`, fetching it when absent or not fresh.
    ///
    /// A fresh entry, or any entry whose key is under an in-flight mutation,
    /// is returned without calling `fetcher`. Otherwise concurrent readers of
    /// the same key share a single fetch, which keeps running and stores its
    /// result even if every reader goes away.
    pub async fn read<T, F, Fut>(
        &self,
        key: CacheKey,
        config: ReadConfig,
        fetcher: F,
    ) -> CacheResult<ReadOutcome<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        if !config.enabled {
            tracing::trace!(key = %key, "Read disabled");
            return Ok(ReadOutcome::Idle);
        }
        let stale_time = config.stale_time.unwrap_or(self.inner.config.stale_time);

        let joined = {
            let state = self.inner.lock();
            if let Some(entry) = state.entries.get(&key) {
                let under_mutation = state.is_mutating(&key);
                if under_mutation || entry.staleness_at(stale_time, Utc::now()).is_fresh() {
                    tracing::trace!(key = %key, under_mutation, "Cache hit");
                    return Ok(ReadOutcome::Ready(CacheRead::from_cache(
                        entry.decode()?,
                        entry.updated_at(),
                    )));
                }
            }
            state.fetches.get(&key).map(|fetch| fetch.shared.clone())
        };

        let shared = match joined {
            Some(shared) => {
                tracing::trace!(key = %key, "Joining in-flight fetch");
                shared
            }
            None => {
                // Unlocked: the fetcher may call back into the coordinator.
                let fetch = fetcher();
                let mut guard = self.inner.lock();
                let state = &mut *guard;
                let registered = state.fetches.get(&key).map(|fetch| fetch.shared.clone());
                match registered {
                    Some(existing) => {
                        tracing::trace!(key = %key, "Joining fetch started concurrently");
                        existing
                    }
                    None => {
                        tracing::trace!(key = %key, "Cache miss");
                        self.inner.start_fetch(state, key.clone(), fetch)
                    }
                }
            }
        };

        let value = shared.await?;

        // A mutation that started while we waited owns the displayed value.
        {
            let state = self.inner.lock();
            if state.is_mutating(&key) {
                if let Some(entry) = state.entries.get(&key) {
                    return Ok(ReadOutcome::Ready(CacheRead::from_cache(
                        entry.decode()?,
                        entry.updated_at(),
                    )));
                }
            }
        }

        Ok(ReadOutcome::Ready(CacheRead::from_fetch(serde_json::from_value(value)?)))
    }

    /// Current state of `key` for rendering.
    pub fn snapshot<T: DeserializeOwned>(&self, key: &CacheKey) -> QuerySnapshot<T> {
        let state = self.inner.lock();
        let entry = state.entries.get(key);
        let data = entry.and_then(|entry| match entry.decode() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Cached value has an unexpected shape");
                None
            }
        });
        let fetching = state.fetches.contains_key(key);
        let error = state.failures.get(key).cloned();
        let status = if error.is_some() {
            QueryStatus::Error
        } else if entry.is_some() {
            QueryStatus::Success
        } else if fetching {
            QueryStatus::Pending
        } else {
            QueryStatus::Idle
        };

        QuerySnapshot {
            data,
            status,
            fetch_status: if fetching {
                FetchStatus::Fetching
            } else {
                FetchStatus::Idle
            },
            error,
            updated_at: entry.map(CacheEntry::updated_at),
            staleness: entry
                .map(|entry| entry.staleness_at(self.inner.config.stale_time, Utc::now())),
        }
    }

    /// Cached value of `key`, without fetching.
    pub fn peek<T: DeserializeOwned>(&self, key: &CacheKey) -> CacheResult<Option<T>> {
        self.inner
            .lock()
            .entries
            .get(key)
            .map(CacheEntry::decode)
            .transpose()
    }

    /// Raw entry of `key`, including its timestamp and invalidation flag.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn staleness(&self, key: &CacheKey) -> Option<Staleness> {
        let stale_time = self.inner.config.stale_time;
        self.inner
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.staleness_at(stale_time, Utc::now()))
    }

    pub fn is_invalidated(&self, key: &CacheKey) -> bool {
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(CacheEntry::is_invalidated)
    }

    /// Whether a mutation currently holds a snapshot of `key`.
    pub fn is_mutating(&self, key: &CacheKey) -> bool {
        self.inner.lock().is_mutating(key)
    }

    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.inner.lock().fetches.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self.inner.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Mark every entry under `prefix` invalidated so its next read
    /// refetches. Returns the number of matching entries.
    pub fn invalidate_prefix(&self, prefix: &CacheKey) -> usize {
        let mut guard = self.inner.lock();
        let matched = self.inner.invalidate_matching(&mut guard, prefix);
        tracing::debug!(prefix = %prefix, matched, "Invalidated key family");
        matched
    }

    // === Observers & notifications ===

    /// Register a live consumer of `key`. The entry is not evicted while any
    /// observer is alive.
    pub fn observe(&self, key: CacheKey) -> Observer {
        self.inner
            .lock()
            .observers
            .entry(key.clone())
            .or_default()
            .active += 1;
        Observer {
            inner: Arc::clone(&self.inner),
            key,
        }
    }

    pub fn observer_count(&self, key: &CacheKey) -> usize {
        self.inner
            .lock()
            .observers
            .get(key)
            .map_or(0, |slot| slot.active)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    // === Mutations ===

    /// Run one optimistic mutation.
    ///
    /// The mutation takes its place in the per-key queue and is spawned
    /// immediately; the returned future only reports its outcome. Once
    /// issued it runs to completion whether or not the future is awaited.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mutate<R, F, Fut>(
        &self,
        mutation: Mutation<R>,
        mutation_fn: F,
    ) -> impl Future<Output = CacheResult<R>> + Send + 'static
    where
        R: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, ClientError>> + Send + 'static,
    {
        let mut slot = self.inner.queue.enqueue(mutation.keys());
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            slot.ready().await;
            let result = inner.run_mutation(mutation, mutation_fn).await;
            drop(slot);
            result
        });
        async move { handle.await? }
    }

    /// Number of keys with queued or running mutations.
    pub fn pending_mutation_keys(&self) -> usize {
        self.inner.queue.pending_keys()
    }

    // === Retention ===

    /// Evict unobserved entries older than the retention window.
    pub fn collect_garbage(&self) -> usize {
        self.collect_garbage_at(Utc::now())
    }

    /// [`Self::collect_garbage`] against an explicit clock.
    pub fn collect_garbage_at(&self, now: DateTime<Utc>) -> usize {
        let Ok(gc_time) = chrono::Duration::from_std(self.inner.config.gc_time) else {
            return 0;
        };
        let mut guard = self.inner.lock();
        let state = &mut *guard;

        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(key, entry)| {
                if state.is_mutating(key) || state.fetches.contains_key(*key) {
                    return false;
                }
                let slot = state.observers.get(*key);
                if slot.is_some_and(|slot| slot.active > 0) {
                    return false;
                }
                let last_seen = slot
                    .and_then(|slot| slot.released_at)
                    .map_or(entry.updated_at(), |released| released.max(entry.updated_at()));
                now.signed_duration_since(last_seen) >= gc_time
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.entries.remove(key);
            state.failures.remove(key);
            state.observers.remove(key);
            self.inner.emit(CacheEvent::Evicted { key: key.clone() });
        }
        let entries = &state.entries;
        state
            .observers
            .retain(|key, slot| slot.active > 0 || entries.contains_key(key));

        if !expired.is_empty() {
            tracing::debug!(evicted = expired.len(), "Evicted unobserved entries");
        }
        expired.len()
    }
}

impl std::fmt::Debug for OptimisticCacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("OptimisticCacheCoordinator")
            .field("entries", &state.entries.len())
            .field("fetches", &state.fetches.len())
            .field("mutating", &state.mutating.len())
            .finish()
    }
}

/// A live consumer of one key. Dropping it starts the key's retention window.
pub struct Observer {
    inner: Arc<Inner>,
    key: CacheKey,
}

impl Observer {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        if let Some(slot) = state.observers.get_mut(&self.key) {
            slot.active = slot.active.saturating_sub(1);
            if slot.active == 0 {
                slot.released_at = Some(Utc::now());
            }
        }
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer").field("key", &self.key).finish()
    }
}
