//! Cache entries and the read-side result types.
//!
//! Entries hold the last known JSON representation of a server value. Typed
//! access goes through serde at the coordinator boundary, which lets one
//! cache hold users, refuge lists and id arrays side by side.

use chrono::{DateTime, Utc};
use refugio_core::CacheKey;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::CacheError;

// ============================================================================
// ENTRIES
// ============================================================================

/// One cached value with its staleness state.
///
/// Snapshots taken by mutations are whole `CacheEntry` clones, so a rollback
/// restores value, timestamp and invalidation flag together.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    value: Value,
    updated_at: DateTime<Utc>,
    invalidated: bool,
}

impl CacheEntry {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
            invalidated: false,
        }
    }

    pub(crate) fn with_state(value: Value, updated_at: DateTime<Utc>, invalidated: bool) -> Self {
        Self {
            value,
            updated_at,
            invalidated,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub(crate) fn invalidate(&mut self) -> bool {
        let changed = !self.invalidated;
        self.invalidated = true;
        changed
    }

    /// Staleness of this entry at `now` under the given window.
    pub fn staleness_at(&self, stale_time: Duration, now: DateTime<Utc>) -> Staleness {
        if self.invalidated {
            return Staleness::Invalidated;
        }
        let age = now.signed_duration_since(self.updated_at);
        match chrono::Duration::from_std(stale_time) {
            Ok(window) if age < window => Staleness::Fresh,
            Ok(_) => Staleness::Stale,
            // Windows beyond chrono's range never expire.
            Err(_) => Staleness::Fresh,
        }
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

/// Whether an entry can be served without a refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Younger than the stale window and not invalidated.
    Fresh,
    /// Usable for display, refetched on the next read.
    Stale,
    /// A dependent mutation succeeded; refetched on the next read.
    Invalidated,
}

impl Staleness {
    pub fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh)
    }
}

// ============================================================================
// READS
// ============================================================================

/// Per-read options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadConfig {
    /// A disabled read is a no-op (e.g. the entity id is not known yet).
    pub enabled: bool,
    /// Overrides the coordinator's default stale window.
    pub stale_time: Option<Duration>,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: None,
        }
    }
}

impl ReadConfig {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }
}

/// A value read through the cache, with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    cached_at: DateTime<Utc>,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: true,
        }
    }

    pub fn from_fetch(value: T) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            was_cache_hit: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }
}

/// Result of [`crate::OptimisticCacheCoordinator::read`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    /// The read was disabled; nothing was fetched.
    Idle,
    Ready(CacheRead<T>),
}

impl<T> ReadOutcome<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Idle => None,
            Self::Ready(read) => Some(read.into_value()),
        }
    }

    pub fn as_read(&self) -> Option<&CacheRead<T>> {
        match self {
            Self::Idle => None,
            Self::Ready(read) => Some(read),
        }
    }
}

// ============================================================================
// QUERY SNAPSHOTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing cached and nothing in flight.
    Idle,
    /// First fetch in flight, no data yet.
    Pending,
    Success,
    /// The last fetch failed.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Fetching,
}

/// What a UI layer renders for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot<T> {
    pub data: Option<T>,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub error: Option<CacheError>,
    pub updated_at: Option<DateTime<Utc>>,
    pub staleness: Option<Staleness>,
}

impl<T> QuerySnapshot<T> {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }
}

// ============================================================================
// CHANGE NOTIFICATIONS
// ============================================================================

/// Change notification broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Fetched { key: CacheKey },
    FetchFailed { key: CacheKey },
    Provisional { key: CacheKey },
    Reconciled { key: CacheKey },
    RolledBack { key: CacheKey },
    Invalidated { key: CacheKey },
    Evicted { key: CacheKey },
}

impl CacheEvent {
    pub fn key(&self) -> &CacheKey {
        match self {
            Self::Fetched { key }
            | Self::FetchFailed { key }
            | Self::Provisional { key }
            | Self::Reconciled { key }
            | Self::RolledBack { key }
            | Self::Invalidated { key }
            | Self::Evicted { key } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_staleness_windows() {
        let now = Utc::now();
        let entry = CacheEntry::with_state(json!(1), now - chrono::Duration::seconds(10), false);
        assert_eq!(entry.staleness_at(Duration::from_secs(30), now), Staleness::Fresh);
        assert_eq!(entry.staleness_at(Duration::from_secs(5), now), Staleness::Stale);
        assert_eq!(entry.staleness_at(Duration::ZERO, now), Staleness::Stale);
        assert_eq!(entry.staleness_at(Duration::MAX, now), Staleness::Fresh);
    }

    #[test]
    fn test_invalidated_wins_over_age() {
        let mut entry = CacheEntry::new(json!(["r1"]));
        assert!(entry.invalidate());
        assert!(!entry.invalidate());
        assert_eq!(
            entry.staleness_at(Duration::from_secs(3600), Utc::now()),
            Staleness::Invalidated
        );
    }

    #[test]
    fn test_decode_type_mismatch() {
        let entry = CacheEntry::new(json!({ "not": "a list" }));
        let decoded: Result<Vec<String>, _> = entry.decode();
        assert!(matches!(decoded, Err(CacheError::Serde(_))));
    }

    #[test]
    fn test_read_outcome_helpers() {
        let idle: ReadOutcome<u32> = ReadOutcome::Idle;
        assert!(idle.is_idle());
        assert_eq!(idle.into_value(), None);
        let ready = ReadOutcome::Ready(CacheRead::from_fetch(7u32));
        assert!(!ready.as_read().unwrap().was_cache_hit());
        assert_eq!(ready.into_value(), Some(7));
    }
}
