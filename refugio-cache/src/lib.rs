//! Refugio Cache - Optimistic Cache Coordination
//!
//! Keeps server-owned entities cached on the client, coalesces concurrent
//! reads of the same key, and runs mutations optimistically: snapshot,
//! provisional write, network call, then reconcile or roll back. Successful
//! mutations stale-mark dependent views through a declared table of
//! invalidation edges.

pub mod config;
pub mod coordinator;
pub mod entities;
pub mod entry;
pub mod error;
pub mod gc;
pub mod invalidation;
pub mod mutation;
pub mod queue;

pub use config::CacheConfig;
pub use coordinator::{Observer, OptimisticCacheCoordinator};
pub use entities::renovations::conflicting_renovation;
pub use entities::EntityStore;
pub use entry::{
    CacheEntry, CacheEvent, CacheRead, FetchStatus, QuerySnapshot, QueryStatus, ReadConfig,
    ReadOutcome, Staleness,
};
pub use error::{CacheError, CacheResult};
pub use gc::{gc_task, GcMetrics, GcSnapshot};
pub use invalidation::{EdgeParam, EdgeParams, EdgeTarget, InvalidationTable, Segment};
pub use mutation::Mutation;
pub use queue::{MutationQueue, QueueSlot};
