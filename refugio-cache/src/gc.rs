//! Background retention task.
//!
//! Runs [`OptimisticCacheCoordinator::collect_garbage`] every
//! `gc_interval` until shutdown is signalled:
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(gc_task(cache.clone(), shutdown_rx));
//!
//! // Later
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::coordinator::OptimisticCacheCoordinator;

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct GcMetrics {
    /// Collection cycles completed
    pub cycles: AtomicU64,

    /// Entries evicted since the task started
    pub evicted: AtomicU64,
}

impl GcMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> GcSnapshot {
        GcSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcSnapshot {
    pub cycles: u64,
    pub evicted: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Evict expired entries periodically until `shutdown_rx` reads `true` or
/// its sender is dropped. Returns the counters collected meanwhile.
pub async fn gc_task(
    cache: OptimisticCacheCoordinator,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<GcMetrics> {
    let metrics = Arc::new(GcMetrics::new());
    let period = cache.config().gc_interval.max(Duration::from_millis(1));

    let mut gc_interval = interval(period);
    gc_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        gc_interval_ms = period.as_millis() as u64,
        gc_time_secs = cache.config().gc_time.as_secs(),
        "Cache retention task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache retention task shutting down");
                    break;
                }
            }

            _ = gc_interval.tick() => {
                let evicted = cache.collect_garbage();
                metrics.cycles.fetch_add(1, Ordering::Relaxed);
                metrics.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        evicted = snapshot.evicted,
        "Cache retention task completed"
    );

    metrics
}
