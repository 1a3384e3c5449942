//! Coordinator configuration.

use refugio_client::CacheSettings;
use std::time::Duration;

/// Configuration for the cache coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Age after which a cached entry is refetched on the next read.
    pub stale_time: Duration,
    /// How long an unobserved entry survives before eviction.
    pub gc_time: Duration,
    /// How often the retention sweeper runs.
    pub gc_interval: Duration,
    /// Buffer size of the change notification channel.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(30),
            gc_time: Duration::from_secs(300),
            gc_interval: Duration::from_secs(60),
            event_capacity: 256,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    pub fn with_gc_interval(mut self, gc_interval: Duration) -> Self {
        self.gc_interval = gc_interval;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            stale_time: settings.stale_time(),
            gc_time: settings.gc_time(),
            gc_interval: settings.gc_interval(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = CacheSettings {
            stale_time_ms: 1_000,
            gc_time_ms: 5_000,
            gc_interval_ms: 500,
        };
        let config = CacheConfig::from(&settings);
        assert_eq!(config.stale_time, Duration::from_secs(1));
        assert_eq!(config.gc_time, Duration::from_secs(5));
        assert_eq!(config.gc_interval, Duration::from_millis(500));
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_event_capacity_is_never_zero() {
        let config = CacheConfig::new().with_event_capacity(0);
        assert_eq!(config.event_capacity, 1);
    }
}
