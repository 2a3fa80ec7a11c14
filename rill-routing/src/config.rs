//! Shard map configuration.

use std::time::Duration;

/// Default minimum retry backoff in milliseconds (1 second).
pub const UPDATE_BACKOFF_MIN_MS_DEFAULT: u64 = 1_000;

/// Default maximum retry backoff in milliseconds (30 seconds).
pub const UPDATE_BACKOFF_MAX_MS_DEFAULT: u64 = 30_000;

/// Default grace window for closed-partition cache entries (60 seconds).
pub const CLOSED_PARTITION_TTL_MS_DEFAULT: u64 = 60_000;

/// Configuration for a [`crate::ShardMap`].
#[derive(Debug, Clone)]
pub struct ShardMapConfig {
    /// Name of the stream whose partitions are mapped.
    pub stream_name: String,
    /// Optional ARN qualifying the stream name.
    pub stream_arn: Option<String>,
    /// Backoff after the first failed fetch.
    pub min_backoff: Duration,
    /// Backoff ceiling for repeated failures.
    pub max_backoff: Duration,
    /// How long closed partitions stay resolvable in the cache.
    pub closed_partition_ttl: Duration,
}

impl ShardMapConfig {
    /// Creates a configuration with default timings for the given stream.
    #[must_use]
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            stream_arn: None,
            min_backoff: Duration::from_millis(UPDATE_BACKOFF_MIN_MS_DEFAULT),
            max_backoff: Duration::from_millis(UPDATE_BACKOFF_MAX_MS_DEFAULT),
            closed_partition_ttl: Duration::from_millis(CLOSED_PARTITION_TTL_MS_DEFAULT),
        }
    }

    /// Sets the stream ARN.
    #[must_use]
    pub fn with_stream_arn(mut self, arn: impl Into<String>) -> Self {
        self.stream_arn = Some(arn.into());
        self
    }

    /// Sets the minimum retry backoff.
    #[must_use]
    pub const fn with_min_backoff(mut self, backoff: Duration) -> Self {
        self.min_backoff = backoff;
        self
    }

    /// Sets the maximum retry backoff.
    #[must_use]
    pub const fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Sets the closed-partition grace window.
    #[must_use]
    pub const fn with_closed_partition_ttl(mut self, ttl: Duration) -> Self {
        self.closed_partition_ttl = ttl;
        self
    }

    /// Creates a configuration with short timings for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self::new("test-stream")
            .with_min_backoff(Duration::from_millis(10))
            .with_max_backoff(Duration::from_millis(100))
            .with_closed_partition_ttl(Duration::from_millis(200))
    }
}
