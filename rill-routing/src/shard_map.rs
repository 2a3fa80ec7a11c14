//! Shard map - live routing state for a partitioned stream.
//!
//! The shard map owns the fetch-and-rebuild state machine. An update runs a
//! paginated listing against the directory service, reconciles the fetched
//! ranges into a minimal disjoint cover, and publishes the new routing table
//! and partition cache. Failures schedule a retry with growing backoff;
//! callers keep reading whatever was last published. At most one fetch
//! sequence is in flight at a time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use xxhash_rust::xxh3::xxh3_128;

use rill_core::{PartitionDescriptor, PartitionId};

use crate::backoff::Backoff;
use crate::cache::PartitionCache;
use crate::config::ShardMapConfig;
use crate::directory::{DirectoryClient, DirectoryError, ListPartitionsRequest};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::reconcile::reconcile;
use crate::table::RoutingTable;

// -----------------------------------------------------------------------------
// State machine
// -----------------------------------------------------------------------------

/// Lifecycle state of the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    /// No usable table yet, or the last fetch failed and a retry is pending.
    Invalid,
    /// A fetch sequence is in flight.
    Updating,
    /// The table and cache reflect the most recent successful fetch.
    Ready,
}

/// Routing state guarded by one lock: the state machine, the table, and the
/// completion time of the last successful rebuild.
#[derive(Debug)]
struct RouterState {
    state: MapState,
    table: RoutingTable,
    updated_at: Instant,
}

// -----------------------------------------------------------------------------
// ShardMap
// -----------------------------------------------------------------------------

/// State shared between the public handle and its background tasks.
struct Shared {
    config: ShardMapConfig,
    client: Arc<dyn DirectoryClient>,
    metrics: Arc<dyn MetricsSink>,
    /// State machine, routing table, and last-update time.
    router: RwLock<RouterState>,
    /// Partition metadata, open-id set, and the cleanup flag.
    cache: RwLock<PartitionCache>,
    /// Retry delay state; locked only for non-async bookkeeping.
    backoff: Mutex<Backoff>,
    /// The pending scheduled retry, if any.
    retry: Mutex<Option<JoinHandle<()>>>,
}

/// Live mapping from 128-bit hash keys to stream partitions.
///
/// Construction spawns the cache reaper and triggers the initial directory
/// fetch; lookups work against whatever has been published so far. The map
/// degrades to returning `None` rather than blocking or failing: a caller
/// with no routing answer falls back to its unrouted path.
pub struct ShardMap {
    shared: Arc<Shared>,
    reaper: Option<JoinHandle<()>>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ShardMap {
    /// Creates a shard map with the no-op metrics sink.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, or if the configured
    /// closed-partition TTL is zero.
    #[must_use]
    pub fn new(client: Arc<dyn DirectoryClient>, config: ShardMapConfig) -> Self {
        Self::with_metrics(client, Arc::new(NoopMetrics), config)
    }

    /// Creates a shard map reporting to the given metrics sink.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, or if the configured
    /// closed-partition TTL is zero.
    #[must_use]
    pub fn with_metrics(
        client: Arc<dyn DirectoryClient>,
        metrics: Arc<dyn MetricsSink>,
        config: ShardMapConfig,
    ) -> Self {
        assert!(
            !config.closed_partition_ttl.is_zero(),
            "closed partition TTL must be non-zero"
        );

        let backoff = Backoff::new(config.min_backoff, config.max_backoff);
        let shared = Arc::new(Shared {
            config,
            client,
            metrics,
            router: RwLock::new(RouterState {
                state: MapState::Invalid,
                table: RoutingTable::default(),
                updated_at: Instant::now(),
            }),
            cache: RwLock::new(PartitionCache::new()),
            backoff: Mutex::new(backoff),
            retry: Mutex::new(None),
        });

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let reaper = tokio::spawn(reap_task(Arc::clone(&shared), shutdown_rx));

        spawn_update(&shared);

        Self {
            shared,
            reaper: Some(reaper),
            shutdown_tx,
        }
    }

    /// Returns the partition currently responsible for a hash key.
    ///
    /// Non-blocking: this sits on the record-emission hot path, so it tries
    /// the routing lock without waiting and returns `None` on contention or
    /// while no table is ready. A hash beyond every table entry means the
    /// table fails to cover the space; that is logged and reported as a
    /// miss, never a panic.
    #[must_use]
    pub fn shard_id(&self, hash: u128) -> Option<PartitionId> {
        let Ok(router) = self.shared.router.try_read() else {
            return None;
        };
        if router.state != MapState::Ready {
            return None;
        }

        let id = router.table.lookup(hash);
        if id.is_none() {
            error!(
                stream = %self.shared.config.stream_name,
                hash = %hash,
                "Hash key not covered by any partition range"
            );
            self.shared.metrics.lookup_uncovered();
        }
        id
    }

    /// Returns the cached descriptor for a partition, regardless of map
    /// state. Closed partitions remain resolvable for the configured grace
    /// window.
    pub async fn get_shard(&self, id: PartitionId) -> Option<PartitionDescriptor> {
        self.shared.cache.read().await.get(id).cloned()
    }

    /// Reports that a record was routed to a partition other than the one
    /// this map predicted.
    ///
    /// Triggers a rebuild only when the observation is newer than the last
    /// successful rebuild, the map is `Ready`, and the predicted partition
    /// (when given) is still believed open - a misprediction against a
    /// partition already known closed carries no new information.
    pub async fn invalidate(&self, seen_at: Instant, predicted: Option<PartitionId>) {
        let gap = {
            let router = self.shared.router.write().await;
            if router.state != MapState::Ready || seen_at <= router.updated_at {
                return;
            }
            seen_at.duration_since(router.updated_at)
        };

        if let Some(id) = predicted {
            if !self.shared.cache.read().await.is_open(id) {
                debug!(
                    stream = %self.shared.config.stream_name,
                    partition = %id,
                    "Ignoring invalidation against a closed partition"
                );
                return;
            }
        }

        info!(
            stream = %self.shared.config.stream_name,
            gap = ?gap,
            predicted = ?predicted,
            "Partition map invalidated by misrouted record"
        );
        spawn_update(&self.shared);
    }

    /// Triggers a rebuild of the routing table.
    ///
    /// Returns immediately; the fetch runs in the background. A rebuild
    /// already in flight absorbs the request.
    pub fn update(&self) {
        spawn_update(&self.shared);
    }

    /// Returns the current state of the map.
    pub async fn state(&self) -> MapState {
        self.shared.router.read().await.state
    }

    /// Hashes a raw partition key into the 128-bit hash space.
    #[must_use]
    pub fn hash_partition_key(key: &[u8]) -> u128 {
        xxh3_128(key)
    }

    /// Stops the reaper and cancels any pending retry.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(reaper) = self.reaper.take() {
            let _ = reaper.await;
        }
        cancel_retry(&self.shared);
    }
}

impl Drop for ShardMap {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            reaper.abort();
        }
        cancel_retry(&self.shared);
    }
}

// -----------------------------------------------------------------------------
// Update pipeline
// -----------------------------------------------------------------------------

/// Spawns the fetch pipeline; a pipeline already in flight wins.
fn spawn_update(shared: &Arc<Shared>) {
    let this = Arc::clone(shared);
    tokio::spawn(run_update(this));
}

/// Runs one complete fetch sequence: claim the update, page through the
/// directory listing, reconcile, publish.
async fn run_update(shared: Arc<Shared>) {
    {
        let mut router = shared.router.write().await;
        if router.state == MapState::Updating {
            debug!(
                stream = %shared.config.stream_name,
                "Partition map update already in flight"
            );
            return;
        }
        router.state = MapState::Updating;
    }
    cancel_retry(&shared);

    info!(stream = %shared.config.stream_name, "Updating partition map");
    let started = Instant::now();

    // Fresh accumulation buffer per attempt; a failed page discards the
    // whole fetch.
    let mut fetched: Vec<PartitionDescriptor> = Vec::new();
    let mut request = ListPartitionsRequest::open_partitions(
        &shared.config.stream_name,
        shared.config.stream_arn.as_deref(),
    );

    loop {
        match shared.client.list_partitions(&request).await {
            Ok(page) => {
                fetched.extend(page.descriptors);
                shared
                    .backoff
                    .lock()
                    .expect("backoff lock poisoned")
                    .on_success();
                match page.next_token {
                    Some(token) => request = ListPartitionsRequest::next_page(&token),
                    None => break,
                }
            }
            Err(err) => {
                update_fail(&shared, &err).await;
                return;
            }
        }
    }

    publish(&shared, fetched, started).await;
}

/// Publishes a completed fetch: reconcile, merge the cache, swap the table,
/// mark `Ready`. Write locks are held only for the swaps.
async fn publish(shared: &Shared, fetched: Vec<PartitionDescriptor>, started: Instant) {
    let reconciled = reconcile(&fetched);
    let partitions = reconciled.table.len();
    let now = Instant::now();

    {
        let mut cache = shared.cache.write().await;
        cache.absorb(fetched, &reconciled.open, now);
    }
    {
        let mut router = shared.router.write().await;
        router.table = reconciled.table;
        router.state = MapState::Ready;
        router.updated_at = now;
    }

    shared.metrics.map_updated(partitions, started.elapsed());
    info!(
        stream = %shared.config.stream_name,
        partitions,
        "Partition map updated"
    );
}

/// Records a failed fetch: mark the map invalid, schedule the retry, grow
/// the backoff.
async fn update_fail(shared: &Arc<Shared>, err: &DirectoryError) {
    let delay = shared
        .backoff
        .lock()
        .expect("backoff lock poisoned")
        .on_failure();

    error!(
        stream = %shared.config.stream_name,
        code = err.code(),
        error = %err,
        retry_in = ?delay,
        "Partition map update failed"
    );
    shared.metrics.map_update_failed(err.code());

    {
        let mut router = shared.router.write().await;
        router.state = MapState::Invalid;
    }
    schedule_retry(shared, delay);
}

/// Schedules a retry after `delay`, replacing any retry already pending.
fn schedule_retry(shared: &Arc<Shared>, delay: Duration) {
    let mut slot = shared.retry.lock().expect("retry lock poisoned");
    if let Some(pending) = slot.take() {
        pending.abort();
    }

    let this = Arc::clone(shared);
    *slot = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // This task is the pending retry; clear the slot before running so
        // the update does not cancel itself.
        let _ = this.retry.lock().expect("retry lock poisoned").take();
        run_update(this).await;
    }));
}

/// Aborts the pending retry, if any.
fn cancel_retry(shared: &Shared) {
    if let Some(pending) = shared.retry.lock().expect("retry lock poisoned").take() {
        pending.abort();
    }
}

// -----------------------------------------------------------------------------
// Reaper
// -----------------------------------------------------------------------------

/// Background loop removing closed partitions once their grace window ends.
async fn reap_task(shared: Arc<Shared>, mut shutdown_rx: mpsc::Receiver<()>) {
    let ttl = shared.config.closed_partition_ttl;
    let mut tick = tokio::time::interval(ttl / 2);
    // A late sweep must not trigger a burst of catch-up ticks.
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!(
                    stream = %shared.config.stream_name,
                    "Partition cache reaper shutting down"
                );
                break;
            }
            _ = tick.tick() => {
                reap_once(&shared, ttl).await;
            }
        }
    }
}

/// One reaper wake-up.
///
/// Sweeps only when the map is `Ready`, the last successful rebuild is at
/// least `ttl` old, and something was tombstoned since the last sweep. The
/// staleness gate guarantees every tombstone is ripe when the sweep runs, so
/// clearing the flag afterwards orphans nothing; the flag gate keeps idle
/// wake-ups down to a read-locked check.
async fn reap_once(shared: &Shared, ttl: Duration) {
    let stale = {
        let router = shared.router.read().await;
        router.state == MapState::Ready && router.updated_at.elapsed() >= ttl
    };
    if !stale {
        return;
    }
    if !shared.cache.read().await.needs_cleanup() {
        return;
    }

    let removed = shared.cache.write().await.reap(Instant::now(), ttl);
    if removed > 0 {
        shared.metrics.partitions_reaped(removed);
        info!(
            stream = %shared.config.stream_name,
            removed,
            "Reaped closed partitions from the cache"
        );
    }
}
