//! Partition metadata cache with delayed eviction.
//!
//! Entries for partitions closed by a repartition are tombstoned rather than
//! removed, so in-flight lookups referencing a just-closed partition still
//! resolve during a grace window. The reaper sweeps ripe tombstones later.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use rill_core::{PartitionDescriptor, PartitionId};

/// A cached descriptor plus its eviction deadline.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The descriptor as last observed open.
    descriptor: PartitionDescriptor,
    /// When the partition stopped being observed open; `None` while live.
    delete_at: Option<Instant>,
}

/// Mapping from partition id to cached metadata.
///
/// Mutated by the rebuild pipeline after each successful directory fetch and
/// read by lookup callers; callers guard it with the orchestrator's lock.
#[derive(Debug, Default)]
pub struct PartitionCache {
    /// All cached entries, live and tombstoned.
    entries: HashMap<PartitionId, CacheEntry>,
    /// Ids observed open in the most recent successful fetch.
    open: HashSet<PartitionId>,
    /// Set when any entry was tombstoned since the last sweep.
    needs_cleanup: bool,
}

impl PartitionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached descriptor for a partition, live or tombstoned.
    #[must_use]
    pub fn get(&self, id: PartitionId) -> Option<&PartitionDescriptor> {
        self.entries.get(&id).map(|entry| &entry.descriptor)
    }

    /// Returns true if the partition was open in the latest fetch.
    #[must_use]
    pub fn is_open(&self, id: PartitionId) -> bool {
        self.open.contains(&id)
    }

    /// Returns the ids observed open in the latest fetch.
    #[must_use]
    pub const fn open_ids(&self) -> &HashSet<PartitionId> {
        &self.open
    }

    /// Returns true if a tombstone is awaiting the reaper.
    #[must_use]
    pub const fn needs_cleanup(&self) -> bool {
        self.needs_cleanup
    }

    /// Returns the number of cached entries, including tombstoned ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges one complete fetch into the cache.
    ///
    /// Descriptors in the open set are inserted, or revived if previously
    /// tombstoned; an entry already present and still open keeps its
    /// descriptor. Everything else - fetched descriptors already carrying a
    /// closing sequence number, and previously cached entries absent from
    /// the open set - is tombstoned at `now`. A tombstoned entry keeps its
    /// original deadline.
    pub fn absorb(
        &mut self,
        descriptors: Vec<PartitionDescriptor>,
        open: &HashSet<PartitionId>,
        now: Instant,
    ) {
        for descriptor in descriptors {
            let id = descriptor.id;
            match self.entries.entry(id) {
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    if open.contains(&id) {
                        slot.get_mut().delete_at = None;
                    }
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(CacheEntry {
                        descriptor,
                        delete_at: None,
                    });
                }
            }
        }

        for (id, entry) in &mut self.entries {
            if !open.contains(id) && entry.delete_at.is_none() {
                entry.delete_at = Some(now);
                self.needs_cleanup = true;
            }
        }

        self.open.clone_from(open);
    }

    /// Removes every entry whose tombstone is at least `ttl` old.
    ///
    /// Clears the cleanup flag and returns the number of entries removed.
    pub fn reap(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry
                .delete_at
                .map_or(true, |deadline| now.duration_since(deadline) < ttl)
        });
        self.needs_cleanup = false;
        before - self.entries.len()
    }
}
