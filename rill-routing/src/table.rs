//! Routing table - ordered hash-range endpoints for O(log n) lookup.
//!
//! The table holds one entry per disjoint hash range, sorted ascending by
//! the range's inclusive end. A hash value routes to the first entry whose
//! end is at or above it.

use rill_core::PartitionId;

/// One disjoint hash range in the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingEntry {
    /// Inclusive upper end of the hash range.
    pub end: u128,
    /// The partition that owns the range.
    pub id: PartitionId,
}

/// Ordered sequence of disjoint hash ranges built by reconciliation.
///
/// Entries are strictly increasing by `end`; each entry owns the hash values
/// from the previous entry's end (exclusive) through its own end (inclusive).
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    /// Entries sorted ascending by `end`.
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    /// Wraps a list of entries already sorted strictly ascending by `end`.
    pub(crate) fn from_sorted(entries: Vec<RoutingEntry>) -> Self {
        debug_assert!(
            entries.windows(2).all(|pair| pair[0].end < pair[1].end),
            "routing entries must be strictly ascending by end"
        );
        Self { entries }
    }

    /// Returns the partition owning the given hash value.
    ///
    /// Finds the first entry whose end is >= the hash; returns `None` if the
    /// hash lies beyond every entry (the table does not cover it).
    #[must_use]
    pub fn lookup(&self, hash: u128) -> Option<PartitionId> {
        let index = self.entries.partition_point(|entry| entry.end < hash);
        self.entries.get(index).map(|entry| entry.id)
    }

    /// Returns the table's entries, ascending by range end.
    #[must_use]
    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    /// Returns the number of disjoint ranges in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table holds no ranges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
