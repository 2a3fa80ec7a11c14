//! Range reconciliation - minimal disjoint cover of overlapping partitions.
//!
//! During a repartition the directory briefly reports parent and child
//! partitions whose hash ranges overlap. Reconciliation sweeps the reported
//! ranges from the top of the hash space down, awarding each contested
//! segment to the range that reaches furthest right, so a record never
//! routes to a child whose range is a strict subset of a still-valid parent.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use rill_core::{PartitionDescriptor, PartitionId};

use crate::table::{RoutingEntry, RoutingTable};

/// A partition's claim on a hash range, ordered for the sweep.
///
/// The heap pops the claim with the greatest `end` first; ties go to the
/// greater `start` (the narrower claim), then to the greater id (the
/// directory allocates ids in creation order, so children of a split
/// outrank their parent when the ranges are identical).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    start: u128,
    end: u128,
    id: PartitionId,
}

impl Ord for Claim {
    fn cmp(&self, other: &Self) -> Ordering {
        self.end
            .cmp(&other.end)
            .then(self.start.cmp(&other.start))
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Claim {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of reconciling one complete directory fetch.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    /// Minimal disjoint cover of the fetched ranges.
    pub table: RoutingTable,
    /// Ids of partitions still accepting records.
    pub open: HashSet<PartitionId>,
}

/// Builds the minimal disjoint cover of a fetched descriptor set.
///
/// Sweeps by right endpoint, highest first: an uncontested upper segment is
/// emitted as a routing entry and the frontier drops to that claim's start;
/// a claim overlapping territory already awarded is truncated to just below
/// the frontier and re-queued, or discarded when fully subsumed. A re-queued
/// claim re-enters the sweep below everything already awarded, so the heap
/// only ever shrinks relative to the remaining territory and the sweep is
/// O(n log n) for realistic repartition snapshots.
#[must_use]
pub fn reconcile(descriptors: &[PartitionDescriptor]) -> Reconciled {
    let mut heap: BinaryHeap<Claim> = descriptors
        .iter()
        .map(|descriptor| Claim {
            start: descriptor.hash_range.start,
            end: descriptor.hash_range.end,
            id: descriptor.id,
        })
        .collect();

    let mut emitted: Vec<RoutingEntry> = Vec::with_capacity(heap.len());
    // Lowest hash value not yet awarded; None means unbounded above.
    let mut frontier: Option<u128> = None;

    while let Some(claim) = heap.pop() {
        match frontier {
            Some(taken) if claim.end >= taken => {
                if claim.start < taken {
                    // The claim's upper portion is already awarded; it may
                    // still own the territory below the frontier.
                    heap.push(Claim {
                        end: taken - 1,
                        ..claim
                    });
                }
            }
            _ => {
                emitted.push(RoutingEntry {
                    end: claim.end,
                    id: claim.id,
                });
                if claim.start == 0 {
                    // The cover reaches the bottom of the hash space;
                    // everything still queued is subsumed.
                    break;
                }
                frontier = Some(claim.start);
            }
        }
    }

    // The sweep emitted from the top of the hash space down.
    emitted.reverse();

    let open = descriptors
        .iter()
        .filter(|descriptor| !descriptor.is_closed())
        .map(|descriptor| descriptor.id)
        .collect();

    Reconciled {
        table: RoutingTable::from_sorted(emitted),
        open,
    }
}

#[cfg(test)]
mod tests {
    use rill_core::{HashRange, SequenceNumberRange};

    use super::*;

    fn open_partition(id: u64, start: u128, end: u128) -> PartitionDescriptor {
        PartitionDescriptor::new(
            PartitionId::new(id),
            HashRange::new(start, end),
            SequenceNumberRange::open("0"),
        )
    }

    fn closed_partition(id: u64, start: u128, end: u128) -> PartitionDescriptor {
        PartitionDescriptor::new(
            PartitionId::new(id),
            HashRange::new(start, end),
            SequenceNumberRange::closed("0", "99"),
        )
    }

    fn ends(reconciled: &Reconciled) -> Vec<(u128, u64)> {
        reconciled
            .table
            .entries()
            .iter()
            .map(|entry| (entry.end, entry.id.get()))
            .collect()
    }

    #[test]
    fn test_split_parent_yields_to_children() {
        // Parent [0,9] split into [0,4] and [5,9]; children get higher ids.
        let descriptors = vec![
            open_partition(1, 0, 9),
            open_partition(2, 0, 4),
            open_partition(3, 5, 9),
        ];
        let reconciled = reconcile(&descriptors);
        assert_eq!(ends(&reconciled), vec![(4, 2), (9, 3)]);
    }

    #[test]
    fn test_narrower_range_wins_on_equal_end() {
        let descriptors = vec![open_partition(1, 0, 5), open_partition(2, 3, 5)];
        let reconciled = reconcile(&descriptors);
        // [3,5] takes the top; [0,5] is truncated to [0,2].
        assert_eq!(ends(&reconciled), vec![(2, 1), (5, 2)]);
    }

    #[test]
    fn test_subsumed_range_is_discarded() {
        let descriptors = vec![open_partition(1, 0, 9), open_partition(2, 2, 6)];
        let reconciled = reconcile(&descriptors);
        assert_eq!(ends(&reconciled), vec![(9, 1)]);
    }

    #[test]
    fn test_identical_ranges_prefer_younger_id() {
        let descriptors = vec![open_partition(1, 0, 9), open_partition(2, 0, 9)];
        let reconciled = reconcile(&descriptors);
        assert_eq!(ends(&reconciled), vec![(9, 2)]);
    }

    #[test]
    fn test_disjoint_input_passes_through() {
        let descriptors = vec![
            open_partition(1, 0, 4),
            open_partition(2, 5, 9),
            open_partition(3, 10, 20),
        ];
        let reconciled = reconcile(&descriptors);
        assert_eq!(ends(&reconciled), vec![(4, 1), (9, 2), (20, 3)]);
    }

    #[test]
    fn test_empty_input_yields_empty_cover() {
        let reconciled = reconcile(&[]);
        assert!(reconciled.table.is_empty());
        assert!(reconciled.open.is_empty());
    }

    #[test]
    fn test_merge_overlap_resolves_to_rightmost_reach() {
        // Merge in progress: parents [0,4] and [5,9] plus child [0,9].
        // The child reaches furthest right and owns the whole space.
        let descriptors = vec![
            open_partition(1, 0, 4),
            open_partition(2, 5, 9),
            open_partition(3, 0, 9),
        ];
        let reconciled = reconcile(&descriptors);
        assert_eq!(ends(&reconciled), vec![(9, 3)]);
    }

    #[test]
    fn test_cover_is_sorted_disjoint_and_complete() {
        // A repartition snapshot over the full space with overlaps.
        let quarter = u128::MAX / 4;
        let descriptors = vec![
            open_partition(1, 0, quarter),
            open_partition(2, quarter + 1, u128::MAX),
            open_partition(3, quarter + 1, 2 * quarter),
            open_partition(4, 2 * quarter + 1, u128::MAX),
        ];
        let reconciled = reconcile(&descriptors);
        let entries = reconciled.table.entries();

        // Strictly ascending ends.
        assert!(entries.windows(2).all(|pair| pair[0].end < pair[1].end));

        // Every hash covered by some input resolves to exactly one entry.
        for hash in [0, quarter, quarter + 1, 2 * quarter, 2 * quarter + 1, u128::MAX] {
            assert!(
                reconciled.table.lookup(hash).is_some(),
                "hash {hash} must be covered"
            );
        }
    }

    #[test]
    fn test_open_set_excludes_closing_descriptors() {
        let descriptors = vec![
            closed_partition(1, 0, 9),
            open_partition(2, 0, 4),
            open_partition(3, 5, 9),
        ];
        let reconciled = reconcile(&descriptors);

        assert!(!reconciled.open.contains(&PartitionId::new(1)));
        assert!(reconciled.open.contains(&PartitionId::new(2)));
        assert!(reconciled.open.contains(&PartitionId::new(3)));
    }

    #[test]
    fn test_truncated_claim_competes_again() {
        // [0,9] loses its top to [6,9], then its middle to [3,5]: the
        // re-queued remainder competes again and keeps [0,2].
        let descriptors = vec![
            open_partition(1, 0, 9),
            open_partition(2, 3, 5),
            open_partition(3, 6, 9),
        ];
        let reconciled = reconcile(&descriptors);
        assert_eq!(ends(&reconciled), vec![(2, 1), (5, 2), (9, 3)]);
    }
}
