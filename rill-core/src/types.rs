//! Partition identifiers, hash-key ranges, and partition descriptors.
//!
//! The directory service names partitions with a fixed-width string form
//! (`shardId-000000000042`); internally Rill works with the numeric suffix
//! only and renders the wire form back on demand.

use std::fmt;

/// Wire prefix the directory service uses for partition identifiers.
const PARTITION_ID_PREFIX: &str = "shardId";

/// Number of decimal digits in the zero-padded wire suffix.
const PARTITION_ID_DIGITS: usize = 12;

// -----------------------------------------------------------------------------
// PartitionId
// -----------------------------------------------------------------------------

/// Unique identifier for a stream partition.
///
/// Wraps the numeric suffix of the directory service's partition identifier
/// string. Ordering follows the directory service's allocation order: a
/// partition created later (for example a child of a split) always compares
/// greater than one created earlier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PartitionId(u64);

impl PartitionId {
    /// Creates a partition id from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parses a partition id from the directory service's wire form.
    ///
    /// The wire form is `<prefix>-<suffix>` where the suffix is a decimal
    /// number; the prefix itself is not interpreted. Leading zeros in the
    /// suffix are accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ParsePartitionIdError`] if the separator is missing or the
    /// suffix is not a valid decimal number.
    pub fn parse_wire(wire: &str) -> Result<Self, ParsePartitionIdError> {
        let (_, suffix) = wire
            .split_once('-')
            .ok_or_else(|| ParsePartitionIdError::MissingSeparator {
                input: wire.to_string(),
            })?;
        let value = suffix
            .parse::<u64>()
            .map_err(|_| ParsePartitionIdError::InvalidSuffix {
                input: wire.to_string(),
            })?;
        Ok(Self(value))
    }

    /// Renders the canonical wire form: `shardId-` plus the zero-padded
    /// 12-digit decimal suffix.
    #[must_use]
    pub fn to_wire(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PARTITION_ID_PREFIX}-{:0width$}",
            self.0,
            width = PARTITION_ID_DIGITS
        )
    }
}

impl From<u64> for PartitionId {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<PartitionId> for u64 {
    fn from(id: PartitionId) -> Self {
        id.get()
    }
}

/// Errors from parsing a wire-form partition identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsePartitionIdError {
    /// The identifier has no `-` separator.
    MissingSeparator {
        /// The rejected input.
        input: String,
    },
    /// The suffix after the separator is not a decimal u64.
    InvalidSuffix {
        /// The rejected input.
        input: String,
    },
}

impl fmt::Display for ParsePartitionIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator { input } => {
                write!(f, "partition id has no separator: {input:?}")
            }
            Self::InvalidSuffix { input } => {
                write!(f, "partition id suffix is not a decimal number: {input:?}")
            }
        }
    }
}

impl std::error::Error for ParsePartitionIdError {}

// -----------------------------------------------------------------------------
// HashRange
// -----------------------------------------------------------------------------

/// Inclusive range of 128-bit partition-hash values owned by a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashRange {
    /// Start of the range (inclusive).
    pub start: u128,
    /// End of the range (inclusive).
    pub end: u128,
}

impl HashRange {
    /// Creates a new hash range.
    ///
    /// # Panics
    ///
    /// Panics if start > end.
    #[must_use]
    pub fn new(start: u128, end: u128) -> Self {
        assert!(start <= end, "hash range start must be <= end");
        Self { start, end }
    }

    /// Returns true if this range contains the given hash value.
    #[must_use]
    pub const fn contains(&self, hash: u128) -> bool {
        hash >= self.start && hash <= self.end
    }
}

impl fmt::Display for HashRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

// -----------------------------------------------------------------------------
// SequenceNumberRange
// -----------------------------------------------------------------------------

/// The sequence-number range a partition covers.
///
/// Sequence numbers exceed 64 bits and are opaque to the routing layer, so
/// they are carried as strings. A present `end` means the partition has been
/// closed by a repartition and accepts no new records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequenceNumberRange {
    /// First sequence number in the partition.
    pub start: String,
    /// Final sequence number, present only once the partition is closed.
    pub end: Option<String>,
}

impl SequenceNumberRange {
    /// Creates the range of a partition that is still accepting records.
    #[must_use]
    pub fn open(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: None,
        }
    }

    /// Creates the range of a partition closed by a repartition.
    #[must_use]
    pub fn closed(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: Some(end.into()),
        }
    }

    /// Returns true if the partition has stopped accepting records.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.end.is_some()
    }
}

// -----------------------------------------------------------------------------
// PartitionDescriptor
// -----------------------------------------------------------------------------

/// Metadata the directory service reports for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDescriptor {
    /// The partition's identifier.
    pub id: PartitionId,
    /// The hash-key range the partition owns.
    pub hash_range: HashRange,
    /// The sequence-number range the partition covers.
    pub sequence_range: SequenceNumberRange,
}

impl PartitionDescriptor {
    /// Creates a new partition descriptor.
    #[must_use]
    pub const fn new(
        id: PartitionId,
        hash_range: HashRange,
        sequence_range: SequenceNumberRange,
    ) -> Self {
        Self {
            id,
            hash_range,
            sequence_range,
        }
    }

    /// Returns true if the partition no longer accepts new records.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.sequence_range.is_closed()
    }
}
