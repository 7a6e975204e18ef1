//! Epoch-quantized partitions.

use core::fmt;
use std::{path::PathBuf, time::SystemTime};

/// The number of epochs per partition: one day of chain time.
pub const EPOCH_QUANTUM: u64 = 2880;

/// The inclusive epoch range `[q·Q, (q+1)·Q − 1]` covered by one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionRange {
    /// The first epoch of the partition.
    pub start: u64,
    /// The last epoch of the partition.
    pub end: u64,
}

impl PartitionRange {
    /// Returns the partition the given epoch falls into.
    pub const fn containing(height: u64) -> Self {
        let start = height / EPOCH_QUANTUM * EPOCH_QUANTUM;
        Self { start, end: start + EPOCH_QUANTUM - 1 }
    }

    /// Returns the file name of the partition, `<start>-<end>.json`.
    pub fn file_name(&self) -> String {
        format!("{self}.json")
    }

    /// Parses a partition file name. Only names produced by [Self::file_name] are accepted.
    pub fn parse(name: &str) -> Option<Self> {
        let (start, end) = name.strip_suffix(".json")?.split_once('-')?;
        let range = Self { start: start.parse().ok()?, end: end.parse().ok()? };
        (range == Self::containing(range.start)).then_some(range)
    }

    /// Returns `true` if the epoch falls into this partition.
    pub const fn contains(&self, height: u64) -> bool {
        self.start <= height && height <= self.end
    }
}

impl fmt::Display for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A partition file found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFile {
    /// The epoch range the file covers.
    pub range: PartitionRange,
    /// The path of the file.
    pub path: PathBuf,
    /// The last modification time of the file.
    pub modified: SystemTime,
}
