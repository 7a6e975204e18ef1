//! Error types for the partitioned store and the compactor.

use crate::PartitionRange;
use std::{io, path::PathBuf};
use thiserror::Error;

/// An error opening or writing the partitioned store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The raw and event halves of the store disagree. Never repaired automatically.
    #[error("Store consistency error: {0}")]
    Consistency(String),
    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file or directory operated on.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// An event could not be serialized.
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// An error compiling event partitions.
#[derive(Error, Debug)]
pub enum CompileError {
    /// A compiled partition has no event partition at its position.
    #[error("Compiled partition {compiled} has no matching event partition")]
    Mismatch {
        /// The orphaned compiled partition.
        compiled: PartitionRange,
        /// The event partition found at its position, if any.
        event: Option<PartitionRange>,
    },
    /// A stored line could not be parsed.
    #[error("Invalid record in {} line {line}: {source}", path.display())]
    Parse {
        /// The file being read.
        path: PathBuf,
        /// The 1-based line number.
        line: usize,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Listing or accessing the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
