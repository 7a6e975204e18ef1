//! Ingestion errors and their classification.

use spacemon_derive::errors::{DecodeError, EnrichError, ProviderError};
use spacemon_store::StoreError;
use thiserror::Error;

/// An error raised while ingesting a window of events.
#[derive(Error, Debug)]
pub enum IngestError {
    /// A raw event could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    /// A sector event could not be enriched.
    #[error("Enrich error: {0}")]
    Enrich(#[from] EnrichError),
    /// A chain API call failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    /// The store could not be written.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    /// The event query hit the result cap with a filter range of one epoch.
    #[error("Event query saturated at the minimum filter range")]
    RangeExhausted,
}

impl IngestError {
    /// Wrap [IngestError] as an [IngestErrorKind::Critical].
    pub const fn crit(self) -> IngestErrorKind {
        IngestErrorKind::Critical(self)
    }

    /// Wrap [IngestError] as an [IngestErrorKind::Temporary].
    pub const fn temp(self) -> IngestErrorKind {
        IngestErrorKind::Temporary(self)
    }

    /// Wrap [IngestError] as an [IngestErrorKind::Saturated].
    pub const fn saturated(self) -> IngestErrorKind {
        IngestErrorKind::Saturated(self)
    }

    /// Classifies the error by how ingestion recovers from it.
    pub fn classify(self) -> IngestErrorKind {
        let (saturated, transient) = match &self {
            Self::Provider(err) | Self::Enrich(EnrichError::Provider(err)) => {
                (err.is_saturated(), err.is_transient())
            }
            _ => (false, false),
        };
        if saturated {
            self.saturated()
        } else if transient {
            self.temp()
        } else {
            self.crit()
        }
    }
}

/// A top level filter for [IngestError] that sorts by recovery.
#[derive(Error, Debug)]
pub enum IngestErrorKind {
    /// The event query may be truncated; shrink the window and retry.
    #[error("Saturated: {0}")]
    Saturated(IngestError),
    /// Retry the same window after a pause.
    #[error("Temporary error: {0}")]
    Temporary(IngestError),
    /// Stop ingesting.
    #[error("Critical error: {0}")]
    Critical(IngestError),
}

impl IngestErrorKind {
    /// Returns the wrapped error.
    pub fn into_inner(self) -> IngestError {
        match self {
            Self::Saturated(err) | Self::Temporary(err) | Self::Critical(err) => err,
        }
    }
}

impl From<IngestError> for IngestErrorKind {
    fn from(err: IngestError) -> Self {
        err.classify()
    }
}
