//! The outcome of one ingestion step.

use crate::IngestError;

/// The result of [Ingestor::step].
///
/// [Ingestor::step]: crate::Ingestor::step
#[derive(Debug)]
pub enum StepOutcome {
    /// A window was ingested and the cursor advanced past it.
    Advanced {
        /// The first epoch of the window.
        from: u64,
        /// The last epoch of the window.
        to: u64,
        /// The number of events saved from the window.
        saved: usize,
    },
    /// No final epochs remain to ingest.
    Idle {
        /// The chain head height.
        head: u64,
    },
    /// The event query hit the result cap; the filter range was halved.
    Shrunk {
        /// The new filter range.
        filter_range: u64,
    },
    /// A transient failure; the same window is retried.
    Retrying(IngestError),
}

impl StepOutcome {
    /// Returns `true` if the loop should pause before the next step.
    pub const fn should_pause(&self) -> bool {
        matches!(self, Self::Idle { .. } | Self::Retrying(_))
    }
}
