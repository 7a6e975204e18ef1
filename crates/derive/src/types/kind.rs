//! The builtin actor event types.

use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The `$type` of a builtin actor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Verifier datacap balance changed.
    VerifierBalance,
    /// A verified allocation was made.
    Allocation,
    /// A verified allocation expired or was removed.
    AllocationRemoved,
    /// An allocation was claimed by a provider.
    Claim,
    /// A claim's term was extended.
    ClaimUpdated,
    /// A claim was removed.
    ClaimRemoved,
    /// A market deal was published.
    DealPublished,
    /// A market deal was activated.
    DealActivated,
    /// A market deal was terminated.
    DealTerminated,
    /// A market deal completed its term.
    DealCompleted,
    /// A sector was pre-committed.
    SectorPrecommitted,
    /// A sector was proven and activated.
    SectorActivated,
    /// A sector's data was replaced by a replica update.
    SectorUpdated,
    /// A sector was terminated.
    SectorTerminated,
}

/// The `$type` string does not name a builtin event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown builtin actor event type: {0}")]
pub struct UnknownEventKind(pub String);

impl EventKind {
    /// Every builtin event type, in the order they are requested from the node.
    pub const ALL: [Self; 14] = [
        Self::VerifierBalance,
        Self::Allocation,
        Self::AllocationRemoved,
        Self::Claim,
        Self::ClaimUpdated,
        Self::ClaimRemoved,
        Self::DealPublished,
        Self::DealActivated,
        Self::DealTerminated,
        Self::DealCompleted,
        Self::SectorPrecommitted,
        Self::SectorActivated,
        Self::SectorUpdated,
        Self::SectorTerminated,
    ];

    /// Returns the `$type` string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VerifierBalance => "verifier-balance",
            Self::Allocation => "allocation",
            Self::AllocationRemoved => "allocation-removed",
            Self::Claim => "claim",
            Self::ClaimUpdated => "claim-updated",
            Self::ClaimRemoved => "claim-removed",
            Self::DealPublished => "deal-published",
            Self::DealActivated => "deal-activated",
            Self::DealTerminated => "deal-terminated",
            Self::DealCompleted => "deal-completed",
            Self::SectorPrecommitted => "sector-precommitted",
            Self::SectorActivated => "sector-activated",
            Self::SectorUpdated => "sector-updated",
            Self::SectorTerminated => "sector-terminated",
        }
    }

    /// Returns `true` for the types that carry repeated `piece-cid` / `piece-size` entries.
    pub const fn has_pieces(&self) -> bool {
        matches!(self, Self::SectorActivated | Self::SectorUpdated)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}
