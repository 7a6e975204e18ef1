//! Errors raised by the [StateEnricher].
//!
//! [StateEnricher]: crate::enrich::StateEnricher

use super::ProviderError;
use crate::types::EventKind;
use cid::Cid;
use thiserror::Error;

/// A structural failure while enriching a sector event.
///
/// Soft failures (ambiguous manifests, undecodable parameters or batch returns) never surface as
/// an [EnrichError]; the enricher logs them and yields no extra data instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    /// The originating message was sent with a method the event type cannot come from.
    #[error("Unexpected method {method} for {kind} event in message {msg}")]
    UnexpectedMethod {
        /// The event type.
        kind: EventKind,
        /// The method number found on the message.
        method: u64,
        /// The message CID.
        msg: Cid,
    },
    /// The event carries an unsealed CID but no sector number.
    #[error("{0} event has no sector number")]
    MissingSector(EventKind),
    /// The execution receipt of the message could not be found.
    #[error("No receipt found for message {0}")]
    MissingReceipt(Cid),
    /// The execution receipt carries no return payload.
    #[error("Receipt for message {0} has no return data")]
    MalformedReceipt(Cid),
    /// A chain API call failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl EnrichError {
    /// Returns `true` for the structural format errors, as opposed to provider failures.
    pub const fn is_format(&self) -> bool {
        !matches!(self, Self::Provider(_))
    }
}
