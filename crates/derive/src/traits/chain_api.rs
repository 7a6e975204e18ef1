//! The chain API consumed by the enricher and the ingestion loop.

use crate::{
    errors::ProviderError,
    types::{EventKind, Message, MsgLookup, RawEvent, TipSet},
};
use async_trait::async_trait;
use cid::Cid;

/// Describes the Filecoin node methods the ingestion pipeline depends on.
///
/// Methods take `&self` so that independent lookups can be awaited together.
#[async_trait]
pub trait ChainApi: Send + Sync {
    /// Returns the current head tipset (`Filecoin.ChainHead`).
    async fn chain_head(&self) -> Result<TipSet, ProviderError>;

    /// Returns the tipset at the given height, or the first non-null tipset below it
    /// (`Filecoin.ChainGetTipSetByHeight`).
    async fn tipset_by_height(&self, height: u64) -> Result<TipSet, ProviderError>;

    /// Returns the message with the given CID (`Filecoin.ChainGetMessage`).
    async fn chain_get_message(&self, cid: &Cid) -> Result<Message, ProviderError>;

    /// Searches for the execution of a message, looking back at most `limit` epochs from the
    /// given tipset (`Filecoin.StateSearchMsg`). Returns `None` if it was not found.
    async fn state_search_msg(
        &self,
        tipset: &[Cid],
        msg: &Cid,
        limit: i64,
        allow_replaced: bool,
    ) -> Result<Option<MsgLookup>, ProviderError>;

    /// Returns the builtin actor events of the given types emitted in the inclusive epoch range
    /// (`Filecoin.GetActorEventsRaw`).
    ///
    /// Fails with [ProviderError::MaxResults] when the node returns exactly its result cap.
    async fn actor_events_raw(
        &self,
        from_height: u64,
        to_height: u64,
        kinds: &[EventKind],
    ) -> Result<Vec<RawEvent>, ProviderError>;
}
