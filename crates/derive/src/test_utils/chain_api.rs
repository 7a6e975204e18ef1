//! A scripted [ChainApi] for testing.

use crate::{
    errors::ProviderError,
    traits::ChainApi,
    types::{EventKind, Message, MessageReceipt, MsgLookup, RawEvent, TipSet},
};
use async_trait::async_trait;
use cid::Cid;
use spin::Mutex;
use std::collections::{HashMap, VecDeque};

/// A mock chain API for testing.
///
/// Head heights are served in order, the last one repeating. Event responses are served in
/// order, an empty list once exhausted. Every event query window is recorded.
#[derive(Debug, Default)]
pub struct TestChainApi {
    /// Scripted head heights.
    pub heads: Mutex<VecDeque<u64>>,
    /// Tipsets by height.
    pub tipsets: Mutex<HashMap<u64, TipSet>>,
    /// Errors served once by the next tipset lookup at a height.
    pub tipset_failures: Mutex<HashMap<u64, ProviderError>>,
    /// Messages by CID.
    pub messages: Mutex<HashMap<Cid, Message>>,
    /// Message lookups by message CID.
    pub lookups: Mutex<HashMap<Cid, MsgLookup>>,
    /// Scripted responses to event queries.
    pub events: Mutex<VecDeque<Result<Vec<RawEvent>, ProviderError>>>,
    /// The `(from, to)` windows of every event query.
    pub queries: Mutex<Vec<(u64, u64)>>,
    /// The arguments of every `state_search_msg` call.
    pub searches: Mutex<Vec<(Vec<Cid>, Cid, i64, bool)>>,
}

impl TestChainApi {
    /// Appends a head height to the script.
    pub fn push_head(&self, height: u64) {
        self.heads.lock().push_back(height);
    }

    /// Inserts a tipset.
    pub fn insert_tipset(&self, tipset: TipSet) {
        self.tipsets.lock().insert(tipset.height, tipset);
    }

    /// Fails the next tipset lookup at `height` with `err`.
    pub fn fail_tipset_once(&self, height: u64, err: ProviderError) {
        self.tipset_failures.lock().insert(height, err);
    }

    /// Inserts a message under the given CID.
    pub fn insert_message(&self, cid: Cid, method: u64, params: Option<Vec<u8>>) {
        let message = Message {
            to: "f01000".to_string(),
            from: "f3sender".to_string(),
            nonce: 0,
            method,
            params,
        };
        self.messages.lock().insert(cid, message);
    }

    /// Inserts a successful receipt for the given message CID.
    pub fn insert_receipt(&self, msg: Cid, return_data: Option<Vec<u8>>, height: u64) {
        let lookup = MsgLookup {
            message: msg,
            receipt: MessageReceipt { exit_code: 0, return_data, gas_used: 1 },
            tip_set: vec![],
            height,
        };
        self.lookups.lock().insert(msg, lookup);
    }

    /// Appends a response to the event query script.
    pub fn push_events(&self, response: Result<Vec<RawEvent>, ProviderError>) {
        self.events.lock().push_back(response);
    }

    /// Returns the recorded event query windows.
    pub fn queried_windows(&self) -> Vec<(u64, u64)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl ChainApi for TestChainApi {
    async fn chain_head(&self) -> Result<TipSet, ProviderError> {
        let mut heads = self.heads.lock();
        let height = if heads.len() > 1 { heads.pop_front() } else { heads.front().copied() };
        height
            .map(|height| TipSet { cids: vec![], height })
            .ok_or_else(|| ProviderError::Response("no head scripted".to_string()))
    }

    async fn tipset_by_height(&self, height: u64) -> Result<TipSet, ProviderError> {
        if let Some(err) = self.tipset_failures.lock().remove(&height) {
            return Err(err);
        }
        self.tipsets
            .lock()
            .get(&height)
            .cloned()
            .ok_or_else(|| ProviderError::Response(format!("tipset {height} not found")))
    }

    async fn chain_get_message(&self, cid: &Cid) -> Result<Message, ProviderError> {
        self.messages
            .lock()
            .get(cid)
            .cloned()
            .ok_or_else(|| ProviderError::Response(format!("message {cid} not found")))
    }

    async fn state_search_msg(
        &self,
        tipset: &[Cid],
        msg: &Cid,
        limit: i64,
        allow_replaced: bool,
    ) -> Result<Option<MsgLookup>, ProviderError> {
        self.searches.lock().push((tipset.to_vec(), *msg, limit, allow_replaced));
        Ok(self.lookups.lock().get(msg).cloned())
    }

    async fn actor_events_raw(
        &self,
        from_height: u64,
        to_height: u64,
        _kinds: &[EventKind],
    ) -> Result<Vec<RawEvent>, ProviderError> {
        self.queries.lock().push((from_height, to_height));
        self.events.lock().pop_front().unwrap_or_else(|| Ok(vec![]))
    }
}
