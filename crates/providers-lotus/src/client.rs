//! The Lotus JSON-RPC [ChainApi].

use crate::{
    cache::DiskCache,
    rpc::{parse_response, Request},
    tipset_key::TipSetKey,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use cid::Cid;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use spacemon_derive::{
    errors::ProviderError,
    ipld::Ipld,
    traits::ChainApi,
    types::{EventKind, Message, MsgLookup, RawEvent, TipSet},
};
use spin::Mutex;
use std::{num::NonZeroUsize, time::Duration};
use tracing::{debug, warn};

/// The number of results at which `GetActorEventsRaw` truncates its response.
pub const MAX_ACTOR_EVENTS_RESULTS: usize = 10_000;

/// The timeout of a single RPC request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The IPLD codec of builtin actor event values (CBOR).
const CBOR_CODEC: u64 = 0x51;

/// A [ChainApi] over a Lotus node's JSON-RPC HTTP endpoint.
#[derive(Debug)]
pub struct LotusClient {
    /// The JSON-RPC endpoint.
    url: String,
    /// The inner reqwest client.
    inner: reqwest::Client,
    /// The cache for results scoped to finalized tipsets.
    cache: Option<DiskCache>,
    /// The last `tipset_by_height` result.
    tipset_by_height_cache: Mutex<LruCache<u64, TipSet>>,
}

impl LotusClient {
    /// Creates a new [LotusClient] for the given endpoint, caching finalized results in `cache`.
    pub fn new(url: impl Into<String>, cache: Option<DiskCache>) -> Result<Self, ProviderError> {
        let inner = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            inner,
            cache,
            tipset_by_height_cache: Mutex::new(LruCache::new(NonZeroUsize::MIN)),
        })
    }

    /// Returns the JSON-RPC endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let result = self.request_raw(method, params).await?;
        decode(method, result)
    }

    async fn request_raw(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        crate::inc!(LOTUS_RPC_REQUESTS, &[method]);
        crate::timer!(START, LOTUS_RPC_DURATION, &[method], timer);
        debug!(target: "lotus", method, "Sending request");

        let result = self.send(method, params).await;
        match &result {
            Ok(_) => {
                crate::timer!(STOP, timer);
            }
            Err(e) => {
                crate::timer!(DISCARD, timer);
                crate::inc!(LOTUS_RPC_FAILURES, &[method, error_label(e)]);
                warn!(target: "lotus", method, "Request failed: {e}");
            }
        }
        result
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let response = self
            .inner
            .post(&self.url)
            .json(&Request::new(method, params))
            .send()
            .await
            .map_err(from_reqwest)?;
        let status = response.status();
        let body = response.bytes().await.map_err(from_reqwest)?;
        match parse_response(&body) {
            Err(ProviderError::Response(_)) if status.is_server_error() => {
                Err(ProviderError::Transport(format!("HTTP {status}")))
            }
            Err(ProviderError::Response(msg)) if !status.is_success() => {
                Err(ProviderError::Response(format!("HTTP {status}: {msg}")))
            }
            result => result,
        }
    }

    /// Serves `method` from the disk cache, falling back to the node and storing the result.
    async fn cached<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        cache_name: Option<String>,
    ) -> Result<T, ProviderError> {
        let (Some(cache), Some(name)) = (&self.cache, cache_name) else {
            return self.request(method, params).await;
        };
        if let Some(value) = cache.get(&name).await {
            crate::inc!(LOTUS_CACHE_HITS, &[method, "disk"]);
            return decode(method, value);
        }
        let value = self.request_raw(method, params).await?;
        let decoded = decode(method, value.clone())?;
        cache.put(&name, &value).await?;
        Ok(decoded)
    }
}

#[async_trait]
impl ChainApi for LotusClient {
    async fn chain_head(&self) -> Result<TipSet, ProviderError> {
        self.request("Filecoin.ChainHead", json!([])).await
    }

    async fn tipset_by_height(&self, height: u64) -> Result<TipSet, ProviderError> {
        if let Some(tipset) = self.tipset_by_height_cache.lock().get(&height) {
            crate::inc!(LOTUS_CACHE_HITS, &["Filecoin.ChainGetTipSetByHeight", "tipset"]);
            return Ok(tipset.clone());
        }
        let tipset: TipSet =
            self.request("Filecoin.ChainGetTipSetByHeight", json!([height, []])).await?;
        self.tipset_by_height_cache.lock().put(height, tipset.clone());
        Ok(tipset)
    }

    async fn chain_get_message(&self, cid: &Cid) -> Result<Message, ProviderError> {
        let name = format!("chainGetMessage-{cid}.json");
        self.cached("Filecoin.ChainGetMessage", json!([link(cid)]), Some(name)).await
    }

    async fn state_search_msg(
        &self,
        tipset: &[Cid],
        msg: &Cid,
        limit: i64,
        allow_replaced: bool,
    ) -> Result<Option<MsgLookup>, ProviderError> {
        let key = TipSetKey::new(tipset);
        let name = if key.is_empty() {
            None
        } else {
            let tsk = key.cid().map_err(|e| ProviderError::Cache(e.to_string()))?;
            Some(format!("stateSearchMsg-{msg}-{limit}-{allow_replaced}-{tsk}.json"))
        };
        let tsk: Vec<Value> = tipset.iter().map(link).collect();
        let params = json!([tsk, link(msg), limit, allow_replaced]);
        self.cached("Filecoin.StateSearchMsg", params, name).await
    }

    async fn actor_events_raw(
        &self,
        from_height: u64,
        to_height: u64,
        kinds: &[EventKind],
    ) -> Result<Vec<RawEvent>, ProviderError> {
        let filters = kinds
            .iter()
            .map(|kind| {
                let value = Ipld::from(kind.as_str())
                    .to_cbor()
                    .map_err(|e| ProviderError::Response(format!("encode filter: {e}")))?;
                let filter = json!({ "Codec": CBOR_CODEC, "Value": STANDARD.encode(value) });
                Ok::<_, ProviderError>(filter)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let params = json!([{
            "fromHeight": from_height,
            "toHeight": to_height,
            "fields": { "$type": filters },
        }]);
        let events: Option<Vec<RawEvent>> =
            self.request("Filecoin.GetActorEventsRaw", params).await?;
        let events = events.unwrap_or_default();
        if events.len() == MAX_ACTOR_EVENTS_RESULTS {
            return Err(ProviderError::MaxResults(MAX_ACTOR_EVENTS_RESULTS));
        }
        Ok(events)
    }
}

fn link(cid: &Cid) -> Value {
    json!({ "/": cid.to_string() })
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, ProviderError> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::Response(format!("Unexpected {method} result: {e}")))
}

fn from_reqwest(err: reqwest::Error) -> ProviderError {
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        ProviderError::Transport(err.to_string())
    } else {
        ProviderError::Response(err.to_string())
    }
}

#[cfg(feature = "metrics")]
const fn error_label(err: &ProviderError) -> &'static str {
    match err {
        ProviderError::MaxResults(_) => "max_results",
        ProviderError::Transport(_) => "transport",
        ProviderError::Rpc { .. } => "rpc",
        ProviderError::Response(_) => "response",
        ProviderError::Cache(_) => "cache",
    }
}
