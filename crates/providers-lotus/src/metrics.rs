//! Prometheus metrics of the Lotus JSON-RPC client.
//!
//! Labels are the JSON-RPC method name (`Filecoin.ChainHead`, ...), plus the [ProviderError]
//! class for failures and the cache for cache lookups.
//!
//! [ProviderError]: spacemon_derive::errors::ProviderError

use lazy_static::lazy_static;
use prometheus::{self, register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

/// Lotus answers most calls in milliseconds, while event queries over wide windows can take up
/// to the request timeout.
const RPC_DURATION_BUCKETS: &[f64; 12] =
    &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 60.0];

lazy_static! {
    /// JSON-RPC requests sent to the Lotus node, by method.
    pub static ref LOTUS_RPC_REQUESTS: CounterVec = register_counter_vec!(
        "spacemon_lotus_rpc_requests_total",
        "JSON-RPC requests sent to the Lotus node",
        &["method"]
    ).expect("spacemon_lotus_rpc_requests_total failed to register");

    /// Failed Lotus JSON-RPC requests, by method and error class.
    pub static ref LOTUS_RPC_FAILURES: CounterVec = register_counter_vec!(
        "spacemon_lotus_rpc_failures_total",
        "Failed JSON-RPC requests to the Lotus node, by error class",
        &["method", "error"]
    ).expect("spacemon_lotus_rpc_failures_total failed to register");

    /// Round-trip time of successful Lotus JSON-RPC requests.
    pub static ref LOTUS_RPC_DURATION: HistogramVec = register_histogram_vec!(
        "spacemon_lotus_rpc_duration_seconds",
        "Round-trip time of successful JSON-RPC requests to the Lotus node",
        &["method"],
        RPC_DURATION_BUCKETS.to_vec()
    )
    .expect("spacemon_lotus_rpc_duration_seconds failed to register");

    /// Calls answered from a cache instead of the node, by method and cache (`disk`, `tipset`).
    pub static ref LOTUS_CACHE_HITS: CounterVec = register_counter_vec!(
        "spacemon_lotus_cache_hits_total",
        "Lotus calls answered from the finalized-result disk cache or the tipset cache",
        &["method", "cache"]
    ).expect("spacemon_lotus_cache_hits_total failed to register");
}
