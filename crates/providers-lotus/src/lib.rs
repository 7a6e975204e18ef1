#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod macros;

#[cfg(feature = "metrics")]
pub mod metrics;

mod cache;
pub use cache::DiskCache;

mod client;
pub use client::{LotusClient, MAX_ACTOR_EVENTS_RESULTS, REQUEST_TIMEOUT};

mod rpc;

mod tipset_key;
pub use tipset_key::TipSetKey;
