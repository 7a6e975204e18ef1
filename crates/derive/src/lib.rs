#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(any(test, feature = "test-utils")), warn(unused_crate_dependencies))]

/// Re-export commonly used types and traits.
pub mod prelude {
    pub use crate::{
        decoder::EventDecoder,
        enrich::StateEnricher,
        errors::{DecodeError, EnrichError, ProviderError},
        ipld::Ipld,
        registry::SchemaRegistry,
        traits::ChainApi,
        types::{DdoExtra, DecodedEvent, EventKind, RawEvent},
    };
}

pub mod decoder;
pub mod enrich;
pub mod errors;
pub mod ipld;
pub mod registry;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
