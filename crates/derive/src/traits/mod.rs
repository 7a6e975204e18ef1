//! Traits describing the collaborators of the decode and enrichment stages.

mod chain_api;
pub use chain_api::ChainApi;
