//! Error types for event decoding, enrichment and the chain API.

mod decode;
pub use decode::DecodeError;

mod enrich;
pub use enrich::EnrichError;

mod providers;
pub use providers::ProviderError;
