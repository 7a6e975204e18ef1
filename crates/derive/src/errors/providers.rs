//! Errors surfaced by [ChainApi] implementations.
//!
//! [ChainApi]: crate::traits::ChainApi

use thiserror::Error;

/// An error returned by a [ChainApi] call.
///
/// [ChainApi]: crate::traits::ChainApi
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The event query returned exactly the upstream result cap, so the window may be truncated.
    #[error("Max results ({0}) reached for GetActorEventsRaw")]
    MaxResults(usize),
    /// The request never completed: connection refused or reset, timeout, or a broken body.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// The JSON-RPC error code.
        code: i64,
        /// The JSON-RPC error message.
        message: String,
    },
    /// The response could not be interpreted.
    #[error("Invalid response: {0}")]
    Response(String),
    /// Reading or writing the on-disk response cache failed.
    #[error("Cache error: {0}")]
    Cache(String),
}

impl ProviderError {
    /// Returns `true` if retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if the request hit the upstream result cap.
    pub const fn is_saturated(&self) -> bool {
        matches!(self, Self::MaxResults(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classes() {
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(!ProviderError::Transport("reset".into()).is_saturated());
        assert!(ProviderError::MaxResults(10_000).is_saturated());
        assert!(!ProviderError::Rpc { code: 1, message: "nope".into() }.is_transient());
        assert!(!ProviderError::Response("bad".into()).is_transient());
        assert!(!ProviderError::Cache("disk".into()).is_transient());
    }
}
