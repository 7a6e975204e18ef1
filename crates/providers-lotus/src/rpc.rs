//! JSON-RPC 2.0 envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use spacemon_derive::errors::ProviderError;

/// A JSON-RPC request.
#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub(crate) jsonrpc: &'static str,
    pub(crate) method: &'a str,
    pub(crate) params: Value,
    pub(crate) id: u64,
}

impl<'a> Request<'a> {
    pub(crate) const fn new(method: &'a str, params: Value) -> Self {
        Self { jsonrpc: "2.0", method, params, id: 1 }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    error: Option<ErrorObject>,
    /// `None` when the member is absent, `Some(Value::Null)` for a `null` result.
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
}

fn present<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

/// Unwraps the result of a JSON-RPC response body.
pub(crate) fn parse_response(body: &[u8]) -> Result<Value, ProviderError> {
    let response: Response = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Response(format!("Invalid JSON response: {e}")))?;
    if response.jsonrpc.as_deref() != Some("2.0") {
        return Err(ProviderError::Response("Invalid JSON-RPC version".to_string()));
    }
    if let Some(error) = response.error {
        return Err(ProviderError::Rpc { code: error.code, message: error.message });
    }
    response.result.ok_or_else(|| ProviderError::Response("Missing result".to_string()))
}
