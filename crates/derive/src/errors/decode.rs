//! Errors raised while turning raw event entries into typed events.

use thiserror::Error;

/// An error encountered while decoding or validating a raw actor event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The entries are structurally malformed: empty, missing the leading `$type`, carrying an
    /// undecodable value, or breaking the `piece-cid` / `piece-size` ordering.
    #[error("Malformed event entries: {0}")]
    Format(String),
    /// Two entries resolved to the same camel-cased field name.
    #[error("Unexpected duplicate key {0} in event")]
    DuplicateKey(String),
    /// The `$type` has no registered schema.
    #[error("Unknown event type {ty}, no schema for {schema}")]
    UnknownType {
        /// The declared `$type`.
        ty: String,
        /// The schema name the type resolved to.
        schema: String,
    },
    /// The decoded event does not conform to the schema of its type.
    #[error("Invalid event data format, {ty} event doesn't conform to {schema} schema: {reason}")]
    SchemaValidation {
        /// The declared `$type`.
        ty: String,
        /// The schema the event was validated against.
        schema: String,
        /// The first violation found.
        reason: String,
    },
    /// The schema registry has not been initialized.
    #[error("Schema registry must be initialized before decoding")]
    NotInitialized,
}

impl From<minicbor::decode::Error> for DecodeError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Format(format!("CBOR decode failed: {err}"))
    }
}

impl From<base64::DecodeError> for DecodeError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Format(format!("base64 decode failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn test_base64_error_is_format() {
        let err = base64::engine::general_purpose::STANDARD.decode("!!!").unwrap_err();
        let err: DecodeError = err.into();
        assert!(matches!(err, DecodeError::Format(_)));
    }

    #[test]
    fn test_cbor_error_is_format() {
        let err = minicbor::decode::Error::end_of_input();
        let err: DecodeError = err.into();
        assert!(matches!(err, DecodeError::Format(msg) if msg.contains("CBOR")));
    }

    #[test]
    fn test_unknown_type_display() {
        let err = DecodeError::UnknownType { ty: "bogus".into(), schema: "BogusEvent".into() };
        assert_eq!(err.to_string(), "Unknown event type bogus, no schema for BogusEvent");
    }
}
