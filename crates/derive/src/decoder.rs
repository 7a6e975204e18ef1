//! The [EventDecoder] turns raw event entries into typed, schema-checked events.

use crate::{
    errors::DecodeError,
    ipld::Ipld,
    registry::SchemaRegistry,
    types::{DecodedEvent, EventEntry, EventKind, RawEvent},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::{collections::BTreeMap, sync::Arc};
use tracing::trace;

/// Decodes raw builtin actor events against a [SchemaRegistry].
///
/// Decoding is pure: it performs no I/O and yields the same result for the same entries.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    registry: Arc<SchemaRegistry>,
}

impl EventDecoder {
    /// Creates a new [EventDecoder] backed by the given registry.
    pub const fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Decodes a raw event, carrying over its chain metadata.
    pub fn decode(&self, raw: &RawEvent) -> Result<DecodedEvent, DecodeError> {
        let (kind, event) = self.decode_entries(&raw.entries)?;
        trace!(target: "decoder", kind = %kind, height = raw.height, "Decoded event");
        Ok(DecodedEvent {
            kind,
            event,
            emitter: raw.emitter.clone(),
            height: raw.height,
            msg_cid: raw.msg_cid,
            reverted: raw.reverted,
            tipset_key: raw.tipset_key.clone(),
            extra: None,
        })
    }

    /// Decodes an ordered list of entries into the event type and its camel-cased fields.
    pub fn decode_entries(
        &self,
        entries: &[EventEntry],
    ) -> Result<(EventKind, BTreeMap<String, Ipld>), DecodeError> {
        if !self.registry.is_initialized() {
            return Err(DecodeError::NotInitialized);
        }
        let (first, rest) = entries
            .split_first()
            .ok_or_else(|| DecodeError::Format("expected at least one entry".into()))?;
        if first.key != "$type" {
            return Err(DecodeError::Format("expected $type as first entry".into()));
        }
        let ty = match decode_value(first)? {
            Ipld::String(ty) => ty,
            other => {
                return Err(DecodeError::Format(format!(
                    "expected $type to be a string, found {}",
                    other.kind_name()
                )))
            }
        };

        let kind = ty.parse::<EventKind>().ok();
        let has_pieces = kind.is_some_and(|k| k.has_pieces());

        let mut event = BTreeMap::new();
        let mut pieces: Vec<BTreeMap<String, Ipld>> = Vec::new();
        for entry in rest {
            let value = decode_value(entry)?;
            if has_pieces {
                match entry.key.as_str() {
                    "piece-cid" => {
                        pieces.push(BTreeMap::from([("cid".to_string(), value)]));
                        continue;
                    }
                    "piece-size" => {
                        let open = pieces.last_mut().ok_or_else(|| {
                            DecodeError::Format("expected piece-cid before piece-size".into())
                        })?;
                        if open.contains_key("size") {
                            return Err(DecodeError::Format("duplicate piece-size".into()));
                        }
                        open.insert("size".to_string(), value);
                        continue;
                    }
                    _ => {}
                }
            }
            let key = camel_case(&entry.key);
            if event.contains_key(&key) {
                return Err(DecodeError::DuplicateKey(key));
            }
            event.insert(key, value);
        }
        if has_pieces {
            if event.contains_key("pieces") {
                return Err(DecodeError::DuplicateKey("pieces".into()));
            }
            let pieces = pieces.into_iter().map(Ipld::Map).collect();
            event.insert("pieces".to_string(), Ipld::List(pieces));
        }

        let schema_name = schema_name(&ty);
        let schema = self
            .registry
            .event_schema(&schema_name)
            .ok_or_else(|| DecodeError::UnknownType { ty: ty.clone(), schema: schema_name.clone() })?;
        schema.validate(&event).map_err(|reason| DecodeError::SchemaValidation {
            ty: ty.clone(),
            schema: schema_name.clone(),
            reason,
        })?;

        // Every registered schema name maps back to an event kind.
        let kind = kind.ok_or(DecodeError::UnknownType { ty, schema: schema_name })?;
        Ok((kind, event))
    }
}

fn decode_value(entry: &EventEntry) -> Result<Ipld, DecodeError> {
    let bytes = STANDARD.decode(entry.value.as_bytes())?;
    Ok(Ipld::from_cbor(&bytes)?)
}

/// Converts a kebab-case key to camelCase: every `-` followed by a lowercase ASCII letter is
/// replaced by the uppercased letter. Other characters are left alone.
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('-', Some(next)) if next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Maps an event `$type` to its schema name, e.g. `sector-activated` to `SectorActivatedEvent`.
pub fn schema_name(ty: &str) -> String {
    let camel = camel_case(ty);
    let mut chars = camel.chars();
    let mut name = String::with_capacity(camel.len() + 5);
    if let Some(first) = chars.next() {
        name.push(first.to_ascii_uppercase());
        name.extend(chars);
    }
    name.push_str("Event");
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{cbor_entry, entry, test_cid, type_entry};
    use proptest::prelude::*;

    fn decoder() -> EventDecoder {
        EventDecoder::new(Arc::new(SchemaRegistry::builtin()))
    }

    #[test]
    fn test_decode_allocation() {
        let entries = vec![
            type_entry("allocation"),
            entry("client", Ipld::from(1234)),
            entry("expiration", Ipld::from(1_470_000)),
        ];
        let (kind, event) = decoder().decode_entries(&entries).unwrap();
        assert_eq!(kind, EventKind::Allocation);
        assert_eq!(
            event,
            BTreeMap::from([
                ("client".to_string(), Ipld::from(1234)),
                ("expiration".to_string(), Ipld::from(1_470_000)),
            ])
        );
    }

    #[test]
    fn test_decode_raw_allocation_values() {
        // "allocation", 1234, 1470000 as produced by the node.
        let entries = vec![
            cbor_entry("$type", "amFsbG9jYXRpb24="),
            cbor_entry("client", "GQTS"),
            cbor_entry("expiration", "GgAWbjA="),
        ];
        let (kind, event) = decoder().decode_entries(&entries).unwrap();
        assert_eq!(kind, EventKind::Allocation);
        assert_eq!(event["client"], Ipld::from(1234));
        assert_eq!(event["expiration"], Ipld::from(1_470_000));
    }

    #[test]
    fn test_decode_keys_are_camel_cased() {
        let entries = vec![
            type_entry("claim"),
            entry("piece-cid", Ipld::Link(test_cid("piece"))),
            entry("piece-size", Ipld::from(2048)),
            entry("term-start", Ipld::from(10)),
        ];
        let (_, event) = decoder().decode_entries(&entries).unwrap();
        assert!(event.contains_key("pieceCid"));
        assert!(event.contains_key("pieceSize"));
        assert!(event.contains_key("termStart"));
    }

    #[test]
    fn test_decode_sector_activated_pieces() {
        let entries = vec![
            type_entry("sector-activated"),
            entry("sector", Ipld::from(9)),
            entry("unsealed-cid", Ipld::Link(test_cid("unsealed"))),
            entry("piece-cid", Ipld::Link(test_cid("a"))),
            entry("piece-size", Ipld::from(1024)),
            entry("piece-cid", Ipld::Link(test_cid("b"))),
            entry("piece-size", Ipld::from(2048)),
        ];
        let raw = RawEvent {
            emitter: "f01000".into(),
            entries,
            height: 100,
            reverted: false,
            msg_cid: test_cid("msg"),
            tipset_key: vec![test_cid("block")],
        };
        let decoded = decoder().decode(&raw).unwrap();
        assert_eq!(decoded.kind, EventKind::SectorActivated);
        assert_eq!(decoded.sector(), Some(9));
        assert_eq!(decoded.unsealed_cid(), Some(&test_cid("unsealed")));
        let Ipld::List(pieces) = &decoded.event["pieces"] else { panic!("pieces not a list") };
        assert_eq!(pieces.len(), 2);
        assert_eq!(
            pieces[1],
            Ipld::Map(BTreeMap::from([
                ("cid".to_string(), Ipld::Link(test_cid("b"))),
                ("size".to_string(), Ipld::from(2048)),
            ]))
        );
        assert_eq!(decoded.msg_cid, raw.msg_cid);
    }

    #[test]
    fn test_decode_sector_activated_without_pieces() {
        let entries = vec![
            type_entry("sector-activated"),
            entry("sector", Ipld::from(9)),
            entry("unsealed-cid", Ipld::Null),
        ];
        let (_, event) = decoder().decode_entries(&entries).unwrap();
        assert_eq!(event["pieces"], Ipld::List(vec![]));
    }

    #[test]
    fn test_piece_size_ordering() {
        let dangling = vec![
            type_entry("sector-updated"),
            entry("sector", Ipld::from(9)),
            entry("piece-size", Ipld::from(1024)),
        ];
        assert!(matches!(decoder().decode_entries(&dangling), Err(DecodeError::Format(_))));

        let twice = vec![
            type_entry("sector-updated"),
            entry("piece-cid", Ipld::Link(test_cid("a"))),
            entry("piece-size", Ipld::from(1024)),
            entry("piece-size", Ipld::from(1024)),
        ];
        assert_eq!(
            decoder().decode_entries(&twice),
            Err(DecodeError::Format("duplicate piece-size".into()))
        );
    }

    #[test]
    fn test_duplicate_key() {
        let entries = vec![
            type_entry("deal-published"),
            entry("id", Ipld::from(1)),
            entry("id", Ipld::from(2)),
        ];
        assert_eq!(decoder().decode_entries(&entries), Err(DecodeError::DuplicateKey("id".into())));
    }

    #[test]
    fn test_missing_type() {
        assert!(matches!(decoder().decode_entries(&[]), Err(DecodeError::Format(_))));
        let entries = vec![entry("client", Ipld::from(1)), type_entry("allocation")];
        assert!(matches!(decoder().decode_entries(&entries), Err(DecodeError::Format(_))));
        let entries = vec![entry("$type", Ipld::from(1))];
        assert!(matches!(decoder().decode_entries(&entries), Err(DecodeError::Format(_))));
    }

    #[test]
    fn test_bad_value_encoding() {
        let entries = vec![type_entry("allocation"), cbor_entry("client", "not base64!")];
        assert!(matches!(decoder().decode_entries(&entries), Err(DecodeError::Format(_))));
    }

    #[test]
    fn test_unknown_type() {
        let entries = vec![type_entry("sector-exploded")];
        assert_eq!(
            decoder().decode_entries(&entries),
            Err(DecodeError::UnknownType {
                ty: "sector-exploded".into(),
                schema: "SectorExplodedEvent".into()
            })
        );
    }

    #[test]
    fn test_schema_violation() {
        let entries = vec![type_entry("sector-terminated"), entry("sector", Ipld::from("nine"))];
        let err = decoder().decode_entries(&entries).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::SchemaValidation { ref schema, .. } if schema == "SectorTerminatedEvent"
        ));
    }

    #[test]
    fn test_uninitialized_registry() {
        let decoder = EventDecoder::new(Arc::new(SchemaRegistry::default()));
        assert_eq!(
            decoder.decode_entries(&[type_entry("allocation")]),
            Err(DecodeError::NotInitialized)
        );
    }

    #[test]
    fn test_schema_name() {
        assert_eq!(schema_name("verifier-balance"), "VerifierBalanceEvent");
        assert_eq!(schema_name("claim"), "ClaimEvent");
    }

    proptest! {
        #[test]
        fn test_camel_case_words(words in prop::collection::vec("[a-z][a-z0-9]{0,7}", 1..5)) {
            let kebab = words.join("-");
            let camel = camel_case(&kebab);
            prop_assert!(!camel.contains('-'));
            let expected: String = words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.clone() } else { w[..1].to_uppercase() + &w[1..] })
                .collect();
            prop_assert_eq!(camel, expected);
        }

        #[test]
        fn test_entries_without_leading_type_fail(
            keys in prop::collection::vec("[a-z]{1,8}(-[a-z]{1,8})?", 1..6)
        ) {
            let entries: Vec<_> = keys.iter().map(|k| entry(k, Ipld::from(1))).collect();
            prop_assert!(matches!(decoder().decode_entries(&entries), Err(DecodeError::Format(_))));
        }
    }
}
