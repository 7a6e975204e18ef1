//! Raw and decoded actor events.

use super::{
    serde_helpers::{cid_json, cid_vec_json},
    EventKind,
};
use crate::ipld::Ipld;
use cid::Cid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single `{Flags, Key, Codec, Value}` entry of a raw event. `Value` stays base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventEntry {
    /// Indexing flags.
    pub flags: u64,
    /// The entry key, kebab-cased.
    pub key: String,
    /// The IPLD codec of the value; 0x51 (CBOR) for builtin actors.
    pub codec: u64,
    /// The base64 encoded value bytes.
    pub value: String,
}

/// An actor event as returned by `Filecoin.GetActorEventsRaw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// The emitting actor address.
    pub emitter: String,
    /// The ordered entries, beginning with `$type`.
    pub entries: Vec<EventEntry>,
    /// The epoch of the tipset the message was included in.
    pub height: u64,
    /// Whether the event was reverted by a reorg.
    pub reverted: bool,
    /// The CID of the message that emitted the event.
    #[serde(with = "cid_json")]
    pub msg_cid: Cid,
    /// The tipset key the event belongs to.
    #[serde(with = "cid_vec_json")]
    pub tipset_key: Vec<Cid>,
}

/// A decoded, schema-checked actor event.
///
/// Serializes with `type` as the first key; the compactor's line pre-filter relies on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    /// The event type.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// The camel-cased event fields.
    pub event: BTreeMap<String, Ipld>,
    /// The emitting actor address.
    pub emitter: String,
    /// The epoch of the tipset the message was included in.
    pub height: u64,
    /// The CID of the message that emitted the event.
    #[serde(with = "cid_json")]
    pub msg_cid: Cid,
    /// Whether the event was reverted by a reorg.
    pub reverted: bool,
    /// The tipset key the event belongs to.
    #[serde(with = "cid_vec_json")]
    pub tipset_key: Vec<Cid>,
    /// Piece manifest data attached by the enricher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<DdoExtra>,
}

impl DecodedEvent {
    /// Returns the `sector` field, if present and a valid sector number.
    pub fn sector(&self) -> Option<u64> {
        self.event.get("sector").and_then(Ipld::as_u64)
    }

    /// Returns the `unsealedCid` field when it is present and not null.
    pub fn unsealed_cid(&self) -> Option<&Cid> {
        self.event.get("unsealedCid").and_then(Ipld::as_link)
    }
}

/// The piece manifest of a proven sector, correlated from its prove message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdoExtra {
    /// The miner actor method the sector was proven with.
    pub method: u64,
    /// The pieces of the sector, in manifest order.
    pub pieces: Vec<ManifestPiece>,
}

/// A single piece of a sector manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPiece {
    /// The piece CID.
    #[serde(with = "cid_json")]
    pub cid: Cid,
    /// The padded piece size.
    pub size: u64,
    /// Whether the piece claims a verified allocation.
    pub verified: bool,
    /// Whether the storage market actor (f05) is notified of the piece.
    pub f05: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_cid;

    #[test]
    fn test_raw_event_lotus_json() {
        let msg = test_cid("msg");
        let block = test_cid("block");
        let json = serde_json::json!({
            "emitter": "f06",
            "entries": [{ "Flags": 3, "Key": "$type", "Codec": 81, "Value": "amFsbG9jYXRpb24=" }],
            "height": 1470000,
            "reverted": false,
            "msgCid": { "/": msg.to_string() },
            "tipsetKey": [{ "/": block.to_string() }],
        });
        let raw: RawEvent = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(raw.entries[0].key, "$type");
        assert_eq!(raw.msg_cid, msg);
        assert_eq!(raw.tipset_key, vec![block]);
        assert_eq!(serde_json::to_value(&raw).unwrap(), json);
    }

    #[test]
    fn test_decoded_event_serializes_type_first() {
        let event = DecodedEvent {
            kind: EventKind::SectorActivated,
            event: BTreeMap::from([("sector".to_string(), Ipld::Integer(7))]),
            emitter: "f01234".into(),
            height: 10,
            msg_cid: test_cid("msg"),
            reverted: false,
            tipset_key: vec![],
            extra: None,
        };
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.starts_with(r#"{"type":"sector-activated","event":{"sector":7}"#));
        assert!(line.contains(r#""reverted":false"#));
        assert!(!line.contains("extra"));
        assert_eq!(event.sector(), Some(7));
        assert!(event.unsealed_cid().is_none());
    }
}
