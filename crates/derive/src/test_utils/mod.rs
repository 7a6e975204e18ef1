//! Test Utilities for `spacemon-derive`.

use crate::{
    ipld::Ipld,
    types::{EventEntry, RawEvent},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};

mod chain_api;
pub use chain_api::TestChainApi;

mod tracing;
pub use tracing::{collect_traces, CollectedTrace, CollectingLayer, TraceStorage};

/// The DAG-CBOR codec.
const DAG_CBOR: u64 = 0x71;

/// A piece in a test manifest: `(cid, size, verified allocation (client, id), notify addresses)`.
pub type TestPiece = (Cid, u64, Option<(u64, u64)>, Vec<Vec<u8>>);

/// The byte encoding of the storage market actor address, `f05`.
pub const F05: [u8; 2] = [0x00, 0x05];

/// Returns a deterministic DAG-CBOR CID derived from a seed string.
pub fn test_cid(seed: &str) -> Cid {
    Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(seed.as_bytes()))
}

/// Builds an entry holding the CBOR encoding of `value`.
pub fn entry(key: &str, value: Ipld) -> EventEntry {
    EventEntry { flags: 3, key: key.to_string(), codec: 0x51, value: STANDARD.encode(cbor(&value)) }
}

/// Builds the leading `$type` entry.
pub fn type_entry(ty: &str) -> EventEntry {
    entry("$type", Ipld::from(ty))
}

/// Builds an entry from an already base64 encoded value.
pub fn cbor_entry(key: &str, value: &str) -> EventEntry {
    EventEntry { flags: 3, key: key.to_string(), codec: 0x51, value: value.to_string() }
}

/// Builds a raw event at `height` emitted from the message seeded by `msg`.
pub fn raw_event(height: u64, msg: &str, entries: Vec<EventEntry>) -> RawEvent {
    RawEvent {
        emitter: "f01000".to_string(),
        entries,
        height,
        reverted: false,
        msg_cid: test_cid(msg),
        tipset_key: vec![test_cid(&format!("block-{height}"))],
    }
}

/// Builds a raw `sector-activated` event for `sector` carrying an unsealed CID and one piece.
pub fn sector_activated(height: u64, msg: &str, sector: u64) -> RawEvent {
    raw_event(
        height,
        msg,
        vec![
            type_entry("sector-activated"),
            entry("sector", Ipld::from(sector)),
            entry("unsealed-cid", Ipld::Link(test_cid("unsealed"))),
            entry("piece-cid", Ipld::Link(test_cid("piece"))),
            entry("piece-size", Ipld::from(2048)),
        ],
    )
}

/// Builds a raw `deal-published` event.
pub fn deal_published(height: u64, msg: &str, id: u64) -> RawEvent {
    raw_event(
        height,
        msg,
        vec![
            type_entry("deal-published"),
            entry("id", Ipld::from(id)),
            entry("client", Ipld::from(1000)),
            entry("provider", Ipld::from(2000)),
        ],
    )
}

/// Encodes `ProveCommitSectors3Params` for the given sectors.
pub fn prove_commit_sectors3(sectors: &[(u64, Vec<TestPiece>)]) -> Vec<u8> {
    let activations = sectors
        .iter()
        .map(|(sector, pieces)| Ipld::List(vec![Ipld::from(*sector), piece_list(pieces)]))
        .collect();
    cbor(&Ipld::List(vec![
        Ipld::List(activations),
        Ipld::List(vec![Ipld::Bytes(vec![0xaa; 4])]),
        Ipld::Bytes(vec![]),
        Ipld::Null,
        Ipld::Bool(true),
        Ipld::Bool(false),
    ]))
}

/// Encodes `ProveReplicaUpdates3Params` for the given sectors.
pub fn prove_replica_updates3(sectors: &[(u64, Vec<TestPiece>)]) -> Vec<u8> {
    let updates = sectors
        .iter()
        .map(|(sector, pieces)| {
            Ipld::List(vec![
                Ipld::from(*sector),
                Ipld::from(0),
                Ipld::from(0),
                Ipld::Link(test_cid("sealed")),
                piece_list(pieces),
            ])
        })
        .collect();
    cbor(&Ipld::List(vec![
        Ipld::List(updates),
        Ipld::List(vec![]),
        Ipld::Bytes(vec![]),
        Ipld::from(1),
        Ipld::Null,
        Ipld::Bool(true),
        Ipld::Bool(false),
    ]))
}

/// Encodes a `BatchReturn` with the given `(index, code)` failures.
pub fn batch_return(success_count: u64, fails: &[(u64, u64)]) -> Vec<u8> {
    let fails = fails
        .iter()
        .map(|(index, code)| Ipld::List(vec![Ipld::from(*index), Ipld::from(*code)]))
        .collect();
    cbor(&Ipld::List(vec![Ipld::from(success_count), Ipld::List(fails)]))
}

fn piece_list(pieces: &[TestPiece]) -> Ipld {
    Ipld::List(
        pieces
            .iter()
            .map(|(cid, size, key, notify)| {
                let key = key.map_or(Ipld::Null, |(client, id)| {
                    Ipld::List(vec![Ipld::from(client), Ipld::from(id)])
                });
                let notify = notify
                    .iter()
                    .map(|addr| Ipld::List(vec![Ipld::Bytes(addr.clone()), Ipld::Bytes(vec![])]))
                    .collect();
                Ipld::List(vec![Ipld::Link(*cid), Ipld::from(*size), key, Ipld::List(notify)])
            })
            .collect(),
    )
}

fn cbor(value: &Ipld) -> Vec<u8> {
    value.to_cbor().expect("test values are in range")
}
