//! Canonical tipset keys.

use cid::Cid;
use core::convert::Infallible;
use minicbor::{encode, Encoder};
use multihash_codetable::{Code, MultihashDigest};

/// The DAG-CBOR codec.
const DAG_CBOR: u64 = 0x71;

/// The key of a tipset: the concatenated binary CIDs of its blocks, in tipset order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TipSetKey {
    encoded: Vec<u8>,
}

impl TipSetKey {
    /// Creates the key of the tipset made of `cids`.
    pub fn new(cids: &[Cid]) -> Self {
        Self { encoded: cids.iter().flat_map(|cid| cid.to_bytes()).collect() }
    }

    /// Returns `true` if the key names no blocks.
    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// Returns the content identifier of the key: the blake2b-256 hash of the key encoded as a
    /// DAG-CBOR byte string, as a DAG-CBOR CIDv1.
    pub fn cid(&self) -> Result<Cid, encode::Error<Infallible>> {
        let mut e = Encoder::new(Vec::with_capacity(self.encoded.len() + 9));
        e.bytes(&self.encoded)?;
        Ok(Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&e.into_writer())))
    }
}
