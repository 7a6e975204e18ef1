//! Auxiliary schemas: miner actor message parameters and batch receipts.
//!
//! These are DAG-CBOR tuples (CBOR arrays). Each decoder checks the tuple arity and the kinds of
//! the fields it reads; fields the enricher has no use for are skipped.

use crate::ipld::decode_link;
use cid::Cid;
use minicbor::{data::Type, decode, Decoder};

/// A typed structure decoded from DAG-CBOR.
pub trait AuxiliarySchema: Sized {
    /// The schema name used in diagnostics.
    const NAME: &'static str;

    /// Decodes the structure from the current position of the decoder.
    fn decode_cbor(d: &mut Decoder<'_>) -> Result<Self, decode::Error>;
}

/// The return value of a batched miner method: a success count and the failed positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReturn {
    /// The number of entries that succeeded.
    pub success_count: u64,
    /// The failed entries, by position in the parameter list.
    pub fail_codes: Vec<FailCode>,
}

impl BatchReturn {
    /// Returns `true` if the entry at `index` failed.
    pub fn failed(&self, index: usize) -> bool {
        self.fail_codes.iter().any(|f| f.index as usize == index)
    }
}

/// A single failure marker of a [BatchReturn].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailCode {
    /// The position of the failed entry.
    pub index: u64,
    /// The exit code of the failure.
    pub code: u64,
}

/// The `(client, id)` key of a verified allocation claimed by a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedAllocationKey {
    /// The client actor id.
    pub client: u64,
    /// The allocation id.
    pub id: u64,
}

/// A piece being activated in a sector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceActivationManifest {
    /// The piece CID.
    pub cid: Cid,
    /// The padded piece size.
    pub size: u64,
    /// The verified allocation claimed by the piece, if any.
    pub verified_allocation_key: Option<VerifiedAllocationKey>,
    /// The byte encoded addresses of the actors notified of the activation.
    pub notify: Vec<Vec<u8>>,
}

/// The pieces of one sector, as carried by both prove methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorManifest {
    /// The sector number.
    pub sector: u64,
    /// The pieces of the sector.
    pub pieces: Vec<PieceActivationManifest>,
}

/// The parameters of miner method `ProveCommitSectors3` (34).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProveCommitSectors3Params {
    /// One manifest per proven sector.
    pub sector_activations: Vec<SectorManifest>,
    /// Whether every activation must succeed.
    pub require_activation_success: bool,
    /// Whether every notification must succeed.
    pub require_notification_success: bool,
}

/// The parameters of miner method `ProveReplicaUpdates3` (35).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProveReplicaUpdates3Params {
    /// One manifest per updated sector.
    pub sector_updates: Vec<SectorManifest>,
    /// Whether every activation must succeed.
    pub require_activation_success: bool,
    /// Whether every notification must succeed.
    pub require_notification_success: bool,
}

impl ProveCommitSectors3Params {
    /// Consumes the parameters, yielding the sector manifests in parameter order.
    pub fn into_manifests(self) -> Vec<SectorManifest> {
        self.sector_activations
    }
}

impl ProveReplicaUpdates3Params {
    /// Consumes the parameters, yielding the sector manifests in parameter order.
    pub fn into_manifests(self) -> Vec<SectorManifest> {
        self.sector_updates
    }
}

impl AuxiliarySchema for BatchReturn {
    const NAME: &'static str = "BatchReturn";

    fn decode_cbor(d: &mut Decoder<'_>) -> Result<Self, decode::Error> {
        tuple(d, 2)?;
        let success_count = d.u64()?;
        let fail_codes = list(d, |d| {
            tuple(d, 2)?;
            Ok(FailCode { index: d.u64()?, code: d.u64()? })
        })?;
        Ok(Self { success_count, fail_codes })
    }
}

impl AuxiliarySchema for ProveCommitSectors3Params {
    const NAME: &'static str = "ProveCommitSectors3Params";

    fn decode_cbor(d: &mut Decoder<'_>) -> Result<Self, decode::Error> {
        tuple(d, 6)?;
        let sector_activations = list(d, |d| {
            tuple(d, 2)?;
            let sector = d.u64()?;
            let pieces = list(d, piece_manifest)?;
            Ok(SectorManifest { sector, pieces })
        })?;
        // sector_proofs, aggregate_proof, aggregate_proof_type
        list(d, |d| d.bytes().map(drop))?;
        nullable(d, |d| d.bytes().map(drop))?;
        nullable(d, |d| d.i64().map(drop))?;
        Ok(Self {
            sector_activations,
            require_activation_success: d.bool()?,
            require_notification_success: d.bool()?,
        })
    }
}

impl AuxiliarySchema for ProveReplicaUpdates3Params {
    const NAME: &'static str = "ProveReplicaUpdates3Params";

    fn decode_cbor(d: &mut Decoder<'_>) -> Result<Self, decode::Error> {
        tuple(d, 7)?;
        let sector_updates = list(d, |d| {
            tuple(d, 5)?;
            let sector = d.u64()?;
            // deadline, partition, new_sealed_cid
            d.u64()?;
            d.u64()?;
            link(d)?;
            let pieces = list(d, piece_manifest)?;
            Ok(SectorManifest { sector, pieces })
        })?;
        // sector_proofs, aggregate_proof, update_proofs_type, aggregate_proof_type
        list(d, |d| d.bytes().map(drop))?;
        nullable(d, |d| d.bytes().map(drop))?;
        d.i64()?;
        nullable(d, |d| d.i64().map(drop))?;
        Ok(Self {
            sector_updates,
            require_activation_success: d.bool()?,
            require_notification_success: d.bool()?,
        })
    }
}

fn piece_manifest(d: &mut Decoder<'_>) -> Result<PieceActivationManifest, decode::Error> {
    tuple(d, 4)?;
    let cid = link(d)?;
    let size = d.u64()?;
    let verified_allocation_key = nullable(d, |d| {
        tuple(d, 2)?;
        Ok(VerifiedAllocationKey { client: d.u64()?, id: d.u64()? })
    })?;
    let notify = list(d, |d| {
        tuple(d, 2)?;
        let address = d.bytes()?.to_vec();
        d.bytes()?;
        Ok(address)
    })?;
    Ok(PieceActivationManifest { cid, size, verified_allocation_key, notify })
}

fn tuple(d: &mut Decoder<'_>, arity: u64) -> Result<(), decode::Error> {
    let pos = d.position();
    match d.array()? {
        Some(len) if len == arity => Ok(()),
        Some(len) => {
            Err(decode::Error::message(format!("expected tuple of {arity}, found {len}")).at(pos))
        }
        None => Err(decode::Error::message("indefinite length tuple").at(pos)),
    }
}

fn list<T>(
    d: &mut Decoder<'_>,
    mut item: impl FnMut(&mut Decoder<'_>) -> Result<T, decode::Error>,
) -> Result<Vec<T>, decode::Error> {
    let pos = d.position();
    let len = d
        .array()?
        .ok_or_else(|| decode::Error::message("indefinite length list").at(pos))?;
    (0..len).map(|_| item(d)).collect()
}

fn nullable<T>(
    d: &mut Decoder<'_>,
    item: impl FnOnce(&mut Decoder<'_>) -> Result<T, decode::Error>,
) -> Result<Option<T>, decode::Error> {
    if d.datatype()? == Type::Null {
        d.null()?;
        Ok(None)
    } else {
        item(d).map(Some)
    }
}

fn link(d: &mut Decoder<'_>) -> Result<Cid, decode::Error> {
    let pos = d.position();
    let tag = d.tag()?;
    if tag.as_u64() != 42 {
        return Err(decode::Error::message(format!("expected cid tag, found {}", tag.as_u64()))
            .at(pos));
    }
    decode_link(d)
}
