//! Miner actor prove methods.

use crate::{
    errors::DecodeError,
    registry::{
        ProveCommitSectors3Params, ProveReplicaUpdates3Params, SchemaRegistry, SectorManifest,
    },
    types::EventKind,
};

/// The legacy aggregate prove-commit method number.
pub const PROVE_COMMIT_AGGREGATE: u64 = 26;

/// The `ProveCommitSectors3` method number.
pub const PROVE_COMMIT_SECTORS3: u64 = 34;

/// The `ProveReplicaUpdates3` method number.
pub const PROVE_REPLICA_UPDATES3: u64 = 35;

/// The byte encoding of the ID address `f05`, the storage market actor.
pub const F05_ADDRESS: [u8; 2] = [0x00, 0x05];

/// A miner method that proves sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProveMethod {
    /// Method 26, no manifest; never enriched.
    ProveCommitAggregate,
    /// Method 34.
    ProveCommitSectors3,
    /// Method 35.
    ProveReplicaUpdates3,
}

impl ProveMethod {
    /// Returns the method a proof event of the given kind must originate from.
    pub const fn for_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::SectorActivated => Some(Self::ProveCommitSectors3),
            EventKind::SectorUpdated => Some(Self::ProveReplicaUpdates3),
            _ => None,
        }
    }

    /// Resolves a method number.
    pub const fn from_number(method: u64) -> Option<Self> {
        match method {
            PROVE_COMMIT_AGGREGATE => Some(Self::ProveCommitAggregate),
            PROVE_COMMIT_SECTORS3 => Some(Self::ProveCommitSectors3),
            PROVE_REPLICA_UPDATES3 => Some(Self::ProveReplicaUpdates3),
            _ => None,
        }
    }

    /// Returns the method number.
    pub const fn number(&self) -> u64 {
        match self {
            Self::ProveCommitAggregate => PROVE_COMMIT_AGGREGATE,
            Self::ProveCommitSectors3 => PROVE_COMMIT_SECTORS3,
            Self::ProveReplicaUpdates3 => PROVE_REPLICA_UPDATES3,
        }
    }

    /// Returns the method name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ProveCommitAggregate => "ProveCommitAggregate",
            Self::ProveCommitSectors3 => "ProveCommitSectors3",
            Self::ProveReplicaUpdates3 => "ProveReplicaUpdates3",
        }
    }

    /// Decodes the method parameters into per-sector manifests, in parameter order.
    pub fn decode_manifests(
        &self,
        registry: &SchemaRegistry,
        params: &[u8],
    ) -> Result<Vec<SectorManifest>, DecodeError> {
        match self {
            Self::ProveCommitSectors3 => {
                Ok(registry.decode_aux::<ProveCommitSectors3Params>(params)?.into_manifests())
            }
            Self::ProveReplicaUpdates3 => {
                Ok(registry.decode_aux::<ProveReplicaUpdates3Params>(params)?.into_manifests())
            }
            Self::ProveCommitAggregate => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_numbers() {
        for method in [
            ProveMethod::ProveCommitAggregate,
            ProveMethod::ProveCommitSectors3,
            ProveMethod::ProveReplicaUpdates3,
        ] {
            assert_eq!(ProveMethod::from_number(method.number()), Some(method));
        }
        assert_eq!(ProveMethod::from_number(6), None);
    }

    #[test]
    fn test_expected_method_per_kind() {
        assert_eq!(
            ProveMethod::for_kind(EventKind::SectorActivated),
            Some(ProveMethod::ProveCommitSectors3)
        );
        assert_eq!(
            ProveMethod::for_kind(EventKind::SectorUpdated),
            Some(ProveMethod::ProveReplicaUpdates3)
        );
        assert_eq!(ProveMethod::for_kind(EventKind::SectorPrecommitted), None);
    }
}
