//! Field tables of the builtin actor event schemas.

use super::{
    EventSchema, FieldKind as K, FieldSpec as F,
    Presence::{Nullable, Optional, Required},
};

const VERIFIER_BALANCE: &[F] = &[
    F::new("verifier", K::Int, Required),
    F::new("client", K::Int, Optional),
    F::new("balance", K::Bytes, Optional),
];

const ALLOCATION: &[F] = &[
    F::new("id", K::Int, Optional),
    F::new("client", K::Int, Optional),
    F::new("provider", K::Int, Optional),
    F::new("pieceCid", K::Link, Optional),
    F::new("pieceSize", K::Int, Optional),
    F::new("termMin", K::Int, Optional),
    F::new("termMax", K::Int, Optional),
    F::new("expiration", K::Int, Optional),
];

const CLAIM: &[F] = &[
    F::new("id", K::Int, Optional),
    F::new("client", K::Int, Optional),
    F::new("provider", K::Int, Optional),
    F::new("pieceCid", K::Link, Optional),
    F::new("pieceSize", K::Int, Optional),
    F::new("termMin", K::Int, Optional),
    F::new("termMax", K::Int, Optional),
    F::new("termStart", K::Int, Optional),
    F::new("sector", K::Int, Optional),
];

const DEAL: &[F] = &[
    F::new("id", K::Int, Optional),
    F::new("client", K::Int, Optional),
    F::new("provider", K::Int, Optional),
];

const SECTOR: &[F] = &[F::new("sector", K::Int, Required)];

const SECTOR_WITH_PIECES: &[F] = &[
    F::new("sector", K::Int, Required),
    F::new("unsealedCid", K::Link, Nullable),
    F::new("pieces", K::Pieces, Required),
];

pub(super) const EVENT_SCHEMAS: &[EventSchema] = &[
    EventSchema { name: "VerifierBalanceEvent", fields: VERIFIER_BALANCE },
    EventSchema { name: "AllocationEvent", fields: ALLOCATION },
    EventSchema { name: "AllocationRemovedEvent", fields: ALLOCATION },
    EventSchema { name: "ClaimEvent", fields: CLAIM },
    EventSchema { name: "ClaimUpdatedEvent", fields: CLAIM },
    EventSchema { name: "ClaimRemovedEvent", fields: CLAIM },
    EventSchema { name: "DealPublishedEvent", fields: DEAL },
    EventSchema { name: "DealActivatedEvent", fields: DEAL },
    EventSchema { name: "DealTerminatedEvent", fields: DEAL },
    EventSchema { name: "DealCompletedEvent", fields: DEAL },
    EventSchema { name: "SectorPrecommittedEvent", fields: SECTOR },
    EventSchema { name: "SectorActivatedEvent", fields: SECTOR_WITH_PIECES },
    EventSchema { name: "SectorUpdatedEvent", fields: SECTOR_WITH_PIECES },
    EventSchema { name: "SectorTerminatedEvent", fields: SECTOR },
];
