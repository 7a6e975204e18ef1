//! The schema registry.
//!
//! Event schemas are closed structs over [Ipld] maps: each field has a [FieldKind] and a
//! [Presence], fields not named by the schema are rejected. Auxiliary schemas describe the
//! DAG-CBOR tuples found in miner actor message parameters and receipts; they are decoded into
//! typed structs through [SchemaRegistry::decode_aux].

use crate::{errors::DecodeError, ipld::Ipld};
use minicbor::Decoder;
use std::collections::BTreeMap;

mod builtin;

mod auxiliary;
pub use auxiliary::{
    AuxiliarySchema, BatchReturn, FailCode, PieceActivationManifest, ProveCommitSectors3Params,
    ProveReplicaUpdates3Params, SectorManifest, VerifiedAllocationKey,
};

/// The kind of value a schema field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// An integer.
    Int,
    /// A byte string.
    Bytes,
    /// A CID link.
    Link,
    /// A UTF-8 string.
    String,
    /// A boolean.
    Bool,
    /// A list of `{cid: Link, size: Int}` piece records.
    Pieces,
}

/// Whether a schema field must be present, and whether it may be `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be present and non-null.
    Required,
    /// May be absent; non-null when present.
    Optional,
    /// Must be present; may be `null`.
    Nullable,
}

/// A single field of an [EventSchema].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// The camel-cased field name.
    pub name: &'static str,
    /// The kind of the field's value.
    pub kind: FieldKind,
    /// The field's presence rule.
    pub presence: Presence,
}

impl FieldSpec {
    pub(crate) const fn new(name: &'static str, kind: FieldKind, presence: Presence) -> Self {
        Self { name, kind, presence }
    }
}

/// A closed event schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSchema {
    /// The PascalCase schema name, e.g. `SectorActivatedEvent`.
    pub name: &'static str,
    /// The fields of the schema.
    pub fields: &'static [FieldSpec],
}

impl EventSchema {
    /// Validates a decoded event body, returning the first violation.
    pub fn validate(&self, event: &BTreeMap<String, Ipld>) -> Result<(), String> {
        if let Some(unknown) = event.keys().find(|k| !self.fields.iter().any(|f| f.name == *k)) {
            return Err(format!("unexpected field {unknown}"));
        }
        for field in self.fields {
            match (event.get(field.name), field.presence) {
                (None, Presence::Optional) => {}
                (None, _) => return Err(format!("missing field {}", field.name)),
                (Some(Ipld::Null), Presence::Nullable) => {}
                (Some(value), _) => check_kind(field, value)?,
            }
        }
        Ok(())
    }
}

fn check_kind(field: &FieldSpec, value: &Ipld) -> Result<(), String> {
    let ok = match field.kind {
        FieldKind::Int => matches!(value, Ipld::Integer(_)),
        FieldKind::Bytes => matches!(value, Ipld::Bytes(_)),
        FieldKind::Link => matches!(value, Ipld::Link(_)),
        FieldKind::String => matches!(value, Ipld::String(_)),
        FieldKind::Bool => matches!(value, Ipld::Bool(_)),
        FieldKind::Pieces => return check_pieces(field.name, value),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("field {} expected {:?}, found {}", field.name, field.kind, value.kind_name()))
    }
}

fn check_pieces(name: &str, value: &Ipld) -> Result<(), String> {
    let Ipld::List(pieces) = value else {
        return Err(format!("field {name} expected a list, found {}", value.kind_name()));
    };
    for (i, piece) in pieces.iter().enumerate() {
        let Ipld::Map(piece) = piece else {
            return Err(format!("{name}[{i}] expected a map, found {}", piece.kind_name()));
        };
        match piece.get("cid") {
            Some(Ipld::Link(_)) => {}
            _ => return Err(format!("{name}[{i}].cid must be a link")),
        }
        match piece.get("size") {
            Some(Ipld::Integer(_)) => {}
            _ => return Err(format!("{name}[{i}].size must be an integer")),
        }
        if piece.len() != 2 {
            return Err(format!("{name}[{i}] has unexpected fields"));
        }
    }
    Ok(())
}

/// An immutable registry of event and auxiliary schemas.
///
/// [SchemaRegistry::default] is empty and represents a registry that was never initialized;
/// [SchemaRegistry::builtin] holds the builtin actor event schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    events: BTreeMap<&'static str, EventSchema>,
}

impl SchemaRegistry {
    /// Builds the registry of builtin actor event schemas.
    pub fn builtin() -> Self {
        let events = builtin::EVENT_SCHEMAS
            .iter()
            .map(|schema| (schema.name, schema.clone()))
            .collect();
        Self { events }
    }

    /// Returns `true` if the registry holds any schemas.
    pub fn is_initialized(&self) -> bool {
        !self.events.is_empty()
    }

    /// Looks up an event schema by its PascalCase name.
    pub fn event_schema(&self, name: &str) -> Option<&EventSchema> {
        self.events.get(name)
    }

    /// Returns the names of all registered event schemas.
    pub fn event_schema_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.events.keys().copied()
    }

    /// Decodes and validates an auxiliary structure from DAG-CBOR bytes.
    pub fn decode_aux<T: AuxiliarySchema>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        if !self.is_initialized() {
            return Err(DecodeError::NotInitialized);
        }
        let mut d = Decoder::new(bytes);
        let value = T::decode_cbor(&mut d).map_err(|e| DecodeError::SchemaValidation {
            ty: T::NAME.to_string(),
            schema: T::NAME.to_string(),
            reason: e.to_string(),
        })?;
        if d.position() != bytes.len() {
            return Err(DecodeError::SchemaValidation {
                ty: T::NAME.to_string(),
                schema: T::NAME.to_string(),
                reason: "trailing bytes".to_string(),
            });
        }
        Ok(value)
    }
}
