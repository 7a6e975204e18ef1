//! A dynamic DAG-CBOR value model.
//!
//! Event entry values are arbitrary DAG-CBOR: integers, byte strings, CIDs (tag 42), and
//! occasionally lists and maps. [Ipld] holds a decoded value and renders it as DAG-JSON when
//! serialized with serde.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use cid::Cid;
use core::convert::Infallible;
use minicbor::{
    data::{Int, Tag, Type},
    decode, encode, Decoder, Encoder,
};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::BTreeMap;

/// The CBOR tag for CIDs in DAG-CBOR.
const CID_TAG: u64 = 42;

/// The maximum nesting depth accepted when decoding.
const MAX_DEPTH: usize = 64;

/// A decoded DAG-CBOR value.
#[derive(Debug, Clone, PartialEq)]
pub enum Ipld {
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer in the CBOR range `[-2^64, 2^64 - 1]`.
    Integer(i128),
    /// A floating point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// A byte string.
    Bytes(Vec<u8>),
    /// A list of values.
    List(Vec<Ipld>),
    /// A map with string keys.
    Map(BTreeMap<String, Ipld>),
    /// A CID link.
    Link(Cid),
}

impl Ipld {
    /// Decodes a single DAG-CBOR value, rejecting trailing bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, decode::Error> {
        let mut d = Decoder::new(bytes);
        let value = decode_value(&mut d, 0)?;
        if d.position() != bytes.len() {
            return Err(decode::Error::message("trailing bytes after value").at(d.position()));
        }
        Ok(value)
    }

    /// Encodes the value as DAG-CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>, encode::Error<Infallible>> {
        let mut e = Encoder::new(Vec::new());
        encode_value(self, &mut e)?;
        Ok(e.into_writer())
    }

    /// Returns the value as a `u64`, if it is a non-negative integer in range.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Integer(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the CID, if the value is a link.
    pub const fn as_link(&self) -> Option<&Cid> {
        match self {
            Self::Link(cid) => Some(cid),
            _ => None,
        }
    }

    /// Returns `true` if the value is `null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The name of the value's kind, for diagnostics.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Link(_) => "link",
        }
    }
}

impl From<u64> for Ipld {
    fn from(value: u64) -> Self {
        Self::Integer(value as i128)
    }
}

impl From<Cid> for Ipld {
    fn from(value: Cid) -> Self {
        Self::Link(value)
    }
}

impl From<&str> for Ipld {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

fn decode_value(d: &mut Decoder<'_>, depth: usize) -> Result<Ipld, decode::Error> {
    if depth > MAX_DEPTH {
        return Err(decode::Error::message("value nested too deeply").at(d.position()));
    }
    let ty = d.datatype()?;
    let value = match ty {
        Type::Null => {
            d.null()?;
            Ipld::Null
        }
        Type::Bool => Ipld::Bool(d.bool()?),
        Type::U8
        | Type::U16
        | Type::U32
        | Type::U64
        | Type::I8
        | Type::I16
        | Type::I32
        | Type::I64
        | Type::Int => Ipld::Integer(i128::from(d.int()?)),
        Type::F16 | Type::F32 | Type::F64 => Ipld::Float(d.f64()?),
        Type::String => Ipld::String(d.str()?.to_string()),
        Type::Bytes => Ipld::Bytes(d.bytes()?.to_vec()),
        Type::Array => {
            let len = definite(d.array()?, d)?;
            let mut list = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                list.push(decode_value(d, depth + 1)?);
            }
            Ipld::List(list)
        }
        Type::Map => {
            let len = definite(d.map()?, d)?;
            let mut map = BTreeMap::new();
            for _ in 0..len {
                let key = match d.datatype()? {
                    Type::String => d.str()?.to_string(),
                    other => {
                        return Err(decode::Error::message(format!(
                            "map keys must be strings, found {other}"
                        ))
                        .at(d.position()))
                    }
                };
                let value = decode_value(d, depth + 1)?;
                if map.insert(key, value).is_some() {
                    return Err(decode::Error::message("duplicate map key").at(d.position()));
                }
            }
            Ipld::Map(map)
        }
        Type::Tag => {
            let tag = d.tag()?;
            if tag.as_u64() != CID_TAG {
                return Err(decode::Error::message(format!("unsupported tag {}", tag.as_u64()))
                    .at(d.position()));
            }
            Ipld::Link(decode_link(d)?)
        }
        Type::BytesIndef | Type::StringIndef | Type::ArrayIndef | Type::MapIndef => {
            return Err(
                decode::Error::message("indefinite length items are not DAG-CBOR").at(d.position())
            )
        }
        other => return Err(decode::Error::type_mismatch(other).at(d.position())),
    };
    Ok(value)
}

fn definite(len: Option<u64>, d: &Decoder<'_>) -> Result<u64, decode::Error> {
    len.ok_or_else(|| {
        decode::Error::message("indefinite length items are not DAG-CBOR").at(d.position())
    })
}

/// Decodes the byte string of a tag 42 link: a `0x00` multibase prefix followed by a binary CID.
pub(crate) fn decode_link(d: &mut Decoder<'_>) -> Result<Cid, decode::Error> {
    let pos = d.position();
    let bytes = d.bytes()?;
    match bytes.split_first() {
        Some((0, cid)) => Cid::try_from(cid)
            .map_err(|e| decode::Error::message(format!("invalid cid: {e}")).at(pos)),
        _ => Err(decode::Error::message("cid bytes must start with 0x00").at(pos)),
    }
}

fn encode_value(
    value: &Ipld,
    e: &mut Encoder<Vec<u8>>,
) -> Result<(), encode::Error<Infallible>> {
    match value {
        Ipld::Null => {
            e.null()?;
        }
        Ipld::Bool(b) => {
            e.bool(*b)?;
        }
        Ipld::Integer(i) => {
            let int = Int::try_from(*i).map_err(|_| encode::Error::message("integer out of range"))?;
            e.int(int)?;
        }
        Ipld::Float(f) => {
            e.f64(*f)?;
        }
        Ipld::String(s) => {
            e.str(s)?;
        }
        Ipld::Bytes(b) => {
            e.bytes(b)?;
        }
        Ipld::List(list) => {
            e.array(list.len() as u64)?;
            for item in list {
                encode_value(item, e)?;
            }
        }
        Ipld::Map(map) => {
            e.map(map.len() as u64)?;
            for (k, v) in map {
                e.str(k)?;
                encode_value(v, e)?;
            }
        }
        Ipld::Link(cid) => {
            let mut bytes = vec![0u8];
            bytes.extend_from_slice(&cid.to_bytes());
            e.tag(Tag::new(CID_TAG))?.bytes(&bytes)?;
        }
    }
    Ok(())
}

impl Serialize for Ipld {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => {
                if let Ok(i) = i64::try_from(*i) {
                    serializer.serialize_i64(i)
                } else if let Ok(u) = u64::try_from(*i) {
                    serializer.serialize_u64(u)
                } else {
                    serializer.serialize_i128(*i)
                }
            }
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Bytes(b) => {
                let mut inner = BTreeMap::new();
                inner.insert("bytes", STANDARD_NO_PAD.encode(b));
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("/", &inner)?;
                map.end()
            }
            Self::List(list) => serializer.collect_seq(list),
            Self::Map(m) => serializer.collect_map(m),
            Self::Link(cid) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("/", &cid.to_string())?;
                map.end()
            }
        }
    }
}
