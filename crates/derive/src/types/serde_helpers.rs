//! Serde helpers for the Lotus JSON encodings of CIDs and byte strings.
//!
//! Lotus renders CIDs in the DAG-JSON link form `{"/": "<cid>"}` and byte slices as standard,
//! padded base64 strings (`null` when empty).

use base64::{engine::general_purpose::STANDARD, Engine};
use cid::Cid;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
struct LinkRepr {
    #[serde(rename = "/")]
    link: String,
}

fn parse_link<E: serde::de::Error>(repr: LinkRepr) -> Result<Cid, E> {
    Cid::try_from(repr.link.as_str()).map_err(|e| E::custom(format!("invalid cid {}: {e}", repr.link)))
}

/// `{"/": "<cid>"}` for a single [Cid].
pub mod cid_json {
    use super::*;

    /// Serializes a [Cid] as a DAG-JSON link.
    pub fn serialize<S: Serializer>(cid: &Cid, serializer: S) -> Result<S::Ok, S::Error> {
        LinkRepr { link: cid.to_string() }.serialize(serializer)
    }

    /// Deserializes a DAG-JSON link into a [Cid].
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cid, D::Error> {
        parse_link(LinkRepr::deserialize(deserializer)?)
    }
}

/// A list of DAG-JSON links, as used for tipset keys. `null` reads as an empty list.
pub mod cid_vec_json {
    use super::*;

    /// Serializes a list of [Cid]s as DAG-JSON links.
    pub fn serialize<S: Serializer>(cids: &[Cid], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(cids.iter().map(|c| LinkRepr { link: c.to_string() }))
    }

    /// Deserializes a list of DAG-JSON links.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Cid>, D::Error> {
        Option::<Vec<LinkRepr>>::deserialize(deserializer)?
            .unwrap_or_default()
            .into_iter()
            .map(parse_link)
            .collect()
    }
}

/// An optional base64 byte string.
pub mod bytes_json {
    use super::*;

    /// Serializes bytes as a padded base64 string, or `null`.
    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes a padded base64 string, or `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| STANDARD.decode(s.as_bytes()).map_err(D::Error::custom))
            .transpose()
    }
}
