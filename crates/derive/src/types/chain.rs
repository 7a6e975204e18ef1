//! Lotus chain objects consumed by the enricher and the ingestion loop.

use super::serde_helpers::{bytes_json, cid_json, cid_vec_json};
use cid::Cid;
use serde::{Deserialize, Serialize};

/// A tipset, reduced to its key and height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TipSet {
    /// The block CIDs forming the tipset key.
    #[serde(with = "cid_vec_json")]
    pub cids: Vec<Cid>,
    /// The tipset epoch.
    pub height: u64,
}

/// An unsigned chain message as returned by `Filecoin.ChainGetMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    /// The receiving actor address.
    pub to: String,
    /// The sending actor address.
    pub from: String,
    /// The sender nonce.
    pub nonce: u64,
    /// The invoked method number.
    pub method: u64,
    /// The CBOR encoded method parameters.
    #[serde(with = "bytes_json", default)]
    pub params: Option<Vec<u8>>,
}

/// The execution receipt of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageReceipt {
    /// The exit code of the invocation.
    pub exit_code: i64,
    /// The CBOR encoded return value.
    #[serde(rename = "Return", with = "bytes_json", default)]
    pub return_data: Option<Vec<u8>>,
    /// Gas consumed by the invocation.
    pub gas_used: i64,
}

/// The result of `Filecoin.StateSearchMsg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgLookup {
    /// The CID of the executed message.
    #[serde(with = "cid_json")]
    pub message: Cid,
    /// The execution receipt.
    pub receipt: MessageReceipt,
    /// The tipset the message was executed in.
    #[serde(with = "cid_vec_json")]
    pub tip_set: Vec<Cid>,
    /// The epoch of that tipset.
    pub height: u64,
}
