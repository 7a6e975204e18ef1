//! Wire and domain types shared by the decoder, the enricher and the chain API.

pub mod serde_helpers;

mod kind;
pub use kind::{EventKind, UnknownEventKind};

mod event;
pub use event::{DdoExtra, DecodedEvent, EventEntry, ManifestPiece, RawEvent};

mod chain;
pub use chain::{Message, MessageReceipt, MsgLookup, TipSet};
