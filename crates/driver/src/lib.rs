#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

mod core;
pub use core::{Ingestor, LOOP_PAUSE, PROGRESS_INTERVAL};

mod cursor;
pub use cursor::{EpochWindow, IngestCursor, DEFAULT_FILTER_RANGE, FINALITY_DEPTH};

mod errors;
pub use errors::{IngestError, IngestErrorKind};

mod results;
pub use results::StepOutcome;
