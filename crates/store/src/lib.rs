#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::{
        compile::{Compactor, CompileSummary, CompiledRecord},
        errors::{CompileError, StoreError},
        layout::StoreLayout,
        partition::{PartitionFile, PartitionRange, EPOCH_QUANTUM},
        store::{PartitionedStore, RepairPolicy},
    };
}

pub mod compile;
pub use compile::{Compactor, CompileSummary, CompiledRecord};

pub mod errors;
pub use errors::{CompileError, StoreError};

mod layout;
pub use layout::StoreLayout;

mod partition;
pub use partition::{PartitionFile, PartitionRange, EPOCH_QUANTUM};

mod store;
pub use store::{PartitionedStore, RepairPolicy};
