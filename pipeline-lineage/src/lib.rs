// Pipeline Lineage Library
// Combinatorial module-set dispatch with per-path lineage keys

pub mod error;
pub mod events;
pub mod graph;
pub mod key;
pub mod module;
pub mod module_set;
pub mod store;

// Re-export commonly used types
pub use error::{LineageError, LineageResult, ModuleError};

// Re-export key types
pub use key::{common_prefix_length, make_segment, CompositeKey, KeyJoin, Segment};

// Re-export store types
pub use store::{init_args, OutputStore, StoreRecord};

// Re-export module types
pub use module::{module_fn, Applicable, Fittable, FnModule, Predictable};
pub use module_set::{FitState, FittedStore, LineageMatching, ModuleSet, ModuleSetOptions};

// Re-export event types
pub use events::{progress_channel, LineageEvent, Operation, ProgressReceiver, ProgressSender};

// Re-export graph types
pub use graph::{
    build_ancestry_tree, build_graph, AncestryNode, AncestryTree, LineageGraph,
};
