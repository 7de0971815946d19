//! The process-wide keyed store of design entities, with merge-on-insert
//! semantics and per-entity JSON persistence. There is no global instance;
//! callers thread an explicit handle through the orchestrator.

pub mod registry;
pub mod store;

pub use registry::ModelRegistry;
pub use store::ModelStore;
