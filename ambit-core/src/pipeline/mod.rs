//! The pipeline core: nodes, the registry that routes events to them, the
//! per-execution context, scope checking, batching, and the generic scan
//! node shape.

pub mod batch;
pub mod context;
pub mod factory;
pub mod node;
pub mod registry;
pub mod scan_node;
pub mod scope;
