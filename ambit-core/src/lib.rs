//! Event-driven reconnaissance pipeline core.
//!
//! Independent scan nodes subscribe to typed events, execute
//! bounded-concurrency work when one arrives, and emit follow-on events
//! through a scope-policy-aware context, forming a processing graph wired
//! only at runtime. The actual CLI tool wrappers, persistence layer, and API
//! surface live elsewhere and reach this crate through the narrow contracts
//! in [`contracts`].

pub mod bus;
pub mod contracts;
pub mod error;
pub mod pipeline;
pub mod resolver;

pub use bus::{EventBus, InProcEventBus};
pub use contracts::{Ingestor, ProcessEventStream, Runner, ScopeRuleSource};
pub use error::{PipelineError, Result};
pub use pipeline::batch::{BatchPolicy, BatchProcessor, batch_stream, batch_stream_dedup};
pub use pipeline::context::{EmitOutcome, PipelineContext};
pub use pipeline::factory::NodeFactory;
pub use pipeline::node::{Node, NodeId, NodeLogic, NodeSpec};
pub use pipeline::registry::{NodeRegistry, PipelineGraph};
pub use pipeline::scan_node::{NoIngest, ScanNode, TargetExtractor};
pub use resolver::ServiceResolver;
