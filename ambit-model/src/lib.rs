//! Core data model definitions shared across Ambit crates.

pub mod error;
pub mod events;
pub mod ids;
pub mod ingest;
pub mod process;
pub mod scope;

pub use error::{ModelError, Result as ModelResult};
pub use events::{Event, EventType, QueueName};
pub use ids::ProgramId;
pub use ingest::{IngestField, IngestResult};
pub use process::{ProcessEvent, ProcessEventKind};
pub use scope::{RuleType, ScopeAction, ScopePolicy, ScopeRule};
