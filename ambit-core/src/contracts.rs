//! Contracts for the collaborators this core consumes but does not own:
//! external tool runners, the persistence-side ingestors, and the scope-rule
//! store.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use ambit_model::{IngestResult, ProcessEvent, ProgramId, ScopeRule};

use crate::error::Result;

/// Lazy sequence of process events from a running external tool.
pub type ProcessEventStream = Pin<Box<dyn Stream<Item = ProcessEvent> + Send>>;

/// Wrapper around an external CLI tool. Spawning, argument construction, and
/// timeout handling all live behind this seam; the pipeline only consumes
/// the event stream.
pub trait Runner: Send + Sync {
    fn run(&self, targets: &[String]) -> ProcessEventStream;
}

/// Persists a batch of tool results and reports which entities were actually
/// new, so only novel discoveries propagate further.
#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, program_id: ProgramId, batch: &[Value]) -> Result<IngestResult>;
}

/// Read access to a program's persisted scope rules. The one place the
/// pipeline context reaches toward storage, and only for rules.
#[async_trait]
pub trait ScopeRuleSource: Send + Sync {
    async fn find_by_program(&self, program_id: ProgramId) -> Result<Vec<ScopeRule>>;
}
