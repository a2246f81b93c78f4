use thiserror::Error;

use crate::pipeline::node::NodeId;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("node already registered: {0}")]
    DuplicateNode(NodeId),

    #[error("node not wired into a registry: {0}")]
    NotWired(NodeId),

    #[error("node already stopped: {0}")]
    NodeStopped(NodeId),

    #[error("event bus not connected")]
    BusNotConnected,

    #[error("no provider registered for service: {0}")]
    UnresolvedService(&'static str),

    #[error("scan execution failed: {0}")]
    Execution(String),

    #[error("ingestion failed: {0}")]
    Ingest(String),

    #[error("scope rule lookup failed: {0}")]
    ScopeLookup(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
