use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle tag on a runner's output stream.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessEventKind {
    Started,
    Stdout,
    Stderr,
    Result,
    Terminated,
    Timeout,
    Failed,
}

/// One element of the lazy sequence a runner yields while the external tool
/// executes. The core only inspects `kind`; `payload` stays opaque until a
/// batch processor's extractor looks at it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessEvent {
    #[serde(rename = "type")]
    pub kind: ProcessEventKind,
    #[serde(default)]
    pub payload: Value,
}

impl ProcessEvent {
    pub fn new(kind: ProcessEventKind, payload: impl Into<Value>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn result(payload: impl Into<Value>) -> Self {
        Self::new(ProcessEventKind::Result, payload)
    }

    pub fn stdout(line: impl Into<String>) -> Self {
        Self::new(ProcessEventKind::Stdout, Value::String(line.into()))
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        Self::new(ProcessEventKind::Stderr, Value::String(line.into()))
    }
}
