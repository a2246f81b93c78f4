//! Long-lived graph operators.
//!
//! A node declares the event types it consumes and produces; the registry
//! routes matching events to it. Delivery never blocks on the node's work:
//! `handle_event` spawns the execution and returns, and a counting semaphore
//! bounds how many executions run at once. Shutdown drains in-flight
//! executions rather than cancelling them.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use ambit_config::PipelineConfig;
use ambit_model::{Event, EventType, ScopePolicy};

use crate::bus::EventBus;
use crate::error::{PipelineError, Result};
use crate::pipeline::context::PipelineContext;
use crate::resolver::ServiceResolver;

/// Unique node identifier within a registry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId(value)
    }
}

/// Static description of a node: identity, subscriptions, and concurrency
/// limits.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub node_id: NodeId,
    pub event_in: BTreeSet<EventType>,
    pub event_out: BTreeSet<EventType>,
    pub max_parallelism: usize,
    pub execution_delay: Duration,
    pub scope_policy: ScopePolicy,
}

impl NodeSpec {
    pub fn new(
        node_id: impl Into<NodeId>,
        event_in: impl IntoIterator<Item = EventType>,
        event_out: impl IntoIterator<Item = EventType>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            event_in: event_in.into_iter().collect(),
            event_out: event_out.into_iter().collect(),
            max_parallelism: 1,
            execution_delay: Duration::ZERO,
            scope_policy: ScopePolicy::None,
        }
    }

    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism.max(1);
        self
    }

    /// Stagger execution start, e.g. to let DNS propagate before crawling.
    pub fn with_execution_delay(mut self, delay: Duration) -> Self {
        self.execution_delay = delay;
        self
    }

    pub fn with_scope_policy(mut self, policy: ScopePolicy) -> Self {
        self.scope_policy = policy;
        self
    }
}

/// Tool-specific behaviour of a node. The runtime around it (scheduling,
/// backpressure, context creation, error swallowing) lives in [`Node`].
///
/// An `Err` from `execute` means the event is dropped: the node runtime logs
/// it and stays healthy for future events. There is no retry and no
/// dead-letter queue; that is a deliberate simplification for best-effort
/// reconnaissance.
#[async_trait]
pub trait NodeLogic: Send + Sync {
    async fn execute(&self, event: Event, ctx: PipelineContext) -> Result<()>;
}

/// Shared collaborators handed to a node when the registry registers it.
/// The single seam through which nodes see the rest of the process.
#[derive(Clone)]
pub(crate) struct NodeWiring {
    pub bus: Arc<dyn EventBus>,
    pub resolver: Arc<ServiceResolver>,
    pub config: Arc<PipelineConfig>,
}

impl fmt::Debug for NodeWiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeWiring")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// A registered graph operator with its concurrency gate and in-flight
/// execution tracking.
pub struct Node {
    spec: NodeSpec,
    logic: Arc<dyn NodeLogic>,
    semaphore: Arc<Semaphore>,
    executions: TaskTracker,
    wiring: OnceLock<NodeWiring>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("spec", &self.spec)
            .field("in_flight", &self.executions.len())
            .field("wired", &self.wiring.get().is_some())
            .finish()
    }
}

impl Node {
    pub fn new(spec: NodeSpec, logic: Arc<dyn NodeLogic>) -> Self {
        let semaphore = Arc::new(Semaphore::new(spec.max_parallelism));
        Self {
            spec,
            logic,
            semaphore,
            executions: TaskTracker::new(),
            wiring: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.spec.node_id
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    pub(crate) fn wire(&self, wiring: NodeWiring) -> Result<()> {
        self.wiring.set(wiring).map_err(|_| {
            PipelineError::Internal(format!("node already wired: {}", self.spec.node_id))
        })
    }

    /// Schedule an execution for `event` and return immediately. Dispatch
    /// must never wait on a node's work; the semaphore inside the spawned
    /// task is what bounds concurrency.
    pub fn handle_event(&self, event: Event) -> Result<()> {
        let wiring = self
            .wiring
            .get()
            .cloned()
            .ok_or_else(|| PipelineError::NotWired(self.spec.node_id.clone()))?;
        if self.executions.is_closed() {
            return Err(PipelineError::NodeStopped(self.spec.node_id.clone()));
        }

        let node_id = self.spec.node_id.clone();
        let scope_policy = self.spec.scope_policy;
        let delay = self.spec.execution_delay;
        let semaphore = self.semaphore.clone();
        let logic = self.logic.clone();

        self.executions.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            if !delay.is_zero() {
                debug!(node = %node_id, delay_ms = delay.as_millis() as u64, "delaying execution");
                tokio::time::sleep(delay).await;
            }

            let ctx = PipelineContext::new(node_id.clone(), wiring, scope_policy);
            let event_type = event.event;
            if let Err(err) = logic.execute(event, ctx).await {
                warn!(
                    node = %node_id,
                    event = %event_type,
                    error = %err,
                    "execution failed; event dropped"
                );
            }
        });

        Ok(())
    }

    /// Drain: wait for every in-flight execution, accept no new events.
    pub async fn stop(&self) {
        self.executions.close();
        let pending = self.executions.len();
        if pending > 0 {
            info!(node = %self.spec.node_id, pending, "waiting for executions to complete");
        }
        self.executions.wait().await;
        info!(node = %self.spec.node_id, "node stopped");
    }
}
