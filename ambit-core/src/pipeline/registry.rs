//! Node registration and event routing.
//!
//! The registry owns one consumer task per logical queue. Each consumer
//! receives every event on its queue and dispatches by event name to the
//! nodes whose `event_in` declares it. A node rejecting an event never
//! affects delivery to its siblings.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use ambit_config::PipelineConfig;
use ambit_model::{Event, EventType, QueueName};

use crate::bus::EventBus;
use crate::error::{PipelineError, Result};
use crate::pipeline::node::{Node, NodeId, NodeWiring};
use crate::resolver::ServiceResolver;

#[derive(Default)]
struct Routes {
    nodes: RwLock<HashMap<NodeId, Arc<Node>>>,
    by_event: RwLock<HashMap<EventType, Vec<Arc<Node>>>>,
}

impl Routes {
    fn dispatch(&self, event: Event) {
        let consumers: Vec<Arc<Node>> = {
            let by_event = self
                .by_event
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            by_event.get(&event.event).cloned().unwrap_or_default()
        };
        if consumers.is_empty() {
            debug!(event = %event.event, "no node consumes event");
            return;
        }
        for node in consumers {
            if let Err(err) = node.handle_event(event.clone()) {
                warn!(
                    node = %node.id(),
                    event = %event.event,
                    error = %err,
                    "node rejected event"
                );
            }
        }
    }
}

/// Runtime home of the pipeline's nodes.
pub struct NodeRegistry {
    bus: Arc<dyn EventBus>,
    resolver: Arc<ServiceResolver>,
    config: Arc<PipelineConfig>,
    routes: Arc<Routes>,
    cancel: CancellationToken,
    consumers: TaskTracker,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self
            .routes
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("NodeRegistry")
            .field("nodes", &nodes.len())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl NodeRegistry {
    pub fn new(
        bus: Arc<dyn EventBus>,
        resolver: Arc<ServiceResolver>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            bus,
            resolver,
            config,
            routes: Arc::new(Routes::default()),
            cancel: CancellationToken::new(),
            consumers: TaskTracker::new(),
        }
    }

    /// Register `node`, wiring it to this registry's bus and resolver and
    /// indexing its subscriptions.
    pub fn register(&self, node: Node) -> Result<()> {
        let node = Arc::new(node);
        let mut nodes = self
            .routes
            .nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if nodes.contains_key(node.id()) {
            return Err(PipelineError::DuplicateNode(node.id().clone()));
        }
        node.wire(NodeWiring {
            bus: self.bus.clone(),
            resolver: self.resolver.clone(),
            config: self.config.clone(),
        })?;

        let mut by_event = self
            .routes
            .by_event
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for event in &node.spec().event_in {
            by_event.entry(*event).or_default().push(node.clone());
        }
        info!(
            node = %node.id(),
            subscriptions = node.spec().event_in.len(),
            "registered node"
        );
        nodes.insert(node.id().clone(), node);
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.routes
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Connect the bus and start one consumer task per logical queue.
    pub async fn start(&self) -> Result<()> {
        self.bus.connect().await?;
        for queue in QueueName::ALL {
            let mut receiver = self.bus.subscribe(queue);
            let routes = self.routes.clone();
            let cancel = self.cancel.clone();
            self.consumers.spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = receiver.recv() => match received {
                            Ok(event) => routes.dispatch(event),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(queue = %queue, skipped, "consumer lagged; events skipped");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
                debug!(queue = %queue, "consumer stopped");
            });
        }
        info!(queues = QueueName::ALL.len(), "registry started");
        Ok(())
    }

    /// Stop consuming, then drain every node's in-flight executions.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.consumers.close();
        self.consumers.wait().await;

        let nodes: Vec<Arc<Node>> = {
            let nodes = self
                .routes
                .nodes
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            nodes.values().cloned().collect()
        };
        futures::future::join_all(nodes.iter().map(|node| node.stop())).await;
        info!("registry stopped");
    }

    /// Static projection of the processing graph implied by the registered
    /// nodes' event declarations.
    pub fn graph(&self) -> PipelineGraph {
        let nodes = self
            .routes
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut specs: Vec<_> = nodes.values().map(|node| node.spec().clone()).collect();
        specs.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        let mut edges = Vec::new();
        for producer in &specs {
            for consumer in &specs {
                for event in producer.event_out.intersection(&consumer.event_in) {
                    edges.push(GraphEdge {
                        from: producer.node_id.clone(),
                        to: consumer.node_id.clone(),
                        event: *event,
                    });
                }
            }
        }

        PipelineGraph {
            nodes: specs
                .into_iter()
                .map(|spec| GraphNode {
                    id: spec.node_id,
                    event_in: spec.event_in.into_iter().collect(),
                    event_out: spec.event_out.into_iter().collect(),
                })
                .collect(),
            edges,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PipelineGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub event_in: Vec<EventType>,
    pub event_out: Vec<EventType>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub event: EventType,
}
