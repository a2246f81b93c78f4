//! Assembles nodes from configuration.
//!
//! The factory is the one place configuration defaults meet node
//! construction: concurrency limits and the default scope policy come from
//! [`PipelineConfig`], and batch thresholds are looked up per tool. Nodes
//! needing a custom extractor or deduplication assemble their `ScanNode`
//! directly and hand it to [`NodeFactory::node`].

use std::sync::Arc;

use ambit_config::PipelineConfig;
use ambit_model::{EventType, IngestField};

use crate::contracts::{Ingestor, Runner};
use crate::pipeline::batch::BatchProcessor;
use crate::pipeline::node::{Node, NodeId, NodeLogic, NodeSpec};
use crate::pipeline::scan_node::ScanNode;

#[derive(Clone, Debug)]
pub struct NodeFactory {
    config: Arc<PipelineConfig>,
}

impl NodeFactory {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    /// A spec seeded with the configured node defaults.
    pub fn spec(
        &self,
        node_id: impl Into<NodeId>,
        event_in: impl IntoIterator<Item = EventType>,
        event_out: impl IntoIterator<Item = EventType>,
    ) -> NodeSpec {
        NodeSpec::new(node_id, event_in, event_out)
            .with_max_parallelism(self.config.node.max_parallelism)
            .with_execution_delay(self.config.node.execution_delay())
            .with_scope_policy(self.config.scope.default_policy)
    }

    /// Result-payload batch processor with `tool`'s merged thresholds.
    pub fn batch_processor(&self, tool: &str) -> BatchProcessor {
        BatchProcessor::results(self.config.batch_for(tool))
    }

    pub fn node(&self, spec: NodeSpec, logic: impl NodeLogic + 'static) -> Node {
        Node::new(spec, Arc::new(logic))
    }

    /// The common ingesting tool node: run, persist batches, emit one event
    /// per novel entity. `event_out` is derived from the output mapping.
    pub fn ingesting_node<R, I>(
        &self,
        node_id: impl Into<NodeId>,
        event_in: impl IntoIterator<Item = EventType>,
        outputs: impl IntoIterator<Item = (EventType, IngestField)>,
    ) -> Node
    where
        R: Runner + Send + 'static,
        I: Ingestor + Send + 'static,
    {
        let node_id = node_id.into();
        let outputs: Vec<(EventType, IngestField)> = outputs.into_iter().collect();
        let processor = self.batch_processor(node_id.as_str());
        let logic = ScanNode::<R, I>::ingesting(processor, outputs.iter().copied());
        let spec = self.spec(node_id, event_in, outputs.iter().map(|(event, _)| *event));
        self.node(spec, logic)
    }

    /// A tool node that forwards results without persistence.
    pub fn pass_through_node<R>(
        &self,
        node_id: impl Into<NodeId>,
        event_in: impl IntoIterator<Item = EventType>,
        outputs: impl IntoIterator<Item = EventType>,
    ) -> Node
    where
        R: Runner + Send + 'static,
    {
        let node_id = node_id.into();
        let outputs: Vec<EventType> = outputs.into_iter().collect();
        let processor = self.batch_processor(node_id.as_str());
        let logic = ScanNode::<R>::pass_through(processor, outputs.iter().copied());
        let spec = self.spec(node_id, event_in, outputs);
        self.node(spec, logic)
    }
}
