//! Per-execution emission context.
//!
//! Every node execution gets a fresh context carrying the bus, the service
//! resolver, and the node's scope policy. All outbound events pass through
//! [`PipelineContext::emit`], which is the single enforcement point for
//! scope: a node cannot leak an out-of-scope target downstream by accident.

use std::sync::Arc;

use tracing::debug;

use ambit_config::PipelineConfig;
use ambit_model::{Event, EventType, ProgramId, ScopePolicy, ScopeRule};

use crate::contracts::ScopeRuleSource;
use crate::error::Result;
use crate::pipeline::node::{NodeId, NodeWiring};
use crate::pipeline::scope::filter_in_scope;

/// Confidence assigned to targets that positively matched the program's
/// scope rules under the confidence policy.
const IN_SCOPE_CONFIDENCE: f64 = 0.9;

/// What happened to an emission. Nodes mostly ignore this; tests and
/// diagnostics read it.
#[derive(Clone, Debug, PartialEq)]
pub enum EmitOutcome {
    /// Published with exactly these targets.
    Published { targets: Vec<String> },
    /// Nothing to publish.
    NoTargets,
    /// Strict policy dropped every target.
    OutOfScope,
    /// Confidence policy: nothing in scope and the emission's confidence
    /// did not clear the pass-through threshold.
    BelowThreshold,
}

pub struct PipelineContext {
    node_id: NodeId,
    wiring: NodeWiring,
    scope_policy: ScopePolicy,
    confidence_threshold: f64,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("node_id", &self.node_id)
            .field("scope_policy", &self.scope_policy)
            .field("confidence_threshold", &self.confidence_threshold)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    pub(crate) fn new(node_id: NodeId, wiring: NodeWiring, scope_policy: ScopePolicy) -> Self {
        let confidence_threshold = wiring.config.scope.confidence_threshold;
        Self {
            node_id,
            wiring,
            scope_policy,
            confidence_threshold,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.wiring.config
    }

    /// Resolve a fresh, execution-scoped instance of `T`.
    pub fn get_service<T: Send + 'static>(&self) -> Result<T> {
        self.wiring.resolver.resolve::<T>()
    }

    /// Publish `event` for `targets`, applying this node's scope policy.
    ///
    /// `source` defaults to the node id. Under the confidence policy an
    /// emission with nothing in scope still goes through, unfiltered, when
    /// its confidence clears the configured threshold; this is what lets
    /// certificate SANs and similar strong signals widen the scan surface.
    pub async fn emit(
        &self,
        event: EventType,
        targets: Vec<String>,
        program_id: ProgramId,
        source: Option<&str>,
        confidence: f64,
    ) -> Result<EmitOutcome> {
        if targets.is_empty() {
            debug!(node = %self.node_id, event = %event, "emit with no targets; nothing published");
            return Ok(EmitOutcome::NoTargets);
        }
        let source = source.unwrap_or(self.node_id.as_str());

        match self.scope_policy {
            ScopePolicy::None => {
                self.publish(event, targets.clone(), program_id, source, confidence)
                    .await?;
                Ok(EmitOutcome::Published { targets })
            }
            ScopePolicy::Strict => {
                let rules = self.scope_rules(program_id).await?;
                let (in_scope, dropped) = filter_in_scope(&targets, &rules);
                if !dropped.is_empty() {
                    debug!(
                        node = %self.node_id,
                        event = %event,
                        dropped = dropped.len(),
                        "dropped out-of-scope targets"
                    );
                }
                if in_scope.is_empty() {
                    return Ok(EmitOutcome::OutOfScope);
                }
                self.publish(event, in_scope.clone(), program_id, source, confidence)
                    .await?;
                Ok(EmitOutcome::Published { targets: in_scope })
            }
            ScopePolicy::Confidence => {
                let rules = self.scope_rules(program_id).await?;
                let (in_scope, _) = filter_in_scope(&targets, &rules);
                if !in_scope.is_empty() {
                    let boosted = confidence.max(IN_SCOPE_CONFIDENCE);
                    self.publish(event, in_scope.clone(), program_id, source, boosted)
                        .await?;
                    return Ok(EmitOutcome::Published { targets: in_scope });
                }
                if confidence >= self.confidence_threshold {
                    self.publish(event, targets.clone(), program_id, source, confidence)
                        .await?;
                    return Ok(EmitOutcome::Published { targets });
                }
                debug!(
                    node = %self.node_id,
                    event = %event,
                    confidence,
                    threshold = self.confidence_threshold,
                    "nothing in scope and confidence below threshold; emission dropped"
                );
                Ok(EmitOutcome::BelowThreshold)
            }
        }
    }

    async fn publish(
        &self,
        event: EventType,
        targets: Vec<String>,
        program_id: ProgramId,
        source: &str,
        confidence: f64,
    ) -> Result<()> {
        let outgoing = Event::new(event, program_id, targets)
            .with_source(source)
            .with_confidence(confidence);
        self.wiring.bus.publish(outgoing).await
    }

    async fn scope_rules(&self, program_id: ProgramId) -> Result<Vec<ScopeRule>> {
        let source = self.get_service::<Arc<dyn ScopeRuleSource>>()?;
        source.find_by_program(program_id).await
    }
}
