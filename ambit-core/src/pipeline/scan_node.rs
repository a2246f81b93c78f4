//! Generic run-batch-ingest-emit node logic.
//!
//! Nearly every tool node is the same shape: take the event's targets, run
//! the external tool, re-chunk its output stream into batches, optionally
//! persist each batch, and emit follow-on events for whatever was new.
//! `ScanNode` captures that shape once; a concrete node is just a runner
//! type, an optional ingestor type, and an output mapping.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, pin_mut};
use serde_json::Value;
use tracing::{debug, info};

use ambit_model::{Event, EventType, IngestField, IngestResult, ProgramId};

use crate::contracts::{Ingestor, Runner};
use crate::error::{PipelineError, Result};
use crate::pipeline::batch::BatchProcessor;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::node::NodeLogic;

/// Confidence on events derived from persisted-and-deduplicated entities.
const INGESTED_CONFIDENCE: f64 = 0.7;
/// Confidence on raw pass-through emissions nothing has vetted yet.
const PASS_THROUGH_CONFIDENCE: f64 = 0.5;

/// Pulls the scan targets out of the triggering event. Defaults to the
/// event's own target list; tools that scan something derived from the
/// event (an ASN lookup keyed by organization, say) install their own.
pub type TargetExtractor = Arc<dyn Fn(&Event) -> Vec<String> + Send + Sync>;

/// Placeholder ingestor type for pass-through nodes. Never invoked; the
/// emission plan of a pass-through node skips ingestion entirely.
#[derive(Debug)]
pub struct NoIngest;

#[async_trait]
impl Ingestor for NoIngest {
    async fn ingest(&self, _program_id: ProgramId, _batch: &[Value]) -> Result<IngestResult> {
        Err(PipelineError::Internal(
            "scan node has no ingestor configured".into(),
        ))
    }
}

enum EmitPlan {
    /// Persist each batch, then emit one event per novel entity according
    /// to the event-to-field mapping.
    Ingest(Vec<(EventType, IngestField)>),
    /// Emit each batch item directly, one event per item.
    PassThrough(Vec<EventType>),
}

/// Node logic parameterized over a tool runner and an ingestor, both
/// resolved fresh for every execution.
pub struct ScanNode<R, I = NoIngest> {
    processor: BatchProcessor,
    plan: EmitPlan,
    extractor: Option<TargetExtractor>,
    _services: PhantomData<fn() -> (R, I)>,
}

impl<R, I> std::fmt::Debug for ScanNode<R, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.plan {
            EmitPlan::Ingest(outputs) => ("ingest", outputs.len()),
            EmitPlan::PassThrough(outputs) => ("pass_through", outputs.len()),
        };
        f.debug_struct("ScanNode")
            .field("processor", &self.processor)
            .field("mode", &mode.0)
            .field("outputs", &mode.1)
            .finish_non_exhaustive()
    }
}

impl<R> ScanNode<R>
where
    R: Runner + Send + 'static,
{
    /// A node that forwards tool output without persisting it.
    pub fn pass_through(
        processor: BatchProcessor,
        outputs: impl IntoIterator<Item = EventType>,
    ) -> Self {
        Self {
            processor,
            plan: EmitPlan::PassThrough(outputs.into_iter().collect()),
            extractor: None,
            _services: PhantomData,
        }
    }
}

impl<R, I> ScanNode<R, I>
where
    R: Runner + Send + 'static,
    I: Ingestor + Send + 'static,
{
    /// A node that persists batches and only propagates novel entities.
    pub fn ingesting(
        processor: BatchProcessor,
        outputs: impl IntoIterator<Item = (EventType, IngestField)>,
    ) -> Self {
        Self {
            processor,
            plan: EmitPlan::Ingest(outputs.into_iter().collect()),
            extractor: None,
            _services: PhantomData,
        }
    }

    pub fn with_target_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&Event) -> Vec<String> + Send + Sync + 'static,
    {
        self.extractor = Some(Arc::new(extractor));
        self
    }
}

#[async_trait]
impl<R, I> NodeLogic for ScanNode<R, I>
where
    R: Runner + Send + 'static,
    I: Ingestor + Send + 'static,
{
    async fn execute(&self, event: Event, ctx: PipelineContext) -> Result<()> {
        let targets = match &self.extractor {
            Some(extract) => extract(&event),
            None => event.targets.clone(),
        };
        if targets.is_empty() {
            debug!(node = %ctx.node_id(), event = %event.event, "no targets to scan");
            return Ok(());
        }

        let runner = ctx.get_service::<R>()?;
        let ingestor = match &self.plan {
            EmitPlan::Ingest(_) => Some(ctx.get_service::<I>()?),
            EmitPlan::PassThrough(_) => None,
        };

        info!(
            node = %ctx.node_id(),
            event = %event.event,
            targets = targets.len(),
            "starting scan"
        );
        let batches = self.processor.batch_stream(runner.run(&targets));
        pin_mut!(batches);

        // Batches are handled serially: an execution never interleaves its
        // own ingest calls.
        let mut batch_count = 0usize;
        while let Some(batch) = batches.next().await {
            batch_count += 1;
            match &self.plan {
                EmitPlan::Ingest(outputs) => {
                    let Some(ingestor) = ingestor.as_ref() else {
                        break;
                    };
                    let result = ingestor.ingest(event.program_id, &batch).await?;
                    for (out_event, field) in outputs {
                        for entity in result.field(*field) {
                            ctx.emit(
                                *out_event,
                                vec![entity.clone()],
                                event.program_id,
                                None,
                                INGESTED_CONFIDENCE,
                            )
                            .await?;
                        }
                    }
                }
                EmitPlan::PassThrough(outputs) => {
                    for out_event in outputs {
                        for item in &batch {
                            let target = match item.as_str() {
                                Some(s) => s.to_owned(),
                                None => item.to_string(),
                            };
                            ctx.emit(
                                *out_event,
                                vec![target],
                                event.program_id,
                                None,
                                PASS_THROUGH_CONFIDENCE,
                            )
                            .await?;
                        }
                    }
                }
            }
        }
        info!(node = %ctx.node_id(), batches = batch_count, "scan complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use futures::stream;
    use tokio::sync::broadcast;

    use ambit_config::PipelineConfig;
    use ambit_model::{ProcessEvent, QueueName, ScopePolicy};

    use crate::bus::{EventBus, InProcEventBus};
    use crate::contracts::ProcessEventStream;
    use crate::pipeline::batch::BatchPolicy;
    use crate::pipeline::node::NodeWiring;
    use crate::resolver::ServiceResolver;

    #[derive(Clone)]
    struct FakeRunner {
        items: Vec<&'static str>,
    }

    impl Runner for FakeRunner {
        fn run(&self, _targets: &[String]) -> ProcessEventStream {
            let events: Vec<ProcessEvent> = self
                .items
                .iter()
                .map(|item| ProcessEvent::result(*item))
                .collect();
            Box::pin(stream::iter(events))
        }
    }

    /// Persists nothing; reports every string in the batch as a new host
    /// and records batch sizes.
    #[derive(Clone, Default)]
    struct EchoIngestor {
        batch_sizes: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl Ingestor for EchoIngestor {
        async fn ingest(&self, _program_id: ProgramId, batch: &[Value]) -> Result<IngestResult> {
            self.batch_sizes.lock().unwrap().push(batch.len());
            Ok(IngestResult {
                new_hosts: batch
                    .iter()
                    .filter_map(|value| value.as_str().map(str::to_owned))
                    .collect(),
                ..Default::default()
            })
        }
    }

    fn policy() -> BatchPolicy {
        BatchPolicy::new(1, 2, Duration::from_secs(600))
    }

    async fn context(resolver: ServiceResolver) -> (PipelineContext, broadcast::Receiver<Event>) {
        let bus = Arc::new(InProcEventBus::new(64));
        bus.connect().await.unwrap();
        let receiver = bus.subscribe(QueueName::Analysis);
        let wiring = NodeWiring {
            bus,
            resolver: Arc::new(resolver),
            config: Arc::new(PipelineConfig::default()),
        };
        (
            PipelineContext::new("httpx".into(), wiring, ScopePolicy::None),
            receiver,
        )
    }

    fn trigger() -> Event {
        Event::new(
            EventType::HttpxScanRequested,
            ProgramId::new(),
            vec!["example.com".into()],
        )
    }

    fn drain(receiver: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn ingesting_node_emits_one_event_per_novel_entity() {
        let mut resolver = ServiceResolver::new();
        resolver.provide(|| FakeRunner {
            items: vec!["a.example.com", "b.example.com", "c.example.com"],
        });
        let ingestor = EchoIngestor::default();
        let sizes = ingestor.batch_sizes.clone();
        resolver.provide(move || ingestor.clone());

        let node: ScanNode<FakeRunner, EchoIngestor> = ScanNode::ingesting(
            BatchProcessor::results(policy()),
            [(EventType::HostDiscovered, IngestField::NewHosts)],
        );
        let (ctx, mut rx) = context(resolver).await;
        node.execute(trigger(), ctx).await.unwrap();

        // Ceiling of 2 splits three results into two serial ingest calls.
        assert_eq!(*sizes.lock().unwrap(), [2, 1]);

        let emitted = drain(&mut rx);
        assert_eq!(emitted.len(), 3);
        for event in &emitted {
            assert_eq!(event.event, EventType::HostDiscovered);
            assert_eq!(event.targets.len(), 1);
            assert_eq!(event.confidence, INGESTED_CONFIDENCE);
            assert_eq!(event.source, "httpx");
        }
        assert_eq!(emitted[0].targets, ["a.example.com"]);
    }

    #[tokio::test]
    async fn pass_through_node_emits_each_item_without_an_ingestor() {
        let mut resolver = ServiceResolver::new();
        resolver.provide(|| FakeRunner {
            items: vec!["https://a.example.com/x", "https://a.example.com/y"],
        });

        let node: ScanNode<FakeRunner> = ScanNode::pass_through(
            BatchProcessor::results(policy()),
            [EventType::GauDiscovered],
        );
        let (ctx, mut rx) = context(resolver).await;
        node.execute(trigger(), ctx).await.unwrap();

        let emitted = drain(&mut rx);
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].targets, ["https://a.example.com/x"]);
        assert_eq!(emitted[1].targets, ["https://a.example.com/y"]);
        assert!(emitted
            .iter()
            .all(|event| event.confidence == PASS_THROUGH_CONFIDENCE));
    }

    #[tokio::test]
    async fn empty_targets_skip_the_scan_without_resolving_services() {
        // An empty resolver would fail any service lookup; succeeding here
        // proves nothing was resolved.
        let node: ScanNode<FakeRunner> = ScanNode::pass_through(
            BatchProcessor::results(policy()),
            [EventType::GauDiscovered],
        );
        let (ctx, mut rx) = context(ServiceResolver::new()).await;
        let event = Event::new(EventType::HttpxScanRequested, ProgramId::new(), vec![]);
        node.execute(event, ctx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn custom_extractor_overrides_the_event_targets() {
        let seen_targets = Arc::new(Mutex::new(Vec::new()));

        #[derive(Clone)]
        struct RecordingRunner {
            seen: Arc<Mutex<Vec<String>>>,
        }

        impl Runner for RecordingRunner {
            fn run(&self, targets: &[String]) -> ProcessEventStream {
                self.seen.lock().unwrap().extend(targets.iter().cloned());
                Box::pin(stream::empty())
            }
        }

        let mut resolver = ServiceResolver::new();
        let runner = RecordingRunner {
            seen: seen_targets.clone(),
        };
        resolver.provide(move || runner.clone());
        let ingestor = EchoIngestor::default();
        resolver.provide(move || ingestor.clone());

        let node: ScanNode<RecordingRunner, EchoIngestor> = ScanNode::ingesting(
            BatchProcessor::results(policy()),
            [(EventType::HostDiscovered, IngestField::NewHosts)],
        )
        .with_target_extractor(|event| {
            event.targets.iter().map(|t| format!("www.{t}")).collect()
        });

        let (ctx, _rx) = context(resolver).await;
        node.execute(trigger(), ctx).await.unwrap();
        assert_eq!(*seen_targets.lock().unwrap(), ["www.example.com"]);
    }
}
