//! Asynchronous publish/subscribe transport for pipeline events.
//!
//! The bus is a pure transport: it partitions traffic into the four fixed
//! logical queues and fans each event out to every subscriber of its queue.
//! Routing to individual nodes happens in the registry, by event name.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use ambit_model::{Event, QueueName};

use crate::error::{PipelineError, Result};

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Establish the transport. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Fire-and-forget publish. Never blocks on slow consumers; publishing
    /// before `connect` is a programming error, not a transport failure.
    async fn publish(&self, event: Event) -> Result<()>;

    /// Receiver for every event published into `queue`.
    fn subscribe(&self, queue: QueueName) -> broadcast::Receiver<Event>;
}

/// In-process event bus that fans pipeline events out over per-queue
/// broadcast channels. Keeps the wiring flexible while we decide how and
/// when to plug in an external message broker.
pub struct InProcEventBus {
    discovery: broadcast::Sender<Event>,
    enumeration: broadcast::Sender<Event>,
    validation: broadcast::Sender<Event>,
    analysis: broadcast::Sender<Event>,
    capacity: usize,
    connected: AtomicBool,
}

impl InProcEventBus {
    pub fn new(capacity: usize) -> Self {
        let (discovery, _) = broadcast::channel(capacity);
        let (enumeration, _) = broadcast::channel(capacity);
        let (validation, _) = broadcast::channel(capacity);
        let (analysis, _) = broadcast::channel(capacity);
        Self {
            discovery,
            enumeration,
            validation,
            analysis,
            capacity,
            connected: AtomicBool::new(false),
        }
    }

    fn sender(&self, queue: QueueName) -> &broadcast::Sender<Event> {
        match queue {
            QueueName::Discovery => &self.discovery,
            QueueName::Enumeration => &self.enumeration,
            QueueName::Validation => &self.validation,
            QueueName::Analysis => &self.analysis,
        }
    }
}

impl fmt::Debug for InProcEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcEventBus")
            .field("capacity", &self.capacity)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("discovery_subscribers", &self.discovery.receiver_count())
            .field(
                "enumeration_subscribers",
                &self.enumeration.receiver_count(),
            )
            .field("validation_subscribers", &self.validation.receiver_count())
            .field("analysis_subscribers", &self.analysis.receiver_count())
            .finish()
    }
}

#[async_trait]
impl EventBus for InProcEventBus {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, event: Event) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(PipelineError::BusNotConnected);
        }
        // A zero-receiver send only means nobody is listening yet.
        let _ = self.sender(event.event.queue()).send(event);
        Ok(())
    }

    fn subscribe(&self, queue: QueueName) -> broadcast::Receiver<Event> {
        self.sender(queue).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambit_model::{EventType, ProgramId};

    #[tokio::test]
    async fn publish_requires_connect() {
        let bus = InProcEventBus::new(16);
        let event = Event::new(EventType::HostDiscovered, ProgramId::new(), vec![]);
        assert!(matches!(
            bus.publish(event.clone()).await,
            Err(PipelineError::BusNotConnected)
        ));

        bus.connect().await.unwrap();
        bus.connect().await.unwrap(); // idempotent
        bus.publish(event).await.unwrap();
    }

    #[tokio::test]
    async fn events_land_on_their_partition_queue() {
        let bus = InProcEventBus::new(16);
        bus.connect().await.unwrap();

        let mut discovery = bus.subscribe(QueueName::Discovery);
        let mut analysis = bus.subscribe(QueueName::Analysis);

        let program = ProgramId::new();
        bus.publish(Event::new(
            EventType::SubdomainDiscovered,
            program,
            vec!["a.example.com".into()],
        ))
        .await
        .unwrap();
        bus.publish(Event::new(
            EventType::HostDiscovered,
            program,
            vec!["b.example.com".into()],
        ))
        .await
        .unwrap();

        let got = discovery.recv().await.unwrap();
        assert_eq!(got.event, EventType::SubdomainDiscovered);
        assert!(discovery.try_recv().is_err());

        let got = analysis.recv().await.unwrap();
        assert_eq!(got.event, EventType::HostDiscovered);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = InProcEventBus::new(16);
        bus.connect().await.unwrap();
        bus.publish(Event::new(
            EventType::GauDiscovered,
            ProgramId::new(),
            vec!["https://example.com/".into()],
        ))
        .await
        .unwrap();
    }
}
