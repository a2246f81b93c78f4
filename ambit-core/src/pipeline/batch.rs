//! Re-chunks a runner's unbounded event stream into bounded batches.
//!
//! Dual threshold: a hard size ceiling flushes promptly under fast sources,
//! and a wall-clock floor gate keeps a slow trickle from starving downstream
//! ingestion while still avoiding tiny batches. Every extracted item lands in
//! exactly one emitted batch; the remainder flushes unconditionally when the
//! source ends.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt, pin_mut};
use serde_json::Value;
use tokio::time::Instant;

use ambit_config::BatchConfig;
use ambit_model::{ProcessEvent, ProcessEventKind};

use crate::contracts::ProcessEventStream;

/// Flush thresholds for one batching invocation.
#[derive(Clone, Copy, Debug)]
pub struct BatchPolicy {
    /// Soft floor: no time-based flush below this size.
    pub min_size: usize,
    /// Hard ceiling: flush immediately at this size.
    pub max_size: usize,
    /// Wall-clock gate for the floor path.
    pub timeout: Duration,
}

impl BatchPolicy {
    pub fn new(min_size: usize, max_size: usize, timeout: Duration) -> Self {
        Self {
            min_size,
            max_size,
            timeout,
        }
    }
}

impl From<BatchConfig> for BatchPolicy {
    fn from(config: BatchConfig) -> Self {
        Self {
            min_size: config.min_size,
            max_size: config.max_size,
            timeout: config.timeout(),
        }
    }
}

/// Collect extracted items from `source` and yield them in bounded batches.
///
/// `extract` returns `None` to skip non-result events (log lines, lifecycle
/// markers). A flush happens when the batch hits `max_size`, or when it has
/// at least `min_size` items and `timeout` has passed since the last flush.
pub fn batch_stream<S, T, F>(
    source: S,
    policy: BatchPolicy,
    mut extract: F,
) -> impl Stream<Item = Vec<T>>
where
    S: Stream<Item = ProcessEvent>,
    T: Send,
    F: FnMut(&ProcessEvent) -> Option<T>,
{
    stream! {
        let mut batch: Vec<T> = Vec::new();
        let mut last_flush = Instant::now();

        pin_mut!(source);
        while let Some(event) = source.next().await {
            let Some(item) = extract(&event) else {
                continue;
            };
            batch.push(item);

            if batch.len() >= policy.max_size
                || (batch.len() >= policy.min_size && last_flush.elapsed() >= policy.timeout)
            {
                yield std::mem::take(&mut batch);
                last_flush = Instant::now();
            }
        }

        if !batch.is_empty() {
            yield batch;
        }
    }
}

/// Deduplicating variant: items whose key was already seen in this
/// invocation are skipped before they count toward the thresholds, so batch
/// sizes always reflect unique items. The seen set lives and dies with one
/// scan execution.
pub fn batch_stream_dedup<S, T, F, K, KF>(
    source: S,
    policy: BatchPolicy,
    mut extract: F,
    mut key_of: KF,
) -> impl Stream<Item = Vec<T>>
where
    S: Stream<Item = ProcessEvent>,
    T: Send,
    F: FnMut(&ProcessEvent) -> Option<T>,
    K: Eq + Hash,
    KF: FnMut(&T) -> K,
{
    let mut seen: HashSet<K> = HashSet::new();
    batch_stream(source, policy, move |event| {
        let item = extract(event)?;
        seen.insert(key_of(&item)).then_some(item)
    })
}

type ExtractFn = Arc<dyn Fn(&ProcessEvent) -> Option<Value> + Send + Sync>;

/// Tool-parameterized bundle of thresholds and an extractor. The factory
/// builds one per tool; a scan node owns it and starts a fresh batching
/// invocation for every execution.
#[derive(Clone)]
pub struct BatchProcessor {
    policy: BatchPolicy,
    extract: ExtractFn,
    dedup: bool,
}

impl fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("policy", &self.policy)
            .field("dedup", &self.dedup)
            .finish()
    }
}

impl BatchProcessor {
    pub fn new<F>(policy: impl Into<BatchPolicy>, extract: F) -> Self
    where
        F: Fn(&ProcessEvent) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            policy: policy.into(),
            extract: Arc::new(extract),
            dedup: false,
        }
    }

    /// The common case: take the payload of every `Result` event.
    pub fn results(policy: impl Into<BatchPolicy>) -> Self {
        Self::new(policy, |event| {
            (event.kind == ProcessEventKind::Result && !event.payload.is_null())
                .then(|| event.payload.clone())
        })
    }

    /// Deduplicate items within each `batch_stream` invocation. Used by
    /// URL-discovery tools whose output repeats heavily.
    pub fn with_dedup(mut self) -> Self {
        self.dedup = true;
        self
    }

    pub fn batch_stream(
        &self,
        source: ProcessEventStream,
    ) -> impl Stream<Item = Vec<Value>> + Send + use<> {
        let extract = self.extract.clone();
        let policy = self.policy;
        if self.dedup {
            futures::future::Either::Left(batch_stream_dedup(
                source,
                policy,
                move |event| extract(event),
                dedup_key,
            ))
        } else {
            futures::future::Either::Right(batch_stream(source, policy, move |event| {
                extract(event)
            }))
        }
    }
}

fn dedup_key(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_owned(),
        None => value.to_string(),
    }
}
