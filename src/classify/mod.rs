//! Batch classification: chunk the filtered items, ask the model about each chunk,
//! and always come back with exactly one verdict per item, in input order.
//!
//! Each chunk moves `Pending -> Requested -> {ParsedValid | ParsedInvalid | RequestFailed}
//! -> Resolved`. The three middle states are the [`ChunkOutcome`] variants; resolving an
//! outcome yields the chunk's verdicts. Chunks are never retried within a run.

pub mod prompt;
pub mod provider;
pub mod response;
pub mod types;

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::classify::prompt::build_batch_prompt;
use crate::classify::provider::ChatProvider;
use crate::classify::response::{parse_chunk_response, ChunkResponse};
use crate::classify::types::{Classification, ClassifiedItem};
use crate::ingest::types::NewsItem;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_secs(2);

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("classify_chunks_total", "Chunks sent to the model.");
        describe_counter!(
            "classify_chunk_failures_total",
            "Chunks resolved through the synthesized-failure path."
        );
        describe_counter!("classify_items_total", "Items classified (any outcome).");
    });
}

/// Terminal state of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    ParsedValid(Vec<Classification>),
    ParsedInvalid(String),
    RequestFailed(String),
}

impl ChunkOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, ChunkOutcome::ParsedValid(_))
    }

    /// Verdicts for a chunk of `len` items.
    pub fn resolve(self, len: usize) -> Vec<Classification> {
        match self {
            ChunkOutcome::ParsedValid(v) => v,
            ChunkOutcome::ParsedInvalid(reason) | ChunkOutcome::RequestFailed(reason) => {
                vec![Classification::failed(&reason); len]
            }
        }
    }
}

impl From<ChunkResponse> for ChunkOutcome {
    fn from(r: ChunkResponse) -> Self {
        match r {
            ChunkResponse::Valid(v) => ChunkOutcome::ParsedValid(v),
            ChunkResponse::Invalid(reason) => ChunkOutcome::ParsedInvalid(reason),
        }
    }
}

/// Receives chunk-level progress. Indices are 1-based.
pub trait ProgressObserver: Send + Sync {
    fn chunk_started(&self, _index: usize, _total: usize, _size: usize) {}
    fn chunk_resolved(&self, _index: usize, _total: usize, _outcome: &ChunkOutcome) {}
}

/// Default observer: progress goes to the log.
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn chunk_started(&self, index: usize, total: usize, size: usize) {
        info!(target: "classify", chunk = index, total, size, "classifying chunk");
    }

    fn chunk_resolved(&self, index: usize, total: usize, outcome: &ChunkOutcome) {
        match outcome {
            ChunkOutcome::ParsedValid(v) => {
                let valuable = v.iter().filter(|c| c.is_valuable).count();
                info!(target: "classify", chunk = index, total, valuable, "chunk classified");
            }
            ChunkOutcome::ParsedInvalid(reason) => {
                warn!(target: "classify", chunk = index, total, %reason, "chunk reply rejected");
            }
            ChunkOutcome::RequestFailed(reason) => {
                warn!(target: "classify", chunk = index, total, %reason, "chunk request failed");
            }
        }
    }
}

/// Contiguous positional ranges of at most `batch_size` items.
pub fn plan_chunks(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    let step = batch_size.max(1);
    (0..len)
        .step_by(step)
        .map(|start| start..(start + step).min(len))
        .collect()
}

pub struct BatchClassifier {
    provider: Arc<dyn ChatProvider>,
    batch_size: usize,
    chunk_delay: Duration,
    observer: Arc<dyn ProgressObserver>,
}

impl BatchClassifier {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            observer: Arc::new(TracingProgress),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Send one chunk and turn whatever comes back into an outcome.
    pub async fn classify_chunk(&self, chunk: &[NewsItem]) -> ChunkOutcome {
        let prompt = build_batch_prompt(chunk);
        match self.provider.complete(&prompt).await {
            Ok(raw) => parse_chunk_response(&raw, chunk.len()).into(),
            Err(e) => ChunkOutcome::RequestFailed(format!("{e:#}")),
        }
    }

    /// One verdict per item, same order, even when chunks fail.
    pub async fn classify(&self, items: &[NewsItem]) -> Vec<Classification> {
        ensure_metrics_described();

        let plan = plan_chunks(items.len(), self.batch_size);
        let total = plan.len();
        let mut results = Vec::with_capacity(items.len());

        for (i, range) in plan.into_iter().enumerate() {
            let index = i + 1;
            let chunk = &items[range];
            self.observer.chunk_started(index, total, chunk.len());

            let outcome = self.classify_chunk(chunk).await;
            counter!("classify_chunks_total").increment(1);
            if outcome.is_failure() {
                counter!("classify_chunk_failures_total").increment(1);
            }
            self.observer.chunk_resolved(index, total, &outcome);

            results.extend(outcome.resolve(chunk.len()));
            counter!("classify_items_total").increment(chunk.len() as u64);

            if index < total && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        debug_assert_eq!(results.len(), items.len());
        results
    }

    /// Pair every item with its verdict.
    pub async fn classify_items(&self, items: Vec<NewsItem>) -> Vec<ClassifiedItem> {
        let verdicts = self.classify(&items).await;
        items
            .into_iter()
            .zip(verdicts)
            .map(|(item, classification)| ClassifiedItem {
                item,
                classification,
            })
            .collect()
    }
}
