//! One daily run: collect -> filter -> classify -> merge history -> publish.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use metrics::{describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::classify::provider::{ChatProvider, OpenAiCompatProvider};
use crate::classify::BatchClassifier;
use crate::config::{AppConfig, HistorySettings, OutputSettings};
use crate::history::{HistoryRecord, HistoryStore};
use crate::ingest::providers::rss_feed::RssFeedProvider;
use crate::ingest::types::SourceProvider;
use crate::ingest::{collect_yesterday, filter_by_keywords};
use crate::publish::feed::{render_feed, write_feed};
use crate::publish::{publisher_from_settings, FeedPublisher};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix time of the last run that got past classification."
        );
    });
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub filtered_out: usize,
    pub classified: usize,
    pub valuable: usize,
    pub history_records: usize,
    pub feed_written: bool,
}

pub struct Pipeline {
    providers: Vec<Box<dyn SourceProvider>>,
    classifier: BatchClassifier,
    publisher: Box<dyn FeedPublisher>,
    denylist: Vec<String>,
    history: HistorySettings,
    output: OutputSettings,
}

impl Pipeline {
    /// Wire the run from configuration plus the three outward-facing collaborators.
    pub fn new(
        cfg: &AppConfig,
        providers: Vec<Box<dyn SourceProvider>>,
        chat: Arc<dyn ChatProvider>,
        publisher: Box<dyn FeedPublisher>,
    ) -> Result<Self> {
        let classifier = BatchClassifier::new(chat)
            .with_batch_size(cfg.classify.batch_size)
            .with_chunk_delay(cfg.classify.chunk_delay());
        Ok(Self {
            providers,
            classifier,
            publisher,
            denylist: cfg.effective_denylist()?,
            history: cfg.history.clone(),
            output: cfg.output.clone(),
        })
    }

    /// Production wiring: HTTP feeds, OpenAI-compatible endpoint, git publishing.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("alpha-feed/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(cfg.fetch_timeout())
            .build()
            .context("building feed http client")?;

        let providers: Vec<Box<dyn SourceProvider>> = cfg
            .feeds
            .iter()
            .map(|f| {
                Box::new(RssFeedProvider::from_url(&f.name, &f.url, http.clone()))
                    as Box<dyn SourceProvider>
            })
            .collect();
        let chat: Arc<dyn ChatProvider> = Arc::new(OpenAiCompatProvider::new(&cfg.llm)?);

        Self::new(cfg, providers, chat, publisher_from_settings(&cfg.publish))
    }

    pub async fn run(&self, now: DateTime<FixedOffset>) -> Result<RunSummary> {
        ensure_metrics_described();
        let today = now.date_naive();
        let mut summary = RunSummary::default();

        let mut history = HistoryStore::load(&self.history.path)?;
        info!(records = history.len(), "history loaded");

        info!(%today, feeds = self.providers.len(), "collecting yesterday's items");
        let collected = collect_yesterday(&self.providers, today).await;
        summary.fetched = collected.len();

        let (kept, dropped) = filter_by_keywords(collected, &self.denylist);
        summary.filtered_out = dropped;
        info!(kept = kept.len(), dropped, "keyword filter applied");

        info!(
            items = kept.len(),
            batch_size = self.classifier.batch_size(),
            "classifying"
        );
        let classified = self.classifier.classify_items(kept).await;
        summary.classified = classified.len();

        let valuable: Vec<HistoryRecord> = classified
            .into_iter()
            .filter(|c| c.is_valuable())
            .map(HistoryRecord::from)
            .collect();
        summary.valuable = valuable.len();
        gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);

        if valuable.is_empty() {
            info!("no new valuable items; history and feed left unchanged");
            summary.history_records = history.len();
            return Ok(summary);
        }

        history.absorb(valuable, self.history.retention_days, now.naive_local());
        history.save()?;
        summary.history_records = history.len();
        info!(records = history.len(), path = %self.history.path.display(), "history saved");

        let xml = render_feed(history.records(), &self.output, now)?;
        write_feed(&self.output.path, &xml)?;
        summary.feed_written = true;

        if let Err(e) = self.publisher.publish(&self.output.path).await {
            warn!(error = ?e, publisher = self.publisher.name(), "publishing failed; local feed kept");
        }

        Ok(summary)
    }
}
