//! alpha-feed: binary entrypoint.
//! Loads configuration, runs the daily collect/classify/publish pipeline once, exits.
//!
//! Exit code is non-zero only when configuration is unusable; every later failure
//! is logged and the run still ends with success.

use std::process::ExitCode;

use alpha_feed::metrics::Metrics;
use alpha_feed::{AppConfig, Pipeline};
use chrono::Local;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; JSON lines when ALPHA_FEED_LOG_JSON=1.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alpha_feed=info,warn"));
    let json = std::env::var("ALPHA_FEED_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn fatal(context: &str, e: anyhow::Error) -> ExitCode {
    error!(error = %format!("{e:#}"), "{context}");
    eprintln!("alpha-feed: {context}: {e:#}");
    ExitCode::FAILURE
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env before reading config so "ENV" API keys resolve.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => return fatal("configuration error", e),
    };
    info!(feeds = cfg.feeds.len(), model = %cfg.llm.model, "config loaded");

    let metrics = match &cfg.metrics_path {
        Some(_) => match Metrics::init() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = ?e, "metrics disabled");
                None
            }
        },
        None => None,
    };

    let pipeline = match Pipeline::from_config(&cfg) {
        Ok(p) => p,
        Err(e) => return fatal("startup error", e),
    };

    match pipeline.run(Local::now().fixed_offset()).await {
        Ok(s) => info!(
            fetched = s.fetched,
            filtered_out = s.filtered_out,
            classified = s.classified,
            valuable = s.valuable,
            history = s.history_records,
            feed_written = s.feed_written,
            "run finished"
        ),
        Err(e) => error!(error = %format!("{e:#}"), "run aborted"),
    }

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_path) {
        if let Err(e) = m.write_textfile(path) {
            warn!(error = ?e, "writing metrics textfile failed");
        }
    }

    ExitCode::SUCCESS
}
