// src/lib.rs
// Library surface for the binary and the integration tests.

pub mod classify;
pub mod config;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod publish;

// ---- Re-exports for the common entry points ----
pub use crate::classify::types::{Category, Classification, ClassifiedItem};
pub use crate::classify::BatchClassifier;
pub use crate::config::AppConfig;
pub use crate::ingest::types::NewsItem;
pub use crate::pipeline::{Pipeline, RunSummary};
