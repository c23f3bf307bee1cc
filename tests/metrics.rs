// tests/metrics.rs
// Own test binary: the Prometheus recorder is process-global.
use std::sync::Arc;
use std::time::Duration;

use alpha_feed::classify::provider::ScriptedProvider;
use alpha_feed::history::HistoryStore;
use alpha_feed::ingest::filter_by_keywords;
use alpha_feed::metrics::Metrics;
use alpha_feed::publish::LocalOnly;
use alpha_feed::{AppConfig, BatchClassifier, NewsItem, Pipeline};
use chrono::{DateTime, NaiveDate};

#[tokio::test]
async fn counters_are_rendered_and_written() {
    let metrics = Metrics::init().expect("recorder");

    let item = NewsItem {
        source: "ChainFeeds".into(),
        title: "t".into(),
        link: "https://example.test".into(),
        summary: "s".into(),
        published: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
    };
    let (kept, _) = filter_by_keywords(vec![item], &["nothing".to_string()]);

    let provider = Arc::new(ScriptedProvider::new([Err("down".to_string())]));
    let classifier = BatchClassifier::new(provider).with_chunk_delay(Duration::ZERO);
    let _ = classifier.classify(&kept).await;

    let out = metrics.render();
    assert!(out.contains("classify_chunks_total"));
    assert!(out.contains("classify_chunk_failures_total"));
    assert!(out.contains("ingest_filtered_total"));

    let dir = tempfile::tempdir().unwrap();

    // empty run: no feeds, nothing valuable, but the run timestamp is still recorded
    let mut cfg = AppConfig::default();
    cfg.history.path = dir.path().join("rss_history.csv");
    cfg.output.path = dir.path().join("filtered_feed.xml");
    cfg.classify.chunk_delay_secs = 0;
    let chat = Arc::new(ScriptedProvider::new(Vec::<Result<String, String>>::new()));
    let pipeline = Pipeline::new(&cfg, Vec::new(), chat, Box::new(LocalOnly)).unwrap();
    let now = DateTime::parse_from_rfc3339("2024-05-02T09:00:00+08:00").unwrap();
    pipeline.run(now).await.unwrap();

    let mut store = HistoryStore::load(&cfg.history.path).unwrap();
    store.absorb(Vec::new(), 30, now.naive_local());

    let out = metrics.render();
    assert!(out.contains("# HELP pipeline_last_run_ts"));
    assert!(out.contains("# HELP history_records"));

    let path = dir.path().join("textfile").join("alpha_feed.prom");
    metrics.write_textfile(&path).unwrap();
    assert!(std::fs::read_to_string(&path)
        .unwrap()
        .contains("classify_items_total"));
}
