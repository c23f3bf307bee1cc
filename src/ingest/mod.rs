// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use crate::ingest::types::{NewsItem, SourceProvider};
use chrono::{Days, NaiveDate};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

/// Max characters kept from a title or summary.
const MAX_TEXT_CHARS: usize = 1500;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total entries parsed from feeds.");
        describe_counter!(
            "ingest_kept_total",
            "Entries dated yesterday that reached the keyword filter."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Entries dropped by the keyword denylist."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Feed fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// True when `title + " " + summary` contains any denylisted substring.
/// Raw, case-sensitive containment; no tokenization.
pub fn is_denied(item: &NewsItem, denylist: &[String]) -> bool {
    let text = format!("{} {}", item.title, item.summary);
    denylist.iter().any(|bad| text.contains(bad.as_str()))
}

/// Drop denylisted items. Returns (kept, dropped_count).
pub fn filter_by_keywords(items: Vec<NewsItem>, denylist: &[String]) -> (Vec<NewsItem>, usize) {
    ensure_metrics_described();

    let before = items.len();
    let kept: Vec<NewsItem> = items
        .into_iter()
        .filter(|it| !is_denied(it, denylist))
        .collect();
    let dropped = before - kept.len();

    counter!("ingest_filtered_total").increment(dropped as u64);
    (kept, dropped)
}

/// Keep only items dated the day before `today`.
pub fn retain_yesterday(items: Vec<NewsItem>, today: NaiveDate) -> Vec<NewsItem> {
    let Some(yesterday) = today.checked_sub_days(Days::new(1)) else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter(|it| it.published == yesterday)
        .collect()
}

/// Fetch every provider in order and keep yesterday's items.
/// A failing provider is logged and contributes nothing.
pub async fn collect_yesterday(
    providers: &[Box<dyn SourceProvider>],
    today: NaiveDate,
) -> Vec<NewsItem> {
    ensure_metrics_described();

    let mut out = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(items) => {
                let fetched = items.len();
                let mut fresh = retain_yesterday(items, today);
                tracing::info!(
                    target: "ingest",
                    provider = p.name(),
                    fetched,
                    yesterday = fresh.len(),
                    "feed collected"
                );
                out.append(&mut fresh);
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
            }
        }
    }

    counter!("ingest_kept_total").increment(out.len() as u64);
    out
}
