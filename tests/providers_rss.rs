// tests/providers_rss.rs
use alpha_feed::ingest::providers::rss_feed::RssFeedProvider;
use alpha_feed::ingest::types::SourceProvider;
use alpha_feed::ingest::{collect_yesterday, retain_yesterday};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

const CHAINFEEDS_XML: &str = include_str!("fixtures/chainfeeds_rss.xml");
const BLOCKBEATS_XML: &str = include_str!("fixtures/blockbeats_rss.xml");
const PANEWS_MIXED_XML: &str = include_str!("fixtures/panews_mixed_rss.xml");

fn may(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

#[tokio::test]
async fn chainfeeds_fixture_parses_every_dated_item() {
    let p = RssFeedProvider::from_fixture("ChainFeeds", CHAINFEEDS_XML);
    let items = p.fetch_latest().await.expect("parse ok");

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.source == "ChainFeeds"));
    assert!(items.iter().all(|i| !i.link.is_empty()));
    assert_eq!(items[0].summary, "Checklist for eligible wallets");
}

#[tokio::test]
async fn cdata_html_is_normalized_and_offsets_become_utc_dates() {
    let p = RssFeedProvider::from_fixture("BlockBeats", BLOCKBEATS_XML);
    let items = p.fetch_latest().await.expect("parse ok");

    let quests = items.iter().find(|i| i.title == "Testnet quests open").unwrap();
    assert_eq!(quests.summary, "Quests are live");
    // 06:00 at +0800 on May 2 is still May 1 in UTC
    assert_eq!(quests.published, may(1));

    let yesterday = retain_yesterday(items, may(2));
    assert_eq!(yesterday.len(), 2);
}

#[tokio::test]
async fn html_entities_do_not_sink_the_feed() {
    let p = RssFeedProvider::from_fixture("PANews", PANEWS_MIXED_XML);
    let items = p.fetch_latest().await.expect("parse ok");

    assert_eq!(items[0].summary, "plain © text &bogus; here");
    let bridge = items.iter().find(|i| i.title == "Bridge volume recovers").unwrap();
    assert_eq!(bridge.summary, "Fees & volume © up");
}

#[tokio::test]
async fn items_split_by_other_channel_elements_are_all_kept() {
    let p = RssFeedProvider::from_fixture("PANews", PANEWS_MIXED_XML);
    let items = p.fetch_latest().await.expect("parse ok");

    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        titles,
        ["Exchange reserves weekly", "Bridge volume recovers", "Validator set grows"]
    );
    assert_eq!(items[2].summary, "Fee market update");
    // zone-less pubDate is read as UTC
    assert!(items.iter().all(|i| i.published == may(1)));
}

#[tokio::test]
async fn broken_xml_is_an_error() {
    let p = RssFeedProvider::from_fixture("Broken", "<rss><channel><item>");
    assert!(p.fetch_latest().await.is_err());
}

struct DownProvider;

#[async_trait]
impl SourceProvider for DownProvider {
    async fn fetch_latest(&self) -> Result<Vec<alpha_feed::NewsItem>> {
        Err(anyhow!("connection refused"))
    }
    fn name(&self) -> &str {
        "Down"
    }
}

#[tokio::test]
async fn failing_feed_does_not_stop_the_others() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(DownProvider),
        Box::new(RssFeedProvider::from_fixture("ChainFeeds", CHAINFEEDS_XML)),
        Box::new(RssFeedProvider::from_fixture("Broken", "not xml")),
    ];
    let items = collect_yesterday(&providers, may(2)).await;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.published == may(1)));
}
