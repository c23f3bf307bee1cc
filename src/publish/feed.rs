// src/publish/feed.rs
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveTime};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::OutputSettings;
use crate::history::HistoryRecord;

/// `Category: <label> | Suggestion: <action>`
pub fn item_description(r: &HistoryRecord) -> String {
    let category = r.category.as_ref().map(|c| c.label()).unwrap_or("-");
    format!("Category: {} | Suggestion: {}", category, r.suggest_action)
}

fn text_element<W: std::io::Write>(w: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(tag)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// RSS 2.0 document with one `<item>` per record, in record order.
pub fn render_feed(
    records: &[HistoryRecord],
    channel: &OutputSettings,
    built_at: DateTime<FixedOffset>,
) -> Result<String> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    w.write_event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0")]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(&mut w, "title", &channel.channel_title)?;
    text_element(&mut w, "link", &channel.channel_link)?;
    text_element(&mut w, "description", &channel.channel_description)?;
    text_element(&mut w, "lastBuildDate", &built_at.to_rfc2822())?;

    for r in records {
        let pub_date = r.time.and_time(NaiveTime::MIN).and_utc().to_rfc2822();

        w.write_event(Event::Start(BytesStart::new("item")))?;
        text_element(&mut w, "title", &r.title)?;
        text_element(&mut w, "link", &r.link)?;
        text_element(&mut w, "description", &item_description(r))?;
        text_element(&mut w, "summary", &r.summary)?;
        text_element(&mut w, "pubDate", &pub_date)?;
        text_element(&mut w, "source", &r.source)?;
        w.write_event(Event::End(BytesEnd::new("item")))?;
    }

    w.write_event(Event::End(BytesEnd::new("channel")))?;
    w.write_event(Event::End(BytesEnd::new("rss")))?;

    String::from_utf8(w.into_inner()).context("rendered feed is not utf-8")
}

/// Write the document next to its final path, then rename over it.
pub fn write_feed(path: &Path, xml: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = path.with_extension("xml.tmp");
    fs::write(&tmp, xml).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    tracing::info!(path = %path.display(), "feed written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::types::Category;
    use chrono::NaiveDate;

    fn record(title: &str, category: Option<Category>) -> HistoryRecord {
        HistoryRecord {
            source: "ChainFeeds".into(),
            title: title.into(),
            link: "https://example.test/a?x=1&y=2".into(),
            summary: "<b>bold</b> claim".into(),
            time: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            is_valuable: true,
            category,
            suggest_action: "Follow up".into(),
        }
    }

    fn built_at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-02T09:00:00+08:00").unwrap()
    }

    #[test]
    fn description_combines_category_and_action() {
        let r = record("t", Some(Category::InvestmentReference));
        assert_eq!(
            item_description(&r),
            "Category: InvestmentReference | Suggestion: Follow up"
        );
        assert_eq!(
            item_description(&record("t", None)),
            "Category: - | Suggestion: Follow up"
        );
    }

    #[test]
    fn text_is_escaped_and_dates_are_rfc2822() {
        let xml = render_feed(
            &[record("A & B", Some(Category::RiskWarning))],
            &OutputSettings::default(),
            built_at(),
        )
        .unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("A &amp; B"));
        assert!(xml.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(xml.contains("Wed, 1 May 2024 00:00:00 +0000"));
        assert!(xml.contains("Thu, 2 May 2024 09:00:00 +0800"));
    }

    #[test]
    fn empty_history_still_renders_channel() {
        let xml = render_feed(&[], &OutputSettings::default(), built_at()).unwrap();
        assert!(xml.contains("<channel>"));
        assert!(!xml.contains("<item>"));
    }
}
