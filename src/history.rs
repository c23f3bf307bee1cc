//! Rolling store of valuable items, persisted as CSV between runs.
//!
//! Lifecycle: `HistoryStore::load` at start, `absorb` the run's valuable items,
//! `save` at the end. The file is rewritten as a whole.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::classify::types::{Category, ClassifiedItem};

/// Column order of the history file.
pub const COLUMNS: [&str; 8] = [
    "source",
    "title",
    "link",
    "summary",
    "time",
    "is_valuable",
    "category",
    "suggest_action",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub source: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    #[serde(with = "lenient_date")]
    pub time: NaiveDate,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_valuable: bool,
    pub category: Option<Category>,
    pub suggest_action: String,
}

impl From<ClassifiedItem> for HistoryRecord {
    fn from(ci: ClassifiedItem) -> Self {
        Self {
            source: ci.item.source,
            title: ci.item.title,
            link: ci.item.link,
            summary: ci.item.summary,
            time: ci.item.published,
            is_valuable: ci.classification.is_valuable,
            category: ci.classification.category,
            suggest_action: ci.classification.suggest_action,
        }
    }
}

/// Existing records first, then new ones; the first record per `(title, link)` wins.
/// Records whose date (at midnight) falls before `now - retention_days` are dropped.
pub fn merge(
    existing: Vec<HistoryRecord>,
    new: Vec<HistoryRecord>,
    retention_days: u32,
    now: NaiveDateTime,
) -> Vec<HistoryRecord> {
    let cutoff = now - TimeDelta::days(i64::from(retention_days));
    let mut seen: HashSet<(String, String)> = HashSet::new();

    existing
        .into_iter()
        .chain(new)
        .filter(|r| seen.insert((r.title.clone(), r.link.clone())))
        .filter(|r| r.time.and_time(NaiveTime::MIN) >= cutoff)
        .collect()
}

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<HistoryRecord>,
}

impl HistoryStore {
    /// A missing file is an empty history.
    pub fn load(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            read_records(path)?
        } else {
            tracing::info!(path = %path.display(), "no history file yet; starting empty");
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn absorb(&mut self, new: Vec<HistoryRecord>, retention_days: u32, now: NaiveDateTime) {
        let existing = std::mem::take(&mut self.records);
        self.records = merge(existing, new, retention_days, now);
        static DESCRIBED: OnceCell<()> = OnceCell::new();
        DESCRIBED.get_or_init(|| {
            metrics::describe_gauge!("history_records", "Records kept in the rolling history.");
        });
        metrics::gauge!("history_records").set(self.records.len() as f64);
    }

    /// Rewrite the whole file (temp file + rename).
    pub fn save(&self) -> Result<()> {
        write_records(&self.path, &self.records)
    }
}

pub fn read_records(path: &Path) -> Result<Vec<HistoryRecord>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening history {}", path.display()))?;
    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<HistoryRecord>().enumerate() {
        let rec = row.with_context(|| format!("history row {} in {}", i + 1, path.display()))?;
        out.push(rec);
    }
    Ok(out)
}

pub fn write_records(path: &Path, records: &[HistoryRecord]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut wtr = csv::Writer::from_path(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        if records.is_empty() {
            wtr.write_record(COLUMNS)?;
        }
        for r in records {
            wtr.serialize(r).context("writing history row")?;
        }
        wtr.flush().context("flushing history")?;
    }
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// `YYYY-MM-DD` on write; on read anything starting with a date (e.g. `2024-05-01 00:00:00`).
mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FMT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(d: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&d.format(FMT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(de)?;
        let head = raw.trim().get(..10).unwrap_or(raw.trim());
        NaiveDate::parse_from_str(head, FMT).map_err(serde::de::Error::custom)
    }
}

fn lenient_bool<'de, D>(de: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("not a boolean: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(title: &str, time: NaiveDate) -> HistoryRecord {
        HistoryRecord {
            source: "BlockBeats".into(),
            title: title.into(),
            link: format!("https://example.test/{title}"),
            summary: "s".into(),
            time,
            is_valuable: true,
            category: Some(Category::RiskWarning),
            suggest_action: "watch".into(),
        }
    }

    fn at(d: NaiveDate, h: u32) -> NaiveDateTime {
        d.and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn first_occurrence_wins_on_duplicate_key() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut old = rec("a", d);
        old.suggest_action = "old".into();
        let mut new = rec("a", d);
        new.suggest_action = "new".into();

        let merged = merge(vec![old], vec![new], 30, at(d, 12));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].suggest_action, "old");
    }

    #[test]
    fn same_title_different_link_is_distinct() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let a = rec("a", d);
        let mut b = rec("a", d);
        b.link = "https://elsewhere.test".into();
        assert_eq!(merge(vec![a], vec![b], 30, at(d, 0)).len(), 2);
    }

    #[test]
    fn retention_boundary_follows_time_of_day() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let now_midnight = at(d + TimeDelta::days(30), 0);
        assert_eq!(merge(vec![rec("a", d)], vec![], 30, now_midnight).len(), 1);

        let now_later = at(d + TimeDelta::days(30), 9);
        assert!(merge(vec![rec("a", d)], vec![], 30, now_later).is_empty());
    }

    #[test]
    fn lenient_fields_accept_pandas_style_rows() {
        let csv_text = "source,title,link,summary,time,is_valuable,category,suggest_action\n\
BlockBeats,t,https://x.test,s,2024-05-01 00:00:00,True,风险预警,hedge\n\
BlockBeats,u,https://y.test,s,2024-05-02,False,,\n";
        let mut rdr = csv::Reader::from_reader(csv_text.as_bytes());
        let rows: Vec<HistoryRecord> = rdr.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(rows[0].is_valuable);
        assert_eq!(rows[0].category, Some(Category::RiskWarning));
        assert!(!rows[1].is_valuable);
        assert_eq!(rows[1].category, None);
        assert_eq!(rows[1].suggest_action, "");
    }
}
