// src/config/app.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::classify::{DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_DELAY};
use crate::ingest::config::merge_denylists;

pub const ENV_CONFIG_PATH: &str = "ALPHA_FEED_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/alpha_feed.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
}

fn default_feeds() -> Vec<FeedSpec> {
    [
        ("ChainFeeds", "https://www.chainfeeds.xyz/rss"),
        ("PANews_推荐", "https://www.panewslab.com/zh/rss/foryou.xml"),
        ("BlockBeats", "https://api.theblockbeats.news/v2/rss/all"),
        ("PANews_快讯", "https://www.panewslab.com/zh/rss/newsflash.xml"),
    ]
    .into_iter()
    .map(|(name, url)| FeedSpec {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// "ENV" means: read from the variable named by `api_key_env`.
    pub api_key: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: "ENV".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifySettings {
    pub batch_size: usize,
    pub chunk_delay_secs: u64,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_delay_secs: DEFAULT_CHUNK_DELAY.as_secs(),
        }
    }
}

impl ClassifySettings {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_secs(self.chunk_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub denylist: Vec<String>,
    pub denylist_path: Option<PathBuf>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            denylist: [
                "比特币价格",
                "以太坊价格",
                "行情",
                "跌破",
                "爆仓",
                "Binance Alpha",
                "币安 Alpha",
                "一周预告",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            denylist_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub path: PathBuf,
    pub retention_days: u32,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("rss_history.csv"),
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub path: PathBuf,
    pub channel_title: String,
    pub channel_link: String,
    pub channel_description: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("filtered_feed.xml"),
            channel_title: "DeepSeek Alpha Feed".to_string(),
            channel_link: "https://example.com/rss_alpha/filtered_feed.xml".to_string(),
            channel_description: "Valuable blockchain news from the last 30 days".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub git_push: bool,
    pub commit_message: String,
    /// Working tree for git; defaults to the output file's directory.
    pub repo_dir: Option<PathBuf>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            git_push: true,
            commit_message: "update RSS XML".to_string(),
            repo_dir: None,
        }
    }
}

/// Everything the run needs, loaded once at startup and passed down explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch_timeout_secs: u64,
    pub metrics_path: Option<PathBuf>,
    pub feeds: Vec<FeedSpec>,
    pub llm: LlmSettings,
    pub classify: ClassifySettings,
    pub filter: FilterSettings,
    pub history: HistorySettings,
    pub output: OutputSettings,
    pub publish: PublishSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            metrics_path: None,
            feeds: default_feeds(),
            llm: LlmSettings::default(),
            classify: ClassifySettings::default(),
            filter: FilterSettings::default(),
            history: HistorySettings::default(),
            output: OutputSettings::default(),
            publish: PublishSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing config toml")
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::parse(&data)
    }

    /// $ALPHA_FEED_CONFIG, then `config/alpha_feed.toml`, then built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from_file(&pb);
        }
        let default_p = Path::new(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(default_p);
        }
        Ok(Self::default())
    }

    /// Load, resolve the API key and validate. Any error here is fatal for the process.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_default()?;
        cfg.resolve_api_key()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Replace an "ENV" (or empty) key with the value of `llm.api_key_env`.
    pub fn resolve_api_key(&mut self) -> Result<()> {
        let key = self.llm.api_key.trim();
        if key.is_empty() || key.eq_ignore_ascii_case("env") {
            let var = self.llm.api_key_env.as_str();
            let value = env::var(var).map_err(|_| anyhow!("Missing {var} env var"))?;
            if value.trim().is_empty() {
                bail!("{var} is set but empty");
            }
            self.llm.api_key = value.trim().to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            bail!("no feeds configured");
        }
        let mut seen = HashSet::new();
        for f in &self.feeds {
            if f.name.trim().is_empty() || f.url.trim().is_empty() {
                bail!("feed entries need both a name and a url");
            }
            if !seen.insert(f.name.as_str()) {
                bail!("duplicate feed name: {}", f.name);
            }
        }
        if self.classify.batch_size == 0 {
            bail!("classify.batch_size must be at least 1");
        }
        if self.history.retention_days == 0 {
            bail!("history.retention_days must be at least 1");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model is empty");
        }
        let key = self.llm.api_key.trim();
        if key.is_empty() || key.eq_ignore_ascii_case("env") {
            bail!("llm.api_key is not resolved");
        }
        if self.fetch_timeout_secs == 0 || self.llm.timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    /// Inline denylist plus the optional external list.
    pub fn effective_denylist(&self) -> Result<Vec<String>> {
        merge_denylists(&self.filter.denylist, self.filter.denylist_path.as_deref())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
