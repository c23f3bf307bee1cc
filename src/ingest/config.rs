// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Load an external keyword denylist. Supports TOML (`denylist = [...]`) or a JSON array.
pub fn load_denylist_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading denylist from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_denylist(&content, ext.as_str())
}

/// Union of the inline list and the optional external file, cleaned.
pub fn merge_denylists(inline: &[String], path: Option<&Path>) -> Result<Vec<String>> {
    let mut all: Vec<String> = inline.to_vec();
    if let Some(p) = path {
        all.extend(load_denylist_from(p)?);
    }
    Ok(clean_list(all))
}

fn parse_denylist(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("denylist");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported denylist format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlDl {
        denylist: Vec<String>,
    }
    let v: TomlDl = toml::from_str(s)?;
    Ok(clean_list(v.denylist))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop empties, dedup.
pub(crate) fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}
