//! Classification records produced for each news item.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ingest::types::NewsItem;

/// Category label returned by the model.
///
/// The four known labels are matched in English or in their Chinese wording.
/// Anything else is kept verbatim so the feed still shows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    InteractionOpportunity,
    InvestmentReference,
    RiskWarning,
    IndustryTrendOrNarrative,
    Other(String),
}

impl Category {
    pub const KNOWN: [Category; 4] = [
        Category::InteractionOpportunity,
        Category::InvestmentReference,
        Category::RiskWarning,
        Category::IndustryTrendOrNarrative,
    ];

    pub fn label(&self) -> &str {
        match self {
            Category::InteractionOpportunity => "InteractionOpportunity",
            Category::InvestmentReference => "InvestmentReference",
            Category::RiskWarning => "RiskWarning",
            Category::IndustryTrendOrNarrative => "IndustryTrendOrNarrative",
            Category::Other(s) => s.as_str(),
        }
    }

    /// `None` for blank labels.
    pub fn parse_label(raw: &str) -> Option<Self> {
        let t = raw.trim();
        if t.is_empty() {
            return None;
        }
        let compact: String = t.chars().filter(|c| !c.is_whitespace()).collect();
        let cat = match compact.as_str() {
            "InteractionOpportunity" | "交互机会" => Category::InteractionOpportunity,
            "InvestmentReference" | "投资参考" => Category::InvestmentReference,
            "RiskWarning" | "风险预警" => Category::RiskWarning,
            "IndustryTrendOrNarrative" | "行业趋势/热点叙事" => {
                Category::IndustryTrendOrNarrative
            }
            _ => Category::Other(t.to_string()),
        };
        Some(cat)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::parse_label(&s).unwrap_or(Category::Other(s))
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.label().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict for exactly one news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(alias = "isValuable")]
    pub is_valuable: bool,
    #[serde(default, deserialize_with = "category_or_none")]
    pub category: Option<Category>,
    #[serde(
        default,
        alias = "suggestedAction",
        alias = "suggested_action",
        deserialize_with = "string_or_empty"
    )]
    pub suggest_action: String,
}

impl Classification {
    /// Negative placeholder used when a chunk could not be classified.
    pub fn failed(reason: &str) -> Self {
        Self {
            is_valuable: false,
            category: None,
            suggest_action: format!("Error: {reason}"),
        }
    }
}

fn category_or_none<'de, D>(de: D) -> Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.as_deref().and_then(Category::parse_label))
}

fn string_or_empty<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.unwrap_or_default())
}

/// A news item together with its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedItem {
    pub item: NewsItem,
    pub classification: Classification,
}

impl ClassifiedItem {
    pub fn is_valuable(&self) -> bool {
        self.classification.is_valuable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_labels_map_to_known_categories() {
        assert_eq!(
            Category::parse_label("行业趋势 / 热点叙事"),
            Some(Category::IndustryTrendOrNarrative)
        );
        assert_eq!(
            Category::parse_label("风险预警"),
            Some(Category::RiskWarning)
        );
    }

    #[test]
    fn unknown_label_is_kept_verbatim() {
        let c = Category::parse_label(" Airdrop ").unwrap();
        assert_eq!(c, Category::Other("Airdrop".into()));
        assert_eq!(c.to_string(), "Airdrop");
    }

    #[test]
    fn blank_label_is_none() {
        assert_eq!(Category::parse_label("   "), None);
    }

    #[test]
    fn failed_carries_diagnostic() {
        let c = Classification::failed("timeout");
        assert!(!c.is_valuable);
        assert!(c.category.is_none());
        assert_eq!(c.suggest_action, "Error: timeout");
    }

    #[test]
    fn camel_case_fields_are_accepted() {
        let c: Classification = serde_json::from_str(
            r#"{"isValuable": true, "category": "RiskWarning", "suggestedAction": "Reduce exposure"}"#,
        )
        .unwrap();
        assert!(c.is_valuable);
        assert_eq!(c.category, Some(Category::RiskWarning));
        assert_eq!(c.suggest_action, "Reduce exposure");
    }
}
