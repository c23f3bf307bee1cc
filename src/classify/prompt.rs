use std::fmt::Write;

use crate::classify::types::Category;
use crate::ingest::types::NewsItem;

const INSTRUCTIONS: &str = r#"You are a professional blockchain researcher. Below is a list of blockchain news items. Judge each item separately.

For every item decide the following three fields:
1. is_valuable: true or false
2. category: if valuable, exactly one of:
{categories}
   use null when the item is not valuable
3. suggest_action: if valuable, the next action you recommend

Return ONLY a JSON array with one object per item, in the same order and with the same count as the list:
[
  {
    "is_valuable": true,
    "category": "...",
    "suggest_action": "..."
  },
  ...
]

News items:
"#;

/// Build the request text for one chunk. Items are numbered from 1 in chunk order.
pub fn build_batch_prompt(batch: &[NewsItem]) -> String {
    let categories = Category::KNOWN
        .iter()
        .map(|c| format!("   - {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    let mut prompt = INSTRUCTIONS.replace("{categories}", &categories);

    for (idx, item) in batch.iter().enumerate() {
        // writing into a String cannot fail
        let _ = write!(
            prompt,
            "\n[{}] Title: {}\nSummary: {}\n",
            idx + 1,
            item.title,
            item.summary
        );
    }
    prompt
}
