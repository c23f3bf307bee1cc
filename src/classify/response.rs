//! Parse-and-validate for raw model replies. Pure: no transport, no logging.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::classify::types::Classification;

/// Outcome of checking one reply against the chunk it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResponse {
    Valid(Vec<Classification>),
    Invalid(String),
}

/// Span from the first `[` to the last `]`, if any.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    static RE_ARRAY: OnceCell<Regex> = OnceCell::new();
    let re = RE_ARRAY.get_or_init(|| Regex::new(r"(?s)\[.*\]").unwrap());
    re.find(raw).map(|m| m.as_str())
}

/// Parse `raw` and require exactly `expected` elements.
pub fn parse_chunk_response(raw: &str, expected: usize) -> ChunkResponse {
    let json_text = extract_json_array(raw).unwrap_or(raw);

    let parsed: Vec<Classification> = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => return ChunkResponse::Invalid(format!("malformed classification JSON: {e}")),
    };

    if parsed.len() != expected {
        return ChunkResponse::Invalid(format!(
            "result count mismatch: expected {expected}, got {}",
            parsed.len()
        ));
    }
    ChunkResponse::Valid(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::types::Category;

    const ONE: &str =
        r#"[{"is_valuable": true, "category": "InvestmentReference", "suggest_action": "Watch"}]"#;

    #[test]
    fn chatter_around_array_is_ignored() {
        let raw = format!("Sure! Here's the result:\n{ONE}\nHope that helps.");
        match parse_chunk_response(&raw, 1) {
            ChunkResponse::Valid(v) => {
                assert!(v[0].is_valuable);
                assert_eq!(v[0].category, Some(Category::InvestmentReference));
                assert_eq!(v[0].suggest_action, "Watch");
            }
            other => panic!("expected valid, got {other:?}"),
        }
    }

    #[test]
    fn markdown_fence_is_tolerated() {
        let raw = format!("```json\n{ONE}\n```");
        assert!(matches!(parse_chunk_response(&raw, 1), ChunkResponse::Valid(_)));
    }

    #[test]
    fn extraction_is_greedy_first_to_last_bracket() {
        let raw = "a [1] b [2] c";
        assert_eq!(extract_json_array(raw), Some("[1] b [2]"));
    }

    #[test]
    fn no_brackets_falls_back_to_raw_text() {
        // an object is not an array, so this stays invalid
        let raw = r#"{"is_valuable": true}"#;
        assert!(extract_json_array(raw).is_none());
        assert!(matches!(parse_chunk_response(raw, 1), ChunkResponse::Invalid(_)));
    }

    #[test]
    fn count_mismatch_is_invalid() {
        let raw = r#"[{"is_valuable": false}, {"is_valuable": false}]"#;
        match parse_chunk_response(raw, 3) {
            ChunkResponse::Invalid(reason) => assert!(reason.contains("expected 3, got 2")),
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn wrong_element_types_are_invalid() {
        assert!(matches!(
            parse_chunk_response(r#"[{"is_valuable": "yes"}]"#, 1),
            ChunkResponse::Invalid(_)
        ));
        assert!(matches!(
            parse_chunk_response(r#"[1]"#, 1),
            ChunkResponse::Invalid(_)
        ));
    }

    #[test]
    fn null_category_and_missing_action_default() {
        let raw = r#"[{"is_valuable": false, "category": null}]"#;
        match parse_chunk_response(raw, 1) {
            ChunkResponse::Valid(v) => {
                assert_eq!(v[0].category, None);
                assert_eq!(v[0].suggest_action, "");
            }
            other => panic!("expected valid, got {other:?}"),
        }
    }
}
