//! Shared selector-evaluation helpers used by both extractor variants
//! (spec.md §4.4 "Selector execution maps each selector type...").

use crate::errors::{ScanError, ScanResult};
use crate::models::shop::{ExtractMode, JsonAggregator, SelectorKind, ShopSelector};

/// Apply an `ExtractMode` to the pieces a DOM/CDP backend can give us.
/// `own_text` is the node's text excluding descendant text; `inner_html`
/// is the node's serialized inner markup.
pub fn apply_extract_mode(
    mode: ExtractMode,
    text: &str,
    own_text: &str,
    inner_html: &str,
    href: Option<&str>,
) -> Option<String> {
    let value = match mode {
        ExtractMode::Text => text.trim().to_string(),
        ExtractMode::OwnText => own_text.trim().to_string(),
        ExtractMode::InnerHtml => inner_html.to_string(),
        ExtractMode::Href => href?.to_string(),
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Case-insensitive substring match used by the `Literal` selector kind
/// (spec.md §4.4 "text-type uses case-insensitive substring matching
/// within a subtree").
pub fn literal_matches(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Walk a dot-separated path (`a.b.c`, numeric segments index arrays) into
/// a parsed JSON value, then evaluate the aggregator against it.
pub fn json_attribute_matches(
    raw: &str,
    json_path: &str,
    expected: Option<&serde_json::Value>,
    aggregator: JsonAggregator,
) -> ScanResult<bool> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ScanError::extractor(format!("invalid json attribute: {e}")))?;

    let resolved = resolve_json_path(&value, json_path);

    Ok(match aggregator {
        JsonAggregator::Any => resolved.iter().any(|v| matches_expected(v, expected)),
        JsonAggregator::All => !resolved.is_empty() && resolved.iter().all(|v| matches_expected(v, expected)),
        JsonAggregator::None => resolved.iter().all(|v| !matches_expected(v, expected)),
    })
}

fn matches_expected(value: &serde_json::Value, expected: Option<&serde_json::Value>) -> bool {
    match expected {
        Some(expected) => value == expected,
        None => !value.is_null(),
    }
}

/// Resolve a dotted path against a JSON value, flattening through arrays
/// encountered along the way (so `items.price` over `{"items":[{"price":1}]}`
/// yields `[1]`).
fn resolve_json_path<'a>(value: &'a serde_json::Value, path: &str) -> Vec<&'a serde_json::Value> {
    let mut current = vec![value];
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let mut next = Vec::new();
        for node in current {
            match node {
                serde_json::Value::Array(items) => {
                    for item in items {
                        if let Some(v) = item.get(segment) {
                            next.push(v);
                        }
                    }
                }
                _ => {
                    if let Some(v) = node.get(segment) {
                        next.push(v);
                    }
                }
            }
        }
        current = next;
    }
    current
}

/// Whether `kind` can be evaluated by the static (CSS-only) extractor.
/// XPath selectors are accepted by the configuration model (spec.md §3)
/// but this crate's static backend only implements CSS/literal/JSON
/// selectors; an XPath selector falls back through the fallback chain and
/// errors only if it is the last remaining candidate.
pub fn is_supported_by_css_backend(kind: &SelectorKind) -> bool {
    !matches!(kind, SelectorKind::XPath(_))
}

/// Try each selector in `selector.candidates()` via `try_one`, returning the
/// first non-empty value (spec.md §3 "fallback lists try values in order").
pub fn first_non_empty<F>(selector: &ShopSelector, mut try_one: F) -> ScanResult<Option<String>>
where
    F: FnMut(&SelectorKind) -> ScanResult<Option<String>>,
{
    for kind in selector.candidates() {
        if let Some(value) = try_one(kind)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match_is_case_insensitive() {
        assert!(literal_matches("In Stock Now", "in stock"));
        assert!(!literal_matches("Out of Stock", "in stock"));
    }

    #[test]
    fn json_path_resolves_nested_field() {
        let raw = r#"{"offers":{"availability":"InStock"}}"#;
        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        let resolved = resolve_json_path(&value, "offers.availability");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].as_str(), Some("InStock"));
    }

    #[test]
    fn json_attribute_any_matches_expected_value() {
        let raw = r#"{"offers":{"availability":"InStock"}}"#;
        let expected = serde_json::Value::String("InStock".into());
        let matched =
            json_attribute_matches(raw, "offers.availability", Some(&expected), JsonAggregator::Any).unwrap();
        assert!(matched);
    }

    #[test]
    fn json_attribute_none_requires_no_match() {
        let raw = r#"{"offers":{"availability":"OutOfStock"}}"#;
        let expected = serde_json::Value::String("InStock".into());
        let matched =
            json_attribute_matches(raw, "offers.availability", Some(&expected), JsonAggregator::None).unwrap();
        assert!(matched);
    }

    #[test]
    fn extract_mode_href_falls_through_when_absent() {
        assert_eq!(apply_extract_mode(ExtractMode::Href, "text", "text", "<a>text</a>", None), None);
    }
}
