//! Strict readers for backend output.
//!
//! Backend text is never trusted to have the requested shape. Callers pull
//! each field through one of these helpers and supply their own fallback.

use serde_json::{Map, Value};

/// Locate the JSON object inside a completion.
///
/// Strips Markdown code fences, then takes the span from the first `{` to
/// the last `}`. Returns the trimmed input when no braces are present.
pub fn extract_json(response: &str) -> &str {
    let mut text = response.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop an optional language tag on the fence line
        let body = rest.strip_prefix("json").unwrap_or(rest);
        text = match body.rfind("```") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        };
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Parse a completion as a JSON object; `None` for anything else.
pub fn parse_object(response: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(extract_json(response)) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Completion is not valid JSON: {}", e);
            None
        }
    }
}

/// A non-empty, trimmed string field.
pub fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Reduce a one-word answer to a bare lowercase label.
///
/// `"Document."`, `` `tabular` `` and `**Both**` all normalize to their word.
pub fn normalize_label(response: &str) -> String {
    let first_line = response.trim().lines().next().unwrap_or("");
    first_line
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Drop a `collection.` prefix from a field name.
pub fn strip_namespace(field: &str) -> &str {
    field.rsplit('.').next().unwrap_or(field).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_variants() {
        let plain = r#"{"select": "*"}"#;
        assert_eq!(extract_json(plain), plain);

        let fenced = "```json\n{\"select\": \"*\"}\n```";
        assert_eq!(extract_json(fenced), "{\"select\": \"*\"}");

        let bare_fence = "```\n{\"limit\": 5}\n```";
        assert_eq!(extract_json(bare_fence), "{\"limit\": 5}");

        let chatty = "Sure! Here is the query:\n{\"filters\": []}\nLet me know.";
        assert_eq!(extract_json(chatty), "{\"filters\": []}");
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object("[1, 2]").is_none());
        assert!(parse_object("not json").is_none());
        assert!(parse_object("{\"a\": 1").is_none());
        assert_eq!(parse_object("{\"a\": 1}").unwrap().len(), 1);
    }

    #[test]
    fn test_string_field() {
        let obj = parse_object(r#"{"a": " users ", "b": "", "c": 3}"#).unwrap();
        assert_eq!(string_field(&obj, "a").as_deref(), Some("users"));
        assert_eq!(string_field(&obj, "b"), None);
        assert_eq!(string_field(&obj, "c"), None);
        assert_eq!(string_field(&obj, "d"), None);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Document."), "document");
        assert_eq!(normalize_label("`tabular`"), "tabular");
        assert_eq!(normalize_label("**Both**\nbecause"), "both");
        assert_eq!(normalize_label("  "), "");
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(strip_namespace("products.price"), "price");
        assert_eq!(strip_namespace("price"), "price");
    }
}
