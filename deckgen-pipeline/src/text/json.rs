//! JSON extraction from free-form text

use serde_json::{Map, Value};

/// Parse the first balanced `{...}` in `text` and keep only `keys`
///
/// Returns `None` when there is no balanced object, it does not parse, or
/// any of `keys` is missing.
pub fn find_and_parse_json(text: &str, keys: &[&str]) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut end = None;

    for (offset, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    end = Some(start + offset);
                    break;
                }
            }
            _ => {}
        }
    }

    let candidate = &text[start..=end?];
    let parsed: Value = serde_json::from_str(candidate).ok()?;
    let object = parsed.as_object()?;

    let mut selected = Map::new();
    for key in keys {
        selected.insert((*key).to_string(), object.get(*key)?.clone());
    }
    Some(selected)
}

/// String form of a JSON value: strings unquoted, anything else serialized
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_object_from_chatter() {
        let text = r#"Sure! Here it is: { "German": "der Hund", "English": "dog", "note": 1 } Hope that helps."#;
        let parsed = find_and_parse_json(text, &["German", "English"]).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["English"], "dog");
    }

    #[test]
    fn test_nested_braces() {
        let text = r#"{"German": "a", "English": "b", "extra": {"x": 1}} trailing }"#;
        assert!(find_and_parse_json(text, &["German"]).is_some());
    }

    #[test]
    fn test_missing_key_or_unbalanced() {
        assert!(find_and_parse_json(r#"{"German": "a"}"#, &["German", "English"]).is_none());
        assert!(find_and_parse_json(r#"{"German": "a""#, &["German"]).is_none());
        assert!(find_and_parse_json("no json here", &["German"]).is_none());
        assert!(find_and_parse_json("{not json}", &["German"]).is_none());
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&Value::String("x".into())), "x");
        assert_eq!(value_text(&serde_json::json!(3)), "3");
    }
}
