//! Recursive sanitization of structured payloads.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::sanitize::input::{InputSanitizer, SanitizeKind, SanitizeOptions};
use crate::sanitize::patterns::{DANGEROUS_CONTENT, SQL_INJECTION};

/// Field name → kind lookup used by [`InputSanitizer::sanitize_object`].
pub type TypeMap = HashMap<String, SanitizeKind>;

impl InputSanitizer {
    /// Sanitize every value of a nested structure.
    ///
    /// Object fields use the kind registered for their name in `type_map`
    /// (text when absent) and array elements inherit the kind of the field
    /// holding the array. Fields and elements that fail sanitization are
    /// dropped, as are fields whose key itself looks hostile. Booleans and
    /// nulls pass through unchanged.
    pub fn sanitize_object(&self, value: &Value, type_map: &TypeMap) -> Value {
        self.sanitize_node(value, SanitizeKind::Text, type_map)
            .unwrap_or(Value::Null)
    }

    fn sanitize_node(&self, value: &Value, kind: SanitizeKind, type_map: &TypeMap) -> Option<Value> {
        match value {
            Value::Object(fields) => {
                let mut clean = Map::new();
                for (key, child) in fields {
                    if DANGEROUS_CONTENT.is_match(key) || SQL_INJECTION.is_match(key) {
                        tracing::debug!(key = %key.escape_debug(), "Dropping field with hostile key");
                        continue;
                    }
                    let child_kind = type_map.get(key).copied().unwrap_or(SanitizeKind::Text);
                    if let Some(value) = self.sanitize_node(child, child_kind, type_map) {
                        clean.insert(key.clone(), value);
                    }
                }
                Some(Value::Object(clean))
            }
            Value::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .filter_map(|item| self.sanitize_node(item, kind, type_map))
                    .collect(),
            )),
            Value::String(_) => self.sanitize_leaf(value, kind),
            Value::Number(_) if matches!(kind, SanitizeKind::Number | SanitizeKind::Amount) => {
                self.sanitize_leaf(value, kind)
            }
            _ => Some(value.clone()),
        }
    }

    fn sanitize_leaf(&self, value: &Value, kind: SanitizeKind) -> Option<Value> {
        let result = self.sanitize(value, kind, &SanitizeOptions::default());
        result.is_valid.then_some(result.sanitized_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_object_sanitization() {
        let sanitizer = InputSanitizer::default();
        let mut types = TypeMap::new();
        types.insert("amount".into(), SanitizeKind::Amount);
        types.insert("email".into(), SanitizeKind::Email);
        types.insert("symbols".into(), SanitizeKind::Crypto);

        let input = json!({
            "amount": "12.123456789",
            "email": "Ada@Example.com",
            "note": "<b>hi</b>",
            "symbols": ["btc", "eth"],
            "profile": {
                "bio": "<script>x()</script>gold fan",
                "verified": true,
                "nickname": null
            }
        });

        let clean = sanitizer.sanitize_object(&input, &types);
        assert_eq!(clean["amount"], json!(12.12345679));
        assert_eq!(clean["email"], json!("ada@example.com"));
        assert_eq!(clean["note"], json!("&lt;b&gt;hi&lt;/b&gt;"));
        assert_eq!(clean["symbols"], json!(["BTC", "ETH"]));
        assert_eq!(clean["profile"]["bio"], json!("gold fan"));
        assert_eq!(clean["profile"]["verified"], json!(true));
        assert_eq!(clean["profile"]["nickname"], Value::Null);
    }

    #[test]
    fn test_invalid_fields_are_dropped() {
        let sanitizer = InputSanitizer::default();
        let mut types = TypeMap::new();
        types.insert("website".into(), SanitizeKind::Url);

        let input = json!({
            "website": "https://evil.com",
            "comment": "1; DROP TABLE users",
            "tags": ["ok", "x' OR 1=1"],
            "onclick=": "value",
            "count": 3
        });

        let clean = sanitizer.sanitize_object(&input, &types);
        let fields = clean.as_object().unwrap();
        assert!(!fields.contains_key("website"));
        assert!(!fields.contains_key("comment"));
        assert!(!fields.contains_key("onclick="));
        assert_eq!(clean["tags"], json!(["ok"]));
        assert_eq!(clean["count"], json!(3));
    }
}
