//! Redaction of secrets before data reaches logs or clients.

use serde_json::{Map, Value};

use crate::sanitize::patterns::{INLINE_SECRETS, SENSITIVE_KEY};

/// Replacement for sensitive values that are not strings.
pub const REDACTED: &str = "[REDACTED]";

/// Characters of a secret string left visible.
const VISIBLE_PREFIX: usize = 4;

const MASK_LENGTH: usize = 8;

/// Whether a field name denotes a secret.
pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEY.is_match(&snake_case(key))
}

/// `apiKey` -> `api_key`, `Authorization` -> `authorization`.
fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch.is_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        out.extend(ch.to_lowercase());
    }
    out
}

/// Recursively mask every value stored under a sensitive key.
pub fn mask_sensitive_data(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let masked: Map<String, Value> = fields
                .iter()
                .map(|(key, child)| {
                    let child = if is_sensitive_key(key) {
                        mask_value(child)
                    } else {
                        mask_sensitive_data(child)
                    };
                    (key.clone(), child)
                })
                .collect();
            Value::Object(masked)
        }
        Value::Array(items) => Value::Array(items.iter().map(mask_sensitive_data).collect()),
        other => other.clone(),
    }
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(secret) => Value::String(mask_secret(secret)),
        Value::Null => Value::Null,
        _ => Value::String(REDACTED.to_string()),
    }
}

/// Keep a short prefix of long secrets so operators can tell keys apart.
pub fn mask_secret(secret: &str) -> String {
    let length = secret.chars().count();
    if length <= MASK_LENGTH {
        return "*".repeat(MASK_LENGTH);
    }
    let prefix: String = secret.chars().take(VISIBLE_PREFIX).collect();
    format!("{}{}", prefix, "*".repeat(MASK_LENGTH))
}

/// Replace secrets embedded in free text (error messages, URLs).
pub fn mask_inline_secrets(text: &str) -> String {
    INLINE_SECRETS
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}
