//! Type-directed sanitization of untrusted input.
//!
//! # Responsibilities
//! - Coerce any JSON value to text and enforce a length limit
//! - Clean the text according to its semantic kind
//! - Run a final security check over whatever is returned
//!
//! # Design Decisions
//! - Never fails: every problem is reported through `SanitizationResult`
//! - Over-long input is truncated AND marked invalid; callers decide whether
//!   the truncated value is still usable
//! - Text escaping is idempotent so values can be sanitized at several layers

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use url::Url;

use crate::sanitize::patterns::{DANGEROUS_CONTENT, EMAIL_FORMAT, SQL_INJECTION, TEXT_DENYLIST};

/// Default maximum input length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Upper bound for monetary amounts.
pub const MAX_AMOUNT: f64 = 1_000_000_000.0;

/// Amounts keep eight decimal places (satoshi precision).
const AMOUNT_SCALE: f64 = 100_000_000.0;

/// Share of punctuation above which a warning is attached.
const SPECIAL_CHAR_RATIO: f64 = 0.3;

const EMAIL_FORBIDDEN: &[char] = &['<', '>', '\'', '"', '(', ')', '[', ']', '{', '}', '\\'];

/// Entities produced by `escape_html`; an `&` starting one of these is kept.
const ESCAPED_ENTITIES: &[&str] = &["amp;", "lt;", "gt;", "quot;", "#x27;"];

/// Domains whose URLs are accepted by default.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "coingecko.com",
    "stripe.com",
    "metals-api.com",
    "goldapi.io",
];

/// Semantic kind of an input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizeKind {
    Text,
    Number,
    Amount,
    Email,
    Url,
    Crypto,
}

impl fmt::Display for SanitizeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SanitizeKind::Text => "text",
            SanitizeKind::Number => "number",
            SanitizeKind::Amount => "amount",
            SanitizeKind::Email => "email",
            SanitizeKind::Url => "url",
            SanitizeKind::Crypto => "crypto",
        };
        f.write_str(name)
    }
}

impl FromStr for SanitizeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(SanitizeKind::Text),
            "number" => Ok(SanitizeKind::Number),
            "amount" => Ok(SanitizeKind::Amount),
            "email" => Ok(SanitizeKind::Email),
            "url" => Ok(SanitizeKind::Url),
            "crypto" => Ok(SanitizeKind::Crypto),
            other => Err(format!("unknown input kind: {}", other)),
        }
    }
}

/// Per-call sanitization options.
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    /// Keep HTML markup in text (the final security check still applies).
    pub allow_html: bool,
    /// Maximum length in characters; longer input is truncated.
    pub max_length: usize,
    /// Pattern whose matches are removed from text input.
    pub strip_chars: Option<Regex>,
    /// Trim surrounding whitespace.
    pub trim_whitespace: bool,
    /// Return numbers as JSON numbers rather than decimal strings.
    pub convert_to_number: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            allow_html: false,
            max_length: DEFAULT_MAX_LENGTH,
            strip_chars: None,
            trim_whitespace: true,
            convert_to_number: true,
        }
    }
}

/// Outcome of a single sanitization call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizationResult {
    pub is_valid: bool,
    pub sanitized_value: Value,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SanitizationResult {
    fn new() -> Self {
        Self {
            is_valid: true,
            sanitized_value: Value::Null,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn reject(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    /// The sanitized value rendered as text.
    pub fn as_text(&self) -> String {
        match &self.sanitized_value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Cleans untrusted values according to their kind.
#[derive(Debug, Clone)]
pub struct InputSanitizer {
    trusted_domains: Vec<String>,
}

impl Default for InputSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_TRUSTED_DOMAINS.iter().copied())
    }
}

impl InputSanitizer {
    /// Create a sanitizer accepting URLs on the given domains and their subdomains.
    pub fn new<I, S>(trusted_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trusted_domains: trusted_domains
                .into_iter()
                .map(|d| d.into().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn trusted_domains(&self) -> &[String] {
        &self.trusted_domains
    }

    /// Whether `host` is one of the trusted domains or a subdomain of one.
    pub fn is_trusted_host(&self, host: &str) -> bool {
        self.trusted_domains.iter().any(|d| host_matches(host, d))
    }

    /// Sanitize a string value.
    pub fn sanitize_str(&self, input: &str, kind: SanitizeKind, options: &SanitizeOptions) -> SanitizationResult {
        self.sanitize(&Value::String(input.to_string()), kind, options)
    }

    /// Sanitize any JSON value as the given kind.
    pub fn sanitize(&self, input: &Value, kind: SanitizeKind, options: &SanitizeOptions) -> SanitizationResult {
        let mut result = SanitizationResult::new();

        let mut raw = coerce_to_string(input);
        if options.trim_whitespace {
            raw = raw.trim().to_string();
        }

        if raw.chars().count() > options.max_length {
            raw = raw.chars().take(options.max_length).collect();
            result
                .warnings
                .push(format!("Input truncated to {} characters", options.max_length));
            result.reject(format!(
                "Input exceeds maximum length of {} characters",
                options.max_length
            ));
        }

        result.sanitized_value = match kind {
            SanitizeKind::Text => Value::String(sanitize_text(&raw, options)),
            SanitizeKind::Number => sanitize_number(&raw, false, options, &mut result),
            SanitizeKind::Amount => sanitize_number(&raw, true, options, &mut result),
            SanitizeKind::Email => Value::String(sanitize_email(&raw, &mut result)),
            SanitizeKind::Url => Value::String(self.sanitize_url(&raw, &mut result)),
            SanitizeKind::Crypto => Value::String(sanitize_crypto(&raw)),
        };

        security_check(&mut result);
        result
    }

    fn sanitize_url(&self, raw: &str, result: &mut SanitizationResult) -> String {
        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            result.reject("URL must use http or https");
            return String::new();
        }

        let parsed = match Url::parse(raw) {
            Ok(url) => url,
            Err(_) => {
                result.reject("Invalid URL");
                return String::new();
            }
        };

        match parsed.host_str() {
            Some(host) if self.is_trusted_host(host) => parsed.to_string(),
            _ => {
                result.reject("URL domain is not trusted");
                String::new()
            }
        }
    }
}

/// Case-insensitive "equal to or subdomain of" check.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Round an amount to eight decimal places.
pub fn round_amount(value: f64) -> f64 {
    (value * AMOUNT_SCALE).round() / AMOUNT_SCALE
}

fn coerce_to_string(input: &Value) -> String {
    match input {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        // f64 Display never uses exponent notation, which the number
        // path would otherwise mangle.
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn sanitize_text(raw: &str, options: &SanitizeOptions) -> String {
    let mut text = if options.allow_html {
        raw.to_string()
    } else {
        let stripped = strip_denylisted(raw);
        let stripped = if options.trim_whitespace { stripped.trim() } else { stripped.as_str() };
        escape_html(stripped)
    };

    if let Some(pattern) = &options.strip_chars {
        text = pattern.replace_all(&text, "").into_owned();
    }

    if options.trim_whitespace {
        text = text.trim().to_string();
    }
    text
}

/// Remove denylisted markers until none remain, so fragments cannot
/// reassemble into a marker after one pass.
fn strip_denylisted(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let mut next = current.clone();
        for pattern in TEXT_DENYLIST.iter() {
            next = pattern.replace_all(&next, "").into_owned();
        }
        if next == current {
            return next;
        }
        current = next;
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        match ch {
            '&' => {
                let rest = &text[idx + 1..];
                if ESCAPED_ENTITIES.iter().any(|e| rest.starts_with(e)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn sanitize_number(raw: &str, amount: bool, options: &SanitizeOptions, result: &mut SanitizationResult) -> Value {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() || cleaned == "-" || cleaned == "." {
        result.reject("Invalid number format");
        return Value::Null;
    }

    let mut number = match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => {
            result.reject("Invalid number format");
            return Value::Null;
        }
    };

    if amount {
        let clamped = number.clamp(0.0, MAX_AMOUNT);
        if clamped != number {
            result
                .warnings
                .push(format!("Amount clamped to the range 0 to {}", MAX_AMOUNT));
        }
        number = round_amount(clamped);
    }

    // Normalize negative zero.
    if number == 0.0 {
        number = 0.0;
    }

    if options.convert_to_number {
        Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
    } else {
        Value::String(number.to_string())
    }
}

fn sanitize_email(raw: &str, result: &mut SanitizationResult) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !EMAIL_FORBIDDEN.contains(c))
        .collect();

    if !cleaned.is_empty() && !EMAIL_FORMAT.is_match(&cleaned) {
        result.reject("Invalid email format");
    }
    cleaned
}

fn sanitize_crypto(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ' ' | '.' | '-'))
        .collect()
}

fn security_check(result: &mut SanitizationResult) {
    let rendered = result.as_text();

    if SQL_INJECTION.is_match(&rendered) {
        result.reject("Potential SQL injection detected");
    }
    if DANGEROUS_CONTENT.is_match(&rendered) {
        result.reject("Potentially dangerous content detected");
    }

    let total = rendered.chars().count();
    if total > 0 {
        let special = rendered
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count();
        if special as f64 / total as f64 > SPECIAL_CHAR_RATIO {
            result.warnings.push("High ratio of special characters".to_string());
        }
    }
}
