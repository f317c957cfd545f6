//! Declarative per-endpoint validation policies.
//!
//! Policies are plain data: they (de)serialize with serde so rule sets can be
//! shipped in the config file and versioned independently of the engine in
//! `validator.rs`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default rejection message for rate-limited requests.
pub const DEFAULT_RATE_LIMIT_MESSAGE: &str = "Too many requests";

/// A compiled field pattern that serializes as its source text.
#[derive(Clone)]
pub struct FieldPattern(Regex);

impl FieldPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPattern").field(&self.as_str()).finish()
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for FieldPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        FieldPattern::new(&source).map_err(serde::de::Error::custom)
    }
}

/// Type of a declared field with the constraints that apply to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    /// Text; bounds are in characters.
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<FieldPattern>,
    },
    /// Any finite number; numeric strings are accepted.
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Monetary amount; sanitization clamps and rounds to 8 decimals.
    Amount {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Email {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    /// Absolute http(s) URL.
    Url,
    Boolean,
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
}

impl FieldKind {
    pub fn string(min_length: Option<usize>, max_length: Option<usize>) -> Self {
        FieldKind::String { min_length, max_length, pattern: None }
    }

    /// String constrained by a built-in pattern.
    ///
    /// Panics if `pattern` does not compile; only used with literals.
    pub fn matching(pattern: &str) -> Self {
        FieldKind::String {
            min_length: None,
            max_length: None,
            pattern: Some(FieldPattern::new(pattern).expect("Invalid built-in field pattern")),
        }
    }

    pub fn number(min: Option<f64>, max: Option<f64>) -> Self {
        FieldKind::Number { min, max }
    }

    pub fn amount(min: Option<f64>, max: Option<f64>) -> Self {
        FieldKind::Amount { min, max }
    }

    pub fn email() -> Self {
        FieldKind::Email { max_length: Some(254) }
    }

    /// Name of the type tag, as written in config files.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String { .. } => "string",
            FieldKind::Number { .. } => "number",
            FieldKind::Amount { .. } => "amount",
            FieldKind::Email { .. } => "email",
            FieldKind::Url => "url",
            FieldKind::Boolean => "boolean",
            FieldKind::Array { .. } => "array",
        }
    }
}

/// Constraint on one request field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub field: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Run the value through the input sanitizer.
    #[serde(default)]
    pub sanitize: bool,
}

impl ValidationRule {
    pub fn new(field: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            field: field.into(),
            kind,
            required: false,
            sanitize: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn sanitized(mut self) -> Self {
        self.sanitize = true;
        self
    }
}

/// Sliding-window limit for one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub window_ms: u64,
    pub max_requests: u32,
    #[serde(default = "default_rate_limit_message")]
    pub message: String,
}

impl RateLimitPolicy {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
            message: DEFAULT_RATE_LIMIT_MESSAGE.to_string(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

fn default_rate_limit_message() -> String {
    DEFAULT_RATE_LIMIT_MESSAGE.to_string()
}

fn default_methods() -> Vec<String> {
    vec!["POST".to_string()]
}

fn default_true() -> bool {
    true
}

/// Everything the request validator needs to know about one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointPolicy {
    /// HTTP methods the endpoint is mounted for.
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,

    #[serde(default)]
    pub rate_limit: Option<RateLimitPolicy>,

    #[serde(default)]
    pub rules: Vec<ValidationRule>,

    /// Master switch for per-rule sanitization.
    #[serde(default = "default_true")]
    pub sanitize: bool,

    /// Emit a security event for every rejection.
    #[serde(default)]
    pub log_events: bool,
}

impl Default for EndpointPolicy {
    fn default() -> Self {
        Self {
            methods: default_methods(),
            rate_limit: None,
            rules: Vec::new(),
            sanitize: true,
            log_events: false,
        }
    }
}

/// Checkout session creation.
pub fn payment_policy() -> EndpointPolicy {
    EndpointPolicy {
        methods: default_methods(),
        rate_limit: Some(RateLimitPolicy {
            window_ms: 15 * 60 * 1000,
            max_requests: 10,
            message: "Too many payment attempts, please try again later".to_string(),
        }),
        rules: vec![
            ValidationRule::new("priceId", FieldKind::matching(r"^price_[A-Za-z0-9]{8,64}$")).required(),
            ValidationRule::new("email", FieldKind::email()).sanitized(),
            ValidationRule::new("amount", FieldKind::amount(Some(0.5), Some(100_000.0))).sanitized(),
            ValidationRule::new("successUrl", FieldKind::Url).sanitized(),
            ValidationRule::new("cancelUrl", FieldKind::Url).sanitized(),
        ],
        sanitize: true,
        log_events: true,
    }
}

/// Affiliate program applications.
pub fn affiliate_policy() -> EndpointPolicy {
    EndpointPolicy {
        methods: default_methods(),
        rate_limit: Some(RateLimitPolicy::new(60 * 60 * 1000, 5)),
        rules: vec![
            ValidationRule::new("name", FieldKind::string(Some(2), Some(100))).required().sanitized(),
            ValidationRule::new("email", FieldKind::email()).required().sanitized(),
            ValidationRule::new("website", FieldKind::Url),
            ValidationRule::new("audience", FieldKind::string(None, Some(1000))).sanitized(),
            ValidationRule::new(
                "platforms",
                FieldKind::Array { min_items: None, max_items: Some(10) },
            )
            .sanitized(),
        ],
        sanitize: true,
        log_events: true,
    }
}

/// Crypto-to-metal conversion requests.
pub fn calculator_policy() -> EndpointPolicy {
    EndpointPolicy {
        methods: vec!["GET".to_string(), "POST".to_string()],
        rate_limit: Some(RateLimitPolicy::new(60 * 1000, 100)),
        rules: vec![
            ValidationRule::new("amount", FieldKind::amount(Some(0.000_000_01), Some(1_000_000_000.0)))
                .required()
                .sanitized(),
            ValidationRule::new("currency", FieldKind::matching(r"^[A-Z]{3,4}$")).required(),
            ValidationRule::new("metal", FieldKind::matching(r"^(gold|silver|platinum|palladium)$")),
            ValidationRule::new("years", FieldKind::number(Some(1.0), Some(50.0))),
        ],
        sanitize: true,
        log_events: false,
    }
}

/// Contact form submissions.
pub fn contact_policy() -> EndpointPolicy {
    EndpointPolicy {
        methods: default_methods(),
        rate_limit: Some(RateLimitPolicy::new(15 * 60 * 1000, 3)),
        rules: vec![
            ValidationRule::new("name", FieldKind::string(Some(1), Some(100))).required().sanitized(),
            ValidationRule::new("email", FieldKind::email()).required().sanitized(),
            ValidationRule::new("subject", FieldKind::string(None, Some(200))).sanitized(),
            ValidationRule::new("message", FieldKind::string(Some(10), Some(5000))).required().sanitized(),
        ],
        sanitize: true,
        log_events: true,
    }
}

/// The built-in endpoint policies, keyed by endpoint name.
pub fn default_policies() -> BTreeMap<String, EndpointPolicy> {
    BTreeMap::from([
        ("payment".to_string(), payment_policy()),
        ("affiliate".to_string(), affiliate_policy()),
        ("calculator".to_string(), calculator_policy()),
        ("contact".to_string(), contact_policy()),
    ])
}
