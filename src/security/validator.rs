//! Request validation pipeline.
//!
//! # Data Flow
//! ```text
//! InboundRequest + EndpointPolicy
//!     → rate limit (route, client ip)
//!     → size check
//!     → body parsing (query / JSON / form)
//!     → per-rule checks, optional sanitization
//!     → whole-request heuristics
//!     → ValidationOutcome
//! ```
//!
//! # Design Decisions
//! - Rejections are data (`ValidationOutcome`), never `Err`
//! - Field rules are all evaluated so clients see every problem at once
//! - Error strings name the field, never echo the submitted value

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::config::schema::SecurityConfig;
use crate::http::request::InboundRequest;
use crate::sanitize::patterns::EMAIL_FORMAT;
use crate::sanitize::{InputSanitizer, SanitizeKind, SanitizeOptions, TypeMap, DEFAULT_MAX_LENGTH};
use crate::security::client_ip::resolve_client_ip;
use crate::security::events::{SecurityEvent, Severity};
use crate::security::heuristics::detect_threats;
use crate::security::rate_limit::RateLimiter;
use crate::security::rules::{EndpointPolicy, FieldKind, RateLimitPolicy, ValidationRule};

/// Generic message used when validation itself fails.
pub const GENERIC_FAILURE: &str = "Request validation failed";
pub const INVALID_FORMAT: &str = "Invalid request format";
pub const BODY_TOO_LARGE: &str = "Request body too large";

/// Internal failures while validating a request.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("failed to serialize request fields: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    RateLimited,
    PayloadTooLarge,
    MalformedBody,
    InvalidFields,
    ThreatDetected,
    Internal,
}

impl Rejection {
    pub fn severity(&self) -> Severity {
        match self {
            Rejection::MalformedBody | Rejection::InvalidFields => Severity::Low,
            Rejection::RateLimited | Rejection::PayloadTooLarge => Severity::Medium,
            Rejection::ThreatDetected | Rejection::Internal => Severity::High,
        }
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::RateLimited => "rate_limited",
            Rejection::PayloadTooLarge => "payload_too_large",
            Rejection::MalformedBody => "malformed_body",
            Rejection::InvalidFields => "invalid_fields",
            Rejection::ThreatDetected => "threat_detected",
            Rejection::Internal => "internal",
        }
    }
}

/// Result of validating one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_data: Option<Value>,
    #[serde(skip)]
    pub rejection: Option<Rejection>,
    /// Set for rate-limited requests.
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl ValidationOutcome {
    pub fn accepted(data: Value) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            sanitized_data: Some(data),
            rejection: None,
            retry_after: None,
        }
    }

    pub fn rejected(rejection: Rejection, errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
            sanitized_data: None,
            rejection: Some(rejection),
            retry_after: None,
        }
    }
}

/// Validates requests against endpoint policies.
///
/// One instance is shared by every endpoint; the rate limiter inside it is
/// keyed by route so endpoints never share counters.
#[derive(Debug)]
pub struct RequestValidator {
    sanitizer: InputSanitizer,
    limiter: RateLimiter,
    max_request_size: usize,
    flag_private_forwarded_ips: bool,
    default_rate_limit: Option<RateLimitPolicy>,
}

impl RequestValidator {
    pub fn new(config: &SecurityConfig) -> Self {
        let default_rate_limit = config
            .rate_limit
            .enabled
            .then(|| RateLimitPolicy::new(config.rate_limit.window_ms, config.rate_limit.max_requests));

        Self {
            sanitizer: InputSanitizer::new(config.trusted_domains.iter().cloned()),
            limiter: RateLimiter::new(),
            max_request_size: config.max_request_size,
            flag_private_forwarded_ips: config.flag_private_forwarded_ips,
            default_rate_limit,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    /// Rate limit applied to `policy`, falling back to the configured default.
    pub fn effective_rate_limit<'a>(&'a self, policy: &'a EndpointPolicy) -> Option<&'a RateLimitPolicy> {
        policy.rate_limit.as_ref().or(self.default_rate_limit.as_ref())
    }

    /// Run the full pipeline for one request.
    pub fn validate_request(&self, request: &InboundRequest, policy: &EndpointPolicy) -> ValidationOutcome {
        let client_ip = resolve_client_ip(&request.headers, request.peer_addr);

        let outcome = match self.run_pipeline(request, policy, &client_ip) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, path = %request.path(), "Request validation failed internally");
                ValidationOutcome::rejected(Rejection::Internal, vec![GENERIC_FAILURE.to_string()])
            }
        };

        if let Some(rejection) = outcome.rejection {
            if policy.log_events {
                SecurityEvent::new(request, &client_ip, outcome.errors.clone(), rejection.severity()).emit();
            } else {
                tracing::debug!(
                    ip = %client_ip,
                    path = %request.path(),
                    reason = rejection.as_str(),
                    errors = ?outcome.errors,
                    "Request rejected"
                );
            }
        }

        outcome
    }

    fn run_pipeline(
        &self,
        request: &InboundRequest,
        policy: &EndpointPolicy,
        client_ip: &str,
    ) -> Result<ValidationOutcome, GuardError> {
        if let Some(limit) = self.effective_rate_limit(policy) {
            let decision = self.limiter.check(request.path(), client_ip, limit);
            if !decision.allowed {
                let mut outcome = ValidationOutcome::rejected(Rejection::RateLimited, vec![limit.message.clone()]);
                outcome.retry_after = decision.retry_after;
                return Ok(outcome);
            }
        }

        if request.body_too_large || request.body.len() > self.max_request_size {
            return Ok(ValidationOutcome::rejected(
                Rejection::PayloadTooLarge,
                vec![BODY_TOO_LARGE.to_string()],
            ));
        }

        let Some(fields) = parse_fields(request) else {
            return Ok(ValidationOutcome::rejected(
                Rejection::MalformedBody,
                vec![INVALID_FORMAT.to_string()],
            ));
        };

        let mut errors = Vec::new();
        let mut sanitized = Map::new();
        for rule in &policy.rules {
            let sanitize = policy.sanitize && rule.sanitize;
            if let Some(value) = self.check_rule(rule, fields.get(&rule.field), sanitize, &mut errors) {
                sanitized.insert(rule.field.clone(), value);
            }
        }

        let surfaces = self.threat_surfaces(request, &fields)?;
        let threats = detect_threats(
            &surfaces[..],
            &request.headers,
            self.flag_private_forwarded_ips,
        );

        if !threats.is_empty() {
            errors.extend(threats.iter().map(|t| t.message().to_string()));
            return Ok(ValidationOutcome::rejected(Rejection::ThreatDetected, errors));
        }
        if !errors.is_empty() {
            return Ok(ValidationOutcome::rejected(Rejection::InvalidFields, errors));
        }

        Ok(ValidationOutcome::accepted(Value::Object(sanitized)))
    }

    /// Renderings of the request scanned by the heuristics.
    fn threat_surfaces(&self, request: &InboundRequest, fields: &Map<String, Value>) -> Result<Vec<String>, GuardError> {
        let mut surfaces = vec![serde_json::to_string(fields)?];

        if !reads_query(request) {
            if let Some(query) = request.query().and_then(form_fields) {
                surfaces.push(serde_json::to_string(&query)?);
            }
        }

        // Form bodies are covered by their parsed rendering; raw form text
        // would match `on*=` on ordinary keys.
        if is_json(request) {
            if let Ok(raw) = std::str::from_utf8(&request.body) {
                surfaces.push(raw.to_string());
            }
        }

        Ok(surfaces)
    }

    /// Check one rule, pushing errors; returns the value to keep.
    fn check_rule(
        &self,
        rule: &ValidationRule,
        value: Option<&Value>,
        sanitize: bool,
        errors: &mut Vec<String>,
    ) -> Option<Value> {
        let field = rule.field.as_str();
        let value = match value {
            Some(value) if !is_blank(value) => value,
            _ => {
                if rule.required {
                    errors.push(format!("{} is required", field));
                }
                return None;
            }
        };

        let before = errors.len();
        let kept = match &rule.kind {
            FieldKind::String { min_length, max_length, pattern } => {
                let Some(text) = value.as_str() else {
                    errors.push(format!("{} must be a string", field));
                    return None;
                };
                let length = text.trim().chars().count();
                if let Some(min) = min_length {
                    if length < *min {
                        errors.push(format!("{} must be at least {} characters", field, min));
                    }
                }
                if let Some(max) = max_length {
                    if length > *max {
                        errors.push(format!("{} must be at most {} characters", field, max));
                    }
                }
                if let Some(pattern) = pattern {
                    if !pattern.is_match(text) {
                        errors.push(format!("{} format is invalid", field));
                    }
                }
                if sanitize && errors.len() == before {
                    self.sanitize_field(field, value, SanitizeKind::Text, *max_length, errors)
                } else {
                    Some(value.clone())
                }
            }
            FieldKind::Number { min, max } | FieldKind::Amount { min, max } => {
                let Some(number) = coerce_number(value) else {
                    errors.push(format!("{} must be a valid number", field));
                    return None;
                };
                if let Some(min) = min {
                    if number < *min {
                        errors.push(format!("{} must be at least {}", field, min));
                    }
                }
                if let Some(max) = max {
                    if number > *max {
                        errors.push(format!("{} must be at most {}", field, max));
                    }
                }
                let kind = match rule.kind {
                    FieldKind::Amount { .. } => SanitizeKind::Amount,
                    _ => SanitizeKind::Number,
                };
                if sanitize && errors.len() == before {
                    self.sanitize_field(field, value, kind, None, errors)
                } else if value.is_number() {
                    Some(value.clone())
                } else {
                    Some(number_value(number))
                }
            }
            FieldKind::Email { max_length } => {
                let Some(text) = value.as_str() else {
                    errors.push(format!("{} must be a string", field));
                    return None;
                };
                if let Some(max) = max_length {
                    if text.trim().chars().count() > *max {
                        errors.push(format!("{} must be at most {} characters", field, max));
                    }
                }
                if !EMAIL_FORMAT.is_match(text.trim()) {
                    errors.push(format!("{} must be a valid email address", field));
                }
                if sanitize && errors.len() == before {
                    self.sanitize_field(field, value, SanitizeKind::Email, *max_length, errors)
                } else {
                    Some(value.clone())
                }
            }
            FieldKind::Url => {
                let Some(text) = value.as_str() else {
                    errors.push(format!("{} must be a string", field));
                    return None;
                };
                if !is_http_url(text.trim()) {
                    errors.push(format!("{} must be a valid URL", field));
                    return None;
                }
                if sanitize && errors.len() == before {
                    self.sanitize_field(field, value, SanitizeKind::Url, None, errors)
                } else {
                    Some(value.clone())
                }
            }
            FieldKind::Boolean => match value {
                Value::Bool(flag) => Some(Value::Bool(*flag)),
                Value::String(text) if text == "true" => Some(Value::Bool(true)),
                Value::String(text) if text == "false" => Some(Value::Bool(false)),
                _ => {
                    errors.push(format!("{} must be a boolean", field));
                    None
                }
            },
            FieldKind::Array { min_items, max_items } => {
                let Some(items) = value.as_array() else {
                    errors.push(format!("{} must be an array", field));
                    return None;
                };
                if let Some(min) = min_items {
                    if items.len() < *min {
                        errors.push(format!("{} must contain at least {} items", field, min));
                    }
                }
                if let Some(max) = max_items {
                    if items.len() > *max {
                        errors.push(format!("{} must contain at most {} items", field, max));
                    }
                }
                if sanitize && errors.len() == before {
                    self.sanitize_items(field, items, errors)
                } else {
                    Some(value.clone())
                }
            }
        };

        if errors.len() > before {
            None
        } else {
            kept
        }
    }

    fn sanitize_field(
        &self,
        field: &str,
        value: &Value,
        kind: SanitizeKind,
        max_length: Option<usize>,
        errors: &mut Vec<String>,
    ) -> Option<Value> {
        let options = SanitizeOptions {
            max_length: max_length.map_or(DEFAULT_MAX_LENGTH, |max| max.max(DEFAULT_MAX_LENGTH)),
            ..SanitizeOptions::default()
        };
        let result = self.sanitizer.sanitize(value, kind, &options);

        if !result.warnings.is_empty() {
            tracing::debug!(field = %field, warnings = ?result.warnings, "Sanitization warnings");
        }
        if !result.is_valid {
            tracing::debug!(field = %field, errors = ?result.errors, "Sanitization rejected field");
            errors.push(format!("{} contains invalid content", field));
            return None;
        }
        Some(result.sanitized_value)
    }

    fn sanitize_items(&self, field: &str, items: &[Value], errors: &mut Vec<String>) -> Option<Value> {
        let mut cleaned = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::String(_) => cleaned.push(self.sanitize_field(field, item, SanitizeKind::Text, None, errors)?),
                Value::Object(_) | Value::Array(_) => {
                    cleaned.push(self.sanitizer.sanitize_object(item, &TypeMap::new()))
                }
                other => cleaned.push(other.clone()),
            }
        }
        Some(Value::Array(cleaned))
    }
}

fn reads_query(request: &InboundRequest) -> bool {
    request.method == axum::http::Method::GET || request.method == axum::http::Method::HEAD
}

fn is_json(request: &InboundRequest) -> bool {
    request
        .content_type()
        .map(|ct| ct == "application/json" || ct.ends_with("+json"))
        .unwrap_or(false)
}

fn is_form(request: &InboundRequest) -> bool {
    request.content_type().as_deref() == Some("application/x-www-form-urlencoded")
}

/// Extract the request's fields; `None` when the body cannot be understood.
fn parse_fields(request: &InboundRequest) -> Option<Map<String, Value>> {
    if reads_query(request) {
        return match request.query() {
            Some(query) => form_fields(query),
            None => Some(Map::new()),
        };
    }

    if request.body.is_empty() {
        return Some(Map::new());
    }

    if is_json(request) {
        return match serde_json::from_slice::<Value>(&request.body) {
            Ok(Value::Object(fields)) => Some(fields),
            _ => None,
        };
    }

    if is_form(request) {
        let body = std::str::from_utf8(&request.body).ok()?;
        return form_fields(body);
    }

    None
}

/// Decode `application/x-www-form-urlencoded` pairs; repeated keys become arrays.
fn form_fields(encoded: &str) -> Option<Map<String, Value>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded).ok()?;
    let mut fields = Map::new();
    for (key, value) in pairs {
        match fields.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                fields.insert(key, Value::String(value));
            }
        }
    }
    Some(fields)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let text = text.trim();
            // Only plain decimal notation; the sanitizer would rewrite anything else.
            if !text.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
                return None;
            }
            text.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Largest integer every f64 in range represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// JSON number for a coerced value; integral values stay integers.
fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        Value::from(number as i64)
    } else {
        Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn is_http_url(text: &str) -> bool {
    url::Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::rules::{affiliate_policy, calculator_policy, contact_policy};
    use axum::http::Method;
    use serde_json::json;

    fn validator() -> RequestValidator {
        RequestValidator::new(&SecurityConfig::default())
    }

    fn post(path: &str, body: Value) -> InboundRequest {
        InboundRequest::new(Method::POST, path)
            .with_peer("203.0.113.10:40000".parse().unwrap())
            .with_json(&body)
    }

    fn amount_policy() -> EndpointPolicy {
        EndpointPolicy {
            rules: vec![ValidationRule::new("amount", FieldKind::number(Some(0.01), Some(10000.0))).required()],
            ..EndpointPolicy::default()
        }
    }

    #[test]
    fn test_number_rule_bounds() {
        let validator = validator();
        let policy = amount_policy();

        let low = validator.validate_request(&post("/n", json!({"amount": -5})), &policy);
        assert_eq!(low.errors, vec!["amount must be at least 0.01"]);
        assert_eq!(low.rejection, Some(Rejection::InvalidFields));

        let high = validator.validate_request(&post("/n", json!({"amount": 20000})), &policy);
        assert_eq!(high.errors, vec!["amount must be at most 10000"]);

        let ok = validator.validate_request(&post("/n", json!({"amount": 99.99})), &policy);
        assert!(ok.valid);
        assert_eq!(ok.sanitized_data, Some(json!({"amount": 99.99})));
    }

    #[test]
    fn test_calculator_currency_and_amount() {
        let validator = validator();
        let policy = calculator_policy();

        let lower = validator.validate_request(
            &post("/api/calculator", json!({"amount": "100.123456789", "currency": "usd"})),
            &policy,
        );
        assert!(!lower.valid);
        assert!(lower.errors.contains(&"currency format is invalid".to_string()));

        let upper = validator.validate_request(
            &post("/api/calculator", json!({"amount": "100.123456789", "currency": "USD"})),
            &policy,
        );
        assert!(upper.valid, "{:?}", upper.errors);
        let data = upper.sanitized_data.unwrap();
        assert_eq!(data["amount"], json!(100.12345679));
        assert_eq!(data["currency"], "USD");
    }

    #[test]
    fn test_calculator_from_query_string() {
        let request = InboundRequest::new(Method::GET, "/api/calculator?amount=2.5&currency=BTC&metal=gold");
        let outcome = validator().validate_request(&request, &calculator_policy());
        assert!(outcome.valid, "{:?}", outcome.errors);
        let data = outcome.sanitized_data.unwrap();
        assert_eq!(data["amount"], json!(2.5));
        assert_eq!(data["metal"], "gold");
    }

    #[test]
    fn test_all_rule_errors_are_collected() {
        let outcome = validator().validate_request(
            &post("/api/contact", json!({"name": "", "email": "not-an-email", "message": "short"})),
            &contact_policy(),
        );
        assert_eq!(
            outcome.errors,
            vec![
                "name is required",
                "email must be a valid email address",
                "message must be at least 10 characters",
            ]
        );
        assert!(outcome.sanitized_data.is_none());
    }

    #[test]
    fn test_sanitized_payload_has_only_declared_fields() {
        let outcome = validator().validate_request(
            &post(
                "/api/contact",
                json!({
                    "name": "Ada & Co",
                    "email": "  Ada@Example.COM ",
                    "message": "I'd like to know more about gold.",
                    "extra": "ignored"
                }),
            ),
            &contact_policy(),
        );
        assert!(outcome.valid, "{:?}", outcome.errors);
        let data = outcome.sanitized_data.unwrap();
        assert_eq!(data["name"], "Ada &amp; Co");
        assert_eq!(data["email"], "ada@example.com");
        assert_eq!(data["message"], "I&#x27;d like to know more about gold.");
        assert!(data.get("extra").is_none());
    }

    #[test]
    fn test_type_errors() {
        let policy = EndpointPolicy {
            rules: vec![
                ValidationRule::new("name", FieldKind::string(None, None)),
                ValidationRule::new("subscribe", FieldKind::Boolean),
                ValidationRule::new("tags", FieldKind::Array { min_items: Some(1), max_items: Some(2) }),
                ValidationRule::new("site", FieldKind::Url),
                ValidationRule::new("count", FieldKind::number(None, None)),
            ],
            ..EndpointPolicy::default()
        };
        let outcome = validator().validate_request(
            &post(
                "/t",
                json!({"name": 5, "subscribe": "yes", "tags": ["a", "b", "c"], "site": "ftp://x.y", "count": "many"}),
            ),
            &policy,
        );
        assert_eq!(
            outcome.errors,
            vec![
                "name must be a string",
                "subscribe must be a boolean",
                "tags must contain at most 2 items",
                "site must be a valid URL",
                "count must be a valid number",
            ]
        );
    }

    #[test]
    fn test_form_body_with_repeated_keys() {
        let request = InboundRequest::new(Method::POST, "/api/affiliate")
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body("name=Grace+Hopper&email=grace%40navy.mil&platforms=youtube&platforms=blog");
        let outcome = validator().validate_request(&request, &crate::security::rules::affiliate_policy());
        assert!(outcome.valid, "{:?}", outcome.errors);
        let data = outcome.sanitized_data.unwrap();
        assert_eq!(data["name"], "Grace Hopper");
        assert_eq!(data["platforms"], json!(["youtube", "blog"]));
    }

    #[test]
    fn test_malformed_bodies() {
        let validator = validator();
        let policy = EndpointPolicy::default();

        let broken = InboundRequest::new(Method::POST, "/m")
            .with_header("content-type", "application/json")
            .with_body("{not json");
        let outcome = validator.validate_request(&broken, &policy);
        assert_eq!(outcome.errors, vec![INVALID_FORMAT]);
        assert_eq!(outcome.rejection, Some(Rejection::MalformedBody));

        let array = post("/m", json!([1, 2, 3]));
        assert_eq!(validator.validate_request(&array, &policy).errors, vec![INVALID_FORMAT]);

        let text = InboundRequest::new(Method::POST, "/m")
            .with_header("content-type", "text/plain")
            .with_body("hello");
        assert_eq!(validator.validate_request(&text, &policy).errors, vec![INVALID_FORMAT]);

        let empty = InboundRequest::new(Method::POST, "/m");
        assert!(validator.validate_request(&empty, &policy).valid);
    }

    #[test]
    fn test_oversized_body() {
        let mut config = SecurityConfig::default();
        config.max_request_size = 16;
        let validator = RequestValidator::new(&config);

        let outcome = validator.validate_request(&post("/s", json!({"message": "x".repeat(32)})), &EndpointPolicy::default());
        assert_eq!(outcome.rejection, Some(Rejection::PayloadTooLarge));
        assert_eq!(outcome.errors, vec![BODY_TOO_LARGE]);

        let flagged = InboundRequest::new(Method::POST, "/s").with_body_too_large();
        assert_eq!(
            validator.validate_request(&flagged, &EndpointPolicy::default()).rejection,
            Some(Rejection::PayloadTooLarge)
        );
    }

    #[test]
    fn test_threats_in_undeclared_fields() {
        let outcome = validator().validate_request(
            &post("/api/calculator", json!({"amount": 1, "currency": "BTC", "note": "<script>alert(1)</script>"})),
            &calculator_policy(),
        );
        assert_eq!(outcome.rejection, Some(Rejection::ThreatDetected));
        assert_eq!(outcome.errors, vec!["Potential XSS attack detected"]);

        let sql = validator().validate_request(
            &post("/api/calculator", json!({"amount": 1, "currency": "BTC", "q": "1 UNION SELECT * FROM users"})),
            &calculator_policy(),
        );
        assert_eq!(sql.errors, vec!["Potential SQL injection detected"]);
    }

    #[test]
    fn test_private_forwarding_header() {
        let request = post("/api/calculator", json!({"amount": 1, "currency": "BTC"}))
            .with_header("x-forwarded-for", "10.0.0.8");
        let outcome = validator().validate_request(&request, &calculator_policy());
        assert_eq!(outcome.errors, vec!["Suspicious forwarding headers detected"]);

        let mut config = SecurityConfig::default();
        config.flag_private_forwarded_ips = false;
        assert!(RequestValidator::new(&config).validate_request(&request, &calculator_policy()).valid);
    }

    #[test]
    fn test_rate_limit_rejects_sixth_request() {
        let validator = validator();
        let policy = EndpointPolicy {
            rate_limit: Some(RateLimitPolicy::new(60_000, 5)),
            ..EndpointPolicy::default()
        };

        for _ in 0..5 {
            assert!(validator.validate_request(&post("/r", json!({})), &policy).valid);
        }
        let sixth = validator.validate_request(&post("/r", json!({})), &policy);
        assert_eq!(sixth.errors, vec!["Too many requests"]);
        assert_eq!(sixth.rejection, Some(Rejection::RateLimited));
        assert!(sixth.retry_after.is_some());

        // another client is unaffected
        let other = InboundRequest::new(Method::POST, "/r").with_peer("198.51.100.20:1".parse().unwrap());
        assert!(validator.validate_request(&other, &policy).valid);
    }

    #[test]
    fn test_default_rate_limit_applies_when_policy_has_none() {
        let mut config = SecurityConfig::default();
        config.rate_limit.max_requests = 1;
        let validator = RequestValidator::new(&config);
        let policy = EndpointPolicy::default();

        assert!(validator.validate_request(&post("/d", json!({})), &policy).valid);
        assert!(!validator.validate_request(&post("/d", json!({})), &policy).valid);

        config.rate_limit.enabled = false;
        let unlimited = RequestValidator::new(&config);
        for _ in 0..3 {
            assert!(unlimited.validate_request(&post("/d", json!({})), &policy).valid);
        }
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let policy = EndpointPolicy {
            rules: vec![
                ValidationRule::new("years", FieldKind::number(Some(1.0), Some(50.0))),
                ValidationRule::new("rate", FieldKind::number(None, None)),
            ],
            ..EndpointPolicy::default()
        };
        let request = InboundRequest::new(Method::GET, "/c?years=10&rate=0.25");
        let outcome = validator().validate_request(&request, &policy);
        assert_eq!(outcome.sanitized_data, Some(json!({"years": 10, "rate": 0.25})));
    }

    #[test]
    fn test_exponent_notation_is_not_a_number() {
        let request = InboundRequest::new(Method::GET, "/api/calculator?amount=1e3&currency=USD");
        let outcome = validator().validate_request(&request, &calculator_policy());
        assert!(!outcome.valid);
        assert_eq!(outcome.errors, vec!["amount must be a valid number"]);
        assert!(outcome.sanitized_data.is_none());

        let policy = amount_policy();
        let spelled = validator().validate_request(&post("/n", json!({"amount": "1E2"})), &policy);
        assert_eq!(spelled.errors, vec!["amount must be a valid number"]);

        let padded = validator().validate_request(&post("/n", json!({"amount": " 42.5 "})), &policy);
        assert!(padded.valid, "{:?}", padded.errors);
        assert_eq!(padded.sanitized_data, Some(json!({"amount": 42.5})));
    }

    #[test]
    fn test_string_length_ignores_surrounding_whitespace() {
        let validator = validator();
        let policy = affiliate_policy();

        let short = validator.validate_request(&post("/api/affiliate", json!({"name": " a", "email": "a@b.io"})), &policy);
        assert!(!short.valid);
        assert_eq!(short.errors, vec!["name must be at least 2 characters"]);

        let padded = validator.validate_request(&post("/api/affiliate", json!({"name": "  Ada  ", "email": "a@b.io"})), &policy);
        assert!(padded.valid, "{:?}", padded.errors);
        assert_eq!(padded.sanitized_data.unwrap()["name"], "Ada");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ValidationOutcome::rejected(Rejection::InvalidFields, vec!["name is required".into()]);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"valid": false, "errors": ["name is required"]})
        );
    }
}
