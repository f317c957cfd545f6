//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows and limits > 0, min <= max)
//! - Detect duplicate rule fields within an endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::security::rules::{EndpointPolicy, FieldKind};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// Dotted location of the offending value.
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Check everything serde cannot.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a valid socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than zero"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a valid socket address", config.observability.metrics_address),
        ));
    }

    let security = &config.security;
    if security.max_request_size == 0 {
        errors.push(ValidationError::new("security.max_request_size", "must be greater than zero"));
    }
    if security.rate_limit.enabled {
        if security.rate_limit.window_ms == 0 {
            errors.push(ValidationError::new("security.rate_limit.window_ms", "must be greater than zero"));
        }
        if security.rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("security.rate_limit.max_requests", "must be greater than zero"));
        }
    }

    for (name, policy) in &config.endpoints {
        validate_endpoint(name, policy, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_endpoint(name: &str, policy: &EndpointPolicy, errors: &mut Vec<ValidationError>) {
    let base = format!("endpoints.{}", name);

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        errors.push(ValidationError::new(&base, "endpoint names may only contain letters, digits, '-' and '_'"));
    }

    if policy.methods.is_empty() {
        errors.push(ValidationError::new(format!("{}.methods", base), "at least one method is required"));
    }
    for method in &policy.methods {
        if method.parse::<Method>().is_err() {
            errors.push(ValidationError::new(
                format!("{}.methods", base),
                format!("'{}' is not an HTTP method", method),
            ));
        }
    }

    if let Some(limit) = &policy.rate_limit {
        if limit.window_ms == 0 {
            errors.push(ValidationError::new(format!("{}.rate_limit.window_ms", base), "must be greater than zero"));
        }
        if limit.max_requests == 0 {
            errors.push(ValidationError::new(format!("{}.rate_limit.max_requests", base), "must be greater than zero"));
        }
    }

    let mut seen = HashSet::new();
    for rule in &policy.rules {
        let path = format!("{}.rules.{}", base, rule.field);
        if rule.field.is_empty() {
            errors.push(ValidationError::new(format!("{}.rules", base), "rule field name is empty"));
        }
        if !seen.insert(rule.field.as_str()) {
            errors.push(ValidationError::new(&path, "field is declared more than once"));
        }

        let inverted = match &rule.kind {
            FieldKind::String { min_length: Some(min), max_length: Some(max), .. } => min > max,
            FieldKind::Number { min: Some(min), max: Some(max) }
            | FieldKind::Amount { min: Some(min), max: Some(max) } => min > max,
            FieldKind::Array { min_items: Some(min), max_items: Some(max) } => min > max,
            _ => false,
        };
        if inverted {
            errors.push(ValidationError::new(&path, "minimum is greater than maximum"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::rules::{RateLimitPolicy, ValidationRule};

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GuardConfig::default()), Ok(()));
    }

    #[test]
    fn test_all_errors_are_reported() {
        let mut config = GuardConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.security.max_request_size = 0;

        let policy = config.endpoints.get_mut("contact").unwrap();
        policy.rate_limit = Some(RateLimitPolicy::new(0, 0));
        policy.methods = vec!["BAD METHOD".to_string()];
        policy.rules.push(ValidationRule::new("name", FieldKind::string(Some(10), Some(2))));

        let errors = validate_config(&config).unwrap_err();
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();

        assert!(paths.contains(&"listener.bind_address"));
        assert!(paths.contains(&"security.max_request_size"));
        assert!(paths.contains(&"endpoints.contact.methods"));
        assert!(paths.contains(&"endpoints.contact.rate_limit.window_ms"));
        assert!(paths.contains(&"endpoints.contact.rate_limit.max_requests"));
        // "name" is both duplicated and inverted
        assert_eq!(paths.iter().filter(|p| **p == "endpoints.contact.rules.name").count(), 2);
    }

    #[test]
    fn test_endpoint_name_is_checked() {
        let mut config = GuardConfig::default();
        config.endpoints.insert("bad/name".to_string(), EndpointPolicy::default());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].path, "endpoints.bad/name");
    }
}
