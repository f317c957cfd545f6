//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::security::rules::{default_policies, EndpointPolicy};

/// Root configuration for the guard.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security settings, before environment overrides.
    pub security: SecurityConfig,

    /// Endpoint policies keyed by endpoint name; mounted under `/api/<name>`.
    pub endpoints: BTreeMap<String, EndpointPolicy>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
            endpoints: default_policies(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Total time allowed for one request, body collection included.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            request_timeout_secs: 30,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening settings as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Production mode: stricter CSP, fatal missing env vars, terse errors.
    pub production: bool,

    /// Origins allowed to call the API (scheme://host[:port]).
    pub allowed_origins: Vec<String>,

    /// Domains (and their subdomains) accepted by URL sanitization.
    pub trusted_domains: Vec<String>,

    pub csp: CspSources,

    /// Defaults for endpoints that declare no rate limit of their own.
    pub rate_limit: RateLimitDefaults,

    pub hsts: HstsConfig,

    /// `X-Frame-Options` value.
    pub frame_options: String,

    /// Maximum request body size in bytes.
    pub max_request_size: usize,

    /// Treat private or loopback addresses in forwarding headers as suspicious.
    pub flag_private_forwarded_ips: bool,

    /// Environment variables that must be present at startup.
    pub required_env: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            production: false,
            allowed_origins: vec![
                "https://timevault.app".to_string(),
                "https://www.timevault.app".to_string(),
                "http://localhost:3000".to_string(),
            ],
            trusted_domains: crate::sanitize::input::DEFAULT_TRUSTED_DOMAINS
                .iter()
                .chain(["timevault.app"].iter())
                .map(|d| d.to_string())
                .collect(),
            csp: CspSources::default(),
            rate_limit: RateLimitDefaults::default(),
            hsts: HstsConfig::default(),
            frame_options: "DENY".to_string(),
            max_request_size: 10 * 1024 * 1024, // 10MB
            flag_private_forwarded_ips: true,
            required_env: Vec::new(),
        }
    }
}

/// Source lists for the Content-Security-Policy directives.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CspSources {
    pub script_src: Vec<String>,
    pub style_src: Vec<String>,
    pub img_src: Vec<String>,
    pub font_src: Vec<String>,
    pub connect_src: Vec<String>,
    pub frame_src: Vec<String>,
}

fn sources(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for CspSources {
    fn default() -> Self {
        Self {
            script_src: sources(&["'self'", "https://js.stripe.com"]),
            style_src: sources(&["'self'", "'unsafe-inline'", "https://fonts.googleapis.com"]),
            img_src: sources(&["'self'", "data:", "https:"]),
            font_src: sources(&["'self'", "https://fonts.gstatic.com"]),
            connect_src: sources(&[
                "'self'",
                "https://api.coingecko.com",
                "https://api.stripe.com",
                "https://metals-api.com",
                "https://www.goldapi.io",
            ]),
            frame_src: sources(&["https://js.stripe.com", "https://hooks.stripe.com"]),
        }
    }
}

/// Rate-limiting defaults.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitDefaults {
    /// Apply the defaults to endpoints without their own limit.
    pub enabled: bool,

    pub window_ms: u64,

    pub max_requests: u32,
}

impl Default for RateLimitDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 15 * 60 * 1000,
            max_requests: 100,
        }
    }
}

/// Strict-Transport-Security settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HstsConfig {
    pub enabled: bool,
    pub max_age_secs: u64,
    pub include_subdomains: bool,
    pub preload: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_secs: 31_536_000, // one year
            include_subdomains: true,
            preload: true,
        }
    }
}
