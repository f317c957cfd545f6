//! Security configuration holder.
//!
//! Resolves the `security` config section against the process environment
//! once at startup and pre-renders the response headers. Shared by handle
//! (`Arc<SecurityManager>`) with the HTTP layer.

use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;

use serde_json::Value;

use crate::config::loader::ConfigError;
use crate::config::schema::SecurityConfig;
use crate::sanitize::input::host_matches;
use crate::security::masking;

pub const ENV_MODE: &str = "TIMEVAULT_ENV";
pub const ENV_ALLOWED_ORIGINS: &str = "TIMEVAULT_ALLOWED_ORIGINS";
pub const ENV_TRUSTED_DOMAINS: &str = "TIMEVAULT_TRUSTED_DOMAINS";
pub const ENV_CSP_CONNECT_SRC: &str = "TIMEVAULT_CSP_CONNECT_SRC";
pub const ENV_RATE_LIMIT_WINDOW_MS: &str = "TIMEVAULT_RATE_LIMIT_WINDOW_MS";
pub const ENV_RATE_LIMIT_MAX: &str = "TIMEVAULT_RATE_LIMIT_MAX";
pub const ENV_HSTS_MAX_AGE: &str = "TIMEVAULT_HSTS_MAX_AGE";
pub const ENV_MAX_REQUEST_SIZE: &str = "TIMEVAULT_MAX_REQUEST_SIZE";

const REFERRER_POLICY: &str = "strict-origin-when-cross-origin";
const PERMISSIONS_POLICY: &str = "camera=(), microphone=(), geolocation=(), payment=(self)";

/// Resolved security configuration plus the headers derived from it.
#[derive(Debug, Clone)]
pub struct SecurityManager {
    config: SecurityConfig,
    csp: String,
    headers: BTreeMap<String, String>,
}

impl SecurityManager {
    /// Resolve against the process environment.
    pub fn from_env(config: SecurityConfig) -> Result<Self, ConfigError> {
        Self::from_config(config, |name| std::env::var(name).ok())
    }

    /// Resolve against an arbitrary variable lookup.
    pub fn from_config<F>(mut config: SecurityConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = env(ENV_MODE) {
            config.production = mode.trim().eq_ignore_ascii_case("production");
        }
        if let Some(origins) = list_var(&env, ENV_ALLOWED_ORIGINS) {
            config.allowed_origins = origins;
        }
        if let Some(domains) = list_var(&env, ENV_TRUSTED_DOMAINS) {
            config.trusted_domains = domains;
        }
        if let Some(sources) = list_var(&env, ENV_CSP_CONNECT_SRC) {
            config.csp.connect_src = sources;
        }
        if let Some(window) = positive_var(&env, ENV_RATE_LIMIT_WINDOW_MS)? {
            config.rate_limit.window_ms = window;
        }
        if let Some(max) = positive_var(&env, ENV_RATE_LIMIT_MAX)? {
            config.rate_limit.max_requests = max;
        }
        if let Some(max_age) = positive_var(&env, ENV_HSTS_MAX_AGE)? {
            config.hsts.max_age_secs = max_age;
        }
        if let Some(size) = positive_var(&env, ENV_MAX_REQUEST_SIZE)? {
            config.max_request_size = size;
        }

        for name in &config.required_env {
            let present = env(name).map(|v| !v.trim().is_empty()).unwrap_or(false);
            if present {
                continue;
            }
            if config.production {
                return Err(ConfigError::MissingEnv(name.clone()));
            }
            tracing::warn!(variable = %name, "Required environment variable is not set");
        }

        let csp = render_csp(&config);
        let headers = render_headers(&config, &csp);

        tracing::info!(
            production = config.production,
            allowed_origins = config.allowed_origins.len(),
            trusted_domains = config.trusted_domains.len(),
            "Security configuration resolved"
        );

        Ok(Self { config, csp, headers })
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn is_production(&self) -> bool {
        self.config.production
    }

    /// The `Content-Security-Policy` header value.
    pub fn csp_header(&self) -> &str {
        &self.csp
    }

    /// Headers attached to every response, keyed by header name.
    pub fn security_headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Exact origin match against the allow-list; a trailing slash is ignored.
    pub fn validate_origin(&self, origin: &str) -> bool {
        let origin = origin.trim().trim_end_matches('/');
        !origin.is_empty()
            && self
                .config
                .allowed_origins
                .iter()
                .any(|allowed| allowed.trim_end_matches('/') == origin)
    }

    /// Whether `domain` is a trusted domain or a subdomain of one.
    pub fn validate_domain(&self, domain: &str) -> bool {
        self.config
            .trusted_domains
            .iter()
            .any(|trusted| host_matches(domain, trusted))
    }

    pub fn mask_sensitive_data(&self, value: &Value) -> Value {
        masking::mask_sensitive_data(value)
    }

    /// Render an error for logs or clients with inline secrets masked.
    ///
    /// Outside production the source chain is appended.
    pub fn sanitize_error(&self, error: &(dyn Error + 'static)) -> String {
        let mut rendered = error.to_string();
        if !self.config.production {
            let mut source = error.source();
            while let Some(cause) = source {
                rendered.push_str(": ");
                rendered.push_str(&cause.to_string());
                source = cause.source();
            }
        }
        masking::mask_inline_secrets(&rendered)
    }
}

fn list_var<F>(env: &F, name: &str) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let items: Vec<String> = env(name)?
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn positive_var<F, T>(env: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = env(name) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(Some(value)),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: raw,
        }),
    }
}

fn directive(name: &str, sources: &[String]) -> String {
    if sources.is_empty() {
        format!("{} 'none'", name)
    } else {
        format!("{} {}", name, sources.join(" "))
    }
}

fn render_csp(config: &SecurityConfig) -> String {
    let csp = &config.csp;
    let mut directives = vec![
        "default-src 'self'".to_string(),
        directive("script-src", &csp.script_src),
        directive("style-src", &csp.style_src),
        directive("img-src", &csp.img_src),
        directive("font-src", &csp.font_src),
        directive("connect-src", &csp.connect_src),
        directive("frame-src", &csp.frame_src),
        "object-src 'none'".to_string(),
        "base-uri 'self'".to_string(),
        "form-action 'self'".to_string(),
        "frame-ancestors 'none'".to_string(),
    ];
    if config.production {
        directives.push("upgrade-insecure-requests".to_string());
    }
    directives.join("; ")
}

fn render_headers(config: &SecurityConfig, csp: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::from([
        ("X-Content-Type-Options".to_string(), "nosniff".to_string()),
        ("X-Frame-Options".to_string(), config.frame_options.clone()),
        ("X-XSS-Protection".to_string(), "1; mode=block".to_string()),
        ("Referrer-Policy".to_string(), REFERRER_POLICY.to_string()),
        ("Permissions-Policy".to_string(), PERMISSIONS_POLICY.to_string()),
        ("Content-Security-Policy".to_string(), csp.to_string()),
    ]);

    if config.hsts.enabled {
        let mut hsts = format!("max-age={}", config.hsts.max_age_secs);
        if config.hsts.include_subdomains {
            hsts.push_str("; includeSubDomains");
        }
        if config.hsts.preload {
            hsts.push_str("; preload");
        }
        headers.insert("Strict-Transport-Security".to_string(), hsts);
    }

    headers
}
