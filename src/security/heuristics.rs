//! Coarse attack-pattern detection over whole requests.
//!
//! These checks look at the request as a whole (serialized payload and
//! forwarding headers) rather than at individual declared fields, so they
//! also catch hostile content in fields no rule mentions.

use std::fmt;

use axum::http::HeaderMap;

use crate::sanitize::patterns::{SQL_INJECTION, XSS_PAYLOAD};
use crate::security::client_ip::{forwarded_addresses, is_suspicious_address};

/// A detected attack indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threat {
    Xss,
    SqlInjection,
    SuspiciousForwarding,
}

impl Threat {
    /// Client-facing description; never includes request content.
    pub fn message(&self) -> &'static str {
        match self {
            Threat::Xss => "Potential XSS attack detected",
            Threat::SqlInjection => "Potential SQL injection detected",
            Threat::SuspiciousForwarding => "Suspicious forwarding headers detected",
        }
    }
}

impl fmt::Display for Threat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Scan payload renderings and forwarding headers.
///
/// Each threat is reported at most once regardless of how many surfaces
/// contain it.
pub fn detect_threats<S: AsRef<str>>(surfaces: &[S], headers: &HeaderMap, flag_private_forwarding: bool) -> Vec<Threat> {
    let mut threats = Vec::new();

    if surfaces.iter().any(|s| XSS_PAYLOAD.is_match(s.as_ref())) {
        threats.push(Threat::Xss);
    }
    if surfaces.iter().any(|s| SQL_INJECTION.is_match(s.as_ref())) {
        threats.push(Threat::SqlInjection);
    }
    if flag_private_forwarding
        && forwarded_addresses(headers)
            .into_iter()
            .any(is_suspicious_address)
    {
        threats.push(Threat::SuspiciousForwarding);
    }

    threats
}
