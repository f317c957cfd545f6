//! Structured security events for rejected requests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::sanitize::client_fingerprint;

/// How serious a rejection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// One rejected request, as written to the log.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub fingerprint: String,
    pub url: String,
    pub method: String,
    pub user_agent: Option<String>,
    pub errors: Vec<String>,
    pub severity: Severity,
}

impl SecurityEvent {
    pub fn new(request: &InboundRequest, client_ip: &str, errors: Vec<String>, severity: Severity) -> Self {
        let user_agent = request.user_agent().map(str::to_string);
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            ip: client_ip.to_string(),
            fingerprint: client_fingerprint(client_ip, user_agent.as_deref()),
            url: request.uri.to_string(),
            method: request.method.to_string(),
            user_agent,
            errors,
            severity,
        }
    }

    /// Write the event to the log and count it.
    pub fn emit(&self) {
        metrics::record_security_event(self.severity);

        let user_agent = self.user_agent.as_deref().unwrap_or("-");
        match self.severity {
            Severity::Low | Severity::Medium => tracing::warn!(
                event_id = %self.id,
                timestamp = %self.timestamp.to_rfc3339(),
                ip = %self.ip,
                fingerprint = %self.fingerprint,
                url = %self.url,
                method = %self.method,
                user_agent = %user_agent,
                errors = ?self.errors,
                severity = self.severity.as_str(),
                "Security event"
            ),
            Severity::High | Severity::Critical => tracing::error!(
                event_id = %self.id,
                timestamp = %self.timestamp.to_rfc3339(),
                ip = %self.ip,
                fingerprint = %self.fingerprint,
                url = %self.url,
                method = %self.method,
                user_agent = %user_agent,
                errors = ?self.errors,
                severity = self.severity.as_str(),
                "Security event"
            ),
        }
    }
}
