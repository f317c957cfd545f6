//! Endpoint handlers.
//!
//! Handlers only run after the validation middleware has accepted the
//! request; they receive the sanitized payload, never the raw body.

use std::sync::Arc;

use axum::{Extension, Json};
use serde_json::{json, Value};

/// Sanitized fields of an accepted request, inserted by the validation
/// middleware.
#[derive(Debug, Clone)]
pub struct SanitizedPayload {
    pub endpoint: Arc<str>,
    pub data: Value,
}

/// Acknowledge an accepted request.
pub async fn accept(Extension(payload): Extension<SanitizedPayload>) -> Json<Value> {
    tracing::debug!(endpoint = %payload.endpoint, "Request accepted");
    Json(json!({
        "status": "accepted",
        "endpoint": &*payload.endpoint,
        "data": payload.data,
    }))
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
