//! Rejection responses.
//!
//! # Responsibilities
//! - Map validation rejections to HTTP status codes
//! - Render the JSON error body
//!
//! # Design Decisions
//! - One generic `error` message; specifics go in `details`
//! - Details are the validator's messages, which never echo request content

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::security::validator::{Rejection, ValidationOutcome, GENERIC_FAILURE};

/// JSON body of every rejected request.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub details: &'a [String],
}

pub fn status_for(rejection: Rejection) -> StatusCode {
    match rejection {
        Rejection::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        Rejection::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        Rejection::MalformedBody
        | Rejection::InvalidFields
        | Rejection::ThreatDetected
        | Rejection::Internal => StatusCode::BAD_REQUEST,
    }
}

/// Response for a rejected validation outcome.
pub fn rejection_response(outcome: &ValidationOutcome) -> Response {
    let status = status_for(outcome.rejection.unwrap_or(Rejection::Internal));
    let body = ErrorBody {
        error: GENERIC_FAILURE,
        details: &outcome.errors,
    };
    let mut response = (status, Json(body)).into_response();

    if let Some(retry_after) = outcome.retry_after {
        // Whole seconds, rounded up, never zero.
        let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
    }

    response
}

/// Response for a request from an origin outside the allow-list.
pub fn forbidden_origin() -> Response {
    let body = ErrorBody {
        error: "Origin not allowed",
        details: &[],
    };
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rate_limited_response_has_retry_after() {
        let mut outcome = ValidationOutcome::rejected(Rejection::RateLimited, vec!["Too many requests".into()]);
        outcome.retry_after = Some(Duration::from_millis(1_500));

        let response = rejection_response(&outcome);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(Rejection::PayloadTooLarge), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(status_for(Rejection::ThreatDetected), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(Rejection::MalformedBody), StatusCode::BAD_REQUEST);
    }
}
