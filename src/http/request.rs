//! Request abstraction handed to the validation pipeline.
//!
//! # Responsibilities
//! - Carry method, URI, headers, collected body and peer address
//! - Record whether the body exceeded the collection limit
//!
//! # Design Decisions
//! - Decoupled from axum's `Request<Body>` so validation is synchronous and
//!   testable without a server
//! - The body is collected up to the configured limit before validation; an
//!   oversized body is flagged rather than read in full

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// An incoming request, body already collected.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub peer_addr: Option<SocketAddr>,
    /// The body was larger than the collection limit and was discarded.
    pub body_too_large: bool,
}

impl InboundRequest {
    /// Build a request with no headers or body.
    ///
    /// An unparseable `uri` falls back to `/`.
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.parse().unwrap_or_else(|_| Uri::from_static("/")),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            peer_addr: None,
            body_too_large: false,
        }
    }

    pub fn from_parts(method: Method, uri: Uri, headers: HeaderMap, body: Bytes, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            peer_addr,
            body_too_large: false,
        }
    }

    /// Add a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and its content type.
    pub fn with_json(self, body: &serde_json::Value) -> Self {
        self.with_header(CONTENT_TYPE.as_str(), "application/json")
            .with_body(body.to_string())
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer_addr = Some(peer);
        self
    }

    pub fn with_body_too_large(mut self) -> Self {
        self.body_too_large = true;
        self.body = Bytes::new();
        self
    }

    /// Media type without parameters, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get(USER_AGENT).and_then(|v| v.to_str().ok())
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_strips_parameters() {
        let request = InboundRequest::new(Method::POST, "/api/contact")
            .with_header("Content-Type", "Application/JSON; charset=utf-8");
        assert_eq!(request.content_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn test_builders() {
        let peer: SocketAddr = "198.51.100.4:5000".parse().unwrap();
        let request = InboundRequest::new(Method::GET, "/api/calculator?amount=1&currency=BTC")
            .with_peer(peer)
            .with_header("user-agent", "curl/8.0");

        assert_eq!(request.path(), "/api/calculator");
        assert_eq!(request.query(), Some("amount=1&currency=BTC"));
        assert_eq!(request.user_agent(), Some("curl/8.0"));
        assert_eq!(request.peer_addr, Some(peer));
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_oversized_body_is_dropped() {
        let request = InboundRequest::new(Method::POST, "/api/contact")
            .with_body("x".repeat(64))
            .with_body_too_large();
        assert!(request.body_too_large);
        assert!(request.body.is_empty());
    }
}
