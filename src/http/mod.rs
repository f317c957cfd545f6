//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, security headers)
//!     → server.rs origin check (403 on disallowed Origin)
//!     → server.rs validation middleware
//!         → request.rs (InboundRequest with collected body)
//!         → security::validator (rate limit, size, fields, heuristics)
//!     → response.rs (rejection) or handlers.rs (sanitized payload)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, X_REQUEST_ID};
pub use server::GuardServer;
