//! TimeVault request guard.
//!
//! Input sanitization, sliding-window rate limiting, schema-driven request
//! validation and security headers for the TimeVault API, plus the axum
//! gateway that applies them.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod sanitize;
pub mod security;

pub use config::schema::GuardConfig;
pub use http::GuardServer;
pub use lifecycle::Shutdown;
pub use sanitize::InputSanitizer;
pub use security::{RequestValidator, SecurityManager};
