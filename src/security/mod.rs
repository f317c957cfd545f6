//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     SecurityConfig + environment → manager.rs (headers, CSP, origin list)
//!
//! Incoming request (validator.rs):
//!     → client_ip.rs (resolve client address)
//!     → rate_limit.rs (sliding window per route and client)
//!     → rules.rs (endpoint policy: declared fields and constraints)
//!     → heuristics.rs (XSS / SQL injection / forwarding checks)
//!     → events.rs (structured event for each logged rejection)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: per-field rules plus whole-request heuristics
//! - Fail closed: reject on any security check failure
//! - No trust in client input; secrets masked before logging (masking.rs)

pub mod client_ip;
pub mod events;
pub mod heuristics;
pub mod manager;
pub mod masking;
pub mod rate_limit;
pub mod rules;
pub mod validator;

pub use manager::SecurityManager;
pub use rate_limit::RateLimiter;
pub use rules::{EndpointPolicy, FieldKind, RateLimitPolicy, ValidationRule};
pub use validator::{Rejection, RequestValidator, ValidationOutcome};
