//! Input sanitization subsystem.
//!
//! # Data Flow
//! ```text
//! untrusted value + kind + options
//!     → input.rs (coerce, truncate, clean per kind)
//!     → patterns.rs (final SQL / script check)
//!     → SanitizationResult { is_valid, sanitized_value, errors, warnings }
//!
//! nested payload + field→kind map
//!     → object.rs (recursive walk, drops invalid fields)
//! ```
//!
//! # Design Decisions
//! - Pure functions: no I/O, no shared state
//! - Failures are data, never panics or `Err`

pub mod crypto;
pub mod input;
pub mod object;
pub mod patterns;

pub use crypto::{client_fingerprint, create_secure_hash, generate_secure_token};
pub use input::{
    round_amount, InputSanitizer, SanitizationResult, SanitizeKind, SanitizeOptions,
    DEFAULT_MAX_LENGTH, MAX_AMOUNT,
};
pub use object::TypeMap;
