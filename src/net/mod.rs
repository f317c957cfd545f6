//! Network layer subsystem.
//!
//! Plain TCP listeners come straight from Tokio; this module only adds the
//! optional TLS termination served through `axum-server`.

pub mod tls;
