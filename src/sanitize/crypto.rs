//! Hashing and random token helpers.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// SHA-256 digest of `data` as lowercase hex.
pub fn create_secure_hash(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// `length` bytes from the operating system RNG, hex encoded.
pub fn generate_secure_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Short identifier correlating requests from the same client without
/// keeping the raw address and user agent together.
pub fn client_fingerprint(ip: &str, user_agent: Option<&str>) -> String {
    let mut digest = create_secure_hash(format!("{}|{}", ip, user_agent.unwrap_or_default()));
    digest.truncate(16);
    digest
}
