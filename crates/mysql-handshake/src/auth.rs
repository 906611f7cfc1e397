//! MySQL authentication response derivation.
//!
//! Implements the two supported authentication plugins:
//! - `mysql_native_password`: SHA1-based (MySQL < 8.0 default)
//! - `caching_sha2_password`: SHA256-based (MySQL 8.0+ default)
//!
//! # mysql_native_password
//!
//! ```text
//! SHA1(salt + SHA1(SHA1(password))) XOR SHA1(password)
//! ```
//!
//! using the first 20 bytes of the server nonce as the salt.
//!
//! # caching_sha2_password
//!
//! ```text
//! XOR(SHA256(password), SHA256(SHA256(SHA256(password)) + nonce))
//! ```
//!
//! over the full nonce. Since XOR is its own inverse, re-applying the second
//! operand to the result recovers `SHA256(password)`.
//!
//! Full authentication (the server asking for the cleartext password) is not
//! derived here; the state machine honors it only over a TLS-secured
//! transport.

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::protocol::CapabilityFlags;

/// Well-known authentication plugin names.
pub mod plugins {
    /// SHA1-based authentication (legacy default)
    pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";
    /// SHA256-based authentication (MySQL 8.0+ default)
    pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
}

/// Derive the auth-response bytes for the plugin the server announced.
///
/// `server_capabilities` is the server's flag set from the greeting;
/// `nonce` is its auth-plugin-data. Fails with a typed error before any
/// network write can happen: missing password, short salt, pre-4.1 server,
/// or a plugin this client does not speak.
pub fn auth_response(
    plugin: &str,
    password: Option<&str>,
    server_capabilities: CapabilityFlags,
    nonce: &[u8],
) -> Result<Vec<u8>> {
    match plugin {
        plugins::MYSQL_NATIVE_PASSWORD => {
            if !server_capabilities.contains(CapabilityFlags::SECURE_CONNECTION) {
                return Err(Error::protocol(
                    "Pre-4.1 auth protocol is not supported or safe",
                ));
            }
            let password = password
                .ok_or_else(|| Error::config("Password required for auth plugin"))?;
            if nonce.len() < 20 {
                return Err(Error::protocol("Server-supplied salt too short"));
            }
            Ok(native_password_scramble(password, &nonce[..20]))
        }
        plugins::CACHING_SHA2_PASSWORD => {
            let password = password
                .ok_or_else(|| Error::config("Password required for auth plugin"))?;
            Ok(caching_sha2_scramble(password, nonce))
        }
        other => Err(Error::UnsupportedPlugin(other.to_string())),
    }
}

/// `mysql_native_password` scramble over a 20-byte salt.
fn native_password_scramble(password: &str, salt: &[u8]) -> Vec<u8> {
    // Stage 1: SHA1(password)
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let stage1: [u8; 20] = hasher.finalize().into();

    // Stage 2: SHA1(SHA1(password))
    let mut hasher = Sha1::new();
    hasher.update(stage1);
    let stage2: [u8; 20] = hasher.finalize().into();

    // Stage 3: SHA1(salt + stage2)
    let mut hasher = Sha1::new();
    hasher.update(salt);
    hasher.update(stage2);
    let stage3: [u8; 20] = hasher.finalize().into();

    // Final: stage3 XOR stage1
    stage3
        .iter()
        .zip(stage1.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// `caching_sha2_password` fast-auth scramble over the full nonce.
fn caching_sha2_scramble(password: &str, nonce: &[u8]) -> Vec<u8> {
    // SHA256(password)
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let password_hash: [u8; 32] = hasher.finalize().into();

    // SHA256(SHA256(password))
    let mut hasher = Sha256::new();
    hasher.update(password_hash);
    let password_hash_hash: [u8; 32] = hasher.finalize().into();

    // SHA256(SHA256(SHA256(password)) + nonce)
    let mut hasher = Sha256::new();
    hasher.update(password_hash_hash);
    hasher.update(nonce);
    let scramble: [u8; 32] = hasher.finalize().into();

    password_hash
        .iter()
        .zip(scramble.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}
