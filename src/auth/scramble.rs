//! MySQL authentication plugins
//!
//! Implements the client side of `mysql_native_password` (SHA-1 scramble),
//! `caching_sha2_password` (SHA-256 scramble, with the full-authentication
//! fallback) and `mysql_clear_password`. Connections are always TLS
//! encrypted before any of these run, so the cleartext paths never expose
//! the password on the wire.

use crate::metrics::labels;
use crate::{Error, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the server nonce used by the scramble plugins
pub const NONCE_LEN: usize = 20;

/// Supported authentication plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    /// SHA-1 challenge/response
    NativePassword,
    /// SHA-256 challenge/response with server-side cache
    CachingSha2Password,
    /// Password sent as-is (TLS only)
    ClearPassword,
}

impl AuthPlugin {
    /// Resolve a plugin announced by the server
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "mysql_native_password" => Ok(Self::NativePassword),
            "caching_sha2_password" => Ok(Self::CachingSha2Password),
            "mysql_clear_password" => Ok(Self::ClearPassword),
            other => Err(Error::Authentication(format!(
                "unsupported authentication plugin '{}'",
                other
            ))),
        }
    }

    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            Self::NativePassword => labels::MECHANISM_NATIVE,
            Self::CachingSha2Password => labels::MECHANISM_CACHING_SHA2,
            Self::ClearPassword => labels::MECHANISM_CLEARTEXT,
        }
    }

    /// Compute the auth response for `password` against the server nonce.
    pub fn respond(&self, password: &str, nonce: &[u8]) -> Vec<u8> {
        match self {
            Self::NativePassword => scramble_native(password, nonce),
            Self::CachingSha2Password => scramble_caching_sha2(password, nonce),
            Self::ClearPassword => clear_password(password),
        }
    }
}

impl fmt::Display for AuthPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn nonce_prefix(nonce: &[u8]) -> &[u8] {
    &nonce[..nonce.len().min(NONCE_LEN)]
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// `SHA1(password) XOR SHA1(nonce + SHA1(SHA1(password)))`
pub fn scramble_native(password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1 = Sha1::digest(password.as_bytes());
    let stage2 = Sha1::digest(stage1);

    let mut hasher = Sha1::new();
    hasher.update(nonce_prefix(nonce));
    hasher.update(stage2);
    let token = hasher.finalize();

    xor(&stage1, &token)
}

/// `SHA256(password) XOR SHA256(SHA256(SHA256(password)) + nonce)`
pub fn scramble_caching_sha2(password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1 = Sha256::digest(password.as_bytes());
    let stage2 = Sha256::digest(stage1);

    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(nonce_prefix(nonce));
    let token = hasher.finalize();

    xor(&stage1, &token)
}

/// NUL-terminated password, for cleartext exchanges over TLS
pub fn clear_password(password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len() + 1);
    out.extend_from_slice(password.as_bytes());
    out.push(0);
    out
}
