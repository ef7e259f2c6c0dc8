//! PEM <-> DER conversion for X.509 certificates
//!
//! DER is the canonical form; PEM is the same bytes base64-encoded between
//! `BEGIN CERTIFICATE` / `END CERTIFICATE` delimiters, 64 columns per line.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rustls_pemfile::Item;
use rustls_pki_types::CertificateDer;
use std::io;

/// PEM header for certificates
pub const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";

/// PEM footer for certificates
pub const PEM_END: &str = "-----END CERTIFICATE-----";

const PEM_LINE_WIDTH: usize = 64;

/// Check whether raw bytes carry at least one PEM certificate block.
pub fn is_pem(data: &[u8]) -> bool {
    data.windows(PEM_BEGIN.len())
        .any(|window| window == PEM_BEGIN.as_bytes())
}

/// Re-encode DER certificate bytes as a single PEM block (with trailing newline).
pub fn der_to_pem(der: &[u8]) -> String {
    let body = BASE64.encode(der);
    let mut out = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);

    out.push_str(PEM_BEGIN);
    out.push('\n');
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(PEM_END);
    out.push('\n');
    out
}

/// Decode every certificate block in PEM text, in order.
///
/// Non-certificate items (keys, CRLs) are skipped. Returns an error if a
/// block is malformed.
pub fn pem_to_der(data: &[u8]) -> io::Result<Vec<CertificateDer<'static>>> {
    let mut reader = io::Cursor::new(data);
    let mut certs = Vec::new();

    loop {
        match rustls_pemfile::read_one(&mut reader)? {
            Some(Item::X509Certificate(cert)) => certs.push(cert),
            Some(_) => {
                // Skip non-certificate items
            }
            None => break,
        }
    }

    Ok(certs)
}
