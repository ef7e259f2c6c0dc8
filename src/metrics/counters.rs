//! Counter helpers

use super::labels;

/// A trust bundle was assembled
pub fn bundle_assembled(authorities: usize) {
    metrics::counter!(labels::BUNDLE_ASSEMBLED).increment(1);
    metrics::gauge!(labels::BUNDLE_AUTHORITIES).set(authorities as f64);
}

/// A connection finished its handshake
pub fn connection_established() {
    metrics::counter!(labels::CONNECTIONS_ESTABLISHED).increment(1);
}

/// A connection attempt failed
pub fn connection_failed(category: &'static str) {
    metrics::counter!(labels::CONNECTIONS_FAILED, "category" => category).increment(1);
}

/// An authentication plugin was used
pub fn auth_attempted(mechanism: &'static str) {
    metrics::counter!(labels::AUTH_ATTEMPTED, "mechanism" => mechanism).increment(1);
}

/// Authentication succeeded
pub fn auth_successful(mechanism: &'static str) {
    metrics::counter!(labels::AUTH_SUCCEEDED, "mechanism" => mechanism).increment(1);
}

/// Authentication failed
pub fn auth_failed(mechanism: &'static str, reason: &'static str) {
    metrics::counter!(labels::AUTH_FAILED, "mechanism" => mechanism, "reason" => reason)
        .increment(1);
}

/// TLS handshake was rejected
pub fn tls_handshake_failed(reason: &'static str) {
    metrics::counter!(labels::TLS_HANDSHAKE_FAILED, "reason" => reason).increment(1);
}
