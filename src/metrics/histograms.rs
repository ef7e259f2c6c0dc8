//! Histogram helpers

use super::labels;

/// Time from TCP connect to authenticated session
pub fn handshake_duration(mechanism: &'static str, millis: u64) {
    metrics::histogram!(labels::HANDSHAKE_DURATION_MS, "mechanism" => mechanism)
        .record(millis as f64);
}
