//! Metric names and label values

/// Authentication plugin label: mysql_native_password
pub const MECHANISM_NATIVE: &str = "mysql_native_password";

/// Authentication plugin label: caching_sha2_password
pub const MECHANISM_CACHING_SHA2: &str = "caching_sha2_password";

/// Authentication plugin label: mysql_clear_password
pub const MECHANISM_CLEARTEXT: &str = "mysql_clear_password";

pub(crate) const BUNDLE_ASSEMBLED: &str = "templog_db_bundle_assembled_total";
pub(crate) const BUNDLE_AUTHORITIES: &str = "templog_db_bundle_authorities";
pub(crate) const CONNECTIONS_ESTABLISHED: &str = "templog_db_connections_established_total";
pub(crate) const CONNECTIONS_FAILED: &str = "templog_db_connections_failed_total";
pub(crate) const AUTH_ATTEMPTED: &str = "templog_db_auth_attempted_total";
pub(crate) const AUTH_SUCCEEDED: &str = "templog_db_auth_succeeded_total";
pub(crate) const AUTH_FAILED: &str = "templog_db_auth_failed_total";
pub(crate) const TLS_HANDSHAKE_FAILED: &str = "templog_db_tls_handshake_failed_total";
pub(crate) const HANDSHAKE_DURATION_MS: &str = "templog_db_handshake_duration_ms";
