//! Process configuration
//!
//! Read once from the environment at start-up and passed by reference.
//! Nothing else in the crate reads environment variables.

use crate::bundle::DEFAULT_BUNDLE_PATH;
use crate::connection::{
    ConnectionConfig, SslMode, TlsConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT,
    DEFAULT_PORT,
};
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Server host name
pub const ENV_DB_HOST: &str = "DB_HOST";
/// Database name
pub const ENV_DB_NAME: &str = "DB_NAME";
/// User name
pub const ENV_DB_USER: &str = "DB_USER";
/// Password
pub const ENV_DB_PASS: &str = "DB_PASS";
/// Application session-signing secret
pub const ENV_SECRET_KEY: &str = "SECRET_KEY";
/// Server port (optional)
pub const ENV_DB_PORT: &str = "DB_PORT";
/// Combined CA bundle path (optional)
pub const ENV_DB_SSL_CA: &str = "DB_SSL_CA";
/// `VERIFY_IDENTITY` or `VERIFY_CA` (optional)
pub const ENV_DB_SSL_MODE: &str = "DB_SSL_MODE";
/// TCP connect timeout in seconds (optional)
pub const ENV_DB_CONNECT_TIMEOUT_SECS: &str = "DB_CONNECT_TIMEOUT_SECS";

/// Top-level application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Database connection parameters
    pub database: DatabaseConfig,
    /// Session-signing secret for the HTTP layer; never used for TLS
    pub secret_key: String,
}

/// Parameters for the MySQL connection
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Server host name
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub database: String,
    /// User name
    pub user: String,
    /// Password
    pub password: String,
    /// Combined CA bundle
    pub ssl_ca: PathBuf,
    /// Certificate verification mode
    pub ssl_mode: SslMode,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// TLS + authentication timeout
    pub handshake_timeout: Duration,
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// `Error::Config` naming the first missing or malformed variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::Config(format!("missing required variable {}", key)))
        };

        let port = match lookup(ENV_DB_PORT) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("{} is not a valid port: {}", ENV_DB_PORT, raw)))?,
            None => DEFAULT_PORT,
        };

        let ssl_mode = match lookup(ENV_DB_SSL_MODE) {
            Some(raw) => raw.parse()?,
            None => SslMode::default(),
        };

        let connect_timeout = match lookup(ENV_DB_CONNECT_TIMEOUT_SECS) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(Error::Config(format!(
                        "{} must be a positive number of seconds: {}",
                        ENV_DB_CONNECT_TIMEOUT_SECS, raw
                    )))
                }
            },
            None => DEFAULT_CONNECT_TIMEOUT,
        };

        let database = DatabaseConfig {
            host: required(ENV_DB_HOST)?,
            port,
            database: required(ENV_DB_NAME)?,
            user: required(ENV_DB_USER)?,
            password: required(ENV_DB_PASS)?,
            ssl_ca: lookup(ENV_DB_SSL_CA)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BUNDLE_PATH)),
            ssl_mode,
            connect_timeout,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        };

        Ok(Self {
            database,
            secret_key: required(ENV_SECRET_KEY)?,
        })
    }
}

impl DatabaseConfig {
    /// Connection parameters for the establisher
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::builder(&self.host, &self.database, &self.user)
            .port(self.port)
            .password(&self.password)
            .ssl_mode(self.ssl_mode)
            .connect_timeout(self.connect_timeout)
            .handshake_timeout(self.handshake_timeout)
            .build()
    }

    /// TLS settings trusting only the configured bundle
    pub fn tls_config(&self) -> Result<TlsConfig> {
        TlsConfig::builder()
            .ca_bundle_path(&self.ssl_ca)
            .ssl_mode(self.ssl_mode)
            .build()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database", &self.database)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ssl_ca", &self.ssl_ca)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DB_HOST", "templog.mysql.database.azure.com"),
        ("DB_NAME", "templog"),
        ("DB_USER", "logger"),
        ("DB_PASS", "s3cret"),
        ("SECRET_KEY", "flask-secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(env(REQUIRED)).unwrap();
        let db = &config.database;
        assert_eq!(db.host, "templog.mysql.database.azure.com");
        assert_eq!(db.port, 3306);
        assert_eq!(db.ssl_ca, PathBuf::from("./combined-ca-certificates.pem"));
        assert_eq!(db.ssl_mode, SslMode::VerifyIdentity);
        assert_eq!(db.connect_timeout, Duration::from_secs(10));
        assert_eq!(db.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.secret_key, "flask-secret");
    }

    #[test]
    fn test_optional_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("DB_PORT", "3307"),
            ("DB_SSL_CA", "/etc/templog/ca.pem"),
            ("DB_SSL_MODE", "verify_ca"),
            ("DB_CONNECT_TIMEOUT_SECS", "3"),
        ]);
        let config = AppConfig::from_lookup(env(&pairs)).unwrap();
        let db = &config.database;
        assert_eq!(db.port, 3307);
        assert_eq!(db.ssl_ca, PathBuf::from("/etc/templog/ca.pem"));
        assert_eq!(db.ssl_mode, SslMode::VerifyCa);
        assert_eq!(db.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_missing_required_variable() {
        for missing in ["DB_HOST", "DB_NAME", "DB_USER", "DB_PASS", "SECRET_KEY"] {
            let pairs: Vec<_> = REQUIRED
                .iter()
                .copied()
                .filter(|(k, _)| *k != missing)
                .collect();
            let err = AppConfig::from_lookup(env(&pairs)).unwrap_err();
            match err {
                Error::Config(msg) => assert!(msg.contains(missing), "{}", msg),
                other => panic!("expected Config error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_empty_required_variable() {
        let mut pairs = REQUIRED.to_vec();
        pairs.retain(|(k, _)| *k != "DB_PASS");
        pairs.push(("DB_PASS", ""));
        assert!(AppConfig::from_lookup(env(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_port_and_timeout() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DB_PORT", "mysql"));
        assert!(matches!(
            AppConfig::from_lookup(env(&pairs)),
            Err(Error::Config(_))
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DB_CONNECT_TIMEOUT_SECS", "0"));
        assert!(matches!(
            AppConfig::from_lookup(env(&pairs)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_weak_ssl_mode() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DB_SSL_MODE", "PREFERRED"));
        assert!(AppConfig::from_lookup(env(&pairs)).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_lookup(env(REQUIRED)).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("flask-secret"));
    }

    #[test]
    fn test_connection_config_carries_parameters() {
        let config = AppConfig::from_lookup(env(REQUIRED)).unwrap();
        let conn = config.database.connection_config();
        assert_eq!(conn.host, "templog.mysql.database.azure.com");
        assert_eq!(conn.database, "templog");
        assert_eq!(conn.user, "logger");
        assert_eq!(conn.password.as_deref(), Some("s3cret"));
        assert_eq!(conn.port, 3306);
    }
}
