//! Error types for bundle assembly and connection establishment

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling a trust bundle or establishing a connection.
///
/// Every variant is fatal at the point of use. Callers are expected to abort
/// start-up (or fail health checks) rather than continue with a partial
/// bundle or an unvalidated connection.
#[derive(Debug, Error)]
pub enum Error {
    /// A supplied certificate could not be parsed as X.509
    #[error("certificate encoding error in '{origin}': {reason}")]
    Encoding {
        /// Label or path of the offending source
        origin: String,
        /// Parser diagnostic
        reason: String,
    },

    /// A declared certificate source path does not exist
    #[error("certificate source not found: {}", .0.display())]
    MissingCertificate(PathBuf),

    /// Network unreachable, TCP refused, timeout, or host rejected by the server
    #[error("connection error: {0}")]
    Connection(String),

    /// Server rejected the supplied credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Server certificate chain could not be validated against the bundle
    #[error("server certificate validation failed: {0}")]
    CertificateValidation(String),

    /// TLS failure unrelated to certificate validation
    #[error("TLS error: {0}")]
    Tls(String),

    /// Server does not offer TLS; plaintext is never used
    #[error("server does not support TLS")]
    TlsNotSupported,

    /// ERR packet from the server outside of authentication
    #[error("server error {code} ({sql_state}): {message}")]
    Server {
        /// MySQL error code
        code: u16,
        /// SQLSTATE
        sql_state: String,
        /// Human readable message
        message: String,
    },

    /// Malformed or unexpected packet
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid or missing configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid connection state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Peer closed the connection
    #[error("connection closed")]
    ConnectionClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Manifest (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable label for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Encoding { .. } => "encoding",
            Error::MissingCertificate(_) => "missing_certificate",
            Error::Connection(_) => "connection",
            Error::Authentication(_) => "authentication",
            Error::CertificateValidation(_) => "certificate_validation",
            Error::Tls(_) => "tls",
            Error::TlsNotSupported => "tls_not_supported",
            Error::Server { .. } => "server",
            Error::Protocol(_) => "protocol",
            Error::Config(_) => "config",
            Error::InvalidState { .. } => "invalid_state",
            Error::ConnectionClosed => "connection_closed",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }

    /// Whether the error came from bundle assembly rather than the network.
    pub fn is_bundle_error(&self) -> bool {
        matches!(
            self,
            Error::Encoding { .. } | Error::MissingCertificate(_) | Error::Json(_)
        )
    }

    pub(crate) fn encoding(origin: impl Into<String>, reason: impl ToString) -> Self {
        Error::Encoding {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
