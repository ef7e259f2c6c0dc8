//! TLS configuration for connections validated against a trust bundle.
//!
//! Server certificates are checked only against the authorities in the
//! combined bundle; the system trust store is never consulted, since the
//! managed server's authority need not be in it.

use crate::bundle::TrustBundle;
use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Certificate verification mode, named after MySQL's `--ssl-mode` values.
///
/// Plaintext modes do not exist: every connection is encrypted and its
/// server chain validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Chain must validate against the bundle; host name is not checked
    VerifyCa,
    /// Chain must validate and the certificate must name the host
    #[default]
    VerifyIdentity,
}

impl SslMode {
    /// Whether host name matching is enforced
    pub fn verifies_hostname(&self) -> bool {
        matches!(self, Self::VerifyIdentity)
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VerifyCa => write!(f, "VERIFY_CA"),
            Self::VerifyIdentity => write!(f, "VERIFY_IDENTITY"),
        }
    }
}

impl std::str::FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "VERIFY_CA" => Ok(Self::VerifyCa),
            "VERIFY_IDENTITY" => Ok(Self::VerifyIdentity),
            "DISABLED" | "PREFERRED" | "REQUIRED" => Err(Error::Config(format!(
                "ssl-mode '{}' does not validate the server certificate: expected VERIFY_CA or VERIFY_IDENTITY",
                s
            ))),
            _ => Err(Error::Config(format!(
                "invalid ssl-mode '{}': expected VERIFY_CA or VERIFY_IDENTITY",
                s
            ))),
        }
    }
}

/// TLS configuration for secure MySQL connections.
///
/// # Examples
///
/// ```ignore
/// use templog_db::connection::{SslMode, TlsConfig};
///
/// let tls = TlsConfig::builder()
///     .ca_bundle_path("./combined-ca-certificates.pem")
///     .ssl_mode(SslMode::VerifyIdentity)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Where the bundle was read from (None when built from memory)
    ca_bundle_path: Option<PathBuf>,
    /// Verification mode
    ssl_mode: SslMode,
    /// Number of trust anchors loaded
    anchors: usize,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Verification mode
    pub fn ssl_mode(&self) -> SslMode {
        self.ssl_mode
    }

    /// Bundle location, if loaded from disk
    pub fn ca_bundle_path(&self) -> Option<&Path> {
        self.ca_bundle_path.as_deref()
    }

    /// Number of trust anchors
    pub fn anchors(&self) -> usize {
        self.anchors
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_bundle_path", &self.ca_bundle_path)
            .field("ssl_mode", &self.ssl_mode)
            .field("anchors", &self.anchors)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
#[derive(Default)]
pub struct TlsConfigBuilder {
    ca_bundle_path: Option<PathBuf>,
    bundle: Option<TrustBundle>,
    ssl_mode: SslMode,
}

impl TlsConfigBuilder {
    /// Read trust anchors from a combined PEM bundle on disk.
    pub fn ca_bundle_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle_path = Some(path.into());
        self
    }

    /// Use an in-memory bundle (takes precedence over the path).
    pub fn bundle(mut self, bundle: TrustBundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    /// Set the verification mode (default: `VerifyIdentity`).
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// - `Config` if neither a bundle nor a bundle path was supplied
    /// - `MissingCertificate` if the bundle file does not exist
    /// - `Encoding` if the bundle does not parse
    pub fn build(self) -> Result<TlsConfig> {
        let bundle = match (self.bundle, &self.ca_bundle_path) {
            (Some(bundle), _) => bundle,
            (None, Some(path)) => TrustBundle::read_from(path)?,
            (None, None) => {
                return Err(Error::Config(
                    "a CA bundle is required; the system trust store is never used".into(),
                ))
            }
        };

        let root_store = bundle.root_store()?;
        let anchors = root_store.len();
        if anchors == 0 {
            return Err(Error::Config("CA bundle contains no trust anchors".into()));
        }

        let client_config = match self.ssl_mode {
            SslMode::VerifyIdentity => ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
            SslMode::VerifyCa => {
                let verifier = ChainOnlyVerifier::new(root_store)?;
                ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(verifier))
                    .with_no_client_auth()
            }
        };

        tracing::debug!(anchors, ssl_mode = %self.ssl_mode, "TLS configuration built");

        Ok(TlsConfig {
            ca_bundle_path: self.ca_bundle_path,
            ssl_mode: self.ssl_mode,
            anchors,
            client_config: Arc::new(client_config),
        })
    }
}

/// Validates the chain against the bundle but tolerates a host name mismatch.
#[derive(Debug)]
struct ChainOnlyVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ChainOnlyVerifier {
    fn new(roots: RootCertStore) -> Result<Self> {
        let inner = WebPkiServerVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| Error::Config(format!("failed to build certificate verifier: {}", e)))?;
        Ok(Self { inner })
    }
}

fn is_name_mismatch(err: &rustls::Error) -> bool {
    matches!(
        err,
        rustls::Error::InvalidCertificate(
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
        )
    )
}

impl ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(ref e) if is_name_mismatch(e) => {
                tracing::debug!(?server_name, "ignoring host name mismatch (VERIFY_CA)");
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Parse server name from hostname for TLS SNI (Server Name Indication).
///
/// # Errors
///
/// Returns an error if the hostname is invalid.
pub fn parse_server_name(hostname: &str) -> Result<ServerName<'static>> {
    // Remove trailing dot if present
    let hostname = hostname.trim_end_matches('.');

    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::Config(format!(
            "Invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    if !hostname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == ':')
    {
        return Err(Error::Config(format!(
            "Invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Config(format!("Invalid hostname for TLS: '{}'", hostname)))
}
