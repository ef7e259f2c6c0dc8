//! Authority certificates and where they come from

use super::pem::{der_to_pem, is_pem, pem_to_der};
use crate::{Error, Result};
use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Position of an authority in the issuer's documented chain of trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustRole {
    /// Root currently signing server certificates
    ActiveRoot,
    /// Next-generation root the operator is rotating towards
    NextRoot,
    /// Intermediate or cross-signing authority
    Intermediate,
}

impl fmt::Display for TrustRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveRoot => write!(f, "active-root"),
            Self::NextRoot => write!(f, "next-root"),
            Self::Intermediate => write!(f, "intermediate"),
        }
    }
}

impl std::str::FromStr for TrustRole {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active-root" => Ok(Self::ActiveRoot),
            "next-root" => Ok(Self::NextRoot),
            "intermediate" => Ok(Self::Intermediate),
            _ => Err(Error::Config(format!(
                "invalid trust role '{}': expected active-root, next-root, or intermediate",
                s
            ))),
        }
    }
}

/// Encoding a certificate arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Binary DER
    Der,
    /// Base64 text with PEM delimiters
    Pem,
}

/// Where authority certificate bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// Operator-downloaded file
    Path(PathBuf),
    /// Bytes already in memory (fetched or embedded)
    Bytes {
        /// Name used in logs and errors
        label: String,
        /// Raw DER or PEM bytes
        data: Vec<u8>,
    },
}

impl CertificateSource {
    /// Source backed by a file
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Source backed by in-memory bytes
    pub fn bytes(label: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            label: label.into(),
            data: data.into(),
        }
    }

    /// Label used in logs and error messages
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Bytes { label, .. } => label.clone(),
        }
    }

    fn read(&self) -> Result<Vec<u8>> {
        match self {
            Self::Path(path) => read_source_file(path),
            Self::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}

fn read_source_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::MissingCertificate(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

/// One certification authority in the trust chain.
///
/// Always holds the DER bytes; the PEM text is derived on demand so that a
/// DER source and its PEM rendering are guaranteed to describe the same
/// certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorityCertificate {
    label: String,
    der: CertificateDer<'static>,
    encoding: Encoding,
    role: TrustRole,
}

impl AuthorityCertificate {
    /// Load every certificate from a source.
    ///
    /// A PEM source may contain several certificates; they are returned in
    /// file order and share the declared role. A DER source holds exactly one.
    ///
    /// # Errors
    ///
    /// - `MissingCertificate` if a path source does not exist
    /// - `Encoding` if the bytes do not parse as X.509
    pub fn load(source: &CertificateSource, role: TrustRole) -> Result<Vec<Self>> {
        let label = source.label();
        let data = source.read()?;

        if is_pem(&data) {
            let ders = pem_to_der(&data).map_err(|e| Error::encoding(&label, e))?;
            if ders.is_empty() {
                return Err(Error::encoding(&label, "no certificate blocks found"));
            }

            let count = ders.len();
            ders.into_iter()
                .enumerate()
                .map(|(i, der)| {
                    let label = if count == 1 {
                        label.clone()
                    } else {
                        format!("{}#{}", label, i + 1)
                    };
                    Self::new(label, der, Encoding::Pem, role)
                })
                .collect()
        } else {
            tracing::debug!(source = %label, "converting DER certificate to PEM");
            let cert = Self::new(label, CertificateDer::from(data), Encoding::Der, role)?;
            Ok(vec![cert])
        }
    }

    /// Build from DER bytes, validating the X.509 structure.
    pub fn from_der(label: impl Into<String>, der: Vec<u8>, role: TrustRole) -> Result<Self> {
        Self::new(label.into(), CertificateDer::from(der), Encoding::Der, role)
    }

    fn new(
        label: String,
        der: CertificateDer<'static>,
        encoding: Encoding,
        role: TrustRole,
    ) -> Result<Self> {
        // Parsing as a trust anchor rejects anything that is not a certificate
        let mut anchors = RootCertStore::empty();
        anchors
            .add(der.clone())
            .map_err(|e| Error::encoding(&label, e))?;

        Ok(Self {
            label,
            der,
            encoding,
            role,
        })
    }

    /// Source label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared chain position
    pub fn role(&self) -> TrustRole {
        self.role
    }

    /// Encoding the certificate was supplied in
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Canonical DER bytes
    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    /// PEM rendering of the DER bytes
    pub fn pem(&self) -> String {
        der_to_pem(self.der.as_ref())
    }

    /// Lowercase hex SHA-256 of the DER bytes
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.der.as_ref()))
    }
}

impl fmt::Debug for AuthorityCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityCertificate")
            .field("label", &self.label)
            .field("role", &self.role)
            .field("encoding", &self.encoding)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_role_from_str() {
        assert_eq!(
            "active-root".parse::<TrustRole>().unwrap(),
            TrustRole::ActiveRoot
        );
        assert_eq!("next-root".parse::<TrustRole>().unwrap(), TrustRole::NextRoot);
        assert_eq!(
            "intermediate".parse::<TrustRole>().unwrap(),
            TrustRole::Intermediate
        );
        assert!("leaf".parse::<TrustRole>().is_err());
    }

    #[test]
    fn test_trust_role_display_round_trip() {
        for role in [
            TrustRole::ActiveRoot,
            TrustRole::NextRoot,
            TrustRole::Intermediate,
        ] {
            assert_eq!(role.to_string().parse::<TrustRole>().unwrap(), role);
        }
    }

    #[test]
    fn test_source_label() {
        let source = CertificateSource::path("/etc/certs/DigiCertGlobalRootG2.crt.pem");
        assert_eq!(source.label(), "DigiCertGlobalRootG2.crt.pem");

        let source = CertificateSource::bytes("fetched", vec![1, 2, 3]);
        assert_eq!(source.label(), "fetched");
    }

    #[test]
    fn test_load_missing_path() {
        let source = CertificateSource::path("/definitely/not/here/root.pem");
        let err = AuthorityCertificate::load(&source, TrustRole::ActiveRoot).unwrap_err();
        assert!(matches!(err, Error::MissingCertificate(_)));
    }

    #[test]
    fn test_load_garbage_der() {
        let source = CertificateSource::bytes("garbage", vec![0xde, 0xad, 0xbe, 0xef]);
        let err = AuthorityCertificate::load(&source, TrustRole::ActiveRoot).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_load_pem_without_certificate() {
        let source = CertificateSource::bytes(
            "key-only",
            "-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n",
        );
        let err = AuthorityCertificate::load(&source, TrustRole::ActiveRoot).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_load_pem_wrapping_garbage() {
        let pem = der_to_pem(&[0x01, 0x02, 0x03]);
        let source = CertificateSource::bytes("wrapped-garbage", pem);
        let err = AuthorityCertificate::load(&source, TrustRole::Intermediate).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }
}
