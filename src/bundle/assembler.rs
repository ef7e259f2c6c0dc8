//! Combined trust bundle assembly

use super::certificate::{AuthorityCertificate, CertificateSource, TrustRole};
use super::pem::pem_to_der;
use crate::{Error, Result};
use rustls::RootCertStore;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default on-disk location of the combined bundle
pub const DEFAULT_BUNDLE_PATH: &str = "./combined-ca-certificates.pem";

/// Azure Database for MySQL Flexible Server authorities, in documented order.
pub const AZURE_FLEXIBLE_SERVER_CHAIN: [(&str, TrustRole); 3] = [
    ("DigiCertGlobalRootCA.crt.pem", TrustRole::ActiveRoot),
    ("DigiCertGlobalRootG2.crt.pem", TrustRole::NextRoot),
    (
        "Microsoft RSA Root Certificate Authority 2017.crt",
        TrustRole::Intermediate,
    ),
];

/// Declared chain of authority sources.
///
/// Order is an external contract set by the certificate issuer; entries are
/// assembled exactly in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct TrustChain {
    entries: Vec<(CertificateSource, TrustRole)>,
}

impl TrustChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// The documented Azure Flexible Server chain, with files under `dir`.
    pub fn azure_flexible_server(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        AZURE_FLEXIBLE_SERVER_CHAIN
            .iter()
            .fold(Self::new(), |chain, (file, role)| {
                chain.authority(CertificateSource::path(dir.join(file)), *role)
            })
    }

    /// Append a source at the next position
    pub fn authority(mut self, source: CertificateSource, role: TrustRole) -> Self {
        self.entries.push((source, role));
        self
    }

    /// Number of declared sources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sources are declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load, validate, and order every declared authority.
    ///
    /// # Errors
    ///
    /// Fails on the first missing or unparsable source; no partial bundle is
    /// produced.
    pub fn assemble(&self) -> Result<TrustBundle> {
        if self.entries.is_empty() {
            return Err(Error::Config("trust chain declares no authorities".into()));
        }

        let mut bundle = TrustBundle::default();
        for (source, role) in &self.entries {
            for cert in AuthorityCertificate::load(source, *role)? {
                bundle = bundle.with_authority(cert);
            }
        }

        tracing::info!(
            sources = self.entries.len(),
            authorities = bundle.len(),
            "trust bundle assembled"
        );
        crate::metrics::counters::bundle_assembled(bundle.len());
        Ok(bundle)
    }
}

/// Result of persisting a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File created or replaced
    Written,
    /// File already held identical content
    Unchanged,
}

/// Ordered set of authorities, serialised as concatenated PEM blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustBundle {
    authorities: Vec<AuthorityCertificate>,
}

impl TrustBundle {
    /// Authorities in trust order
    pub fn authorities(&self) -> &[AuthorityCertificate] {
        &self.authorities
    }

    /// Number of authorities
    pub fn len(&self) -> usize {
        self.authorities.len()
    }

    /// Whether the bundle is empty
    pub fn is_empty(&self) -> bool {
        self.authorities.is_empty()
    }

    /// Whether an authority with this fingerprint is present
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.authorities
            .iter()
            .any(|cert| cert.fingerprint().eq_ignore_ascii_case(fingerprint))
    }

    /// Append an authority (rotation is strictly additive).
    ///
    /// An authority already present keeps its original position.
    pub fn with_authority(mut self, cert: AuthorityCertificate) -> Self {
        let fingerprint = cert.fingerprint();
        if self.contains(&fingerprint) {
            tracing::warn!(
                label = cert.label(),
                %fingerprint,
                "authority declared twice, keeping first position"
            );
            return self;
        }
        self.authorities.push(cert);
        self
    }

    /// Drop an expired authority. This is the only way trust is removed.
    pub fn without_authority(mut self, fingerprint: &str) -> Self {
        let before = self.authorities.len();
        self.authorities
            .retain(|cert| !cert.fingerprint().eq_ignore_ascii_case(fingerprint));
        if self.authorities.len() < before {
            tracing::info!(%fingerprint, "authority removed from trust bundle");
        }
        self
    }

    /// Concatenated PEM text, in trust order
    pub fn to_pem(&self) -> String {
        self.authorities.iter().map(|cert| cert.pem()).collect()
    }

    /// rustls root store holding every authority in the bundle
    pub fn root_store(&self) -> Result<RootCertStore> {
        let mut store = RootCertStore::empty();
        for cert in &self.authorities {
            store
                .add(cert.der().clone())
                .map_err(|e| Error::encoding(cert.label(), e))?;
        }
        Ok(store)
    }

    /// Parse a previously written bundle, recovering certificates in order.
    ///
    /// Roles are not persisted in the PEM artifact; read-back entries are
    /// reported as `Intermediate` except the first, which is the active root.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::MissingCertificate(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        let origin = path.display().to_string();
        let ders = pem_to_der(&data).map_err(|e| Error::encoding(&origin, e))?;
        if ders.is_empty() {
            return Err(Error::encoding(&origin, "bundle contains no certificates"));
        }

        let mut bundle = Self::default();
        for (i, der) in ders.into_iter().enumerate() {
            let role = if i == 0 {
                TrustRole::ActiveRoot
            } else {
                TrustRole::Intermediate
            };
            let cert =
                AuthorityCertificate::from_der(format!("{}#{}", origin, i + 1), der.to_vec(), role)?;
            bundle.authorities.push(cert);
        }
        Ok(bundle)
    }

    /// Persist the bundle, replacing whatever was at `path`.
    ///
    /// The new content is written to a sibling temporary file and renamed
    /// over the target, so readers never see a half-written bundle. When the
    /// target already holds identical bytes nothing is touched.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<WriteOutcome> {
        let path = path.as_ref();
        if self.is_empty() {
            return Err(Error::Config("refusing to write an empty trust bundle".into()));
        }

        let content = self.to_pem();
        match fs::read(path) {
            Ok(existing) if existing == content.as_bytes() => {
                tracing::debug!(path = %path.display(), "trust bundle unchanged");
                return Ok(WriteOutcome::Unchanged);
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        replace_with(path, |file| file.write_all(content.as_bytes()))?;

        tracing::info!(
            path = %path.display(),
            authorities = self.len(),
            "trust bundle written"
        );
        Ok(WriteOutcome::Written)
    }
}

/// Fill a sibling temporary file and rename it over `path`.
///
/// The temporary file never outlives a failed attempt.
fn replace_with(
    path: &Path,
    fill: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> io::Result<()> {
    let tmp = temp_path_for(path);
    let result = fs::File::create(&tmp)
        .and_then(|mut file| {
            fill(&mut file)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "bundle".into());
    name.push(format!(".tmp{}", std::process::id()));
    path.with_file_name(name)
}
