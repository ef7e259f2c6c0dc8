//! JSON manifest declaring the chain order and the bundle location
//!
//! ```json
//! {
//!   "output": "combined-ca-certificates.pem",
//!   "authorities": [
//!     { "path": "DigiCertGlobalRootCA.crt.pem", "role": "active-root" },
//!     { "path": "DigiCertGlobalRootG2.crt.pem", "role": "next-root" },
//!     { "path": "Microsoft RSA Root Certificate Authority 2017.crt", "role": "intermediate" }
//!   ]
//! }
//! ```

use super::assembler::{TrustChain, DEFAULT_BUNDLE_PATH};
use super::certificate::{CertificateSource, TrustRole};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Declared trust chain, as read from disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustManifest {
    /// Where the combined bundle is written
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Authorities in issuer-documented order
    pub authorities: Vec<ManifestEntry>,
}

/// One declared authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// Certificate file (DER or PEM)
    pub path: PathBuf,
    /// Chain position
    pub role: TrustRole,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_BUNDLE_PATH)
}

impl TrustManifest {
    /// Read a manifest; relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read trust manifest '{}': {}",
                path.display(),
                e
            ))
        })?;

        let manifest: Self = serde_json::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(manifest.resolve_against(base))
    }

    /// Anchor relative paths at `base`
    pub fn resolve_against(mut self, base: &Path) -> Self {
        if self.output.is_relative() {
            self.output = base.join(&self.output);
        }
        for entry in &mut self.authorities {
            if entry.path.is_relative() {
                entry.path = base.join(&entry.path);
            }
        }
        self
    }

    /// Chain in declared order
    pub fn chain(&self) -> TrustChain {
        self.authorities
            .iter()
            .fold(TrustChain::new(), |chain, entry| {
                chain.authority(CertificateSource::path(&entry.path), entry.role)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let json = r#"{
            "output": "bundle.pem",
            "authorities": [
                { "path": "a.pem", "role": "active-root" },
                { "path": "/abs/b.crt", "role": "next-root" }
            ]
        }"#;
        let manifest: TrustManifest = serde_json::from_str(json).unwrap();
        let manifest = manifest.resolve_against(Path::new("/etc/templog"));

        assert_eq!(manifest.output, PathBuf::from("/etc/templog/bundle.pem"));
        assert_eq!(
            manifest.authorities[0].path,
            PathBuf::from("/etc/templog/a.pem")
        );
        assert_eq!(manifest.authorities[1].path, PathBuf::from("/abs/b.crt"));
        assert_eq!(manifest.authorities[1].role, TrustRole::NextRoot);
        assert_eq!(manifest.chain().len(), 2);
    }

    #[test]
    fn test_default_output() {
        let json = r#"{ "authorities": [] }"#;
        let manifest: TrustManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.output, PathBuf::from(DEFAULT_BUNDLE_PATH));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let json = r#"{ "authorities": [ { "path": "a.pem", "role": "leaf" } ] }"#;
        assert!(serde_json::from_str::<TrustManifest>(json).is_err());
    }

    #[test]
    fn test_missing_manifest() {
        let err = TrustManifest::load("/no/such/trust-chain.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
