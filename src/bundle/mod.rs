//! Trust bundle assembly
//!
//! This module handles:
//! * Loading authority certificates from files or bytes
//! * DER to PEM conversion
//! * Ordered, additive concatenation into one combined PEM artifact
//! * Atomic, idempotent persistence of that artifact

mod assembler;
mod certificate;
mod manifest;
pub mod pem;

pub use assembler::{
    TrustBundle, TrustChain, WriteOutcome, AZURE_FLEXIBLE_SERVER_CHAIN, DEFAULT_BUNDLE_PATH,
};
pub use certificate::{AuthorityCertificate, CertificateSource, Encoding, TrustRole};
pub use manifest::{ManifestEntry, TrustManifest};
