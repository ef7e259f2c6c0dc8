#![no_main]

use libfuzzer_sys::fuzz_target;
use templog_db::bundle::{AuthorityCertificate, CertificateSource, TrustRole};

fuzz_target!(|data: &[u8]| {
    let source = CertificateSource::bytes("fuzz", data.to_vec());
    let _ = AuthorityCertificate::load(&source, TrustRole::ActiveRoot);
});
