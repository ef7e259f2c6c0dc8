//! Shared fixtures: generated certificate authorities and an in-process
//! MySQL server that speaks just enough of the connection phase over TLS.

#![allow(dead_code)]

use rand::distributions::Alphanumeric;
use rand::Rng;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use templog_db::bundle::{CertificateSource, TrustChain, TrustRole};
use templog_db::connection::{ConnectionConfig, SslMode, TlsConfig};

/// Server name every mock certificate is issued for by default
pub const HOST: &str = "localhost";
pub const DATABASE: &str = "templog";
pub const USER: &str = "logger";
pub const PASSWORD: &str = "correct horse battery staple";

/// Printable 20-byte nonce, as the server generates per connection
fn nonce() -> Vec<u8> {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .collect()
}

/// Self-signed certification authority
pub struct TestCa {
    pub cert: rcgen::Certificate,
    key: KeyPair,
}

impl TestCa {
    pub fn new(common_name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn der(&self) -> Vec<u8> {
        self.cert.der().to_vec()
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// Issue a server certificate for the given DNS names
    pub fn issue(&self, hosts: &[&str]) -> ServerIdentity {
        let key = KeyPair::generate().unwrap();
        let names: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
        let mut params = CertificateParams::new(names).unwrap();
        params.distinguished_name.push(DnType::CommonName, hosts[0]);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();

        ServerIdentity {
            chain: vec![cert.der().clone()],
            key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
        }
    }

    /// Write the CA to `dir/name` as DER or PEM
    pub fn write(&self, dir: &Path, name: &str, pem: bool) -> PathBuf {
        let path = dir.join(name);
        if pem {
            std::fs::write(&path, self.pem()).unwrap();
        } else {
            std::fs::write(&path, self.der()).unwrap();
        }
        path
    }
}

/// Server certificate chain and key
pub struct ServerIdentity {
    pub chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

/// Client-side TLS config trusting exactly `cas`, in order
pub fn tls_config(cas: &[&TestCa], mode: SslMode) -> TlsConfig {
    let chain = cas.iter().enumerate().fold(TrustChain::new(), |chain, (i, ca)| {
        let role = if i == 0 {
            TrustRole::ActiveRoot
        } else {
            TrustRole::NextRoot
        };
        chain.authority(CertificateSource::bytes(format!("ca-{}", i), ca.der()), role)
    });
    let bundle = chain.assemble().unwrap();
    TlsConfig::builder()
        .bundle(bundle)
        .ssl_mode(mode)
        .build()
        .unwrap()
}

/// Connection parameters pointing at a mock server
pub fn connection_config(port: u16, password: &str) -> ConnectionConfig {
    ConnectionConfig::builder(HOST, DATABASE, USER)
        .port(port)
        .password(password)
        .connect_timeout(Duration::from_secs(2))
        .handshake_timeout(Duration::from_secs(2))
        .build()
}

/// How the mock authenticates the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    /// caching_sha2_password, cache miss: cleartext password over TLS
    FullAuth,
    /// caching_sha2_password, cache hit: scramble verified, 0x03 ack
    FastAuth,
    /// AuthSwitch to mysql_native_password
    SwitchToNative,
}

/// Mock server behavior
#[derive(Debug, Clone)]
pub struct MockOptions {
    pub offer_tls: bool,
    pub greeting_error: Option<(u16, &'static str)>,
    pub auth: AuthFlow,
    pub stall: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            offer_tls: true,
            greeting_error: None,
            auth: AuthFlow::FullAuth,
            stall: false,
        }
    }
}

/// In-process MySQL server bound to 127.0.0.1
pub struct MockServer {
    pub addr: SocketAddr,
}

impl MockServer {
    pub async fn start(identity: ServerIdentity) -> Self {
        Self::start_with(identity, MockOptions::default()).await
    }

    pub async fn start_with(identity: ServerIdentity, options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(identity.chain, identity.key)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));
        let options = Arc::new(options);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let options = options.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, acceptor, &options).await;
                });
            }
        });

        Self { addr }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn serve(mut stream: TcpStream, acceptor: TlsAcceptor, options: &MockOptions) -> io::Result<()> {
    if options.stall {
        tokio::time::sleep(Duration::from_secs(30)).await;
        return Ok(());
    }

    if let Some((code, message)) = options.greeting_error {
        let mut payload = vec![0xFF];
        payload.extend_from_slice(&code.to_le_bytes());
        payload.extend_from_slice(message.as_bytes());
        write_packet(&mut stream, 0, &payload).await?;
        return Ok(());
    }

    let scramble = nonce();
    write_packet(&mut stream, 0, &greeting(options.offer_tls, &scramble)).await?;

    let (_, ssl_request) = read_packet(&mut stream).await?;
    assert_eq!(ssl_request.len(), 32, "SSLRequest must be the bare login prefix");
    let mut tls = acceptor.accept(stream).await?;

    let (seq, response) = read_packet(&mut tls).await?;
    let login = Login::parse(&response);
    let mut seq = seq.wrapping_add(1);

    let authenticated = match options.auth {
        AuthFlow::FullAuth => {
            write_packet(&mut tls, seq, &[0x01, 0x04]).await?;
            let (s, cleartext) = read_packet(&mut tls).await?;
            seq = s.wrapping_add(1);
            cleartext.strip_suffix(&[0]) == Some(PASSWORD.as_bytes())
        }
        AuthFlow::FastAuth => {
            let ok = login.auth_response == caching_sha2_expected(PASSWORD, &scramble);
            if ok {
                write_packet(&mut tls, seq, &[0x01, 0x03]).await?;
                seq = seq.wrapping_add(1);
            }
            ok
        }
        AuthFlow::SwitchToNative => {
            let switch_nonce = nonce();
            let mut switch = vec![0xFE];
            switch.extend_from_slice(b"mysql_native_password\0");
            switch.extend_from_slice(&switch_nonce);
            switch.push(0);
            write_packet(&mut tls, seq, &switch).await?;
            let (s, reply) = read_packet(&mut tls).await?;
            seq = s.wrapping_add(1);
            reply == native_expected(PASSWORD, &switch_nonce)
        }
    };

    if !authenticated {
        let message = format!(
            "Access denied for user '{}'@'localhost' (using password: YES)",
            login.user
        );
        write_packet(&mut tls, seq, &err_packet(1045, "28000", &message)).await?;
        return tls.shutdown().await;
    }

    if login.database != DATABASE {
        let message = format!("Unknown database '{}'", login.database);
        write_packet(&mut tls, seq, &err_packet(1049, "42000", &message)).await?;
        return tls.shutdown().await;
    }

    write_packet(&mut tls, seq, &ok_packet()).await?;

    // Command phase
    loop {
        let (_, command) = read_packet(&mut tls).await?;
        match command.first() {
            Some(0x0E) => write_packet(&mut tls, 1, &ok_packet()).await?,
            Some(0x01) => return tls.shutdown().await,
            _ => write_packet(&mut tls, 1, &err_packet(1047, "08S01", "Unknown command")).await?,
        }
    }
}

struct Login {
    user: String,
    auth_response: Vec<u8>,
    database: String,
}

impl Login {
    fn parse(payload: &[u8]) -> Self {
        let rest = &payload[32..];
        let (user, rest) = split_nul(rest);
        let len = rest[0] as usize;
        let auth_response = rest[1..1 + len].to_vec();
        let (database, _) = split_nul(&rest[1 + len..]);
        Self {
            user: String::from_utf8_lossy(user).into_owned(),
            auth_response,
            database: String::from_utf8_lossy(database).into_owned(),
        }
    }
}

fn split_nul(buf: &[u8]) -> (&[u8], &[u8]) {
    let pos = buf.iter().position(|b| *b == 0).unwrap();
    (&buf[..pos], &buf[pos + 1..])
}

fn greeting(offer_tls: bool, scramble: &[u8]) -> Vec<u8> {
    // CLIENT_DEFAULT of the crate, minus SSL when TLS is not offered
    let mut caps: u32 = 0x0000_0001
        | 0x0000_0002
        | 0x0000_0004
        | 0x0000_0008
        | 0x0000_0200
        | 0x0000_2000
        | 0x0000_8000
        | 0x0002_0000
        | 0x0008_0000
        | 0x0020_0000
        | 0x0100_0000;
    if offer_tls {
        caps |= 0x0000_0800;
    }

    let mut p = vec![10];
    p.extend_from_slice(b"8.0.36-mock\0");
    p.extend_from_slice(&7u32.to_le_bytes());
    p.extend_from_slice(&scramble[..8]);
    p.push(0);
    p.extend_from_slice(&(caps as u16).to_le_bytes());
    p.push(45);
    p.extend_from_slice(&2u16.to_le_bytes());
    p.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
    p.push(21);
    p.extend_from_slice(&[0; 10]);
    p.extend_from_slice(&scramble[8..]);
    p.push(0);
    p.extend_from_slice(b"caching_sha2_password\0");
    p
}

fn ok_packet() -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]
}

fn err_packet(code: u16, state: &str, message: &str) -> Vec<u8> {
    let mut p = vec![0xFF];
    p.extend_from_slice(&code.to_le_bytes());
    p.push(b'#');
    p.extend_from_slice(state.as_bytes());
    p.extend_from_slice(message.as_bytes());
    p
}

fn caching_sha2_expected(password: &str, nonce: &[u8]) -> Vec<u8> {
    let stage1 = Sha256::digest(password.as_bytes());
    let stage2 = Sha256::digest(stage1);
    let mut h = Sha256::new();
    h.update(stage2);
    h.update(nonce);
    let mix = h.finalize();
    stage1.iter().zip(mix.iter()).map(|(a, b)| a ^ b).collect()
}

fn native_expected(password: &str, nonce: &[u8]) -> Vec<u8> {
    let stage1 = Sha1::digest(password.as_bytes());
    let stage2 = Sha1::digest(stage1);
    let mut h = Sha1::new();
    h.update(nonce);
    h.update(stage2);
    let mix = h.finalize();
    stage1.iter().zip(mix.iter()).map(|(a, b)| a ^ b).collect()
}

async fn write_packet<S: AsyncWrite + Unpin>(stream: &mut S, seq: u8, payload: &[u8]) -> io::Result<()> {
    let len = payload.len() as u32;
    let mut buf = len.to_le_bytes()[..3].to_vec();
    buf.push(seq);
    buf.extend_from_slice(payload);
    stream.write_all(&buf).await?;
    stream.flush().await
}

async fn read_packet<S: AsyncRead + Unpin>(stream: &mut S) -> io::Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok((header[3], payload))
}
