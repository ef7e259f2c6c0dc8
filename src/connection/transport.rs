//! Transport abstraction (TCP, upgraded to TLS before authentication)

use super::tls::{parse_server_name, TlsConfig};
use crate::{Error, Result};
use bytes::BytesMut;
use sha2::Digest;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Transport layer: plain TCP until the SSLRequest, TLS afterwards
pub enum Transport {
    /// Plain TCP connection (greeting and SSLRequest only)
    Plain(TcpStream),
    /// TLS-encrypted TCP connection
    Tls(Box<TlsStream<TcpStream>>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Plain(_) => f.write_str("Transport::Plain(TcpStream)"),
            Transport::Tls(_) => f.write_str("Transport::Tls(TlsStream)"),
        }
    }
}

impl Transport {
    /// Connect via plain TCP, giving up after `timeout`.
    ///
    /// Resolution failures, refused connections, unreachable networks and
    /// timeouts all surface as `Error::Connection`.
    pub async fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::Connection(format!(
                    "failed to connect to {}:{}: {}",
                    host, port, e
                )))
            }
            Err(_) => {
                return Err(Error::Connection(format!(
                    "timed out after {:?} connecting to {}:{}",
                    timeout, host, port
                )))
            }
        };

        stream.set_nodelay(true)?;
        Ok(Transport::Plain(stream))
    }

    /// Whether the stream is encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Write bytes to the transport
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.write_all(buf).await?,
            Transport::Tls(stream) => stream.write_all(buf).await?,
        }
        Ok(())
    }

    /// Flush the transport
    pub async fn flush(&mut self) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush().await?,
            Transport::Tls(stream) => stream.flush().await?,
        }
        Ok(())
    }

    /// Read bytes into buffer
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = match self {
            Transport::Plain(stream) => stream.read_buf(buf).await?,
            Transport::Tls(stream) => stream.read_buf(buf).await?,
        };
        Ok(n)
    }

    /// Upgrade a plain TCP transport to TLS after the SSLRequest.
    ///
    /// Consumes `self` and returns a new `Transport` with a TLS-encrypted
    /// stream. Certificate rejections surface as
    /// `Error::CertificateValidation`; other handshake failures as
    /// `Error::Tls`.
    pub async fn upgrade_to_tls(self, tls_config: &TlsConfig, hostname: &str) -> Result<Self> {
        match self {
            Transport::Plain(tcp_stream) => {
                let server_name = parse_server_name(hostname)?;
                let connector = tokio_rustls::TlsConnector::from(tls_config.client_config());
                let tls_stream = connector
                    .connect(server_name, tcp_stream)
                    .await
                    .map_err(classify_tls_error)?;

                Ok(Transport::Tls(Box::new(tls_stream)))
            }
            Transport::Tls(_) => Err(Error::Config(
                "transport is already TLS-encrypted".into(),
            )),
        }
    }

    /// Shutdown the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.shutdown().await?,
            Transport::Tls(stream) => stream.shutdown().await?,
        }
        Ok(())
    }

    /// SHA-256 fingerprint (hex) of the server's leaf certificate.
    ///
    /// Returns `None` for plain connections.
    pub fn peer_fingerprint(&self) -> Option<String> {
        match self {
            Transport::Plain(_) => None,
            Transport::Tls(stream) => {
                let (_tcp, conn) = stream.get_ref();
                let certs = conn.peer_certificates()?;
                let leaf = certs.first()?;
                Some(hex::encode(sha2::Sha256::digest(leaf.as_ref())))
            }
        }
    }
}

/// Map a TLS handshake failure onto the error taxonomy.
pub(crate) fn classify_tls_error(e: io::Error) -> Error {
    let tls_err = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>());

    match tls_err {
        Some(rustls::Error::InvalidCertificate(_)) => {
            crate::metrics::counters::tls_handshake_failed("invalid_certificate");
            Error::CertificateValidation(e.to_string())
        }
        Some(other) => {
            crate::metrics::counters::tls_handshake_failed("tls");
            Error::Tls(other.to_string())
        }
        None => {
            crate::metrics::counters::tls_handshake_failed("io");
            Error::Tls(format!("TLS handshake failed: {}", e))
        }
    }
}
