//! Core connection type

use super::state::ConnectionState;
use super::tls::{SslMode, TlsConfig};
use super::transport::Transport;
use crate::auth::{clear_password, AuthPlugin};
use crate::protocol::constants::{caching_sha2, capabilities, error_codes, UTF8MB4_GENERAL_CI};
use crate::protocol::{
    decode_greeting, decode_packet, decode_response, encode_message, BackendMessage,
    FrontendMessage, HandshakeResponse, InitialHandshake, Packet,
};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use std::io;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Default MySQL port
pub const DEFAULT_PORT: u16 = 3306;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on TLS negotiation plus authentication
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on auth-switch / more-data round trips
const MAX_AUTH_ROUNDS: usize = 8;

/// Connection configuration
///
/// Stores connection parameters including host, database, credentials, and
/// timeouts. Use `ConnectionConfig::builder()` for the fluent form.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Server host name (also used for SNI and certificate name matching)
    pub host: String,
    /// Server port (default: 3306)
    pub port: u16,
    /// Database name
    pub database: String,
    /// Username
    pub user: String,
    /// Password (optional)
    pub password: Option<String>,
    /// Certificate verification mode
    pub ssl_mode: SslMode,
    /// TCP connection timeout (default: 10 seconds)
    pub connect_timeout: Duration,
    /// TLS + authentication timeout (default: 10 seconds)
    pub handshake_timeout: Duration,
}

impl ConnectionConfig {
    /// Create new configuration with defaults
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self::builder(host, database, user).build()
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::builder("db.example.com", "templog", "app")
    ///     .password("secret")
    ///     .connect_timeout(Duration::from_secs(5))
    ///     .build();
    /// ```
    pub fn builder(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            host: host.into(),
            port: DEFAULT_PORT,
            database: database.into(),
            user: user.into(),
            password: None,
            ssl_mode: SslMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Set password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

/// Builder for creating `ConnectionConfig`
#[derive(Clone)]
pub struct ConnectionConfigBuilder {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: Option<String>,
    ssl_mode: SslMode,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl ConnectionConfigBuilder {
    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the certificate verification mode
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    /// Set TCP connection timeout
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    /// Set the bound on TLS negotiation plus authentication
    ///
    /// Default: 10 seconds
    pub fn handshake_timeout(mut self, duration: Duration) -> Self {
        self.handshake_timeout = duration;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host,
            port: self.port,
            database: self.database,
            user: self.user,
            password: self.password,
            ssl_mode: self.ssl_mode,
            connect_timeout: self.connect_timeout,
            handshake_timeout: self.handshake_timeout,
        }
    }
}

/// Facts about the server learned during the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Version string from the greeting
    pub version: String,
    /// Server thread id
    pub connection_id: u32,
    /// Negotiated capability flags
    pub capabilities: u32,
}

/// Authenticated, TLS-encrypted MySQL session
pub struct Connection {
    transport: Option<Transport>,
    state: ConnectionState,
    read_buf: BytesMut,
    sequence: u8,
    server: Option<ServerInfo>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("server", &self.server)
            .field("transport", &self.transport)
            .finish()
    }
}

impl Connection {
    /// Create connection from transport
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Some(transport),
            state: ConnectionState::Initial,
            read_buf: BytesMut::with_capacity(8192),
            sequence: 0,
            server: None,
        }
    }

    /// Open a TCP connection and run the full handshake.
    ///
    /// A single attempt: TCP connect bounded by `connect_timeout`, then TLS
    /// upgrade and authentication bounded by `handshake_timeout`.
    pub async fn establish(config: &ConnectionConfig, tls_config: &TlsConfig) -> Result<Self> {
        let result = async {
            let transport =
                Transport::connect_tcp(&config.host, config.port, config.connect_timeout).await?;
            let mut conn = Connection::new(transport);

            match tokio::time::timeout(
                config.handshake_timeout,
                conn.startup(config, tls_config, &config.host),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(Error::Connection(format!(
                        "handshake with {}:{} timed out after {:?}",
                        config.host, config.port, config.handshake_timeout
                    )))
                }
            }
            Ok(conn)
        }
        .await;

        match &result {
            Ok(_) => crate::metrics::counters::connection_established(),
            Err(e) => {
                tracing::error!(error = %e, category = e.category(), "connection failed");
                crate::metrics::counters::connection_failed(e.category());
            }
        }
        result
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Server facts, once the greeting has been read
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    /// Server version string
    pub fn server_version(&self) -> Option<&str> {
        self.server.as_ref().map(|s| s.version.as_str())
    }

    /// Server thread id
    pub fn connection_id(&self) -> Option<u32> {
        self.server.as_ref().map(|s| s.connection_id)
    }

    /// Whether the transport is TLS-encrypted
    pub fn is_encrypted(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_tls)
    }

    /// SHA-256 fingerprint of the server's leaf certificate
    pub fn peer_fingerprint(&self) -> Option<String> {
        self.transport.as_ref().and_then(Transport::peer_fingerprint)
    }

    /// Perform TLS negotiation and authentication
    pub async fn startup(
        &mut self,
        config: &ConnectionConfig,
        tls_config: &TlsConfig,
        hostname: &str,
    ) -> Result<()> {
        async {
            let started = Instant::now();

            let handshake = self.read_greeting().await?;
            let caps = negotiate_capabilities(&handshake, config)?;

            self.server = Some(ServerInfo {
                version: handshake.server_version.clone(),
                connection_id: handshake.connection_id,
                capabilities: caps,
            });
            tracing::debug!(
                server_version = %handshake.server_version,
                connection_id = handshake.connection_id,
                "received server greeting"
            );

            self.negotiate_tls(tls_config, hostname, caps).await?;

            self.state.transition(ConnectionState::Authenticating)?;
            let mechanism = self.authenticate(config, &handshake, caps).await?;

            self.state.transition(ConnectionState::Ready)?;
            crate::metrics::histograms::handshake_duration(
                mechanism,
                started.elapsed().as_millis() as u64,
            );
            tracing::info!(
                fingerprint = %self.peer_fingerprint().unwrap_or_default(),
                "startup complete"
            );
            Ok(())
        }
        .instrument(tracing::info_span!(
            "startup",
            host = %hostname,
            user = %config.user,
            database = %config.database
        ))
        .await
    }

    /// Read the initial handshake, or the ERR the server sends instead.
    async fn read_greeting(&mut self) -> Result<InitialHandshake> {
        let packet = match self.receive_packet().await {
            Ok(packet) => packet,
            Err(Error::ConnectionClosed) => {
                return Err(Error::Connection(
                    "server closed the connection before sending a greeting".into(),
                ))
            }
            Err(e) => return Err(e),
        };

        match decode_greeting(&packet.payload).map_err(protocol_error)? {
            Ok(handshake) => Ok(handshake),
            Err(err) if error_codes::is_host_rejection(err.code) => Err(Error::Connection(
                format!("server refused the connection: {}", err),
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Send SSLRequest and upgrade the transport.
    async fn negotiate_tls(&mut self, tls_config: &TlsConfig, hostname: &str, caps: u32) -> Result<()> {
        self.state.transition(ConnectionState::NegotiatingTls)?;

        self.send_message(&FrontendMessage::SslRequest {
            capabilities: caps,
            charset: UTF8MB4_GENERAL_CI,
        })
        .await?;

        // Bytes received before the upgrade would be unauthenticated plaintext
        if !self.read_buf.is_empty() {
            return Err(Error::Protocol(
                "unexpected data from server before TLS upgrade".into(),
            ));
        }

        let transport = self.transport.take().ok_or(Error::ConnectionClosed)?;
        self.transport = Some(transport.upgrade_to_tls(tls_config, hostname).await?);
        tracing::debug!(ssl_mode = %tls_config.ssl_mode(), "TLS connection established");
        Ok(())
    }

    /// Run the plugin exchange until the server sends OK or ERR.
    ///
    /// Returns the plugin that completed authentication.
    async fn authenticate(
        &mut self,
        config: &ConnectionConfig,
        handshake: &InitialHandshake,
        caps: u32,
    ) -> Result<&'static str> {
        let password = config.password.as_deref().unwrap_or_default();

        let mut plugin = match handshake.auth_plugin.as_deref() {
            Some(name) => AuthPlugin::from_name(name).unwrap_or_else(|_| {
                tracing::debug!(plugin = name, "unknown default plugin, offering mysql_native_password");
                AuthPlugin::NativePassword
            }),
            None => AuthPlugin::NativePassword,
        };
        crate::metrics::counters::auth_attempted(plugin.name());

        let response = HandshakeResponse {
            capabilities: caps,
            charset: UTF8MB4_GENERAL_CI,
            user: config.user.clone(),
            auth_response: plugin.respond(password, &handshake.scramble),
            database: Some(config.database.clone()).filter(|db| !db.is_empty()),
            auth_plugin: plugin.name().to_string(),
        };
        self.send_message(&FrontendMessage::HandshakeResponse(response))
            .await?;

        for _ in 0..MAX_AUTH_ROUNDS {
            let packet = self.receive_packet().await?;
            let msg = decode_response(&packet.payload).map_err(protocol_error)?;

            match msg {
                BackendMessage::Ok(_) => {
                    tracing::debug!(plugin = %plugin, "authentication successful");
                    crate::metrics::counters::auth_successful(plugin.name());
                    return Ok(plugin.name());
                }
                BackendMessage::Err(err) => {
                    if error_codes::is_auth_failure(err.code) {
                        crate::metrics::counters::auth_failed(plugin.name(), "rejected");
                        return Err(Error::Authentication(err.to_string()));
                    }
                    crate::metrics::counters::auth_failed(plugin.name(), "server_error");
                    return Err(err.into());
                }
                BackendMessage::AuthSwitch { plugin: name, data } => {
                    plugin = AuthPlugin::from_name(&name)?;
                    tracing::debug!(plugin = %plugin, "server requested authentication switch");
                    crate::metrics::counters::auth_attempted(plugin.name());
                    let reply = plugin.respond(password, &data);
                    self.send_message(&FrontendMessage::AuthResponse(reply))
                        .await?;
                }
                BackendMessage::AuthMoreData(data) => {
                    self.handle_more_data(plugin, &data, password).await?;
                }
            }
        }

        Err(Error::Protocol(format!(
            "authentication did not complete after {} exchanges",
            MAX_AUTH_ROUNDS
        )))
    }

    /// caching_sha2_password follow-up: fast-auth ack or a full-auth request
    async fn handle_more_data(&mut self, plugin: AuthPlugin, data: &[u8], password: &str) -> Result<()> {
        if plugin != AuthPlugin::CachingSha2Password {
            return Err(Error::Protocol(format!(
                "unexpected AuthMoreData for plugin {}",
                plugin
            )));
        }

        match data.first() {
            Some(&caching_sha2::FAST_AUTH_SUCCESS) => {
                tracing::debug!("caching_sha2_password fast authentication accepted");
                Ok(())
            }
            Some(&caching_sha2::PERFORM_FULL_AUTH) => {
                if !self.is_encrypted() {
                    return Err(Error::Protocol(
                        "refusing to send password over an unencrypted connection".into(),
                    ));
                }
                tracing::debug!("caching_sha2_password full authentication over TLS");
                self.send_message(&FrontendMessage::AuthResponse(clear_password(password)))
                    .await
            }
            other => Err(Error::Protocol(format!(
                "unexpected caching_sha2_password status {:?}",
                other
            ))),
        }
    }

    /// Check the session is alive (COM_PING)
    pub async fn ping(&mut self) -> Result<()> {
        if self.state != ConnectionState::Ready {
            return Err(Error::InvalidState {
                expected: ConnectionState::Ready.to_string(),
                actual: self.state.to_string(),
            });
        }

        self.state.transition(ConnectionState::CommandInProgress)?;
        self.sequence = 0;
        self.send_message(&FrontendMessage::Ping).await?;

        let packet = self.receive_packet().await?;
        let result = match decode_response(&packet.payload).map_err(protocol_error)? {
            BackendMessage::Ok(_) => Ok(()),
            BackendMessage::Err(err) => Err(err.into()),
            other => Err(Error::Protocol(format!(
                "unexpected response to COM_PING: {:?}",
                other
            ))),
        };

        self.state.transition(ConnectionState::Ready)?;
        result
    }

    /// Close the connection (COM_QUIT, then TLS close_notify)
    pub async fn close(mut self) -> Result<()> {
        let was_ready = self.state == ConnectionState::Ready;
        self.state.transition(ConnectionState::Closed)?;
        if was_ready {
            self.sequence = 0;
            let _ = self.send_message(&FrontendMessage::Quit).await;
        }
        if let Some(transport) = self.transport.as_mut() {
            // The server may already have dropped the socket after COM_QUIT
            if let Err(e) = transport.shutdown().await {
                tracing::debug!(error = %e, "transport shutdown failed");
            }
        }
        tracing::debug!("connection closed");
        Ok(())
    }

    /// Send a frontend message with the current sequence id
    async fn send_message(&mut self, msg: &FrontendMessage) -> Result<()> {
        let buf = encode_message(msg, self.sequence)?;
        self.sequence = self.sequence.wrapping_add(1);

        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        transport.write_all(&buf).await?;
        transport.flush().await?;
        Ok(())
    }

    /// Receive one logical packet, checking its sequence id
    async fn receive_packet(&mut self) -> Result<Packet> {
        loop {
            match decode_packet(&self.read_buf) {
                Ok((packet, consumed)) => {
                    self.read_buf.advance(consumed);
                    if packet.sequence != self.sequence {
                        return Err(Error::Protocol(format!(
                            "packet out of order: expected sequence {}, got {}",
                            self.sequence, packet.sequence
                        )));
                    }
                    self.sequence = packet.sequence.wrapping_add(1);
                    return Ok(packet);
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                Err(e) => return Err(protocol_error(e)),
            }

            // Need more data
            let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
            let n = transport.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

fn protocol_error(e: io::Error) -> Error {
    Error::Protocol(e.to_string())
}

/// Intersect our capabilities with the server's, insisting on TLS.
fn negotiate_capabilities(handshake: &InitialHandshake, config: &ConnectionConfig) -> Result<u32> {
    let server = handshake.capabilities;

    if server & capabilities::CLIENT_SSL == 0 {
        return Err(Error::TlsNotSupported);
    }
    if server & capabilities::CLIENT_REQUIRED != capabilities::CLIENT_REQUIRED {
        return Err(Error::Protocol(format!(
            "server capabilities {:#010x} lack protocol 4.1 pluggable authentication",
            server
        )));
    }

    let mut caps = capabilities::CLIENT_DEFAULT & server;
    if config.database.is_empty() {
        caps &= !capabilities::CLIENT_CONNECT_WITH_DB;
    } else if server & capabilities::CLIENT_CONNECT_WITH_DB == 0 {
        return Err(Error::Protocol(format!(
            "server cannot select database '{}' at login (no CLIENT_CONNECT_WITH_DB)",
            config.database
        )));
    }
    Ok(caps)
}
