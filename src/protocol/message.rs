//! Protocol message types

use bytes::Bytes;
use std::fmt;

/// One logical packet: sequence id plus reassembled payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence id of the last physical packet
    pub sequence: u8,
    /// Payload bytes
    pub payload: Bytes,
}

/// Frontend message (client → server)
#[derive(Debug, Clone)]
pub enum FrontendMessage {
    /// SSLRequest: truncated handshake response asking for a TLS upgrade
    SslRequest {
        /// Negotiated capability flags
        capabilities: u32,
        /// Connection character set
        charset: u8,
    },

    /// HandshakeResponse41, sent after the TLS upgrade
    HandshakeResponse(HandshakeResponse),

    /// Raw auth data (after AuthSwitchRequest or AuthMoreData)
    AuthResponse(Vec<u8>),

    /// COM_PING
    Ping,

    /// COM_QUIT
    Quit,
}

/// HandshakeResponse41 fields
#[derive(Clone)]
pub struct HandshakeResponse {
    /// Negotiated capability flags
    pub capabilities: u32,
    /// Connection character set
    pub charset: u8,
    /// Login user
    pub user: String,
    /// Scrambled (or cleartext) credential bytes
    pub auth_response: Vec<u8>,
    /// Initial database
    pub database: Option<String>,
    /// Plugin that produced `auth_response`
    pub auth_plugin: String,
}

impl fmt::Debug for HandshakeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeResponse")
            .field("capabilities", &format_args!("{:#010x}", self.capabilities))
            .field("charset", &self.charset)
            .field("user", &self.user)
            .field("auth_response", &"<redacted>")
            .field("database", &self.database)
            .field("auth_plugin", &self.auth_plugin)
            .finish()
    }
}

/// Initial handshake packet (protocol 10) sent by the server on connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialHandshake {
    /// Always 10
    pub protocol_version: u8,
    /// Human readable server version
    pub server_version: String,
    /// Server thread id
    pub connection_id: u32,
    /// Auth plugin data (nonce), both parts joined
    pub scramble: Vec<u8>,
    /// Server capability flags
    pub capabilities: u32,
    /// Server default character set
    pub charset: u8,
    /// Server status flags
    pub status_flags: u16,
    /// Default authentication plugin
    pub auth_plugin: Option<String>,
}

/// Backend message during and after authentication (server → client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    /// OK packet
    Ok(OkPacket),

    /// ERR packet
    Err(ErrPacket),

    /// Server asks the client to re-authenticate with another plugin
    AuthSwitch {
        /// Plugin name
        plugin: String,
        /// New scramble
        data: Vec<u8>,
    },

    /// Extra plugin-specific auth data
    AuthMoreData(Vec<u8>),
}

/// OK packet fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    /// Affected rows
    pub affected_rows: u64,
    /// Last insert id
    pub last_insert_id: u64,
    /// Server status flags
    pub status_flags: u16,
    /// Warning count
    pub warnings: u16,
    /// Human readable info
    pub info: String,
}

/// ERR packet fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    /// Error code
    pub code: u16,
    /// SQLSTATE (five characters, `HY000` when absent)
    pub sql_state: String,
    /// Error message
    pub message: String,
}

impl fmt::Display for ErrPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.sql_state, self.message)
    }
}

impl From<ErrPacket> for crate::Error {
    fn from(err: ErrPacket) -> Self {
        crate::Error::Server {
            code: err.code,
            sql_state: err.sql_state,
            message: err.message,
        }
    }
}
