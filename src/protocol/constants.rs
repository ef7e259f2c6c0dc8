//! MySQL client/server protocol constants

/// Initial handshake protocol version
pub const PROTOCOL_VERSION: u8 = 10;

/// Maximum payload carried by one physical packet
pub const MAX_PAYLOAD_LEN: usize = 0x00FF_FFFF;

/// Max packet size advertised to the server (16 MiB)
pub const MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

/// utf8mb4_general_ci
pub const UTF8MB4_GENERAL_CI: u8 = 45;

/// Capability flags
pub mod capabilities {
    /// New, more secure passwords
    pub const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;

    /// Found instead of affected rows
    pub const CLIENT_FOUND_ROWS: u32 = 0x0000_0002;

    /// Get all column flags
    pub const CLIENT_LONG_FLAG: u32 = 0x0000_0004;

    /// Database can be specified on connect
    pub const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;

    /// New 4.1 protocol
    pub const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;

    /// Switch to TLS after handshake
    pub const CLIENT_SSL: u32 = 0x0000_0800;

    /// Client knows about transactions
    pub const CLIENT_TRANSACTIONS: u32 = 0x0000_2000;

    /// 4.1 authentication
    pub const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;

    /// Multiple result sets
    pub const CLIENT_MULTI_RESULTS: u32 = 0x0002_0000;

    /// Pluggable authentication
    pub const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;

    /// Length-encoded auth response
    pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 0x0020_0000;

    /// OK packet instead of EOF
    pub const CLIENT_DEPRECATE_EOF: u32 = 0x0100_0000;

    /// Capabilities this client asks for (intersected with the server's)
    pub const CLIENT_DEFAULT: u32 = CLIENT_LONG_PASSWORD
        | CLIENT_FOUND_ROWS
        | CLIENT_LONG_FLAG
        | CLIENT_CONNECT_WITH_DB
        | CLIENT_PROTOCOL_41
        | CLIENT_SSL
        | CLIENT_TRANSACTIONS
        | CLIENT_SECURE_CONNECTION
        | CLIENT_MULTI_RESULTS
        | CLIENT_PLUGIN_AUTH
        | CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
        | CLIENT_DEPRECATE_EOF;

    /// Capabilities the server must offer
    pub const CLIENT_REQUIRED: u32 =
        CLIENT_PROTOCOL_41 | CLIENT_SECURE_CONNECTION | CLIENT_PLUGIN_AUTH;
}

/// First byte of a server response payload
pub mod headers {
    /// OK packet
    pub const OK: u8 = 0x00;

    /// AuthMoreData (caching_sha2_password, sha256_password)
    pub const AUTH_MORE_DATA: u8 = 0x01;

    /// AuthSwitchRequest during authentication
    pub const AUTH_SWITCH: u8 = 0xFE;

    /// ERR packet
    pub const ERR: u8 = 0xFF;
}

/// Command bytes
pub mod commands {
    /// COM_QUIT
    pub const QUIT: u8 = 0x01;

    /// COM_PING
    pub const PING: u8 = 0x0E;
}

/// caching_sha2_password AuthMoreData status bytes
pub mod caching_sha2 {
    /// Fast authentication succeeded, OK follows
    pub const FAST_AUTH_SUCCESS: u8 = 0x03;

    /// Server wants the full password (sent in clear over TLS)
    pub const PERFORM_FULL_AUTH: u8 = 0x04;
}

/// Server error codes that drive error classification
pub mod error_codes {
    /// Too many connections
    pub const ER_CON_COUNT_ERROR: u16 = 1040;

    /// Access denied for user to database
    pub const ER_DBACCESS_DENIED_ERROR: u16 = 1044;

    /// Access denied for user (using password: YES/NO)
    pub const ER_ACCESS_DENIED_ERROR: u16 = 1045;

    /// Host blocked because of many connection errors
    pub const ER_HOST_IS_BLOCKED: u16 = 1129;

    /// Host is not allowed to connect
    pub const ER_HOST_NOT_PRIVILEGED: u16 = 1130;

    /// Client does not support authentication protocol requested by server
    pub const ER_NOT_SUPPORTED_AUTH_MODE: u16 = 1251;

    /// Access denied, no password
    pub const ER_ACCESS_DENIED_NO_PASSWORD_ERROR: u16 = 1698;

    /// Password expired
    pub const ER_MUST_CHANGE_PASSWORD_LOGIN: u16 = 1862;

    /// Account locked
    pub const ER_ACCOUNT_HAS_BEEN_LOCKED: u16 = 3118;

    /// Whether the server refused the host before authentication
    pub fn is_host_rejection(code: u16) -> bool {
        matches!(
            code,
            ER_CON_COUNT_ERROR | ER_HOST_IS_BLOCKED | ER_HOST_NOT_PRIVILEGED
        )
    }

    /// Whether the code signals rejected credentials
    pub fn is_auth_failure(code: u16) -> bool {
        matches!(
            code,
            ER_DBACCESS_DENIED_ERROR
                | ER_ACCESS_DENIED_ERROR
                | ER_NOT_SUPPORTED_AUTH_MODE
                | ER_ACCESS_DENIED_NO_PASSWORD_ERROR
                | ER_MUST_CHANGE_PASSWORD_LOGIN
                | ER_ACCOUNT_HAS_BEEN_LOCKED
        )
    }
}
