//! Connection management
//!
//! This module handles:
//! * Transport abstraction (plain TCP upgraded to TLS)
//! * Connection lifecycle (greeting, TLS, authentication, ping, quit)
//! * State machine enforcement
//! * TLS configuration and certificate verification modes

mod conn;
mod state;
mod tls;
mod transport;

pub use conn::{
    Connection, ConnectionConfig, ConnectionConfigBuilder, ServerInfo, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PORT,
};
pub use state::ConnectionState;
pub use tls::{parse_server_name, SslMode, TlsConfig, TlsConfigBuilder};
pub use transport::Transport;
