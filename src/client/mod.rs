//! High-level client API

mod connection_string;
mod mysql_client;

pub use connection_string::ConnectionInfo;
pub use mysql_client::MysqlClient;
