//! templog-db: trusted CA bundles and TLS-validated MySQL connections
//!
//! Two pieces, used in sequence at start-up:
//!
//! 1. **Bundle assembly**: concatenate the issuer-documented chain of
//!    authority certificates (DER or PEM) into one combined PEM file, in the
//!    declared order, written atomically and idempotently.
//! 2. **Connection establishment**: open a MySQL session that always
//!    negotiates TLS and validates the server certificate against that
//!    bundle, never the system trust store.
//!
//! ```no_run
//! # async fn example() -> templog_db::Result<()> {
//! use templog_db::bundle::TrustChain;
//! use templog_db::{AppConfig, MysqlClient};
//!
//! let bundle = TrustChain::azure_flexible_server("certs").assemble()?;
//! bundle.write_to("combined-ca-certificates.pem")?;
//!
//! let config = AppConfig::from_env()?;
//! let mut client = MysqlClient::connect(&config.database).await?;
//! client.ping().await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod bundle;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;

pub use client::MysqlClient;
pub use config::{AppConfig, DatabaseConfig};
pub use error::{Error, Result};
