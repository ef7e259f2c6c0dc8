//! templog-db: assemble the CA bundle and check the database connection.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use templog_db::bundle::{TrustBundle, TrustChain, TrustManifest, WriteOutcome, DEFAULT_BUNDLE_PATH};
use templog_db::{AppConfig, MysqlClient, Result};

#[derive(Parser)]
#[command(
    name = "templog-db",
    about = "Trusted CA bundle assembly and TLS-validated MySQL checks",
    version
)]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the combined CA bundle from the declared chain
    Assemble {
        /// trust-chain.json manifest declaring order and output
        #[arg(long, conflicts_with = "azure_dir", required_unless_present = "azure_dir")]
        manifest: Option<PathBuf>,

        /// Directory holding the Azure Flexible Server authority files
        #[arg(long)]
        azure_dir: Option<PathBuf>,

        /// Bundle location (overrides the manifest's output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the certificates in a bundle, in order
    Inspect {
        /// Bundle file
        bundle: PathBuf,
    },

    /// Connect with configuration from the environment, ping, and close
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("templog_db=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    let result = match cli.command {
        Command::Assemble {
            manifest,
            azure_dir,
            output,
        } => assemble(manifest, azure_dir, output),
        Command::Inspect { bundle } => inspect(bundle),
        Command::Check => check().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(category = e.category(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

fn assemble(
    manifest: Option<PathBuf>,
    azure_dir: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let (chain, declared_output) = match (manifest, azure_dir) {
        (Some(path), _) => {
            let manifest = TrustManifest::load(&path)?;
            (manifest.chain(), manifest.output)
        }
        (None, Some(dir)) => (
            TrustChain::azure_flexible_server(dir),
            PathBuf::from(DEFAULT_BUNDLE_PATH),
        ),
        (None, None) => {
            return Err(templog_db::Error::Config(
                "either --manifest or --azure-dir is required".into(),
            ))
        }
    };
    let output = output.unwrap_or(declared_output);

    let bundle = chain.assemble()?;
    match bundle.write_to(&output)? {
        WriteOutcome::Written => {
            tracing::info!(path = %output.display(), authorities = bundle.len(), "bundle written")
        }
        WriteOutcome::Unchanged => {
            tracing::info!(path = %output.display(), "bundle already up to date")
        }
    }
    Ok(())
}

fn inspect(path: PathBuf) -> Result<()> {
    let bundle = TrustBundle::read_from(&path)?;
    for (i, cert) in bundle.authorities().iter().enumerate() {
        println!("{:>2}  {}  {}", i + 1, cert.fingerprint(), cert.label());
    }
    Ok(())
}

async fn check() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "loaded configuration");

    let mut client = MysqlClient::connect(&config.database).await?;
    client.ping().await?;
    tracing::info!(
        server_version = client.server_version().unwrap_or_default(),
        connection_id = client.connection_id().unwrap_or_default(),
        "database reachable"
    );
    client.close().await
}
