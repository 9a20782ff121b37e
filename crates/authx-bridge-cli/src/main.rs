//! CLI entry point for the AuthX login bridge.
//!
//! This binary provides the `authx-bridge` command with subcommands for
//! serving the bridge and validating a deployment's configuration.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use authx_bridge_client::AuthxClient;
use authx_bridge_store::{Database, SessionStore, UserStore};
use authx_bridge_web::{AppState, BridgeConfig, WebServer};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// authx-bridge — OAuth2 login bridge for the AuthX identity provider.
#[derive(Parser)]
#[command(
    name = "authx-bridge",
    version,
    about = "OAuth2 login bridge for the AuthX identity provider",
    long_about = "Drives an OAuth2 authorization-code exchange against an AuthX server, \
                  reconciles the asserted identity into a local user record, and \
                  establishes a local session."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge HTTP server.
    Serve,

    /// Validate configuration and storage, then exit.
    Check,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing("info");

    match cli.command {
        Commands::Serve => cmd_serve().await,
        Commands::Check => cmd_check().await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve() -> Result<()> {
    let config = BridgeConfig::from_env().context("failed to load configuration")?;

    let db = open_database(&config).await?;
    validate_record_store(&db).await?;

    let state = AppState::new(
        AuthxClient::new(config.authx()).context("failed to build the OAuth client")?,
        UserStore::new(db.clone()),
        SessionStore::new(db),
        config.allowlist(),
        config.policy(),
    );

    let server = WebServer::new(config, state);
    info!(addr = %server.addr(), "starting authx-bridge");
    server.run().await.context("server exited with an error")
}

// ---------------------------------------------------------------------------
// Subcommand: check
// ---------------------------------------------------------------------------

async fn cmd_check() -> Result<()> {
    let config = BridgeConfig::from_env().context("failed to load configuration")?;

    let db = open_database(&config).await?;
    validate_record_store(&db).await?;

    let allowlist = config.allowlist();
    info!(
        authx_url = %config.authx_url,
        admin_emails = allowlist.emails().len(),
        prevent_non_admin_user_creation = config.prevent_non_admin_user_creation,
        "configuration OK"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn open_database(config: &BridgeConfig) -> Result<Database> {
    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("failed to create the data directory")?;
        }
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open database at {}", config.database_path))?;
    db.run_migrations()
        .await
        .context("failed to run database migrations")?;
    Ok(db)
}

/// The record store must be resolvable at startup — a broken users
/// schema is a fatal configuration error, not a per-request surprise.
async fn validate_record_store(db: &Database) -> Result<()> {
    let users = UserStore::new(db.clone());
    match users.supported_fields().await {
        Ok(caps) => {
            info!(columns = caps.len(), "user record store resolved");
            Ok(())
        }
        Err(err) => bail!("user record store unavailable: {err}"),
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
