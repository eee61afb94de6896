//! NoteVault maintenance binary.
//!
//! Operational entry point for the item store: applies database
//! migrations and checks connectivity of the configured database and
//! blob store. The API layer is deployed separately.

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use notevault_core::config::AppConfig;
use notevault_core::error::AppError;
use notevault_database::connection::DatabasePool;
use notevault_database::migration::run_migrations;
use notevault_storage::create_blob_store;

#[derive(Parser)]
#[command(name = "notevault", version, about = "NoteVault maintenance tasks")]
struct Cli {
    /// Configuration overlay to load (config/<env>.toml).
    #[arg(long, default_value = "development")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Check connectivity of the database and blob store.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(&cli.command, &config).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// Initialize tracing from the logging configuration.
///
/// `RUST_LOG` overrides the configured level when set.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

async fn run(command: &Command, config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("NoteVault v{}", env!("CARGO_PKG_VERSION"));

    match command {
        Command::Migrate => {
            let db = DatabasePool::connect(&config.database).await?;
            run_migrations(db.pool()).await?;
            db.close().await;
            Ok(())
        }
        Command::Check => {
            let db = DatabasePool::connect(&config.database).await?;
            let database_ok = db.health_check().await.unwrap_or(false);

            let blobs = create_blob_store(&config.storage).await?;
            let storage_ok = blobs.health_check().await.unwrap_or(false);

            db.close().await;

            tracing::info!(
                database = database_ok,
                storage = storage_ok,
                provider = blobs.provider_type(),
                "Health check complete"
            );

            if database_ok && storage_ok {
                Ok(())
            } else {
                Err(AppError::internal("One or more health checks failed"))
            }
        }
    }
}
