//! CLI command implementations.

pub mod inventory;
pub mod migrate;
pub mod reservations;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use larder_db::RepositoryError;

/// Errors a command can fail with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Read the database URL, preferring the storefront-specific variable.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))
}

/// Connect to the database.
///
/// # Errors
///
/// Returns an error if no URL is configured or the connection fails.
pub async fn connect() -> Result<PgPool, CommandError> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(larder_db::create_pool(&url).await?)
}
