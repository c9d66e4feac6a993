//! Database migration command.
//!
//! Applies the migrations embedded in `larder-db` (`crates/db/migrations/`).
//! Already-applied migrations are skipped, so this is safe to re-run.

use sqlx::PgPool;

use super::CommandError;

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `CommandError::Migration` if a migration fails or the applied
/// history no longer matches the embedded files.
pub async fn run(pool: &PgPool) -> Result<(), CommandError> {
    tracing::info!(
        available = larder_db::MIGRATOR.iter().count(),
        "Running migrations..."
    );
    larder_db::migrate(pool).await?;
    tracing::info!("Migrations complete");
    Ok(())
}
