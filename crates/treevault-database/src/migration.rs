//! Schema setup for the PostgreSQL backend.
//!
//! The SQL under `migrations/` creates the node and closure tables, the
//! store catalog, and the resource tables keyed by node.

use sqlx::PgPool;
use tracing::info;

use treevault_core::error::{AppError, ErrorKind};
use treevault_core::result::AppResult;

/// Apply the closure-table schema migrations that `pool` has not seen yet.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    let migrator = sqlx::migrate!("../../migrations");
    info!(known = migrator.iter().count(), "Applying metadata schema migrations");

    migrator.run(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, "Failed to apply metadata schema", e)
    })?;

    info!("Metadata schema is up to date");
    Ok(())
}
