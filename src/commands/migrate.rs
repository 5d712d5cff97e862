//! Database migrations.

use tracing::info;

use treevault_core::config::AppConfig;
use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_database::DatabasePool;
use treevault_database::migration::run_migrations;

use crate::output;

/// Apply pending migrations to the configured PostgreSQL database.
pub async fn execute(config: &AppConfig) -> AppResult<()> {
    if config.database.backend != "postgres" {
        return Err(AppError::configuration(format!(
            "Migrations apply to the postgres backend, not '{}'",
            config.database.backend
        )));
    }

    let mut database = config.database.clone();
    database.run_migrations = false;
    let pool = DatabasePool::connect(&database).await?;
    run_migrations(pool.pool()).await?;
    pool.close().await;

    info!("Migrations applied");
    output::print_success("All migrations applied successfully.");
    Ok(())
}
