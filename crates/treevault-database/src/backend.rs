//! Metadata backend selection.

use std::sync::Arc;

use tracing::info;

use treevault_core::config::database::DatabaseConfig;
use treevault_core::error::AppError;
use treevault_core::result::AppResult;

use crate::connection::DatabasePool;
use crate::memory::MemoryMetadataStore;
use crate::metadata::MetadataStore;
use crate::postgres::PgMetadataStore;

/// Wraps the metadata store chosen by configuration.
#[derive(Debug, Clone)]
pub struct MetadataBackend {
    inner: Arc<dyn MetadataStore>,
    /// Present only for the PostgreSQL backend.
    pool: Option<DatabasePool>,
}

impl MetadataBackend {
    /// Connect to the backend named by `config.backend`.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        match config.backend.as_str() {
            "postgres" => {
                info!("Initializing PostgreSQL metadata backend");
                let pool = DatabasePool::connect(config).await?;
                Ok(Self {
                    inner: Arc::new(PgMetadataStore::new(pool.clone())),
                    pool: Some(pool),
                })
            }
            "memory" => {
                info!("Initializing in-memory metadata backend");
                Ok(Self::from_store(Arc::new(MemoryMetadataStore::new())))
            }
            other => Err(AppError::configuration(format!(
                "Unknown metadata backend: '{other}'. Supported: postgres, memory"
            ))),
        }
    }

    /// Wrap an existing store (for testing).
    pub fn from_store(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner: store,
            pool: None,
        }
    }

    /// The wrapped store.
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        Arc::clone(&self.inner)
    }

    /// The connection pool, when backed by PostgreSQL.
    pub fn pool(&self) -> Option<&DatabasePool> {
        self.pool.as_ref()
    }

    /// Close the pool, if any.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
