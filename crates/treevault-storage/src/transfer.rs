//! Cross-store file transfer.

use tracing::info;

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::StoreId;

use crate::manager::StorageManager;

/// Streams files between the providers of two stores.
#[derive(Debug, Clone)]
pub struct CrossStoreTransfer {
    storage: StorageManager,
}

impl CrossStoreTransfer {
    /// Create a transfer helper over the given manager.
    pub fn new(storage: StorageManager) -> Self {
        Self { storage }
    }

    /// Copy `source_path` of one store to `target_path` of another,
    /// deleting the source afterwards when `delete_source` is set.
    pub async fn transfer(
        &self,
        source_store: StoreId,
        source_path: &str,
        target_store: StoreId,
        target_path: &str,
        delete_source: bool,
    ) -> AppResult<u64> {
        if source_store == target_store {
            return Err(AppError::validation(
                "Source and target store must differ for a transfer",
            ));
        }

        let source = self.storage.get(source_store).await?;
        let target = self.storage.get(target_store).await?;

        let stream = source.read(source_path).await?;
        let bytes_written = target.write_stream(target_path, stream).await?;

        if delete_source {
            source.delete(source_path).await?;
        }

        info!(
            source_store = %source_store,
            target_store = %target_store,
            source_path,
            target_path,
            bytes = bytes_written,
            "Completed cross-store transfer"
        );
        Ok(bytes_written)
    }
}
