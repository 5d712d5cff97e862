//! Mirrored binary blobs.

use async_trait::async_trait;

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::NodeId;

use super::{PgMetadataStore, db_error};
use crate::metadata::BinaryStore;

#[async_trait]
impl BinaryStore for PgMetadataStore {
    async fn put_binary(&self, node_id: NodeId, data: &[u8]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE file_meta_resource SET is_binary_mirrored = TRUE WHERE node_id = $1",
        )
        .bind(node_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to flag mirrored file"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("File {node_id} not found")));
        }

        sqlx::query(
            "INSERT INTO binary_resource (node_id, data) VALUES ($1, $2) \
             ON CONFLICT (node_id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(node_id)
        .bind(data)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to write mirrored binary"))?;

        tx.commit().await.map_err(db_error("Failed to commit mirrored binary"))?;
        Ok(())
    }

    async fn get_binary(&self, node_id: NodeId) -> AppResult<Option<Vec<u8>>> {
        sqlx::query_scalar::<_, Vec<u8>>("SELECT data FROM binary_resource WHERE node_id = $1")
            .bind(node_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_error("Failed to read mirrored binary"))
    }

    async fn delete_binary(&self, node_id: NodeId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM binary_resource WHERE node_id = $1")
            .bind(node_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete mirrored binary"))?;
        sqlx::query("UPDATE file_meta_resource SET is_binary_mirrored = FALSE WHERE node_id = $1")
            .bind(node_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to clear mirrored flag"))?;
        tx.commit().await.map_err(db_error("Failed to commit binary removal"))?;
        Ok(())
    }
}
