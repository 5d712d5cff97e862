//! Collaborators notified after mutations commit.

use std::fmt::Debug;

use async_trait::async_trait;
use tracing::info;

use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, StoreId, UserId};
use treevault_entity::resource::FileMetaResource;

/// Receives file index updates. Calls for one store arrive in order on
/// that store's index queue.
#[async_trait]
pub trait SearchIndexSink: Send + Sync + Debug + 'static {
    /// A file was added.
    async fn add(&self, file: &FileMetaResource) -> AppResult<()>;

    /// A file's bytes, name, path, or details changed.
    async fn update(&self, file: &FileMetaResource) -> AppResult<()>;

    /// A file was removed.
    async fn delete(&self, file: &FileMetaResource) -> AppResult<()>;

    /// Forget every file of a store.
    async fn delete_all(&self, store_id: StoreId) -> AppResult<()>;
}

/// Tells interested parties that a directory listing changed.
#[async_trait]
pub trait ChangeNotifier: Send + Sync + Debug + 'static {
    /// `dir_id`'s children changed because of `user_id`.
    async fn directory_contents_changed(&self, dir_id: NodeId, user_id: UserId) -> AppResult<()>;
}

/// Index sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIndexSink;

#[async_trait]
impl SearchIndexSink for TracingIndexSink {
    async fn add(&self, file: &FileMetaResource) -> AppResult<()> {
        info!(node_id = %file.node_id, path = %file.relative_path, "Index add");
        Ok(())
    }

    async fn update(&self, file: &FileMetaResource) -> AppResult<()> {
        info!(node_id = %file.node_id, path = %file.relative_path, "Index update");
        Ok(())
    }

    async fn delete(&self, file: &FileMetaResource) -> AppResult<()> {
        info!(node_id = %file.node_id, path = %file.relative_path, "Index delete");
        Ok(())
    }

    async fn delete_all(&self, store_id: StoreId) -> AppResult<()> {
        info!(store_id = %store_id, "Index cleared");
        Ok(())
    }
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl ChangeNotifier for TracingNotifier {
    async fn directory_contents_changed(&self, dir_id: NodeId, user_id: UserId) -> AppResult<()> {
        info!(dir_id = %dir_id, user_id = %user_id, "Directory contents changed");
        Ok(())
    }
}
