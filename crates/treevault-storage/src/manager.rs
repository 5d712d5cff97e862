//! Routes byte operations to the provider of each store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::traits::storage::StorageProvider;
use treevault_core::types::StoreId;

use crate::providers::LocalStorageProvider;

/// Registered storage providers keyed by store.
#[derive(Debug, Clone, Default)]
pub struct StorageManager {
    providers: Arc<RwLock<HashMap<StoreId, Arc<dyn StorageProvider>>>>,
}

impl StorageManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a store, replacing any previous one.
    pub async fn register(&self, store_id: StoreId, provider: Arc<dyn StorageProvider>) {
        debug!(store_id = %store_id, root = %provider.root().display(), "Registered storage provider");
        self.providers.write().await.insert(store_id, provider);
    }

    /// Register a local provider rooted at `path` unless one already exists.
    pub async fn ensure_local(&self, store_id: StoreId, path: &str) -> AppResult<Arc<dyn StorageProvider>> {
        if let Some(existing) = self.providers.read().await.get(&store_id) {
            return Ok(Arc::clone(existing));
        }
        let provider: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(path).await?);
        self.register(store_id, Arc::clone(&provider)).await;
        Ok(provider)
    }

    /// Remove a store's provider.
    pub async fn unregister(&self, store_id: StoreId) {
        self.providers.write().await.remove(&store_id);
    }

    /// The provider of a store.
    pub async fn get(&self, store_id: StoreId) -> AppResult<Arc<dyn StorageProvider>> {
        self.providers
            .read()
            .await
            .get(&store_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("No storage registered for store {store_id}")))
    }

    /// Ids of every registered store.
    pub async fn list_ids(&self) -> Vec<StoreId> {
        let mut ids: Vec<StoreId> = self.providers.read().await.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treevault_core::error::ErrorKind;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StorageManager::new();

        let first = manager
            .ensure_local(StoreId(1), dir.path().join("one").to_str().unwrap())
            .await
            .unwrap();
        let again = manager.ensure_local(StoreId(1), "/ignored").await.unwrap();
        assert_eq!(first.root(), again.root());
        assert_eq!(manager.list_ids().await, vec![StoreId(1)]);

        manager.unregister(StoreId(1)).await;
        let err = manager.get(StoreId(1)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
