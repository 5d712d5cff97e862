//! Store creation and attachment.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use treevault_core::config::StorageConfig;
use treevault_core::error::{AppError, ErrorKind};
use treevault_core::result::AppResult;
use treevault_database::{MetadataStore, StoreCatalog};
use treevault_entity::resource::{AccessGroups, validate_name};
use treevault_entity::store::{AccessRule, NewStore, Store};
use treevault_storage::StorageManager;

/// Request to create a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStoreRequest {
    /// Unique store name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// On-disk root. Defaults to `<data_root>/<name>`.
    pub path: Option<String>,
    /// Mirroring threshold. Defaults to the configured one.
    pub max_mirrored_file_size_bytes: Option<i64>,
    /// Default for undeclared permission kinds.
    pub access_rule: AccessRule,
    /// Groups of the root directory.
    pub root_groups: AccessGroups,
}

/// Creates stores and attaches their disk providers.
#[derive(Debug, Clone)]
pub struct StoreService {
    metadata: Arc<dyn MetadataStore>,
    storage: StorageManager,
    config: StorageConfig,
}

impl StoreService {
    /// Create a store service.
    pub fn new(metadata: Arc<dyn MetadataStore>, storage: StorageManager, config: StorageConfig) -> Self {
        Self {
            metadata,
            storage,
            config,
        }
    }

    /// Create the store rows, its disk root, and the sibling index directory.
    pub async fn create(&self, req: CreateStoreRequest) -> AppResult<Store> {
        validate_name(&req.name)?;
        let path = match req.path {
            Some(path) => path,
            None => Path::new(&self.config.data_root)
                .join(&req.name)
                .to_string_lossy()
                .into_owned(),
        };

        let store = self
            .metadata
            .create_store(&NewStore {
                name: req.name,
                description: req.description,
                path,
                max_mirrored_file_size_bytes: req
                    .max_mirrored_file_size_bytes
                    .unwrap_or(self.config.default_max_mirrored_file_size_bytes),
                access_rule: req.access_rule,
                root_groups: req.root_groups,
            })
            .await?;

        self.storage.ensure_local(store.id, &store.path).await?;
        let index_dir = store.index_path(&self.config.index_dir_suffix);
        tokio::fs::create_dir_all(&index_dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create index directory: {}", index_dir.display()),
                e,
            )
        })?;

        info!(store_id = %store.id, name = %store.name, path = %store.path, "Store created");
        Ok(store)
    }

    /// All stores.
    pub async fn list(&self) -> AppResult<Vec<Store>> {
        self.metadata.list_stores().await
    }

    /// A store by name.
    pub async fn get_by_name(&self, name: &str) -> AppResult<Store> {
        self.metadata
            .find_store_by_name(name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Store '{name}' not found")))
    }

    /// Register a disk provider for every known store.
    pub async fn attach_all(&self) -> AppResult<usize> {
        let stores = self.list().await?;
        for store in &stores {
            self.storage.ensure_local(store.id, &store.path).await?;
        }
        info!(count = stores.len(), "Attached store providers");
        Ok(stores.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treevault_database::MemoryMetadataStore;

    #[tokio::test]
    async fn test_create_lays_out_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            data_root: dir.path().to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let storage = StorageManager::new();
        let service = StoreService::new(Arc::new(MemoryMetadataStore::new()), storage.clone(), config);

        let store = service
            .create(CreateStoreRequest {
                name: "projects".into(),
                description: None,
                path: None,
                max_mirrored_file_size_bytes: None,
                access_rule: AccessRule::Deny,
                root_groups: AccessGroups::all("G1"),
            })
            .await
            .unwrap();

        assert!(dir.path().join("projects").is_dir());
        assert!(dir.path().join("projects.index").is_dir());
        assert_eq!(store.max_mirrored_file_size_bytes, 5 * 1024 * 1024);
        assert!(storage.get(store.id).await.is_ok());
        assert_eq!(service.get_by_name("projects").await.unwrap().id, store.id);

        let dup = service
            .create(CreateStoreRequest {
                name: "projects".into(),
                description: None,
                path: None,
                max_mirrored_file_size_bytes: None,
                access_rule: AccessRule::Deny,
                root_groups: AccessGroups::all("G1"),
            })
            .await
            .unwrap_err();
        assert_eq!(dup.kind, ErrorKind::Conflict);
    }
}
