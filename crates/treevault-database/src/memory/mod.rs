//! In-memory metadata backend.
//!
//! All tables live behind one `RwLock`; every trait call takes the lock
//! once, which makes each call atomic with respect to the others.

mod state;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, StoreId};
use treevault_entity::node::{ClosureJoinedRow, Node};
use treevault_entity::resource::{
    AccessBits, AccessGroups, DirectoryResource, FileMetaResource, NewFileMeta, PathResource,
    Resource, ResourceType,
};
use treevault_entity::store::{NewStore, Store};

use self::state::{MemoryState, StoreRecord};
use crate::metadata::{BinaryStore, NodeStore, ResourceStore, StoreCatalog};

/// Metadata store held entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_path(
    node: &Node,
    parent: &PathResource,
    resource_type: ResourceType,
    name: &str,
    description: Option<String>,
    groups: AccessGroups,
) -> PathResource {
    PathResource {
        node_id: node.id,
        parent_node_id: Some(parent.node_id),
        store_id: parent.store_id,
        resource_type,
        path_name: name.to_string(),
        relative_path: parent.child_path(name),
        description,
        groups,
        access: AccessBits::default(),
        created_at: node.created_at,
        updated_at: node.updated_at,
    }
}

#[async_trait]
impl NodeStore for MemoryMetadataStore {
    async fn add_node(&self, parent_id: Option<NodeId>, name: &str) -> AppResult<Node> {
        self.state.write().await.insert_node(parent_id, name)
    }

    async fn get_node(&self, node_id: NodeId) -> AppResult<Option<Node>> {
        Ok(self.state.read().await.node(node_id).cloned())
    }

    async fn rename_node(&self, node_id: NodeId, name: &str) -> AppResult<()> {
        self.state.write().await.rename_node(node_id, name)
    }

    async fn get_descendants(
        &self,
        node_id: NodeId,
        max_depth: Option<i32>,
    ) -> AppResult<Vec<ClosureJoinedRow>> {
        Ok(self.state.read().await.descendants(node_id, max_depth))
    }

    async fn get_ancestors(
        &self,
        node_id: NodeId,
        max_levels: Option<i32>,
    ) -> AppResult<Vec<ClosureJoinedRow>> {
        Ok(self.state.read().await.ancestors(node_id, max_levels))
    }

    async fn is_descendant(&self, ancestor_id: NodeId, node_id: NodeId) -> AppResult<bool> {
        Ok(self.state.read().await.is_descendant(ancestor_id, node_id))
    }

    async fn prune(&self, node_id: NodeId, include_self: bool) -> AppResult<Vec<NodeId>> {
        let removed = self.state.write().await.prune(node_id, include_self)?;
        debug!(node_id = %node_id, removed = removed.len(), include_self, "Pruned subtree");
        Ok(removed)
    }

    async fn relocate(&self, node_id: NodeId, new_parent_id: NodeId) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.check_relocation(node_id, new_parent_id)?;
        state.relocate(node_id, new_parent_id);
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MemoryMetadataStore {
    async fn insert_directory(
        &self,
        parent: &PathResource,
        name: &str,
        description: Option<&str>,
        groups: &AccessGroups,
    ) -> AppResult<DirectoryResource> {
        let mut state = self.state.write().await;
        state.ensure_unique_sibling(parent.node_id, name, ResourceType::Directory, None)?;

        let node = state.insert_node(Some(parent.node_id), name)?;
        let dir = DirectoryResource {
            resource: new_path(
                &node,
                parent,
                ResourceType::Directory,
                name,
                description.map(str::to_string),
                groups.clone(),
            ),
        };
        state.resources.insert(node.id, dir.clone().into());
        Ok(dir)
    }

    async fn insert_file(
        &self,
        parent: &PathResource,
        file: &NewFileMeta,
    ) -> AppResult<FileMetaResource> {
        let mut state = self.state.write().await;
        state.ensure_unique_sibling(parent.node_id, &file.name, ResourceType::File, None)?;

        let node = state.insert_node(Some(parent.node_id), &file.name)?;
        let meta = FileMetaResource {
            resource: new_path(
                &node,
                parent,
                ResourceType::File,
                &file.name,
                file.description.clone(),
                file.groups.clone(),
            ),
            file_size_bytes: file.file_size_bytes,
            mime_type: file.mime_type.clone(),
            is_binary_mirrored: false,
        };
        state.resources.insert(node.id, meta.clone().into());
        Ok(meta)
    }

    async fn find_resource(&self, node_id: NodeId) -> AppResult<Option<Resource>> {
        Ok(self.state.read().await.resources.get(&node_id).cloned())
    }

    async fn find_child(
        &self,
        dir_id: NodeId,
        name: &str,
        resource_type: ResourceType,
        exclude: Option<NodeId>,
    ) -> AppResult<Option<Resource>> {
        Ok(self
            .state
            .read()
            .await
            .find_child(dir_id, name, resource_type, exclude)
            .cloned())
    }

    async fn list_children(&self, dir_id: NodeId) -> AppResult<Vec<Resource>> {
        let state = self.state.read().await;
        let mut children: Vec<Resource> = state
            .resources
            .values()
            .filter(|r| r.path().parent_node_id == Some(dir_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| {
            b.is_directory()
                .cmp(&a.is_directory())
                .then_with(|| a.path().path_name.cmp(&b.path().path_name))
        });
        Ok(children)
    }

    async fn find_subtree(
        &self,
        node_id: NodeId,
        max_depth: Option<i32>,
    ) -> AppResult<Vec<Resource>> {
        let state = self.state.read().await;
        Ok(state
            .descendants(node_id, max_depth)
            .iter()
            .filter_map(|row| state.resources.get(&row.node_id).cloned())
            .collect())
    }

    async fn find_ancestor_chain(&self, node_id: NodeId) -> AppResult<Vec<Resource>> {
        let state = self.state.read().await;
        Ok(state
            .ancestors(node_id, None)
            .iter()
            .filter_map(|row| state.resources.get(&row.node_id).cloned())
            .collect())
    }

    async fn update_resources(&self, resources: &[PathResource]) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.check_updates(resources)?;
        state.apply_updates(resources);
        Ok(())
    }

    async fn relocate_resource(
        &self,
        node_id: NodeId,
        new_parent_id: NodeId,
        updated: &[PathResource],
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.check_relocation(node_id, new_parent_id)?;
        state.check_updates(updated)?;
        state.relocate(node_id, new_parent_id);
        state.apply_updates(updated);
        Ok(())
    }

    async fn replace_file_meta(
        &self,
        node_id: NodeId,
        file_size_bytes: i64,
        mime_type: Option<&str>,
    ) -> AppResult<FileMetaResource> {
        let mut state = self.state.write().await;
        let Some(Resource::File(file)) = state.resources.get_mut(&node_id) else {
            return Err(AppError::not_found(format!("File {node_id} not found")));
        };
        file.file_size_bytes = file_size_bytes;
        file.mime_type = mime_type.map(str::to_string);
        file.is_binary_mirrored = false;
        file.resource.updated_at = Utc::now();
        let updated = file.clone();
        state.binaries.remove(&node_id);
        Ok(updated)
    }
}

#[async_trait]
impl BinaryStore for MemoryMetadataStore {
    async fn put_binary(&self, node_id: NodeId, data: &[u8]) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(Resource::File(file)) = state.resources.get_mut(&node_id) else {
            return Err(AppError::not_found(format!("File {node_id} not found")));
        };
        file.is_binary_mirrored = true;
        state.binaries.insert(node_id, data.to_vec());
        Ok(())
    }

    async fn get_binary(&self, node_id: NodeId) -> AppResult<Option<Vec<u8>>> {
        Ok(self.state.read().await.binaries.get(&node_id).cloned())
    }

    async fn delete_binary(&self, node_id: NodeId) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.binaries.remove(&node_id);
        if let Some(Resource::File(file)) = state.resources.get_mut(&node_id) {
            file.is_binary_mirrored = false;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreCatalog for MemoryMetadataStore {
    async fn create_store(&self, new: &NewStore) -> AppResult<Store> {
        if !new.root_groups.is_complete() {
            return Err(AppError::validation(
                "A store root directory must declare read, write, and execute groups",
            ));
        }

        let mut state = self.state.write().await;
        if state.stores.values().any(|s| s.name == new.name) {
            return Err(AppError::conflict("A store with this name already exists"));
        }

        let root = state.insert_node(None, &new.name)?;
        let id = state.next_store();
        let now = Utc::now();
        let root_dir = DirectoryResource {
            resource: PathResource {
                node_id: root.id,
                parent_node_id: None,
                store_id: id,
                resource_type: ResourceType::Directory,
                path_name: new.name.clone(),
                relative_path: String::new(),
                description: new.description.clone(),
                groups: new.root_groups.clone(),
                access: AccessBits::default(),
                created_at: now,
                updated_at: now,
            },
        };
        state.resources.insert(root.id, root_dir.clone().into());

        let record = StoreRecord {
            id,
            name: new.name.clone(),
            description: new.description.clone(),
            path: new.path.clone(),
            root_dir_node_id: root.id,
            max_mirrored_file_size_bytes: new.max_mirrored_file_size_bytes,
            access_rule: new.access_rule,
            created_at: now,
            updated_at: now,
        };
        let store = state.store(&record)?;
        state.stores.insert(id, record);
        Ok(store)
    }

    async fn find_store(&self, store_id: StoreId) -> AppResult<Option<Store>> {
        let state = self.state.read().await;
        state.stores.get(&store_id).map(|r| state.store(r)).transpose()
    }

    async fn find_store_by_name(&self, name: &str) -> AppResult<Option<Store>> {
        let state = self.state.read().await;
        state
            .stores
            .values()
            .find(|r| r.name == name)
            .map(|r| state.store(r))
            .transpose()
    }

    async fn list_stores(&self) -> AppResult<Vec<Store>> {
        let state = self.state.read().await;
        state.stores.values().map(|r| state.store(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treevault_core::error::ErrorKind;
    use treevault_entity::store::AccessRule;

    async fn store_with_root(db: &MemoryMetadataStore) -> Store {
        db.create_store(&NewStore {
            name: "main".into(),
            description: None,
            path: "/tmp/main".into(),
            max_mirrored_file_size_bytes: 1024,
            access_rule: AccessRule::Deny,
            root_groups: AccessGroups::all("G1"),
        })
        .await
        .expect("create store")
    }

    async fn mkdir(db: &MemoryMetadataStore, parent: &PathResource, name: &str) -> DirectoryResource {
        db.insert_directory(parent, name, None, &AccessGroups::inherit())
            .await
            .expect("insert directory")
    }

    #[tokio::test]
    async fn test_closure_rows_per_depth() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        let a = mkdir(&db, &store.root_dir, "a").await;
        let b = mkdir(&db, &a, "b").await;
        let c = mkdir(&db, &b, "c").await;

        let ancestors = db.get_ancestors(c.node_id, None).await.expect("ancestors");
        let depths: Vec<i32> = ancestors.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![3, 2, 1, 0]);
        assert_eq!(ancestors[0].node_id, store.root_dir_node_id);

        let limited = db.get_ancestors(c.node_id, Some(1)).await.expect("ancestors");
        assert_eq!(limited.len(), 2);
        assert_eq!(c.relative_path, "/a/b/c");
    }

    #[tokio::test]
    async fn test_depth_one_rows_are_siblings() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        let x = mkdir(&db, &store.root_dir, "x").await;
        mkdir(&db, &store.root_dir, "w").await;
        mkdir(&db, &store.root_dir, "y").await;
        mkdir(&db, &x, "deep").await;

        let rows = db
            .get_descendants(store.root_dir_node_id, Some(1))
            .await
            .expect("descendants");
        let names: Vec<&str> = rows
            .iter()
            .filter(|r| r.depth == 1)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["w", "x", "y"]);
    }

    #[tokio::test]
    async fn test_is_descendant_includes_self() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        let a = mkdir(&db, &store.root_dir, "a").await;
        assert!(db.is_descendant(a.node_id, a.node_id).await.expect("check"));
        assert!(db.is_descendant(store.root_dir_node_id, a.node_id).await.expect("check"));
        assert!(!db.is_descendant(a.node_id, store.root_dir_node_id).await.expect("check"));
    }

    #[tokio::test]
    async fn test_sibling_names_ignore_case() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        mkdir(&db, &store.root_dir, "Reports").await;

        let err = db
            .insert_directory(&store.root_dir, "reports", None, &AccessGroups::inherit())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        // A file may share a directory's name.
        let file = db
            .insert_file(
                &store.root_dir,
                &NewFileMeta {
                    name: "reports".into(),
                    file_size_bytes: 3,
                    mime_type: None,
                    description: None,
                    groups: AccessGroups::inherit(),
                },
            )
            .await;
        assert!(file.is_ok());
    }

    #[tokio::test]
    async fn test_prune_leaves_disjoint_subtree() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        let a = mkdir(&db, &store.root_dir, "a").await;
        mkdir(&db, &a, "a1").await;
        let b = mkdir(&db, &store.root_dir, "b").await;
        let b1 = mkdir(&db, &b, "b1").await;

        let before = db.get_descendants(b.node_id, None).await.expect("rows");
        let before_ancestors = db.get_ancestors(b1.node_id, None).await.expect("rows");

        let removed = db.prune(a.node_id, true).await.expect("prune");
        assert_eq!(removed.len(), 2);
        assert!(db.find_resource(a.node_id).await.expect("find").is_none());

        assert_eq!(db.get_descendants(b.node_id, None).await.expect("rows"), before);
        assert_eq!(
            db.get_ancestors(b1.node_id, None).await.expect("rows"),
            before_ancestors
        );
    }

    #[tokio::test]
    async fn test_prune_without_self_keeps_node() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        let a = mkdir(&db, &store.root_dir, "a").await;
        mkdir(&db, &a, "a1").await;

        db.prune(a.node_id, false).await.expect("prune");
        let rows = db.get_descendants(a.node_id, None).await.expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].depth, 0);
    }

    #[tokio::test]
    async fn test_relocate_rewires_closure() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        let a = mkdir(&db, &store.root_dir, "a").await;
        let a1 = mkdir(&db, &a, "a1").await;
        let b = mkdir(&db, &store.root_dir, "b").await;

        db.relocate(a.node_id, b.node_id).await.expect("relocate");

        assert!(db.is_descendant(b.node_id, a1.node_id).await.expect("check"));
        let depths: Vec<i32> = db
            .get_ancestors(a1.node_id, None)
            .await
            .expect("rows")
            .iter()
            .map(|r| r.depth)
            .collect();
        assert_eq!(depths, vec![3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_relocate_under_own_subtree_is_structural() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        let a = mkdir(&db, &store.root_dir, "a").await;
        let a1 = mkdir(&db, &a, "a1").await;
        let before = db.get_descendants(store.root_dir_node_id, None).await.expect("rows");

        for target in [a.node_id, a1.node_id] {
            let err = db.relocate(a.node_id, target).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Structural);
        }
        assert_eq!(
            db.get_descendants(store.root_dir_node_id, None).await.expect("rows"),
            before
        );
    }

    #[tokio::test]
    async fn test_binary_mirror_flag() {
        let db = MemoryMetadataStore::new();
        let store = store_with_root(&db).await;
        let file = db
            .insert_file(
                &store.root_dir,
                &NewFileMeta {
                    name: "a.bin".into(),
                    file_size_bytes: 2,
                    mime_type: None,
                    description: None,
                    groups: AccessGroups::inherit(),
                },
            )
            .await
            .expect("insert");

        db.put_binary(file.node_id, b"hi").await.expect("put");
        let stored = db.find_resource(file.node_id).await.expect("find").expect("exists");
        assert!(stored.as_file().expect("file").is_binary_mirrored);

        let replaced = db
            .replace_file_meta(file.node_id, 10, Some("text/plain"))
            .await
            .expect("replace");
        assert!(!replaced.is_binary_mirrored);
        assert!(db.get_binary(file.node_id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_store_requires_complete_root_groups() {
        let db = MemoryMetadataStore::new();
        let err = db
            .create_store(&NewStore {
                name: "bad".into(),
                description: None,
                path: "/tmp/bad".into(),
                max_mirrored_file_size_bytes: 0,
                access_rule: AccessRule::Allow,
                root_groups: AccessGroups {
                    read: Some("G1".into()),
                    write: None,
                    execute: None,
                },
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(db.list_stores().await.expect("list").is_empty());
    }
}
