//! Resource repository: metadata rows and on-disk entries kept in step.
//!
//! Metadata is written first. When the matching disk step of an insert
//! fails, the new node is pruned again. When the disk step of a rename,
//! move, or removal fails, the metadata stays committed and the error is
//! returned with a warning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use treevault_core::error::{AppError, ErrorKind};
use treevault_core::result::AppResult;
use treevault_core::traits::StorageProvider;
use treevault_core::types::{NodeId, StoreId};
use treevault_database::{BinaryStore, MetadataStore, NodeStore, ResourceStore, StoreCatalog};
use treevault_entity::resource::{
    AccessGroups, DirectoryResource, FileMetaResource, NewFileMeta, PathResource, Resource,
    ResourceType, join_relative_path, validate_name,
};
use treevault_entity::store::Store;
use treevault_entity::tree::TreeBuilder;
use treevault_storage::{CrossStoreTransfer, StorageManager, mime_from_path};

/// Parent part of a non-root relative path.
fn parent_path(relative_path: &str) -> &str {
    relative_path
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or("")
}

/// Recompute the relative path of every resource under a rewritten root.
///
/// `rows` is the unresolved subtree (root included); `root` replaces the
/// root row. Returns the rows in top-down order.
fn rewrite_subtree(rows: Vec<Resource>, root: PathResource) -> AppResult<Vec<PathResource>> {
    let tree = TreeBuilder::build_top_down(rows, root.node_id)?;
    let mut rewritten: Vec<Option<PathResource>> = vec![None; tree.len()];
    let mut ordered = Vec::with_capacity(tree.len());

    for index in tree.pre_order() {
        let path = match tree.parent(index) {
            None => root.clone(),
            Some(parent) => {
                let parent = rewritten[parent]
                    .as_ref()
                    .ok_or_else(|| AppError::internal("Subtree rewrite visited a child first"))?;
                let mut path = tree.value(index).path().clone();
                path.relative_path = parent.child_path(&path.path_name);
                path.store_id = parent.store_id;
                path
            }
        };
        rewritten[index] = Some(path.clone());
        ordered.push(path);
    }
    Ok(ordered)
}

/// Maps node rows to typed resources and performs the disk side of every
/// mutation.
#[derive(Debug, Clone)]
pub struct ResourceRepository {
    metadata: Arc<dyn MetadataStore>,
    storage: StorageManager,
    transfer: CrossStoreTransfer,
}

impl ResourceRepository {
    /// Create a repository over a metadata store and the store providers.
    pub fn new(metadata: Arc<dyn MetadataStore>, storage: StorageManager) -> Self {
        Self {
            metadata,
            transfer: CrossStoreTransfer::new(storage.clone()),
            storage,
        }
    }

    /// The metadata store.
    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// The registered storage providers.
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    // ── Lookups ─────────────────────────────────────────────────────

    /// The store with the given id.
    pub async fn store_of(&self, store_id: StoreId) -> AppResult<Store> {
        self.metadata
            .find_store(store_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Store {store_id} not found")))
    }

    /// The disk provider of a store, attached on first use.
    pub async fn provider(&self, store_id: StoreId) -> AppResult<Arc<dyn StorageProvider>> {
        match self.storage.get(store_id).await {
            Ok(provider) => Ok(provider),
            Err(e) if e.is(ErrorKind::NotFound) => {
                let store = self.store_of(store_id).await?;
                self.storage.ensure_local(store.id, &store.path).await
            }
            Err(e) => Err(e),
        }
    }

    /// A resource by node id, without resolved bits.
    pub async fn resource(&self, node_id: NodeId) -> AppResult<Resource> {
        self.metadata
            .find_resource(node_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Resource {node_id} not found")))
    }

    /// First-level child with the given name and type, ignoring case.
    pub async fn find_child(
        &self,
        dir_id: NodeId,
        name: &str,
        resource_type: ResourceType,
    ) -> AppResult<Option<Resource>> {
        self.metadata.find_child(dir_id, name, resource_type, None).await
    }

    /// Whether `dir_id` has a same-type child named `name`, ignoring case
    /// and the resource `exclude`.
    pub async fn has_child(
        &self,
        dir_id: NodeId,
        name: &str,
        resource_type: ResourceType,
        exclude: Option<NodeId>,
    ) -> AppResult<bool> {
        Ok(self
            .metadata
            .find_child(dir_id, name, resource_type, exclude)
            .await?
            .is_some())
    }

    /// First-level children, directories first.
    pub async fn children(&self, dir_id: NodeId) -> AppResult<Vec<Resource>> {
        self.metadata.list_children(dir_id).await
    }

    /// Absolute disk path of a resource.
    pub fn disk_path(&self, store: &Store, resource: &PathResource) -> PathBuf {
        let relative = resource.relative_path.trim_start_matches('/');
        if relative.is_empty() {
            PathBuf::from(&store.path)
        } else {
            Path::new(&store.path).join(relative)
        }
    }

    async fn ensure_unique(
        &self,
        dir_id: NodeId,
        name: &str,
        resource_type: ResourceType,
        exclude: Option<NodeId>,
    ) -> AppResult<()> {
        if self.has_child(dir_id, name, resource_type, exclude).await? {
            return Err(AppError::conflict(format!(
                "A {resource_type} named '{name}' already exists in this directory"
            )));
        }
        Ok(())
    }

    // ── Inserts ─────────────────────────────────────────────────────

    /// Create a directory under `parent`, in metadata and on disk.
    pub async fn add_directory(
        &self,
        parent: &PathResource,
        name: &str,
        description: Option<&str>,
        groups: &AccessGroups,
    ) -> AppResult<DirectoryResource> {
        validate_name(name)?;
        self.ensure_unique(parent.node_id, name, ResourceType::Directory, None)
            .await?;

        let dir = self
            .metadata
            .insert_directory(parent, name, description, groups)
            .await?;

        let provider = self.provider(dir.store_id).await?;
        if let Err(e) = provider.create_dir(&dir.relative_path).await {
            warn!(node_id = %dir.node_id, path = %dir.relative_path, error = %e, "Directory creation failed on disk, pruning node");
            self.metadata.prune(dir.node_id, true).await?;
            return Err(e);
        }

        info!(store_id = %dir.store_id, node_id = %dir.node_id, path = %dir.relative_path, "Directory added");
        Ok(dir)
    }

    /// Record a new file under `parent` and copy `source` into the store.
    pub async fn add_file(
        &self,
        parent: &PathResource,
        source: &Path,
        name: &str,
        description: Option<&str>,
        groups: &AccessGroups,
    ) -> AppResult<FileMetaResource> {
        validate_name(name)?;
        self.ensure_unique(parent.node_id, name, ResourceType::File, None)
            .await?;

        let size = source_size(source).await?;
        let new = NewFileMeta {
            name: name.to_string(),
            file_size_bytes: size,
            mime_type: mime_from_path(name),
            description: description.map(str::to_string),
            groups: groups.clone(),
        };
        let file = self.metadata.insert_file(parent, &new).await?;

        let provider = self.provider(file.store_id).await?;
        if let Err(e) = provider.import(source, &file.relative_path).await {
            warn!(node_id = %file.node_id, path = %file.relative_path, error = %e, "File copy failed on disk, pruning node");
            self.metadata.prune(file.node_id, true).await?;
            return Err(e);
        }

        info!(store_id = %file.store_id, node_id = %file.node_id, path = %file.relative_path, bytes = size, "File added");
        Ok(file)
    }

    /// Overwrite an existing file's bytes from `source` and drop its mirror.
    pub async fn replace_file(&self, file: &FileMetaResource, source: &Path) -> AppResult<FileMetaResource> {
        let provider = self.provider(file.store_id).await?;
        let bytes = provider.import(source, &file.relative_path).await?;
        let size = i64::try_from(bytes)
            .map_err(|_| AppError::validation("File is too large"))?;

        let replaced = self
            .metadata
            .replace_file_meta(file.node_id, size, mime_from_path(&file.path_name).as_deref())
            .await?;

        info!(node_id = %file.node_id, path = %file.relative_path, bytes = size, "File replaced");
        Ok(replaced)
    }

    /// Re-read a file from disk into the binary mirror.
    ///
    /// Files above the store's threshold are not mirrored and any stale
    /// mirror is dropped. Returns whether the file is now mirrored.
    pub async fn mirror_binary(&self, file_id: NodeId) -> AppResult<bool> {
        let file = self.resource(file_id).await?.into_file()?;
        let store = self.store_of(file.store_id).await?;

        if !store.should_mirror(file.file_size_bytes) {
            if file.is_binary_mirrored {
                self.metadata.delete_binary(file_id).await?;
            }
            debug!(node_id = %file_id, bytes = file.file_size_bytes, "File above mirror threshold");
            return Ok(false);
        }

        let provider = self.provider(file.store_id).await?;
        let data = provider.read_bytes(&file.relative_path).await?;
        self.metadata.put_binary(file_id, &data).await?;

        debug!(node_id = %file_id, bytes = data.len(), "Mirrored file bytes");
        Ok(true)
    }

    // ── Updates ─────────────────────────────────────────────────────

    /// Rename a resource.
    ///
    /// A file changes its own row. A directory rewrites the relative path
    /// of its whole subtree, top-down, then moves once on disk.
    pub async fn rename_or_relocate(&self, resource: &Resource, new_name: &str) -> AppResult<Resource> {
        let current = resource.path();
        if current.is_root() {
            return Err(AppError::structural("A store root directory cannot be renamed"));
        }
        if current.path_name == new_name {
            return Ok(resource.clone());
        }
        validate_name(new_name)?;

        let parent_id = current
            .parent_node_id
            .ok_or_else(|| AppError::structural("A store root directory cannot be renamed"))?;
        self.ensure_unique(parent_id, new_name, current.resource_type, Some(current.node_id))
            .await?;

        let mut renamed = current.clone();
        renamed.path_name = new_name.to_string();
        renamed.relative_path = join_relative_path(parent_path(&current.relative_path), new_name);

        let rows = match resource {
            Resource::File(_) => vec![renamed.clone()],
            Resource::Directory(_) => {
                let subtree = self.metadata.find_subtree(current.node_id, None).await?;
                rewrite_subtree(subtree, renamed.clone())?
            }
        };
        self.metadata.update_resources(&rows).await?;

        let provider = self.provider(current.store_id).await?;
        if let Err(e) = provider
            .rename(&current.relative_path, &renamed.relative_path)
            .await
        {
            warn!(node_id = %current.node_id, from = %current.relative_path, to = %renamed.relative_path, error = %e, "Rename committed in metadata but failed on disk");
            return Err(e);
        }

        info!(
            node_id = %current.node_id,
            from = %current.relative_path,
            to = %renamed.relative_path,
            rows = rows.len(),
            "Resource renamed"
        );

        let mut updated = resource.clone();
        *updated.path_mut() = renamed;
        Ok(updated)
    }

    /// Change a resource's description and declared groups.
    ///
    /// A store root must keep all three groups declared.
    pub async fn update_details(
        &self,
        resource: &Resource,
        description: Option<String>,
        groups: AccessGroups,
    ) -> AppResult<Resource> {
        if resource.path().is_root() && !groups.is_complete() {
            return Err(AppError::validation(
                "A store root directory must declare read, write, and execute groups",
            ));
        }

        let mut updated = resource.clone();
        let path = updated.path_mut();
        path.description = description;
        path.groups = groups;
        self.metadata
            .update_resources(std::slice::from_ref(&*path))
            .await?;

        info!(node_id = %resource.node_id(), "Resource details updated");
        Ok(updated)
    }

    /// Move a file into `dest`, keeping its node.
    ///
    /// A same-name file at the destination is removed first when
    /// `replace_existing` is set; otherwise the move is a conflict.
    pub async fn move_file(
        &self,
        file: &FileMetaResource,
        dest: &DirectoryResource,
        replace_existing: bool,
    ) -> AppResult<FileMetaResource> {
        if file.parent_node_id == Some(dest.node_id) {
            return Err(AppError::structural(
                "A file cannot be moved into the directory it is already in",
            ));
        }

        if let Some(existing) = self
            .find_child(dest.node_id, &file.path_name, ResourceType::File)
            .await?
        {
            if !replace_existing {
                return Err(AppError::conflict(format!(
                    "A file named '{}' already exists in the destination",
                    file.path_name
                )));
            }
            self.remove_file(&existing.into_file()?).await?;
        }

        let mut moved = file.clone();
        moved.parent_node_id = Some(dest.node_id);
        moved.store_id = dest.store_id;
        moved.relative_path = dest.child_path(&file.path_name);

        self.metadata
            .relocate_resource(file.node_id, dest.node_id, std::slice::from_ref(&moved.resource))
            .await?;

        let result = if file.store_id == dest.store_id {
            let provider = self.provider(file.store_id).await?;
            provider.rename(&file.relative_path, &moved.relative_path).await
        } else {
            self.provider(file.store_id).await?;
            self.provider(dest.store_id).await?;
            self.transfer
                .transfer(
                    file.store_id,
                    &file.relative_path,
                    dest.store_id,
                    &moved.relative_path,
                    true,
                )
                .await
                .map(|_| ())
        };
        if let Err(e) = result {
            warn!(node_id = %file.node_id, from = %file.relative_path, to = %moved.relative_path, error = %e, "Move committed in metadata but failed on disk");
            return Err(e);
        }

        info!(
            node_id = %file.node_id,
            from_store = %file.store_id,
            to_store = %dest.store_id,
            to = %moved.relative_path,
            "File moved"
        );
        Ok(moved)
    }

    // ── Removals ────────────────────────────────────────────────────

    /// Delete a file's rows and its bytes.
    pub async fn remove_file(&self, file: &FileMetaResource) -> AppResult<()> {
        self.metadata.prune(file.node_id, true).await?;

        let provider = self.provider(file.store_id).await?;
        if let Err(e) = provider.delete(&file.relative_path).await {
            warn!(node_id = %file.node_id, path = %file.relative_path, error = %e, "File removed from metadata but not from disk");
            return Err(e);
        }

        info!(node_id = %file.node_id, path = %file.relative_path, "File removed");
        Ok(())
    }

    /// Delete an empty, non-root directory.
    pub async fn remove_directory(&self, dir: &DirectoryResource) -> AppResult<()> {
        if dir.is_root() {
            return Err(AppError::structural("A store root directory cannot be removed"));
        }
        if !self.children(dir.node_id).await?.is_empty() {
            return Err(AppError::structural(format!(
                "Directory '{}' is not empty",
                dir.relative_path
            )));
        }

        self.metadata.prune(dir.node_id, true).await?;

        let provider = self.provider(dir.store_id).await?;
        if let Err(e) = provider.remove_dir(&dir.relative_path).await {
            warn!(node_id = %dir.node_id, path = %dir.relative_path, error = %e, "Directory removed from metadata but not from disk");
            return Err(e);
        }

        info!(node_id = %dir.node_id, path = %dir.relative_path, "Directory removed");
        Ok(())
    }
}

async fn source_size(source: &Path) -> AppResult<i64> {
    let meta = tokio::fs::metadata(source).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Cannot read source file: {}", source.display()),
            e,
        )
    })?;
    if !meta.is_file() {
        return Err(AppError::validation(format!(
            "Source is not a regular file: {}",
            source.display()
        )));
    }
    i64::try_from(meta.len()).map_err(|_| AppError::validation("File is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use treevault_database::MemoryMetadataStore;
    use treevault_entity::store::{AccessRule, NewStore};

    struct Fixture {
        _dir: tempfile::TempDir,
        repo: ResourceRepository,
        store: Store,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let metadata: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());
        let store = metadata
            .create_store(&NewStore {
                name: "main".into(),
                description: None,
                path: dir.path().join("main").to_string_lossy().into_owned(),
                max_mirrored_file_size_bytes: 1024,
                access_rule: AccessRule::Deny,
                root_groups: AccessGroups::all("G1"),
            })
            .await
            .unwrap();
        Fixture {
            repo: ResourceRepository::new(metadata, StorageManager::new()),
            store,
            _dir: dir,
        }
    }

    fn source_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    async fn mkdir(f: &Fixture, parent: &PathResource, name: &str) -> DirectoryResource {
        f.repo
            .add_directory(parent, name, None, &AccessGroups::inherit())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_directory_creates_disk_entry() {
        let f = fixture().await;
        let docs = mkdir(&f, &f.store.root_dir, "docs").await;
        assert!(f.repo.disk_path(&f.store, &docs).is_dir());

        let err = f
            .repo
            .add_directory(&f.store.root_dir, "DOCS", None, &AccessGroups::inherit())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_add_file_and_mirror() {
        let f = fixture().await;
        let src = tempfile::tempdir().unwrap();
        let file = f
            .repo
            .add_file(
                &f.store.root_dir,
                &source_file(&src, "in.txt", "hello"),
                "hello.txt",
                None,
                &AccessGroups::inherit(),
            )
            .await
            .unwrap();

        assert_eq!(file.file_size_bytes, 5);
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(std::fs::read_to_string(f.repo.disk_path(&f.store, &file)).unwrap(), "hello");

        assert!(f.repo.mirror_binary(file.node_id).await.unwrap());
        let mirrored = f.repo.metadata().get_binary(file.node_id).await.unwrap();
        assert_eq!(mirrored.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_rename_round_trip_restores_paths() {
        let f = fixture().await;
        let a = mkdir(&f, &f.store.root_dir, "a").await;
        let b = mkdir(&f, &a, "b").await;
        let c = mkdir(&f, &b, "c").await;

        let renamed = f.repo.rename_or_relocate(&a.clone().into(), "z").await.unwrap();
        let moved_c = f.repo.resource(c.node_id).await.unwrap();
        assert_eq!(moved_c.path().relative_path, "/z/b/c");
        assert!(Path::new(&f.store.path).join("z/b/c").is_dir());

        f.repo.rename_or_relocate(&renamed, "a").await.unwrap();
        for (id, path) in [(a.node_id, "/a"), (b.node_id, "/a/b"), (c.node_id, "/a/b/c")] {
            assert_eq!(f.repo.resource(id).await.unwrap().path().relative_path, path);
        }
    }

    #[tokio::test]
    async fn test_move_file_rules() {
        let f = fixture().await;
        let src = tempfile::tempdir().unwrap();
        let a = mkdir(&f, &f.store.root_dir, "a").await;
        let b = mkdir(&f, &f.store.root_dir, "b").await;
        let file = f
            .repo
            .add_file(&a, &source_file(&src, "x", "1"), "x.txt", None, &AccessGroups::inherit())
            .await
            .unwrap();
        f.repo
            .add_file(&b, &source_file(&src, "y", "22"), "x.txt", None, &AccessGroups::inherit())
            .await
            .unwrap();

        let same = f.repo.move_file(&file, &a, false).await.unwrap_err();
        assert_eq!(same.kind, ErrorKind::Structural);

        let conflict = f.repo.move_file(&file, &b, false).await.unwrap_err();
        assert_eq!(conflict.kind, ErrorKind::Conflict);

        let moved = f.repo.move_file(&file, &b, true).await.unwrap();
        assert_eq!(moved.node_id, file.node_id);
        assert_eq!(moved.relative_path, "/b/x.txt");
        assert_eq!(
            std::fs::read_to_string(f.repo.disk_path(&f.store, &moved)).unwrap(),
            "1"
        );
        assert_eq!(f.repo.children(b.node_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_directory_requires_empty() {
        let f = fixture().await;
        let a = mkdir(&f, &f.store.root_dir, "a").await;
        let inner = mkdir(&f, &a, "inner").await;

        let err = f.repo.remove_directory(&a).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);

        f.repo.remove_directory(&inner).await.unwrap();
        f.repo.remove_directory(&a).await.unwrap();
        assert!(!f.repo.disk_path(&f.store, &a).exists());

        let root = f.repo.remove_directory(&f.store.root_dir).await.unwrap_err();
        assert_eq!(root.kind, ErrorKind::Structural);
    }

    #[tokio::test]
    async fn test_root_details_need_all_groups() {
        let f = fixture().await;
        let root: Resource = f.store.root_dir.clone().into();
        let err = f
            .repo
            .update_details(&root, None, AccessGroups::inherit())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let updated = f
            .repo
            .update_details(&root, Some("top".into()), AccessGroups::all("G2"))
            .await
            .unwrap();
        assert_eq!(updated.path().groups.read.as_deref(), Some("G2"));
    }
}
