//! Metadata store traits.
//!
//! Each mutating operation is atomic: it either commits every row change
//! it describes or none of them.

use std::fmt::Debug;

use async_trait::async_trait;

use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, StoreId};
use treevault_entity::node::{ClosureJoinedRow, Node};
use treevault_entity::resource::{
    AccessGroups, DirectoryResource, FileMetaResource, NewFileMeta, PathResource, Resource,
    ResourceType,
};
use treevault_entity::store::{NewStore, Store};

/// Closure-table operations over bare nodes.
#[async_trait]
pub trait NodeStore: Send + Sync + Debug + 'static {
    /// Insert a node, its self row, and one row per ancestor of `parent_id`.
    async fn add_node(&self, parent_id: Option<NodeId>, name: &str) -> AppResult<Node>;

    /// Fetch a node by id.
    async fn get_node(&self, node_id: NodeId) -> AppResult<Option<Node>>;

    /// Change a node's name.
    async fn rename_node(&self, node_id: NodeId, name: &str) -> AppResult<()>;

    /// The subtree rooted at `node_id` (itself included at depth 0),
    /// ordered by `(depth, name)`. `None` means unbounded.
    async fn get_descendants(
        &self,
        node_id: NodeId,
        max_depth: Option<i32>,
    ) -> AppResult<Vec<ClosureJoinedRow>>;

    /// `node_id` and its ancestors up to `max_levels` edges away, ordered
    /// by depth descending so the root-most ancestor comes first.
    async fn get_ancestors(
        &self,
        node_id: NodeId,
        max_levels: Option<i32>,
    ) -> AppResult<Vec<ClosureJoinedRow>>;

    /// Whether `node_id` lies in the subtree of `ancestor_id`. True when equal.
    async fn is_descendant(&self, ancestor_id: NodeId, node_id: NodeId) -> AppResult<bool>;

    /// Delete the subtree of `node_id` with every row that references it.
    /// With `include_self` false only the descendants go. Returns the
    /// deleted node ids.
    async fn prune(&self, node_id: NodeId, include_self: bool) -> AppResult<Vec<NodeId>>;

    /// Re-parent `node_id` and its subtree under `new_parent_id`.
    async fn relocate(&self, node_id: NodeId, new_parent_id: NodeId) -> AppResult<()>;
}

/// Typed path resources layered on the node store.
#[async_trait]
pub trait ResourceStore: NodeStore {
    /// Insert node, closure, path, and directory rows for a new directory.
    async fn insert_directory(
        &self,
        parent: &PathResource,
        name: &str,
        description: Option<&str>,
        groups: &AccessGroups,
    ) -> AppResult<DirectoryResource>;

    /// Insert node, closure, path, and file rows for a new file.
    async fn insert_file(
        &self,
        parent: &PathResource,
        file: &NewFileMeta,
    ) -> AppResult<FileMetaResource>;

    /// Fetch a resource by node id.
    async fn find_resource(&self, node_id: NodeId) -> AppResult<Option<Resource>>;

    /// First-level child with the given name and type, ignoring case.
    async fn find_child(
        &self,
        dir_id: NodeId,
        name: &str,
        resource_type: ResourceType,
        exclude: Option<NodeId>,
    ) -> AppResult<Option<Resource>>;

    /// First-level children, directories first, then by name.
    async fn list_children(&self, dir_id: NodeId) -> AppResult<Vec<Resource>>;

    /// Resources of the subtree rooted at `node_id`, ordered by `(depth, name)`.
    async fn find_subtree(&self, node_id: NodeId, max_depth: Option<i32>)
    -> AppResult<Vec<Resource>>;

    /// Resources from the store root down to `node_id`, root-most first.
    async fn find_ancestor_chain(&self, node_id: NodeId) -> AppResult<Vec<Resource>>;

    /// Persist name, path, description, group, and pointer fields of each
    /// resource (and the matching node names) in one transaction.
    async fn update_resources(&self, resources: &[PathResource]) -> AppResult<()>;

    /// Re-parent `node_id` under `new_parent_id` and persist the already
    /// rewritten `updated` rows, in one transaction.
    async fn relocate_resource(
        &self,
        node_id: NodeId,
        new_parent_id: NodeId,
        updated: &[PathResource],
    ) -> AppResult<()>;

    /// Record replaced file bytes and drop any mirrored binary.
    async fn replace_file_meta(
        &self,
        node_id: NodeId,
        file_size_bytes: i64,
        mime_type: Option<&str>,
    ) -> AppResult<FileMetaResource>;
}

/// Mirrored file bytes keyed by file node.
#[async_trait]
pub trait BinaryStore: Send + Sync + Debug + 'static {
    /// Write or overwrite the mirror and mark the file as mirrored.
    async fn put_binary(&self, node_id: NodeId, data: &[u8]) -> AppResult<()>;

    /// Read the mirror, if present.
    async fn get_binary(&self, node_id: NodeId) -> AppResult<Option<Vec<u8>>>;

    /// Drop the mirror and clear the mirrored flag.
    async fn delete_binary(&self, node_id: NodeId) -> AppResult<()>;
}

/// Store definitions.
#[async_trait]
pub trait StoreCatalog: Send + Sync + Debug + 'static {
    /// Create the root node, the store row, and the root directory rows.
    async fn create_store(&self, new: &NewStore) -> AppResult<Store>;

    /// Fetch a store by id.
    async fn find_store(&self, store_id: StoreId) -> AppResult<Option<Store>>;

    /// Fetch a store by its unique name.
    async fn find_store_by_name(&self, name: &str) -> AppResult<Option<Store>>;

    /// All stores ordered by id.
    async fn list_stores(&self) -> AppResult<Vec<Store>>;
}

/// Everything a metadata backend provides.
pub trait MetadataStore: ResourceStore + BinaryStore + StoreCatalog {}

impl<T> MetadataStore for T where T: ResourceStore + BinaryStore + StoreCatalog {}
