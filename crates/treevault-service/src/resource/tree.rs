//! Permission-resolved resource lookups.

use std::sync::Arc;

use treevault_auth::acl::PermissionTreeBuilder;
use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, StoreId};
use treevault_database::{MetadataStore, ResourceStore, StoreCatalog};
use treevault_entity::resource::{DirectoryResource, FileMetaResource, Resource, ResourceType};
use treevault_entity::store::AccessRule;
use treevault_entity::tree::Tree;

use super::reference::ResourceRef;
use crate::context::RequestContext;

/// Loads resources with the caller's access bits stamped on them.
#[derive(Debug, Clone)]
pub struct TreeService {
    metadata: Arc<dyn MetadataStore>,
}

impl TreeService {
    /// Create a tree service over a metadata store.
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    async fn access_rule(&self, resource: &Resource) -> AppResult<AccessRule> {
        let store_id = resource.path().store_id;
        self.metadata
            .find_store(store_id)
            .await?
            .map(|store| store.access_rule)
            .ok_or_else(|| AppError::not_found(format!("Store {store_id} not found")))
    }

    /// Resolve one resource through its ancestor chain.
    pub async fn resolve(&self, ctx: &RequestContext, node_id: NodeId) -> AppResult<Resource> {
        let chain = self.metadata.find_ancestor_chain(node_id).await?;
        let Some(root) = chain.first() else {
            return Err(AppError::not_found(format!("Resource {node_id} not found")));
        };
        let rule = self.access_rule(root).await?;

        let tree = PermissionTreeBuilder::new(&ctx.groups, rule)
            .build_parent_path_resource_tree(chain, true)?;
        Ok(tree.into_root())
    }

    /// The node a reference names. Path segments match case-insensitively;
    /// the last one prefers a directory over a file of the same name.
    pub async fn lookup(&self, reference: &ResourceRef) -> AppResult<NodeId> {
        let (store_id, path) = match reference {
            ResourceRef::Node(id) => return Ok(*id),
            ResourceRef::Path { store_id, path } => (*store_id, path),
        };

        let mut current = self.store_root(store_id).await?;
        let segments: Vec<&str> = ResourceRef::segments(path).collect();
        for (i, segment) in segments.iter().enumerate() {
            let dir = self
                .metadata
                .find_child(current, segment, ResourceType::Directory, None)
                .await?;
            let found = match dir {
                Some(dir) => Some(dir),
                None if i + 1 == segments.len() => {
                    self.metadata
                        .find_child(current, segment, ResourceType::File, None)
                        .await?
                }
                None => None,
            };
            current = found
                .ok_or_else(|| AppError::not_found(format!("No resource at {reference}")))?
                .node_id();
        }
        Ok(current)
    }

    /// The store a reference belongs to.
    pub async fn store_of(&self, reference: &ResourceRef) -> AppResult<StoreId> {
        match reference {
            ResourceRef::Path { store_id, .. } => Ok(*store_id),
            ResourceRef::Node(id) => self
                .metadata
                .find_resource(*id)
                .await?
                .map(|resource| resource.path().store_id)
                .ok_or_else(|| AppError::not_found(format!("Resource {id} not found"))),
        }
    }

    async fn store_root(&self, store_id: StoreId) -> AppResult<NodeId> {
        self.metadata
            .find_store(store_id)
            .await?
            .map(|store| store.root_dir_node_id)
            .ok_or_else(|| AppError::not_found(format!("Store {store_id} not found")))
    }

    /// Resolve the resource a reference names.
    pub async fn resolve_ref(&self, ctx: &RequestContext, reference: &ResourceRef) -> AppResult<Resource> {
        let node_id = self.lookup(reference).await?;
        self.resolve(ctx, node_id).await
    }

    /// Resolve a reference that must name a directory.
    pub async fn resolve_directory(
        &self,
        ctx: &RequestContext,
        reference: &ResourceRef,
    ) -> AppResult<DirectoryResource> {
        self.resolve_ref(ctx, reference).await?.into_directory()
    }

    /// Resolve a reference that must name a file.
    pub async fn resolve_file(
        &self,
        ctx: &RequestContext,
        reference: &ResourceRef,
    ) -> AppResult<FileMetaResource> {
        self.resolve_ref(ctx, reference).await?.into_file()
    }

    /// Resolve the parent directory of a non-root resource.
    pub async fn resolve_parent(
        &self,
        ctx: &RequestContext,
        resource: &Resource,
    ) -> AppResult<DirectoryResource> {
        let parent_id = resource.path().parent_node_id.ok_or_else(|| {
            AppError::structural("A store root directory has no parent")
        })?;
        self.resolve(ctx, parent_id).await?.into_directory()
    }

    /// Resolve the subtree under `node_id`, down to `max_depth` levels.
    pub async fn subtree(
        &self,
        ctx: &RequestContext,
        node_id: NodeId,
        max_depth: Option<i32>,
    ) -> AppResult<Tree<Resource>> {
        let root = self.resolve(ctx, node_id).await?;
        let rule = self.access_rule(&root).await?;
        let rows = self.metadata.find_subtree(node_id, max_depth).await?;

        PermissionTreeBuilder::new(&ctx.groups, rule).build_path_resource_tree(rows, &root)
    }

    /// Resolve `subtree` as if its root were a child of `dest`, under the
    /// rule of `dest`'s store. The returned tree is rooted at `dest`.
    ///
    /// Copies and moves give each destination directory its source's
    /// declared groups, so these are the bits the caller will have there.
    pub async fn project_under(
        &self,
        ctx: &RequestContext,
        subtree: &Tree<Resource>,
        dest: &DirectoryResource,
    ) -> AppResult<Tree<Resource>> {
        let root = Resource::Directory(dest.clone());
        let rule = self.access_rule(&root).await?;

        let mut rows = Vec::with_capacity(subtree.len() + 1);
        rows.push(root.clone());
        for (position, value) in subtree.iter().enumerate() {
            let mut row = value.clone();
            if position == 0 {
                row.path_mut().parent_node_id = Some(dest.node_id);
            }
            rows.push(row);
        }

        PermissionTreeBuilder::new(&ctx.groups, rule).build_path_resource_tree(rows, &root)
    }

    /// Resolved first-level children, directories first, then by name.
    pub async fn children(&self, ctx: &RequestContext, dir_id: NodeId) -> AppResult<Vec<Resource>> {
        let tree = self.subtree(ctx, dir_id, Some(1)).await?;
        let mut children: Vec<Resource> = tree.into_values().into_iter().skip(1).collect();
        children.sort_by(|a, b| {
            b.is_directory()
                .cmp(&a.is_directory())
                .then_with(|| a.path().path_name.cmp(&b.path().path_name))
        });
        Ok(children)
    }
}
