//! File and directory removal.

use async_trait::async_trait;

use treevault_core::error::AppError;
use treevault_core::events::ResourceEvent;
use treevault_core::result::AppResult;
use treevault_core::types::Permission;
use treevault_entity::resource::Resource;
use treevault_service::{RequestContext, ResourceRef};

use super::index::IndexOp;
use super::require_parent;
use crate::progress::ProgressHandle;
use crate::services::PipelineServices;
use crate::task::Task;

/// Delete a file's metadata and bytes.
#[derive(Debug)]
pub struct RemoveFileTask {
    services: PipelineServices,
    ctx: RequestContext,
    target: ResourceRef,
}

impl RemoveFileTask {
    /// Create the task.
    pub fn new(services: PipelineServices, ctx: RequestContext, target: ResourceRef) -> Self {
        Self {
            services,
            ctx,
            target,
        }
    }
}

#[async_trait]
impl Task for RemoveFileTask {
    type Output = ();

    fn name(&self) -> &'static str {
        "remove_file"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<()> {
        progress.set_job_count(1);
        let services = &self.services;
        let file = services.trees.resolve_file(&self.ctx, &self.target).await?;
        let parent =
            require_parent(services, &self.ctx, &file, &[Permission::Read, Permission::Write])
                .await?;

        services.repo.remove_file(&file).await?;
        progress.advance(1);

        services.changed(
            &self.ctx,
            parent.node_id,
            ResourceEvent::Removed {
                node_id: file.node_id,
                parent_id: Some(parent.node_id),
                relative_path: file.relative_path.clone(),
            },
        );
        services.queue_index(IndexOp::Delete(file), None)
    }
}

/// Delete a directory and everything under it, deepest entries first.
///
/// Write access is checked on every node before anything is removed.
#[derive(Debug)]
pub struct RemoveDirectoryTask {
    services: PipelineServices,
    ctx: RequestContext,
    target: ResourceRef,
}

impl RemoveDirectoryTask {
    /// Create the task.
    pub fn new(services: PipelineServices, ctx: RequestContext, target: ResourceRef) -> Self {
        Self {
            services,
            ctx,
            target,
        }
    }
}

#[async_trait]
impl Task for RemoveDirectoryTask {
    /// Number of removed resources.
    type Output = usize;

    fn name(&self) -> &'static str {
        "remove_directory"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<usize> {
        let services = &self.services;
        let checker = self.ctx.checker();

        let dir = services.trees.resolve_directory(&self.ctx, &self.target).await?;
        if dir.is_root() {
            return Err(AppError::structural("A store root directory cannot be removed"));
        }

        let tree = services.trees.subtree(&self.ctx, dir.node_id, None).await?;
        for resource in tree.iter() {
            checker.require(resource.path(), Permission::Write)?;
        }
        progress.set_job_count(tree.len() as u64);

        for index in tree.post_order() {
            match tree.value(index) {
                Resource::File(file) => {
                    services.repo.remove_file(file).await?;
                    services.queue_index(IndexOp::Delete(file.clone()), None)?;
                }
                Resource::Directory(child) => services.repo.remove_directory(child).await?,
            }
            progress.advance(1);
        }

        if let Some(parent_id) = dir.parent_node_id {
            services.changed(
                &self.ctx,
                parent_id,
                ResourceEvent::Removed {
                    node_id: dir.node_id,
                    parent_id: Some(parent_id),
                    relative_path: dir.relative_path.clone(),
                },
            );
        }
        Ok(tree.len())
    }
}
