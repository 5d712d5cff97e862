//! File and directory moves.

use async_trait::async_trait;
use tracing::info;

use treevault_core::error::AppError;
use treevault_core::events::ResourceEvent;
use treevault_core::result::AppResult;
use treevault_core::types::Permission;
use treevault_database::NodeStore;
use treevault_entity::resource::{DirectoryResource, FileMetaResource, Resource, ResourceType};
use treevault_service::{RequestContext, ResourceRef};

use super::index::IndexOp;
use super::{
    EnsureDirectoryTask, RemoveDirectoryTask, Transfer, check_transfer, require_parent,
};
use crate::progress::ProgressHandle;
use crate::registry::Concern;
use crate::services::PipelineServices;
use crate::task::Task;

/// Jobs reported by one file move: the relocation and the index update.
const FILE_MOVE_JOBS: u64 = 2;

/// Move a file into another directory, keeping its node.
#[derive(Debug)]
pub struct MoveFileTask {
    services: PipelineServices,
    ctx: RequestContext,
    source: ResourceRef,
    dest: ResourceRef,
    replace_existing: bool,
}

impl MoveFileTask {
    /// Create the task.
    pub fn new(
        services: PipelineServices,
        ctx: RequestContext,
        source: ResourceRef,
        dest: ResourceRef,
        replace_existing: bool,
    ) -> Self {
        Self {
            services,
            ctx,
            source,
            dest,
            replace_existing,
        }
    }
}

#[async_trait]
impl Task for MoveFileTask {
    type Output = FileMetaResource;

    fn name(&self) -> &'static str {
        "move_file"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<FileMetaResource> {
        progress.set_job_count(FILE_MOVE_JOBS);
        let services = &self.services;
        let checker = self.ctx.checker();

        let file = services.trees.resolve_file(&self.ctx, &self.source).await?;
        checker.require(&file, Permission::Read)?;
        let parent =
            require_parent(services, &self.ctx, &file, &[Permission::Read, Permission::Write])
                .await?;
        let dest = services.trees.resolve_directory(&self.ctx, &self.dest).await?;
        checker.require(&dest, Permission::Write)?;

        let replaced = if self.replace_existing && parent.node_id != dest.node_id {
            services
                .repo
                .find_child(dest.node_id, &file.path_name, ResourceType::File)
                .await?
                .and_then(|r| r.as_file().cloned())
        } else {
            None
        };

        let moved = services
            .repo
            .move_file(&file, &dest, self.replace_existing)
            .await?;
        progress.advance(1);

        if let Some(old) = replaced {
            services.queue_index(IndexOp::Delete(old), None)?;
        }
        if file.store_id == moved.store_id {
            services.queue_index(IndexOp::Update(moved.clone()), Some(progress))?;
        } else {
            services.queue_index(IndexOp::Delete(file.clone()), None)?;
            services.queue_index(IndexOp::Add(moved.clone()), Some(progress))?;
        }

        services.changed(
            &self.ctx,
            parent.node_id,
            ResourceEvent::Moved {
                node_id: file.node_id,
                from_parent_id: parent.node_id,
                to_parent_id: dest.node_id,
            },
        );
        services.notifications.notify(dest.node_id, self.ctx.user_id);

        services.trees.resolve(&self.ctx, moved.node_id).await?.into_file()
    }
}

/// Move a directory's subtree under a destination directory.
///
/// The whole subtree is checked first: read on every file, read and write
/// on every source directory, write on every destination directory, and
/// no same-name file at the destination. Then directories are recreated
/// at the destination, files are moved by [`MoveFileTask`] children
/// keeping their nodes, and a [`RemoveDirectoryTask`] child removes the
/// emptied source directories. Every child runs on a general queue.
#[derive(Debug)]
pub struct MoveDirectoryTask {
    services: PipelineServices,
    ctx: RequestContext,
    source: ResourceRef,
    dest: ResourceRef,
}

impl MoveDirectoryTask {
    /// Create the task.
    pub fn new(
        services: PipelineServices,
        ctx: RequestContext,
        source: ResourceRef,
        dest: ResourceRef,
    ) -> Self {
        Self {
            services,
            ctx,
            source,
            dest,
        }
    }
}

#[async_trait]
impl Task for MoveDirectoryTask {
    type Output = DirectoryResource;

    fn name(&self) -> &'static str {
        "move_directory"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<DirectoryResource> {
        let services = &self.services;
        let checker = self.ctx.checker();

        let source = services.trees.resolve_directory(&self.ctx, &self.source).await?;
        if source.is_root() {
            return Err(AppError::structural("A store root directory cannot be moved"));
        }
        checker.require(&source, Permission::Read)?;
        let parent = require_parent(services, &self.ctx, &source, &[Permission::Write]).await?;
        let dest = services.trees.resolve_directory(&self.ctx, &self.dest).await?;
        checker.require(&dest, Permission::Write)?;

        if services
            .repo
            .metadata()
            .is_descendant(source.node_id, dest.node_id)
            .await?
        {
            return Err(AppError::structural(
                "A directory cannot be moved into its own subtree",
            ));
        }
        if parent.node_id == dest.node_id {
            return Err(AppError::structural(
                "A directory cannot be moved into the directory it is already in",
            ));
        }

        let tree = services.trees.subtree(&self.ctx, source.node_id, None).await?;
        check_transfer(services, &self.ctx, &tree, &dest, Transfer::Move).await?;
        let dirs = tree.iter().filter(|r| r.is_directory()).count() as u64;
        let files = tree.len() as u64 - dirs;
        progress.set_job_count(dirs + FILE_MOVE_JOBS * files + dirs);

        let dest_queue = services.queue(dest.store_id, Concern::General);
        let source_queue = services.queue(source.store_id, Concern::General);
        let mut targets: Vec<Option<DirectoryResource>> = vec![None; tree.len()];
        for index in tree.pre_order() {
            let target_parent = match tree.parent(index) {
                None => dest.clone(),
                Some(parent) => targets[parent]
                    .clone()
                    .ok_or_else(|| AppError::internal("Move visited a child before its parent"))?,
            };

            match tree.value(index) {
                Resource::Directory(dir) => {
                    let child = EnsureDirectoryTask::new(
                        services.clone(),
                        self.ctx.clone(),
                        target_parent,
                        dir.clone(),
                    );
                    let created = dest_queue.submit_child(child, progress)?.wait().await?;
                    targets[index] = Some(created);
                }
                Resource::File(file) => {
                    let child = MoveFileTask::new(
                        services.clone(),
                        self.ctx.clone(),
                        file.node_id.into(),
                        target_parent.node_id.into(),
                        false,
                    );
                    source_queue.submit_child(child, progress)?.wait().await?;
                }
            }
        }

        let cleanup =
            RemoveDirectoryTask::new(services.clone(), self.ctx.clone(), source.node_id.into());
        source_queue.submit_child(cleanup, progress)?.wait().await?;

        info!(
            source = %source.relative_path,
            dest = %dest.relative_path,
            dirs,
            files,
            "Directory moved"
        );

        targets
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| AppError::internal("Moved subtree has no root"))
    }
}
