//! File and directory copies.

use async_trait::async_trait;
use tracing::info;

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::Permission;
use treevault_database::NodeStore;
use treevault_entity::resource::{DirectoryResource, FileMetaResource, Resource, ResourceType};
use treevault_service::{RequestContext, ResourceRef};

use super::{
    EnsureDirectoryTask, FILE_WRITE_JOBS, FileWrite, Transfer, check_transfer, write_file,
};
use crate::progress::ProgressHandle;
use crate::registry::Concern;
use crate::services::PipelineServices;
use crate::task::Task;

/// Copy a file into a directory as a new node.
#[derive(Debug)]
pub struct CopyFileTask {
    services: PipelineServices,
    ctx: RequestContext,
    source: ResourceRef,
    dest: ResourceRef,
    replace_existing: bool,
}

impl CopyFileTask {
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
impl Task for CopyFileTask {
    type Output = FileMetaResource;

    fn name(&self) -> &'static str {
        "copy_file"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<FileMetaResource> {
        progress.set_job_count(FILE_WRITE_JOBS);
        let checker = self.ctx.checker();
        let file = self.services.trees.resolve_file(&self.ctx, &self.source).await?;
        checker.require(&file, Permission::Read)?;
        let dest = self.services.trees.resolve_directory(&self.ctx, &self.dest).await?;
        checker.require(&dest, Permission::Write)?;

        if let Some(existing) = self
            .services
            .repo
            .find_child(dest.node_id, &file.path_name, ResourceType::File)
            .await?
        {
            if existing.node_id() == file.node_id {
                return Err(AppError::conflict(format!(
                    "File '{}' cannot replace itself",
                    file.relative_path
                )));
            }
        }

        let store = self.services.repo.store_of(file.store_id).await?;
        let source = self.services.repo.disk_path(&store, &file);
        let copied = write_file(
            &self.services,
            &self.ctx,
            progress,
            &dest,
            FileWrite {
                source: &source,
                name: &file.path_name,
                description: file.description.as_deref(),
                groups: &file.groups,
                replace_existing: self.replace_existing,
            },
        )
        .await?;

        self.services.trees.resolve(&self.ctx, copied.node_id).await?.into_file()
    }
}

/// Copy a directory's subtree under a destination directory.
///
/// Directories are merged into same-named destination directories. Every
/// permission and name clash is checked over the whole subtree before the
/// first write, so a rejected copy leaves the destination untouched.
/// Directories and files are then written by child tasks on the
/// destination's general queue.
#[derive(Debug)]
pub struct CopyDirectoryTask {
    services: PipelineServices,
    ctx: RequestContext,
    source: ResourceRef,
    dest: ResourceRef,
    replace_existing: bool,
}

impl CopyDirectoryTask {
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
impl Task for CopyDirectoryTask {
    type Output = DirectoryResource;

    fn name(&self) -> &'static str {
        "copy_directory"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<DirectoryResource> {
        let services = &self.services;
        let checker = self.ctx.checker();

        let source = services.trees.resolve_directory(&self.ctx, &self.source).await?;
        match source.parent_node_id {
            Some(parent_id) => {
                let parent = services.trees.resolve(&self.ctx, parent_id).await?;
                checker.require(parent.path(), Permission::Read)?;
            }
            None => checker.require(&source, Permission::Read)?,
        }
        let dest = services.trees.resolve_directory(&self.ctx, &self.dest).await?;
        checker.require(&dest, Permission::Write)?;

        if services
            .repo
            .metadata()
            .is_descendant(source.node_id, dest.node_id)
            .await?
        {
            return Err(AppError::structural(
                "A directory cannot be copied into its own subtree",
            ));
        }
        if source.parent_node_id == Some(dest.node_id) {
            return Err(AppError::structural(
                "A directory cannot be copied into the directory it is already in",
            ));
        }

        let tree = services.trees.subtree(&self.ctx, source.node_id, None).await?;
        let transfer = Transfer::Copy {
            replace_existing: self.replace_existing,
        };
        check_transfer(services, &self.ctx, &tree, &dest, transfer).await?;
        let dirs = tree.iter().filter(|r| r.is_directory()).count() as u64;
        let files = tree.len() as u64 - dirs;
        progress.set_job_count(dirs + FILE_WRITE_JOBS * files);

        let queue = services.queue(dest.store_id, Concern::General);
        let mut targets: Vec<Option<DirectoryResource>> = vec![None; tree.len()];
        for index in tree.pre_order() {
            let target_parent = match tree.parent(index) {
                None => dest.clone(),
                Some(parent) => targets[parent]
                    .clone()
                    .ok_or_else(|| AppError::internal("Copy visited a child before its parent"))?,
            };

            match tree.value(index) {
                Resource::Directory(dir) => {
                    let child = EnsureDirectoryTask::new(
                        services.clone(),
                        self.ctx.clone(),
                        target_parent,
                        dir.clone(),
                    );
                    let copied = queue.submit_child(child, progress)?.wait().await?;
                    targets[index] = Some(copied);
                }
                Resource::File(file) => {
                    let child = CopyFileTask::new(
                        services.clone(),
                        self.ctx.clone(),
                        file.node_id.into(),
                        target_parent.node_id.into(),
                        self.replace_existing,
                    );
                    queue.submit_child(child, progress)?.wait().await?;
                }
            }
        }

        info!(
            source = %source.relative_path,
            dest = %dest.relative_path,
            dirs,
            files,
            "Directory copied"
        );
        targets
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| AppError::internal("Copied subtree has no root"))
    }
}
