//! Concrete pipeline tasks.
//!
//! Every task resolves its targets and checks permissions when it runs,
//! not when it is submitted.

pub mod add;
pub mod copy;
pub mod export;
pub mod index;
pub mod mirror;
pub mod moves;
pub mod remove;
pub mod update;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use treevault_core::error::AppError;
use treevault_core::events::ResourceEvent;
use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, Permission};
use treevault_entity::resource::{
    AccessBits, AccessGroups, DirectoryResource, FileMetaResource, PathResource, Resource,
    ResourceType,
};
use treevault_entity::tree::Tree;
use treevault_service::RequestContext;

use crate::progress::ProgressHandle;
use crate::services::PipelineServices;
use crate::task::Task;

pub use add::{AddDirectoryTask, AddFileRequest, AddFileTask};
pub use copy::{CopyDirectoryTask, CopyFileTask};
pub use export::{ExportResult, ZipExportTask};
pub use index::{IndexOp, IndexTask};
pub use mirror::MirrorBinaryTask;
pub use moves::{MoveDirectoryTask, MoveFileTask};
pub use remove::{RemoveDirectoryTask, RemoveFileTask};
pub use update::{ResourceChanges, UpdateDirectoryTask, UpdateFileTask};

/// Jobs reported by one file write: metadata, index, binary mirror.
pub(crate) const FILE_WRITE_JOBS: u64 = 3;

/// A file to write into a directory.
pub(crate) struct FileWrite<'a> {
    pub source: &'a Path,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub groups: &'a AccessGroups,
    pub replace_existing: bool,
}

/// Write a file into `dir`, then queue the index and mirror children
/// under `progress`. Reports [`FILE_WRITE_JOBS`] jobs in total.
pub(crate) async fn write_file(
    services: &PipelineServices,
    ctx: &RequestContext,
    progress: &ProgressHandle,
    dir: &DirectoryResource,
    write: FileWrite<'_>,
) -> AppResult<FileMetaResource> {
    let FileWrite {
        source,
        name,
        description,
        groups,
        replace_existing,
    } = write;
    let existing = services
        .repo
        .find_child(dir.node_id, name, ResourceType::File)
        .await?;

    let (file, op, event) = match existing {
        Some(_) if !replace_existing => {
            return Err(AppError::conflict(format!(
                "A file named '{name}' already exists in '{}'",
                dir.relative_path
            )));
        }
        Some(existing) => {
            let file = services.repo.replace_file(&existing.into_file()?, source).await?;
            let event = ResourceEvent::FileReplaced {
                node_id: file.node_id,
                size_bytes: file.file_size_bytes,
            };
            (file.clone(), IndexOp::Update(file), event)
        }
        None => {
            let file = services
                .repo
                .add_file(dir, source, name, description, groups)
                .await?;
            let event = ResourceEvent::FileAdded {
                node_id: file.node_id,
                parent_id: dir.node_id,
                store_id: file.store_id,
                name: file.path_name.clone(),
                size_bytes: file.file_size_bytes,
            };
            (file.clone(), IndexOp::Add(file), event)
        }
    };
    progress.advance(1);

    services.queue_index(op, Some(progress))?;
    services.queue_mirror(file.store_id, file.node_id, progress)?;
    services.changed(ctx, dir.node_id, event);
    Ok(file)
}

/// Find a source directory's namesake under a destination directory, or
/// create it, and give it the source's declared groups.
///
/// Submitted as a child of directory copies and moves on the
/// destination store's general queue. Reports one job.
#[derive(Debug)]
pub(crate) struct EnsureDirectoryTask {
    services: PipelineServices,
    ctx: RequestContext,
    target_parent: DirectoryResource,
    source: DirectoryResource,
}

impl EnsureDirectoryTask {
    pub(crate) fn new(
        services: PipelineServices,
        ctx: RequestContext,
        target_parent: DirectoryResource,
        source: DirectoryResource,
    ) -> Self {
        Self {
            services,
            ctx,
            target_parent,
            source,
        }
    }

    async fn ensure(&self) -> AppResult<DirectoryResource> {
        let services = &self.services;
        let (target_parent, source) = (&self.target_parent, &self.source);
        let existing = services
            .repo
            .find_child(target_parent.node_id, &source.path_name, ResourceType::Directory)
            .await?;

        match existing {
            Some(existing) => {
                let existing = services.trees.resolve(&self.ctx, existing.node_id()).await?;
                self.ctx.checker().require(existing.path(), Permission::Write)?;
                if existing.path().groups == source.groups {
                    return existing.into_directory();
                }
                let description = existing.path().description.clone();
                services
                    .repo
                    .update_details(&existing, description, source.groups.clone())
                    .await?
                    .into_directory()
            }
            None => {
                let created = services
                    .repo
                    .add_directory(
                        target_parent,
                        &source.path_name,
                        source.description.as_deref(),
                        &source.groups,
                    )
                    .await?;
                services.changed(
                    &self.ctx,
                    target_parent.node_id,
                    ResourceEvent::DirectoryAdded {
                        node_id: created.node_id,
                        parent_id: target_parent.node_id,
                        store_id: created.store_id,
                        name: created.path_name.clone(),
                    },
                );
                Ok(created)
            }
        }
    }
}

#[async_trait]
impl Task for EnsureDirectoryTask {
    type Output = DirectoryResource;

    fn name(&self) -> &'static str {
        "ensure_directory"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<DirectoryResource> {
        progress.set_job_count(1);
        let dir = self.ensure().await?;
        progress.advance(1);
        Ok(dir)
    }
}

/// What a directory copy or move does with the files it meets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transfer {
    /// Copy; a same-name destination file is replaced only if allowed.
    Copy { replace_existing: bool },
    /// Move; every same-name destination file is a conflict.
    Move,
}

/// Check every permission and name clash a directory copy or move of
/// `tree` into `dest` would run into, before anything is written.
///
/// Directories the transfer would create or merge into carry the source's
/// groups afterwards, so their bits come from [`TreeService::project_under`].
///
/// [`TreeService::project_under`]: treevault_service::TreeService::project_under
pub(crate) async fn check_transfer(
    services: &PipelineServices,
    ctx: &RequestContext,
    tree: &Tree<Resource>,
    dest: &DirectoryResource,
    transfer: Transfer,
) -> AppResult<()> {
    let checker = ctx.checker();
    let projection = services.trees.project_under(ctx, tree, dest).await?;
    let projected: HashMap<NodeId, AccessBits> = projection
        .iter()
        .map(|r| (r.node_id(), r.path().access))
        .collect();

    // Destination counterpart of each source directory that already exists.
    let mut existing: Vec<Option<DirectoryResource>> = vec![None; tree.len()];
    for index in tree.pre_order() {
        let target = match tree.parent(index) {
            None => Some(dest.clone()),
            Some(parent) => existing[parent].clone(),
        };

        match tree.value(index) {
            Resource::Directory(dir) => {
                if transfer == Transfer::Move {
                    checker.require_all(dir, &[Permission::Read, Permission::Write])?;
                }
                let Some(target) = target else { continue };
                let found = services
                    .repo
                    .find_child(target.node_id, &dir.path_name, ResourceType::Directory)
                    .await?;
                if let Some(found) = found {
                    let found = services
                        .trees
                        .resolve(ctx, found.node_id())
                        .await?
                        .into_directory()?;
                    checker.require(&found, Permission::Write)?;
                    existing[index] = Some(found);
                }
            }
            Resource::File(file) => {
                let parent = tree
                    .parent(index)
                    .map(|p| tree.value(p).path())
                    .ok_or_else(|| AppError::internal("A subtree cannot be rooted at a file"))?;
                checker.require(file, Permission::Read)?;
                if transfer == Transfer::Move {
                    checker.require_all(parent, &[Permission::Read, Permission::Write])?;
                }

                let mut landing = match &target {
                    Some(target) => target.resource.clone(),
                    None => parent.clone(),
                };
                landing.access = projected.get(&parent.node_id).copied().unwrap_or_default();
                checker.require(&landing, Permission::Write)?;

                let Some(target) = target else { continue };
                let clash = services
                    .repo
                    .find_child(target.node_id, &file.path_name, ResourceType::File)
                    .await?;
                match (clash, transfer) {
                    (None, _) => {}
                    (Some(clash), Transfer::Copy { replace_existing: true })
                        if clash.node_id() != file.node_id => {}
                    (Some(_), _) => {
                        return Err(AppError::conflict(format!(
                            "A file named '{}' already exists in '{}'",
                            file.path_name, target.relative_path
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Resolve the parent of a non-root resource and require `permissions` on it.
pub(crate) async fn require_parent(
    services: &PipelineServices,
    ctx: &RequestContext,
    resource: &PathResource,
    permissions: &[Permission],
) -> AppResult<DirectoryResource> {
    let parent_id = resource
        .parent_node_id
        .ok_or_else(|| AppError::structural("A store root directory has no parent"))?;
    let parent = services.trees.resolve(ctx, parent_id).await?.into_directory()?;
    ctx.checker().require_all(&parent, permissions)?;
    Ok(parent)
}
