//! Directory and file creation.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use treevault_core::error::AppError;
use treevault_core::events::ResourceEvent;
use treevault_core::result::AppResult;
use treevault_core::types::Permission;
use treevault_entity::resource::{AccessGroups, DirectoryResource, FileMetaResource};
use treevault_service::{RequestContext, ResourceRef};

use super::{FILE_WRITE_JOBS, FileWrite, write_file};
use crate::progress::ProgressHandle;
use crate::services::PipelineServices;
use crate::task::Task;

/// Create a directory under `parent`.
#[derive(Debug)]
pub struct AddDirectoryTask {
    services: PipelineServices,
    ctx: RequestContext,
    parent: ResourceRef,
    name: String,
    description: Option<String>,
    groups: AccessGroups,
}

impl AddDirectoryTask {
    /// Create the task.
    pub fn new(
        services: PipelineServices,
        ctx: RequestContext,
        parent: ResourceRef,
        name: impl Into<String>,
        description: Option<String>,
        groups: AccessGroups,
    ) -> Self {
        Self {
            services,
            ctx,
            parent,
            name: name.into(),
            description,
            groups,
        }
    }
}

#[async_trait]
impl Task for AddDirectoryTask {
    type Output = DirectoryResource;

    fn name(&self) -> &'static str {
        "add_directory"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<DirectoryResource> {
        progress.set_job_count(1);
        let parent = self
            .services
            .trees
            .resolve_directory(&self.ctx, &self.parent)
            .await?;
        self.ctx.checker().require(&parent, Permission::Write)?;

        let dir = self
            .services
            .repo
            .add_directory(&parent, &self.name, self.description.as_deref(), &self.groups)
            .await?;
        let resolved = self.services.trees.resolve(&self.ctx, dir.node_id).await?;

        self.services.changed(
            &self.ctx,
            parent.node_id,
            ResourceEvent::DirectoryAdded {
                node_id: dir.node_id,
                parent_id: parent.node_id,
                store_id: dir.store_id,
                name: dir.path_name.clone(),
            },
        );
        progress.advance(1);
        resolved.into_directory()
    }
}

/// Input of [`AddFileTask`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddFileRequest {
    /// Destination directory.
    pub dir: ResourceRef,
    /// Local file to copy in.
    pub source: PathBuf,
    /// Name in the store. Defaults to the source file name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Declared access groups.
    pub groups: AccessGroups,
    /// Overwrite a same-name file instead of failing.
    pub replace_existing: bool,
}

/// Copy a local file into a directory.
///
/// Reports three jobs: the metadata write, then the index update and the
/// binary mirror, which run as children on their own queues.
#[derive(Debug)]
pub struct AddFileTask {
    services: PipelineServices,
    ctx: RequestContext,
    request: AddFileRequest,
}

impl AddFileTask {
    /// Create the task.
    pub fn new(services: PipelineServices, ctx: RequestContext, request: AddFileRequest) -> Self {
        Self {
            services,
            ctx,
            request,
        }
    }
}

#[async_trait]
impl Task for AddFileTask {
    type Output = FileMetaResource;

    fn name(&self) -> &'static str {
        "add_file"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<FileMetaResource> {
        progress.set_job_count(FILE_WRITE_JOBS);
        let request = &self.request;
        let name = match &request.name {
            Some(name) => name.clone(),
            None => request
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    AppError::validation(format!(
                        "Cannot derive a file name from {}",
                        request.source.display()
                    ))
                })?,
        };

        let dir = self
            .services
            .trees
            .resolve_directory(&self.ctx, &request.dir)
            .await?;
        self.ctx.checker().require(&dir, Permission::Write)?;

        let file = write_file(
            &self.services,
            &self.ctx,
            progress,
            &dir,
            FileWrite {
                source: &request.source,
                name: &name,
                description: request.description.as_deref(),
                groups: &request.groups,
                replace_existing: request.replace_existing,
            },
        )
        .await?;

        self.services.trees.resolve(&self.ctx, file.node_id).await?.into_file()
    }
}
