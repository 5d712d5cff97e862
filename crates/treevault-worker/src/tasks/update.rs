//! Renames and detail changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use treevault_core::error::AppError;
use treevault_core::events::ResourceEvent;
use treevault_core::result::AppResult;
use treevault_core::types::Permission;
use treevault_database::ResourceStore;
use treevault_entity::resource::{
    AccessGroups, DirectoryResource, FileMetaResource, Resource, ResourceType,
};
use treevault_service::{RequestContext, ResourceRef};

use super::index::IndexOp;
use super::require_parent;
use crate::progress::ProgressHandle;
use crate::services::PipelineServices;
use crate::task::Task;

/// Fields to change. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceChanges {
    /// New name.
    pub name: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New declared groups.
    pub groups: Option<AccessGroups>,
}

impl ResourceChanges {
    /// Only a rename.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

async fn apply_changes(
    services: &PipelineServices,
    ctx: &RequestContext,
    progress: &ProgressHandle,
    target: &ResourceRef,
    changes: &ResourceChanges,
    expected: ResourceType,
) -> AppResult<Resource> {
    progress.set_job_count(1);
    let mut resource = services.trees.resolve_ref(ctx, target).await?;
    if resource.resource_type() != expected {
        return Err(AppError::validation(format!(
            "{target} is a {}, not a {expected}",
            resource.resource_type()
        )));
    }

    ctx.checker()
        .require_all(resource.path(), &[Permission::Execute, Permission::Write])?;
    let notify_dir = match resource.path().parent_node_id {
        Some(_) => {
            require_parent(services, ctx, resource.path(), &[Permission::Read, Permission::Write])
                .await?
                .node_id
        }
        None => resource.node_id(),
    };

    let mut changed_fields = Vec::new();
    if changes.description.is_some() || changes.groups.is_some() {
        let description = changes
            .description
            .clone()
            .unwrap_or_else(|| resource.path().description.clone());
        let groups = changes
            .groups
            .clone()
            .unwrap_or_else(|| resource.path().groups.clone());
        resource = services
            .repo
            .update_details(&resource, description, groups)
            .await?;
        if changes.description.is_some() {
            changed_fields.push("description".to_string());
        }
        if changes.groups.is_some() {
            changed_fields.push("groups".to_string());
        }
    }

    let mut renamed = false;
    if let Some(name) = &changes.name {
        if *name != resource.path().path_name {
            resource = services.repo.rename_or_relocate(&resource, name).await?;
            changed_fields.push("name".to_string());
            renamed = true;
        }
    }
    progress.advance(1);

    match &resource {
        Resource::File(file) => services.queue_index(IndexOp::Update(file.clone()), None)?,
        Resource::Directory(dir) if renamed => {
            let subtree = services.repo.metadata().find_subtree(dir.node_id, None).await?;
            for file in subtree.into_iter().filter_map(|r| r.as_file().cloned()) {
                services.queue_index(IndexOp::Update(file), None)?;
            }
        }
        Resource::Directory(_) => {}
    }

    services.changed(
        ctx,
        notify_dir,
        ResourceEvent::Updated {
            node_id: resource.node_id(),
            changed_fields,
        },
    );
    services.trees.resolve(ctx, resource.node_id()).await
}

/// Rename a directory or change its details.
#[derive(Debug)]
pub struct UpdateDirectoryTask {
    services: PipelineServices,
    ctx: RequestContext,
    target: ResourceRef,
    changes: ResourceChanges,
}

impl UpdateDirectoryTask {
    /// Create the task.
    pub fn new(
        services: PipelineServices,
        ctx: RequestContext,
        target: ResourceRef,
        changes: ResourceChanges,
    ) -> Self {
        Self {
            services,
            ctx,
            target,
            changes,
        }
    }
}

#[async_trait]
impl Task for UpdateDirectoryTask {
    type Output = DirectoryResource;

    fn name(&self) -> &'static str {
        "update_directory"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<DirectoryResource> {
        apply_changes(
            &self.services,
            &self.ctx,
            progress,
            &self.target,
            &self.changes,
            ResourceType::Directory,
        )
        .await?
        .into_directory()
    }
}

/// Rename a file or change its details.
#[derive(Debug)]
pub struct UpdateFileTask {
    services: PipelineServices,
    ctx: RequestContext,
    target: ResourceRef,
    changes: ResourceChanges,
}

impl UpdateFileTask {
    /// Create the task.
    pub fn new(
        services: PipelineServices,
        ctx: RequestContext,
        target: ResourceRef,
        changes: ResourceChanges,
    ) -> Self {
        Self {
            services,
            ctx,
            target,
            changes,
        }
    }
}

#[async_trait]
impl Task for UpdateFileTask {
    type Output = FileMetaResource;

    fn name(&self) -> &'static str {
        "update_file"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<FileMetaResource> {
        apply_changes(
            &self.services,
            &self.ctx,
            progress,
            &self.target,
            &self.changes,
            ResourceType::File,
        )
        .await?
        .into_file()
    }
}
