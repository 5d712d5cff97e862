//! Entry points that route each mutation to the right queue.

use treevault_core::result::AppResult;
use treevault_core::types::StoreId;
use treevault_entity::resource::{AccessGroups, DirectoryResource, FileMetaResource};
use treevault_service::{RequestContext, ResourceRef};

use crate::manager::TaskManager;
use crate::registry::Concern;
use crate::services::PipelineServices;
use crate::task::TaskHandle;
use crate::tasks::{
    AddDirectoryTask, AddFileRequest, AddFileTask, CopyDirectoryTask, CopyFileTask, ExportResult,
    IndexOp, IndexTask, MoveDirectoryTask, MoveFileTask, RemoveDirectoryTask, RemoveFileTask,
    ResourceChanges, UpdateDirectoryTask, UpdateFileTask, ZipExportTask,
};

/// Submits mutation tasks.
///
/// Single-resource mutations go to the general queue of the store they
/// touch. Subtree copies, subtree moves, and exports each get their own
/// worker because they wait on children queued on the shared queues.
#[derive(Debug, Clone)]
pub struct MutationPipeline {
    services: PipelineServices,
}

impl MutationPipeline {
    /// Create a pipeline.
    pub fn new(services: PipelineServices) -> Self {
        Self { services }
    }

    /// The shared task collaborators.
    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    async fn general(&self, reference: &ResourceRef) -> AppResult<TaskManager> {
        let store_id = self.services.trees.store_of(reference).await?;
        Ok(self.services.queue(store_id, Concern::General))
    }

    /// Create a directory.
    pub async fn add_directory(
        &self,
        ctx: &RequestContext,
        parent: ResourceRef,
        name: impl Into<String>,
        description: Option<String>,
        groups: AccessGroups,
    ) -> AppResult<TaskHandle<DirectoryResource>> {
        let queue = self.general(&parent).await?;
        queue.submit(AddDirectoryTask::new(
            self.services.clone(),
            ctx.clone(),
            parent,
            name,
            description,
            groups,
        ))
    }

    /// Copy a local file into a directory.
    pub async fn add_file(
        &self,
        ctx: &RequestContext,
        request: AddFileRequest,
    ) -> AppResult<TaskHandle<FileMetaResource>> {
        let queue = self.general(&request.dir).await?;
        queue.submit(AddFileTask::new(self.services.clone(), ctx.clone(), request))
    }

    /// Copy a file into a directory. Runs on the destination's queue.
    pub async fn copy_file(
        &self,
        ctx: &RequestContext,
        source: ResourceRef,
        dest: ResourceRef,
        replace_existing: bool,
    ) -> AppResult<TaskHandle<FileMetaResource>> {
        let queue = self.general(&dest).await?;
        queue.submit(CopyFileTask::new(
            self.services.clone(),
            ctx.clone(),
            source,
            dest,
            replace_existing,
        ))
    }

    /// Move a file into a directory. Runs on the source's queue.
    pub async fn move_file(
        &self,
        ctx: &RequestContext,
        source: ResourceRef,
        dest: ResourceRef,
        replace_existing: bool,
    ) -> AppResult<TaskHandle<FileMetaResource>> {
        let queue = self.general(&source).await?;
        queue.submit(MoveFileTask::new(
            self.services.clone(),
            ctx.clone(),
            source,
            dest,
            replace_existing,
        ))
    }

    /// Copy a directory subtree.
    pub fn copy_directory(
        &self,
        ctx: &RequestContext,
        source: ResourceRef,
        dest: ResourceRef,
        replace_existing: bool,
    ) -> TaskHandle<DirectoryResource> {
        TaskManager::spawn_dedicated(CopyDirectoryTask::new(
            self.services.clone(),
            ctx.clone(),
            source,
            dest,
            replace_existing,
        ))
    }

    /// Move a directory subtree.
    pub fn move_directory(
        &self,
        ctx: &RequestContext,
        source: ResourceRef,
        dest: ResourceRef,
    ) -> TaskHandle<DirectoryResource> {
        TaskManager::spawn_dedicated(MoveDirectoryTask::new(
            self.services.clone(),
            ctx.clone(),
            source,
            dest,
        ))
    }

    /// Remove a directory and its subtree.
    pub async fn remove_directory(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
    ) -> AppResult<TaskHandle<usize>> {
        let queue = self.general(&target).await?;
        queue.submit(RemoveDirectoryTask::new(self.services.clone(), ctx.clone(), target))
    }

    /// Remove a file.
    pub async fn remove_file(&self, ctx: &RequestContext, target: ResourceRef) -> AppResult<TaskHandle<()>> {
        let queue = self.general(&target).await?;
        queue.submit(RemoveFileTask::new(self.services.clone(), ctx.clone(), target))
    }

    /// Rename a directory or change its details.
    pub async fn update_directory(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
        changes: ResourceChanges,
    ) -> AppResult<TaskHandle<DirectoryResource>> {
        let queue = self.general(&target).await?;
        queue.submit(UpdateDirectoryTask::new(
            self.services.clone(),
            ctx.clone(),
            target,
            changes,
        ))
    }

    /// Rename a file or change its details.
    pub async fn update_file(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
        changes: ResourceChanges,
    ) -> AppResult<TaskHandle<FileMetaResource>> {
        let queue = self.general(&target).await?;
        queue.submit(UpdateFileTask::new(
            self.services.clone(),
            ctx.clone(),
            target,
            changes,
        ))
    }

    /// Archive resources into a zip under the export directory.
    pub fn zip_export(
        &self,
        ctx: &RequestContext,
        targets: Vec<ResourceRef>,
        archive_name: Option<String>,
    ) -> TaskHandle<ExportResult> {
        TaskManager::spawn_dedicated(ZipExportTask::new(
            self.services.clone(),
            ctx.clone(),
            targets,
            archive_name,
        ))
    }

    /// Clear a store's index and add every file back.
    pub fn reindex_store(&self, store_id: StoreId) -> AppResult<TaskHandle<usize>> {
        self.services
            .queue(store_id, Concern::Index)
            .submit(IndexTask::new(self.services.clone(), IndexOp::Rebuild(store_id)))
    }
}
