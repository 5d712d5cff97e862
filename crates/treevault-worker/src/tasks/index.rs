//! Search index updates.

use async_trait::async_trait;
use tracing::warn;

use treevault_core::result::AppResult;
use treevault_core::types::StoreId;
use treevault_database::ResourceStore;
use treevault_entity::resource::{FileMetaResource, Resource};

use crate::progress::ProgressHandle;
use crate::services::PipelineServices;
use crate::task::Task;

/// One change to forward to the index sink.
#[derive(Debug, Clone)]
pub enum IndexOp {
    /// A new file.
    Add(FileMetaResource),
    /// A changed file.
    Update(FileMetaResource),
    /// A removed file.
    Delete(FileMetaResource),
    /// Clear the store and add every file it holds.
    Rebuild(StoreId),
}

impl IndexOp {
    /// The store whose index queue runs this op.
    pub fn store_id(&self) -> StoreId {
        match self {
            Self::Add(file) | Self::Update(file) | Self::Delete(file) => file.store_id,
            Self::Rebuild(store_id) => *store_id,
        }
    }
}

/// Applies an [`IndexOp`]. Sink failures are logged and the task still
/// completes, so a parent task is never failed by its index child.
#[derive(Debug)]
pub struct IndexTask {
    services: PipelineServices,
    op: IndexOp,
}

impl IndexTask {
    /// Create an index task.
    pub fn new(services: PipelineServices, op: IndexOp) -> Self {
        Self { services, op }
    }

    async fn apply(&self) -> AppResult<usize> {
        let sink = &self.services.index;
        match &self.op {
            IndexOp::Add(file) => sink.add(file).await.map(|_| 1),
            IndexOp::Update(file) => sink.update(file).await.map(|_| 1),
            IndexOp::Delete(file) => sink.delete(file).await.map(|_| 1),
            IndexOp::Rebuild(store_id) => {
                let metadata = self.services.repo.metadata();
                let store = self.services.repo.store_of(*store_id).await?;
                sink.delete_all(store.id).await?;

                let mut added = 0;
                for resource in metadata.find_subtree(store.root_dir_node_id, None).await? {
                    if let Resource::File(file) = resource {
                        sink.add(&file).await?;
                        added += 1;
                    }
                }
                Ok(added)
            }
        }
    }
}

#[async_trait]
impl Task for IndexTask {
    type Output = usize;

    fn name(&self) -> &'static str {
        "index"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<usize> {
        progress.set_job_count(1);
        let indexed = match self.apply().await {
            Ok(indexed) => indexed,
            Err(e) => {
                warn!(store_id = %self.op.store_id(), op = ?self.op, error = %e, "Index update failed");
                0
            }
        };
        progress.advance(1);
        Ok(indexed)
    }
}
