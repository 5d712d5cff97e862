//! The collaborators every task runs against.

use std::path::PathBuf;
use std::sync::Arc;

use treevault_core::config::WorkerConfig;
use treevault_core::events::ResourceEvent;
use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, StoreId};
use treevault_database::MetadataStore;
use treevault_service::{RequestContext, ResourceRepository, TreeService};
use treevault_storage::StorageManager;

use crate::events::EventBus;
use crate::manager::TaskManager;
use crate::notify::NotificationDispatcher;
use crate::progress::ProgressHandle;
use crate::registry::{Concern, TaskManagerRegistry};
use crate::sinks::{ChangeNotifier, SearchIndexSink};
use crate::tasks::index::{IndexOp, IndexTask};
use crate::tasks::mirror::MirrorBinaryTask;

/// Shared handles passed to every task.
#[derive(Debug, Clone)]
pub struct PipelineServices {
    /// Metadata and disk mutations.
    pub repo: ResourceRepository,
    /// Permission-resolved lookups.
    pub trees: TreeService,
    /// Per-store task queues.
    pub queues: TaskManagerRegistry,
    /// Search index collaborator.
    pub index: Arc<dyn SearchIndexSink>,
    /// Directory-changed notifications.
    pub notifications: NotificationDispatcher,
    /// Domain events.
    pub events: EventBus,
    /// Where zip exports are written.
    pub export_dir: PathBuf,
}

impl PipelineServices {
    /// Wire the pipeline over a metadata store and the store providers.
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        storage: StorageManager,
        index: Arc<dyn SearchIndexSink>,
        notifier: Arc<dyn ChangeNotifier>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            repo: ResourceRepository::new(metadata.clone(), storage),
            trees: TreeService::new(metadata),
            queues: TaskManagerRegistry::new(),
            index,
            notifications: NotificationDispatcher::spawn(notifier, config.dedup_notifications),
            events: EventBus::new(config.event_capacity),
            export_dir: PathBuf::from(&config.export_dir),
        }
    }

    /// The queue of one store and concern.
    pub fn queue(&self, store_id: StoreId, concern: Concern) -> TaskManager {
        self.queues.manager(store_id, concern)
    }

    /// Queue an index update on the store's index queue.
    pub(crate) fn queue_index(&self, op: IndexOp, parent: Option<&ProgressHandle>) -> AppResult<()> {
        let queue = self.queue(op.store_id(), Concern::Index);
        let task = IndexTask::new(self.clone(), op);
        match parent {
            Some(parent) => queue.submit_child(task, parent)?,
            None => queue.submit(task)?,
        };
        Ok(())
    }

    /// Queue a binary mirror refresh on the store's binary queue.
    pub(crate) fn queue_mirror(
        &self,
        store_id: StoreId,
        file_id: NodeId,
        parent: &ProgressHandle,
    ) -> AppResult<()> {
        self.queue(store_id, Concern::Binary)
            .submit_child(MirrorBinaryTask::new(self.repo.clone(), file_id), parent)?;
        Ok(())
    }

    /// Publish an event and tell listeners the directory changed.
    pub(crate) fn changed(&self, ctx: &RequestContext, dir_id: NodeId, event: ResourceEvent) {
        self.events.publish(ctx.user_id, event);
        self.notifications.notify(dir_id, ctx.user_id);
    }
}
