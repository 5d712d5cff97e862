//! Runtime wiring shared by every command.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use treevault_auth::{CachedGroupMembership, GroupMembershipProvider, StaticGroupMembership};
use treevault_core::config::AppConfig;
use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::UserId;
use treevault_database::MetadataBackend;
use treevault_entity::resource::Resource;
use treevault_service::{RequestContext, ResourceRef, StoreService};
use treevault_storage::StorageManager;
use treevault_worker::{MutationPipeline, PipelineServices, TracingIndexSink, TracingNotifier};

/// Everything a command needs, built once from configuration.
#[derive(Debug)]
pub struct App {
    /// The metadata backend.
    pub backend: MetadataBackend,
    /// Store creation and lookup.
    pub stores: StoreService,
    /// Task submission.
    pub pipeline: MutationPipeline,
    groups: Arc<dyn GroupMembershipProvider>,
}

impl App {
    /// Connect the backend and start the store queues.
    pub async fn start(config: &AppConfig) -> AppResult<Self> {
        // ── Step 1: Metadata backend ──
        let backend = MetadataBackend::connect(&config.database).await?;
        let metadata = backend.store();

        // ── Step 2: Store providers ──
        let storage = StorageManager::new();
        let stores = StoreService::new(metadata.clone(), storage.clone(), config.storage.clone());
        stores.attach_all().await?;

        // ── Step 3: Group membership ──
        let groups: Arc<dyn GroupMembershipProvider> = Arc::new(CachedGroupMembership::new(
            Arc::new(StaticGroupMembership::from_config(&config.groups)?),
            &config.groups,
        ));

        // ── Step 4: Task pipeline ──
        let services = PipelineServices::new(
            metadata,
            storage,
            Arc::new(TracingIndexSink),
            Arc::new(TracingNotifier),
            &config.worker,
        );
        for store in stores.list().await? {
            services.queues.register_store(store.id);
        }
        info!(queues = services.queues.len(), "Task pipeline ready");

        Ok(Self {
            backend,
            stores,
            pipeline: MutationPipeline::new(services),
            groups,
        })
    }

    /// The request context of `user`. Without a user the nil id is used,
    /// which belongs to no group unless configured.
    pub async fn context(&self, user: Option<Uuid>) -> AppResult<RequestContext> {
        let user_id = UserId::from_uuid(user.unwrap_or(Uuid::nil()));
        RequestContext::resolve(user_id, self.groups.as_ref()).await
    }

    /// Parse `<store>:<path>` into a reference.
    pub async fn locate(&self, location: &str) -> AppResult<ResourceRef> {
        let (store_name, path) = location.split_once(':').ok_or_else(|| {
            AppError::validation(format!("Expected <store>:<path>, got '{location}'"))
        })?;
        let store = self.stores.get_by_name(store_name).await?;
        Ok(ResourceRef::path(store.id, path))
    }

    /// Look up the resource at a location, without permission bits.
    pub async fn resource_at(&self, location: &str) -> AppResult<(ResourceRef, Resource)> {
        let reference = self.locate(location).await?;
        let services = self.pipeline.services();
        let node_id = services.trees.lookup(&reference).await?;
        let resource = services.repo.resource(node_id).await?;
        Ok((reference, resource))
    }

    /// Close the backend.
    pub async fn shutdown(self) {
        self.backend.close().await;
    }
}
