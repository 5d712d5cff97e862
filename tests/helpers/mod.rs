//! Shared setup for pipeline integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use treevault_auth::acl::GroupSet;
use treevault_core::config::{StorageConfig, WorkerConfig};
use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, StoreId, UserId};
use treevault_database::MemoryMetadataStore;
use treevault_entity::resource::{AccessGroups, FileMetaResource, Resource};
use treevault_entity::store::{AccessRule, Store};
use treevault_service::{CreateStoreRequest, RequestContext, ResourceRef, StoreService};
use treevault_storage::StorageManager;
use treevault_worker::{
    Concern, MutationPipeline, PipelineServices, ProgressHandle, SearchIndexSink, Task,
    TracingNotifier,
};

/// Group that owns the test store root.
pub const ADMINS: &str = "admins";

/// One recorded index call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    Add(String),
    Update(String),
    Delete(String),
    Clear(StoreId),
}

/// Index sink that remembers what it was told.
#[derive(Debug, Default)]
pub struct RecordingIndexSink {
    calls: Mutex<Vec<IndexCall>>,
}

impl RecordingIndexSink {
    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: IndexCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SearchIndexSink for RecordingIndexSink {
    async fn add(&self, file: &FileMetaResource) -> AppResult<()> {
        self.record(IndexCall::Add(file.relative_path.clone()));
        Ok(())
    }

    async fn update(&self, file: &FileMetaResource) -> AppResult<()> {
        self.record(IndexCall::Update(file.relative_path.clone()));
        Ok(())
    }

    async fn delete(&self, file: &FileMetaResource) -> AppResult<()> {
        self.record(IndexCall::Delete(file.relative_path.clone()));
        Ok(())
    }

    async fn delete_all(&self, store_id: StoreId) -> AppResult<()> {
        self.record(IndexCall::Clear(store_id));
        Ok(())
    }
}

/// A task that does nothing; waiting on it drains the queue ahead of it.
#[derive(Debug)]
struct Barrier;

#[async_trait]
impl Task for Barrier {
    type Output = ();

    fn name(&self) -> &'static str {
        "barrier"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<()> {
        progress.set_job_count(0);
        Ok(())
    }
}

/// A pipeline over the in-memory backend and a temporary data root.
pub struct TestApp {
    pub dir: TempDir,
    pub metadata: Arc<MemoryMetadataStore>,
    pub stores: StoreService,
    pub pipeline: MutationPipeline,
    pub index: Arc<RecordingIndexSink>,
    pub store: Store,
    pub admin: RequestContext,
}

impl TestApp {
    /// Start the pipeline with one store `docs` whose root belongs to
    /// [`ADMINS`] under the deny rule.
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let metadata = Arc::new(MemoryMetadataStore::new());
        let storage = StorageManager::new();

        let storage_config = StorageConfig {
            data_root: dir.path().join("stores").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let worker_config = WorkerConfig {
            export_dir: dir.path().join("exports").to_string_lossy().into_owned(),
            ..WorkerConfig::default()
        };

        let stores = StoreService::new(metadata.clone(), storage.clone(), storage_config);
        let index = Arc::new(RecordingIndexSink::default());
        let services = PipelineServices::new(
            metadata.clone(),
            storage,
            index.clone(),
            Arc::new(TracingNotifier),
            &worker_config,
        );

        let pipeline = MutationPipeline::new(services);
        let store = create_store(&stores, &pipeline, "docs", AccessRule::Deny).await;

        Self {
            dir,
            metadata,
            stores,
            pipeline,
            index,
            store,
            admin: Self::user(&[ADMINS]),
        }
    }

    /// Create another store owned by [`ADMINS`].
    pub async fn create_store(&self, name: &str, access_rule: AccessRule) -> Store {
        create_store(&self.stores, &self.pipeline, name, access_rule).await
    }

    /// A fresh user in `groups`.
    pub fn user(groups: &[&str]) -> RequestContext {
        RequestContext::new(UserId::new(), groups.iter().copied().collect::<GroupSet>())
    }

    /// Path reference into the default store.
    pub fn at(&self, path: &str) -> ResourceRef {
        ResourceRef::path(self.store.id, path)
    }

    /// Write a local source file under the temp dir.
    pub fn source_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join("sources").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Create a directory as admin and wait for it.
    pub async fn mkdir(&self, parent: &str, name: &str, groups: AccessGroups) -> NodeId {
        self.pipeline
            .add_directory(&self.admin, self.at(parent), name, None, groups)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap()
            .node_id
    }

    /// Add a file as admin and wait for it.
    pub async fn put(&self, dir: &str, name: &str, contents: &[u8]) -> FileMetaResource {
        let source = self.source_file(name, contents);
        self.pipeline
            .add_file(
                &self.admin,
                treevault_worker::AddFileRequest {
                    dir: self.at(dir),
                    source,
                    name: Some(name.to_string()),
                    description: None,
                    groups: AccessGroups::inherit(),
                    replace_existing: false,
                },
            )
            .await
            .unwrap()
            .wait()
            .await
            .unwrap()
    }

    /// Names of the first-level children of `path`, as admin.
    pub async fn child_names(&self, path: &str) -> Vec<String> {
        let trees = &self.pipeline.services().trees;
        let dir = trees.lookup(&self.at(path)).await.unwrap();
        trees
            .children(&self.admin, dir)
            .await
            .unwrap()
            .iter()
            .map(|r| r.path().path_name.clone())
            .collect()
    }

    /// Resolve `path` in the default store for `ctx`.
    pub async fn resolve(&self, ctx: &RequestContext, path: &str) -> AppResult<Resource> {
        self.pipeline.services().trees.resolve_ref(ctx, &self.at(path)).await
    }

    /// Wait until everything already queued for `concern` has run.
    pub async fn drain(&self, store_id: StoreId, concern: Concern) {
        self.pipeline
            .services()
            .queue(store_id, concern)
            .submit(Barrier)
            .unwrap()
            .wait()
            .await
            .unwrap();
    }

    /// Disk location of a store-relative path.
    pub fn disk(&self, store: &Store, relative_path: &str) -> PathBuf {
        PathBuf::from(&store.path).join(relative_path.trim_start_matches('/'))
    }
}

async fn create_store(
    stores: &StoreService,
    pipeline: &MutationPipeline,
    name: &str,
    access_rule: AccessRule,
) -> Store {
    let store = stores
        .create(CreateStoreRequest {
            name: name.to_string(),
            description: None,
            path: None,
            max_mirrored_file_size_bytes: Some(1024),
            access_rule,
            root_groups: AccessGroups::all(ADMINS),
        })
        .await
        .unwrap();
    pipeline.services().queues.register_store(store.id);
    store
}
