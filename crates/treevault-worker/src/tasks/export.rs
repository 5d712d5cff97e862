//! Zip export of selected resources.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use treevault_core::error::{AppError, ErrorKind};
use treevault_core::events::ResourceEvent;
use treevault_core::result::AppResult;
use treevault_core::types::{Permission, StoreId};
use treevault_entity::resource::{FileMetaResource, Resource, validate_name};
use treevault_entity::store::Store;
use treevault_service::{RequestContext, ResourceRef};

use crate::progress::ProgressHandle;
use crate::services::PipelineServices;
use crate::task::Task;

/// A written archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    /// Where the archive was written.
    pub archive_path: PathBuf,
    /// Number of files in it.
    pub file_count: u64,
}

/// One archive entry.
#[derive(Debug)]
struct Entry {
    disk_path: PathBuf,
    name: String,
}

/// Write the selected files, and every file under the selected
/// directories, into one zip archive. Entry names are relative to the
/// parent of each selected resource.
#[derive(Debug)]
pub struct ZipExportTask {
    services: PipelineServices,
    ctx: RequestContext,
    targets: Vec<ResourceRef>,
    archive_name: Option<String>,
}

impl ZipExportTask {
    /// Create the task.
    pub fn new(
        services: PipelineServices,
        ctx: RequestContext,
        targets: Vec<ResourceRef>,
        archive_name: Option<String>,
    ) -> Self {
        Self {
            services,
            ctx,
            targets,
            archive_name,
        }
    }

    async fn collect(&self) -> AppResult<Vec<Entry>> {
        let checker = self.ctx.checker();
        let mut stores: HashMap<StoreId, Store> = HashMap::new();
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for target in &self.targets {
            let resource = self.services.trees.resolve_ref(&self.ctx, target).await?;
            checker.require(resource.path(), Permission::Read)?;
            let base = parent_path(&resource.path().relative_path).to_string();

            let files: Vec<FileMetaResource> = match resource {
                Resource::File(file) => vec![file],
                Resource::Directory(dir) => {
                    let tree = self.services.trees.subtree(&self.ctx, dir.node_id, None).await?;
                    tree.into_values()
                        .into_iter()
                        .filter_map(|r| match r {
                            Resource::File(file) => Some(file),
                            Resource::Directory(_) => None,
                        })
                        .collect()
                }
            };

            for file in files {
                checker.require(&file, Permission::Read)?;
                let name = file
                    .relative_path
                    .strip_prefix(base.as_str())
                    .unwrap_or(&file.relative_path)
                    .trim_start_matches('/')
                    .to_string();
                if !seen.insert(name.clone()) {
                    warn!(entry = %name, "Skipping duplicate archive entry");
                    continue;
                }

                if !stores.contains_key(&file.store_id) {
                    let store = self.services.repo.store_of(file.store_id).await?;
                    stores.insert(store.id, store);
                }
                let store = stores
                    .get(&file.store_id)
                    .ok_or_else(|| AppError::internal("Store lookup lost its entry"))?;
                entries.push(Entry {
                    disk_path: self.services.repo.disk_path(store, &file),
                    name,
                });
            }
        }
        Ok(entries)
    }
}

fn parent_path(relative_path: &str) -> &str {
    relative_path
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or("")
}

fn write_archive(path: &Path, entries: &[Entry], progress: &ProgressHandle) -> AppResult<u64> {
    let file = File::create(path).map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to create archive: {}", path.display()),
            e,
        )
    })?;
    let mut zip = zip::ZipWriter::new(file);

    for entry in entries {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(entry.name.as_str(), options)?;
        let mut input = File::open(&entry.disk_path).map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to open {}", entry.disk_path.display()),
                e,
            )
        })?;
        std::io::copy(&mut input, &mut zip)?;
        progress.advance(1);
    }

    zip.finish()?;
    Ok(entries.len() as u64)
}

#[async_trait]
impl Task for ZipExportTask {
    type Output = ExportResult;

    fn name(&self) -> &'static str {
        "zip_export"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<ExportResult> {
        let entries = self.collect().await?;
        progress.set_job_count(entries.len() as u64);

        let export_dir = self.services.export_dir.clone();
        tokio::fs::create_dir_all(&export_dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create export directory: {}", export_dir.display()),
                e,
            )
        })?;
        let archive_name = match &self.archive_name {
            Some(name) => {
                validate_name(name)?;
                name.clone()
            }
            None => format!("export-{}.zip", progress.snapshot().task_id),
        };
        let archive_path = export_dir.join(archive_name);

        let path = archive_path.clone();
        let job_progress = progress.clone();
        let file_count =
            tokio::task::spawn_blocking(move || write_archive(&path, &entries, &job_progress))
                .await
                .map_err(|e| AppError::internal(format!("Archive writer stopped: {e}")))??;

        info!(path = %archive_path.display(), files = file_count, "Export written");
        self.services.events.publish(
            self.ctx.user_id,
            ResourceEvent::Exported {
                file_count,
                archive_path: archive_path.to_string_lossy().into_owned(),
            },
        );
        Ok(ExportResult {
            archive_path,
            file_count,
        })
    }
}
