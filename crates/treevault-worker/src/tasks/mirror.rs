//! Binary mirror refresh.

use async_trait::async_trait;
use tracing::warn;

use treevault_core::result::AppResult;
use treevault_core::types::NodeId;
use treevault_service::ResourceRepository;

use crate::progress::ProgressHandle;
use crate::task::Task;

/// Copies a file's bytes into the binary mirror when the store's threshold
/// allows it. Failures are logged and the task still completes.
#[derive(Debug)]
pub struct MirrorBinaryTask {
    repo: ResourceRepository,
    file_id: NodeId,
}

impl MirrorBinaryTask {
    /// Create a mirror task for one file.
    pub fn new(repo: ResourceRepository, file_id: NodeId) -> Self {
        Self { repo, file_id }
    }
}

#[async_trait]
impl Task for MirrorBinaryTask {
    type Output = bool;

    fn name(&self) -> &'static str {
        "mirror_binary"
    }

    async fn run(self, progress: &ProgressHandle) -> AppResult<bool> {
        progress.set_job_count(1);
        let mirrored = self.repo.mirror_binary(self.file_id).await.unwrap_or_else(|e| {
            warn!(node_id = %self.file_id, error = %e, "Binary mirroring failed");
            false
        });
        progress.advance(1);
        Ok(mirrored)
    }
}
