//! The task abstraction and the handle returned on submission.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::TaskId;
use treevault_entity::task::TaskProgress;

use crate::progress::{ProgressHandle, ProgressListener};

/// A unit of work run by a [`TaskManager`](crate::manager::TaskManager).
#[async_trait]
pub trait Task: Send + 'static {
    /// What the task produces on success.
    type Output: Send + 'static;

    /// Short task kind used in logs and progress snapshots.
    fn name(&self) -> &'static str;

    /// Do the work, reporting jobs through `progress`.
    async fn run(self, progress: &ProgressHandle) -> AppResult<Self::Output>;
}

/// A submitted task.
///
/// Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle<O> {
    id: TaskId,
    progress: ProgressHandle,
    result: oneshot::Receiver<AppResult<O>>,
}

impl<O> TaskHandle<O> {
    pub(crate) fn new(
        id: TaskId,
        progress: ProgressHandle,
        result: oneshot::Receiver<AppResult<O>>,
    ) -> Self {
        Self {
            id,
            progress,
            result,
        }
    }

    /// The task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The current progress snapshot.
    pub fn progress(&self) -> TaskProgress {
        self.progress.snapshot()
    }

    /// A receiver that observes every progress change.
    pub fn subscribe(&self) -> watch::Receiver<TaskProgress> {
        self.progress.subscribe()
    }

    /// Be called back on every progress change.
    pub fn register_progress_listener(&self, listener: impl ProgressListener) {
        self.progress.add_listener(Arc::new(listener));
    }

    /// Wait until the task and every child it spawned are finished.
    ///
    /// Returns the task's own error as soon as `run` fails.
    pub async fn wait(self) -> AppResult<O> {
        let Self {
            id,
            progress,
            result,
        } = self;
        let output = result
            .await
            .map_err(|_| AppError::internal(format!("Task {id} stopped without a result")))??;

        let mut rx = progress.subscribe();
        rx.wait_for(|p| p.state.is_terminal())
            .await
            .map_err(|_| AppError::internal(format!("Progress of task {id} was dropped")))?;
        Ok(output)
    }
}
