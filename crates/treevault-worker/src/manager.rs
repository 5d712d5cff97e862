//! Single-worker FIFO task queues.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::TaskId;

use crate::progress::ProgressHandle;
use crate::task::{Task, TaskHandle};

type QueuedJob = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Runs submitted tasks one at a time, in submission order.
///
/// A panicking or failing task is logged and the worker moves on to the
/// next one.
#[derive(Debug, Clone)]
pub struct TaskManager {
    label: Arc<str>,
    tx: mpsc::UnboundedSender<QueuedJob>,
}

impl TaskManager {
    /// Start a queue and its worker on the current runtime.
    pub fn spawn(label: impl Into<String>) -> Self {
        let label: Arc<str> = Arc::from(label.into());
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedJob>();

        let worker_label = label.clone();
        tokio::spawn(async move {
            tracing::debug!(queue = %worker_label, "Task queue started");
            while let Some(job) = rx.recv().await {
                job.await;
            }
            tracing::debug!(queue = %worker_label, "Task queue stopped");
        });

        Self { label, tx }
    }

    /// The queue label, `<store>:<concern>`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queue a top-level task.
    pub fn submit<T: Task>(&self, task: T) -> AppResult<TaskHandle<T::Output>> {
        self.enqueue(task, None)
    }

    /// Queue a task whose jobs also count toward `parent`.
    pub fn submit_child<T: Task>(
        &self,
        task: T,
        parent: &ProgressHandle,
    ) -> AppResult<TaskHandle<T::Output>> {
        self.enqueue(task, Some(parent.clone()))
    }

    fn enqueue<T: Task>(
        &self,
        task: T,
        parent: Option<ProgressHandle>,
    ) -> AppResult<TaskHandle<T::Output>> {
        let (handle, job) = prepare(task, parent, self.label.clone());
        self.tx
            .send(job)
            .map_err(|_| AppError::internal(format!("Task queue {} is closed", self.label)))?;
        Ok(handle)
    }

    /// Run a task on its own worker, outside every queue.
    pub fn spawn_dedicated<T: Task>(task: T) -> TaskHandle<T::Output> {
        let (handle, job) = prepare(task, None, Arc::from("dedicated"));
        tokio::spawn(job);
        handle
    }
}

fn prepare<T: Task>(
    task: T,
    parent: Option<ProgressHandle>,
    queue: Arc<str>,
) -> (TaskHandle<T::Output>, QueuedJob) {
    let task_id = TaskId::new();
    let name = task.name();
    let progress = ProgressHandle::new(task_id, name, parent);
    let (result_tx, result_rx) = oneshot::channel();

    let job_progress = progress.clone();
    let job = async move {
        job_progress.start();
        tracing::debug!(queue = %queue, task_id = %task_id, task = name, "Task started");

        let outcome = AssertUnwindSafe(task.run(&job_progress))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(AppError::internal(format!("Task {name} panicked"))));

        match &outcome {
            Ok(_) => {
                job_progress.finish_run();
                tracing::info!(queue = %queue, task_id = %task_id, task = name, "Task completed");
            }
            Err(e) => {
                job_progress.fail(e.to_string());
                tracing::error!(queue = %queue, task_id = %task_id, task = name, error = %e, "Task failed");
            }
        }
        let _ = result_tx.send(outcome);
    };

    (
        TaskHandle::new(task_id, progress, result_rx),
        Box::pin(job),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use treevault_entity::task::TaskState;

    struct Record {
        log: Arc<Mutex<Vec<u32>>>,
        value: u32,
        delay_ms: u64,
    }

    #[async_trait]
    impl Task for Record {
        type Output = u32;

        fn name(&self) -> &'static str {
            "record"
        }

        async fn run(self, progress: &ProgressHandle) -> AppResult<u32> {
            progress.set_job_count(1);
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.log.lock().unwrap().push(self.value);
            progress.advance(1);
            Ok(self.value)
        }
    }

    struct Explode;

    #[async_trait]
    impl Task for Explode {
        type Output = ();

        fn name(&self) -> &'static str {
            "explode"
        }

        async fn run(self, _progress: &ProgressHandle) -> AppResult<()> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn test_tasks_run_in_submission_order() {
        let queue = TaskManager::spawn("s:general");
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = [(1, 30), (2, 0), (3, 10)]
            .into_iter()
            .map(|(value, delay_ms)| {
                queue
                    .submit(Record {
                        log: log.clone(),
                        value,
                        delay_ms,
                    })
                    .unwrap()
            })
            .collect();

        for handle in handles {
            handle.wait().await.unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_panic_fails_task_and_queue_continues() {
        let queue = TaskManager::spawn("s:general");
        let failed = queue.submit(Explode).unwrap();
        let next = queue
            .submit(Record {
                log: Arc::new(Mutex::new(Vec::new())),
                value: 7,
                delay_ms: 0,
            })
            .unwrap();

        let err = failed.wait().await.unwrap_err();
        assert!(err.message.contains("panicked"));
        assert_eq!(next.wait().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_dedicated_task_reports_done() {
        let handle = TaskManager::spawn_dedicated(Record {
            log: Arc::new(Mutex::new(Vec::new())),
            value: 1,
            delay_ms: 0,
        });
        let mut rx = handle.subscribe();
        assert_eq!(handle.wait().await.unwrap(), 1);
        rx.wait_for(|p| p.state == TaskState::Done).await.unwrap();
    }
}
