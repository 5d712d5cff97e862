//! Progress reporting for running tasks.
//!
//! Each task owns a [`ProgressHandle`]. Jobs completed by a child task are
//! also credited to its parent, so a parent reaches `Done` only once its
//! own `run` has returned and every job it counted has been reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use treevault_core::types::TaskId;
use treevault_entity::task::{TaskProgress, TaskState};

/// Receives every progress snapshot of a task.
pub trait ProgressListener: Send + Sync + 'static {
    /// Called after each change.
    fn on_progress(&self, progress: &TaskProgress);
}

impl<F> ProgressListener for F
where
    F: Fn(&TaskProgress) + Send + Sync + 'static,
{
    fn on_progress(&self, progress: &TaskProgress) {
        self(progress)
    }
}

struct ProgressInner {
    tx: watch::Sender<TaskProgress>,
    listeners: Mutex<Vec<Arc<dyn ProgressListener>>>,
    parent: Option<ProgressHandle>,
    // Set once `fail` has credited the remaining jobs upward.
    detached: AtomicBool,
}

/// Shared progress state of one task.
#[derive(Clone)]
pub struct ProgressHandle {
    inner: Arc<ProgressInner>,
}

impl std::fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHandle")
            .field("progress", &*self.inner.tx.borrow())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

impl ProgressHandle {
    /// Progress for a newly queued task.
    pub fn new(task_id: TaskId, task_name: &str, parent: Option<ProgressHandle>) -> Self {
        let (tx, _rx) = watch::channel(TaskProgress::pending(task_id, task_name));
        Self {
            inner: Arc::new(ProgressInner {
                tx,
                listeners: Mutex::new(Vec::new()),
                parent,
                detached: AtomicBool::new(false),
            }),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> TaskProgress {
        self.inner.tx.borrow().clone()
    }

    /// A receiver that observes every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<TaskProgress> {
        self.inner.tx.subscribe()
    }

    /// Register a listener. It first sees the current snapshot.
    pub fn add_listener(&self, listener: Arc<dyn ProgressListener>) {
        listener.on_progress(&self.snapshot());
        self.listeners().push(listener);
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Arc<dyn ProgressListener>>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, change: impl FnOnce(&mut TaskProgress)) {
        self.inner.tx.send_modify(|progress| {
            change(progress);
            if progress.state == TaskState::Running
                && progress.run_finished
                && progress.jobs_complete()
            {
                progress.state = TaskState::Done;
            }
        });

        let snapshot = self.snapshot();
        let listeners: Vec<_> = self.listeners().clone();
        for listener in listeners {
            listener.on_progress(&snapshot);
        }
    }

    /// Mark the task as picked up by a worker.
    pub fn start(&self) {
        self.update(|p| {
            p.state = TaskState::Running;
            p.message = "running".to_string();
        });
    }

    /// Set the total number of jobs this task will report.
    pub fn set_job_count(&self, job_count: u64) {
        self.update(|p| p.job_count = Some(job_count));
    }

    /// Replace the status line.
    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|p| p.message = message);
    }

    /// Report `jobs` completed jobs, here and on every ancestor.
    ///
    /// After `fail`, jobs are still counted here but no longer reach the
    /// parent, which was already credited with the whole remainder.
    pub fn advance(&self, jobs: u64) {
        self.update(|p| p.completed_jobs += jobs);
        if self.inner.detached.load(Ordering::SeqCst) {
            return;
        }
        if let Some(parent) = &self.inner.parent {
            parent.advance(jobs);
        }
    }

    /// Record that `run` returned successfully.
    pub fn finish_run(&self) {
        self.update(|p| {
            p.run_finished = true;
            p.message = "finished".to_string();
        });
    }

    /// Mark the task failed. Jobs it never reported are credited to the
    /// parent so the parent can still complete.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.inner.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut remaining = 0;
        self.update(|p| {
            remaining = p
                .job_count
                .map(|total| total.saturating_sub(p.completed_jobs))
                .unwrap_or(0);
            p.run_finished = true;
            p.message = reason.clone();
            p.state = TaskState::Failed(reason);
        });
        if let Some(parent) = &self.inner.parent {
            if remaining > 0 {
                parent.advance(remaining);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_done_waits_for_children() {
        let parent = ProgressHandle::new(TaskId::new(), "add_file", None);
        parent.start();
        parent.set_job_count(3);
        parent.advance(1);

        let index = ProgressHandle::new(TaskId::new(), "index", Some(parent.clone()));
        let binary = ProgressHandle::new(TaskId::new(), "mirror_binary", Some(parent.clone()));

        parent.finish_run();
        assert_eq!(parent.snapshot().state, TaskState::Running);

        index.start();
        index.set_job_count(1);
        index.advance(1);
        index.finish_run();
        assert_eq!(index.snapshot().state, TaskState::Done);
        assert_eq!(parent.snapshot().completed_jobs, 2);

        binary.start();
        binary.set_job_count(1);
        binary.fail("disk gone");
        let done = parent.snapshot();
        assert_eq!(done.completed_jobs, 3);
        assert_eq!(done.state, TaskState::Done);
    }

    #[test]
    fn test_failed_task_stops_crediting_parent() {
        let parent = ProgressHandle::new(TaskId::new(), "copy_directory", None);
        parent.start();
        parent.set_job_count(4);

        let task = ProgressHandle::new(TaskId::new(), "copy_file", Some(parent.clone()));
        task.start();
        task.set_job_count(3);
        task.advance(1);

        // Still running when its owner fails; keeps reporting afterwards.
        let index = ProgressHandle::new(TaskId::new(), "index", Some(task.clone()));
        index.start();
        index.set_job_count(1);

        task.fail("destination is gone");
        assert_eq!(parent.snapshot().completed_jobs, 3);

        index.advance(1);
        index.finish_run();
        task.fail("reported twice");

        let parent_progress = parent.snapshot();
        assert_eq!(parent_progress.completed_jobs, 3);
        assert!(parent_progress.completed_jobs <= parent_progress.job_count.unwrap_or(0));
        assert_eq!(task.snapshot().completed_jobs, 2);
        assert_eq!(
            task.snapshot().state,
            TaskState::Failed("destination is gone".to_string())
        );
    }

    #[test]
    fn test_listeners_see_each_change() {
        let progress = ProgressHandle::new(TaskId::new(), "remove_file", None);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        progress.add_listener(Arc::new(move |_: &TaskProgress| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        progress.start();
        progress.set_job_count(1);
        progress.advance(1);
        progress.finish_run();

        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(progress.snapshot().progress_percent(), Some(100));
    }
}
