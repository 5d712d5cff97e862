//! Task state machine and progress snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use treevault_core::types::TaskId;

/// Lifecycle of a pipeline task: `Pending -> Running -> Done | Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum TaskState {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// Running, or finished its own work while child tasks are outstanding.
    Running,
    /// The task and every child it spawned have completed.
    Done,
    /// The task failed.
    Failed(String),
}

impl TaskState {
    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of a task, published on its progress channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Task identifier.
    pub task_id: TaskId,
    /// Task kind, such as `add_file`.
    pub task_name: String,
    /// Current state.
    pub state: TaskState,
    /// Total job count, `None` until the task has computed it.
    pub job_count: Option<u64>,
    /// Jobs completed so far, including those reported by child tasks.
    pub completed_jobs: u64,
    /// Latest human-readable status line.
    pub message: String,
    /// Whether the task's own `run` has returned.
    pub run_finished: bool,
}

impl TaskProgress {
    /// Create the initial snapshot of a queued task.
    pub fn pending(task_id: TaskId, task_name: impl Into<String>) -> Self {
        Self {
            task_id,
            task_name: task_name.into(),
            state: TaskState::Pending,
            job_count: None,
            completed_jobs: 0,
            message: "queued".to_string(),
            run_finished: false,
        }
    }

    /// Percentage complete, `None` while the job count is unknown.
    pub fn progress_percent(&self) -> Option<u8> {
        match self.job_count {
            Some(0) => Some(100),
            Some(total) => {
                let done = self.completed_jobs.min(total);
                Some(((done * 100) / total) as u8)
            }
            None => None,
        }
    }

    /// Whether every counted job has been reported.
    pub fn jobs_complete(&self) -> bool {
        self.job_count.is_none_or(|total| self.completed_jobs >= total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_unknown_until_counted() {
        let mut progress = TaskProgress::pending(TaskId::new(), "copy_directory");
        assert_eq!(progress.progress_percent(), None);

        progress.job_count = Some(8);
        progress.completed_jobs = 2;
        assert_eq!(progress.progress_percent(), Some(25));
        assert!(!progress.jobs_complete());

        progress.completed_jobs = 9;
        assert_eq!(progress.progress_percent(), Some(100));
        assert!(progress.jobs_complete());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Failed("boom".into()).is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }
}
