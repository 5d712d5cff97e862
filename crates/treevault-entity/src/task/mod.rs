//! Pipeline task state and progress snapshots.

pub mod progress;

pub use progress::{TaskProgress, TaskState};
