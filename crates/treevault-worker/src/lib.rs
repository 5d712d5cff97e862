//! # treevault-worker
//!
//! The mutation pipeline. Every change to a store's tree runs as a task on
//! a FIFO queue owned by that store:
//!
//! - `general` for metadata and disk mutations
//! - `binary` for mirroring file bytes into the metadata store
//! - `index` for search index updates
//!
//! Tasks publish their progress on a watch channel. A task that spawns
//! children on other queues is `Done` only after every child has reported.

pub mod events;
pub mod manager;
pub mod notify;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod services;
pub mod sinks;
pub mod task;
pub mod tasks;

pub use events::EventBus;
pub use manager::TaskManager;
pub use notify::NotificationDispatcher;
pub use pipeline::MutationPipeline;
pub use progress::{ProgressHandle, ProgressListener};
pub use registry::{Concern, TaskManagerRegistry};
pub use services::PipelineServices;
pub use sinks::{ChangeNotifier, SearchIndexSink, TracingIndexSink, TracingNotifier};
pub use task::{Task, TaskHandle};
pub use tasks::{AddFileRequest, ExportResult, ResourceChanges};
