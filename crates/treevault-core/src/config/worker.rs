//! Task pipeline configuration.

use serde::{Deserialize, Serialize};

/// Task pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Directory that receives zip export archives.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    /// Skip directory-changed notifications while an equivalent one is pending.
    #[serde(default = "default_true")]
    pub dedup_notifications: bool,
    /// Capacity of the domain event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            dedup_notifications: default_true(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_export_dir() -> String {
    "./data/exports".to_string()
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    1024
}
