//! On-disk storage configuration.

use serde::{Deserialize, Serialize};

/// Storage layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory under which store roots are created when no explicit path is given.
    #[serde(default = "default_data_root")]
    pub data_root: String,
    /// Suffix of the sibling directory reserved for a store's search index.
    #[serde(default = "default_index_dir_suffix")]
    pub index_dir_suffix: String,
    /// Mirroring threshold applied to new stores that do not set one.
    #[serde(default = "default_max_mirrored")]
    pub default_max_mirrored_file_size_bytes: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            index_dir_suffix: default_index_dir_suffix(),
            default_max_mirrored_file_size_bytes: default_max_mirrored(),
        }
    }
}

fn default_data_root() -> String {
    "./data/stores".to_string()
}

fn default_index_dir_suffix() -> String {
    ".index".to_string()
}

fn default_max_mirrored() -> i64 {
    // 5 MiB
    5 * 1024 * 1024
}
