//! Resource-related domain events.

use serde::{Deserialize, Serialize};

use crate::types::{NodeId, StoreId};

/// Events related to directory and file mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResourceEvent {
    /// A directory was created.
    DirectoryAdded {
        /// The new directory node.
        node_id: NodeId,
        /// The parent directory.
        parent_id: NodeId,
        /// The store it belongs to.
        store_id: StoreId,
        /// The directory name.
        name: String,
    },
    /// A file was added to a directory.
    FileAdded {
        /// The new file node.
        node_id: NodeId,
        /// The containing directory.
        parent_id: NodeId,
        /// The store it belongs to.
        store_id: StoreId,
        /// The file name.
        name: String,
        /// The file size in bytes.
        size_bytes: i64,
    },
    /// An existing file's bytes were replaced.
    FileReplaced {
        /// The file node.
        node_id: NodeId,
        /// The new file size in bytes.
        size_bytes: i64,
    },
    /// A resource moved to a new parent directory.
    Moved {
        /// The moved node.
        node_id: NodeId,
        /// The previous parent directory.
        from_parent_id: NodeId,
        /// The new parent directory.
        to_parent_id: NodeId,
    },
    /// A resource and its subtree were removed.
    Removed {
        /// The removed node.
        node_id: NodeId,
        /// The directory it was removed from.
        parent_id: Option<NodeId>,
        /// Store-relative path at removal time.
        relative_path: String,
    },
    /// A resource's name, description, or access groups changed.
    Updated {
        /// The updated node.
        node_id: NodeId,
        /// Fields that changed.
        changed_fields: Vec<String>,
    },
    /// A zip archive was produced.
    Exported {
        /// Number of files in the archive.
        file_count: u64,
        /// Absolute archive path.
        archive_path: String,
    },
}
