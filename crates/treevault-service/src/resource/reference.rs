//! References to resources that are resolved when a task runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use treevault_core::types::{NodeId, StoreId};

/// A resource named either by node id or by its path inside a store.
///
/// Path references are looked up when the task runs, so a task may name
/// a resource that an earlier task on the same queue creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "lowercase")]
pub enum ResourceRef {
    /// A node id.
    Node(NodeId),
    /// A store-relative path such as `/docs/report.txt`. `/` or the empty
    /// path is the store root.
    Path {
        /// The store.
        store_id: StoreId,
        /// Forward-slash separated path.
        path: String,
    },
}

impl ResourceRef {
    /// Reference by path.
    pub fn path(store_id: StoreId, path: impl Into<String>) -> Self {
        Self::Path {
            store_id,
            path: path.into(),
        }
    }

    /// The path segments of a path reference, empty for the root.
    pub fn segments(path: &str) -> impl Iterator<Item = &str> {
        path.split('/').filter(|segment| !segment.is_empty())
    }
}

impl From<NodeId> for ResourceRef {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Path { store_id, path } => write!(f, "store {store_id}:{path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_skip_empty() {
        let segments: Vec<&str> = ResourceRef::segments("/a//b/").collect();
        assert_eq!(segments, vec!["a", "b"]);
        assert_eq!(ResourceRef::segments("/").count(), 0);
    }
}
