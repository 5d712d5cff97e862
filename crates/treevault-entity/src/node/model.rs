//! Node and closure row models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use treevault_core::types::NodeId;

/// A position in a store's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Node {
    /// Sequence-generated node identifier.
    pub id: NodeId,
    /// Parent node, `None` for a store root.
    pub parent_id: Option<NodeId>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// When the node was last renamed or relocated.
    pub updated_at: DateTime<Utc>,
    /// Node name (the last path segment).
    pub name: String,
}

impl Node {
    /// Whether this node is a store root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// One ancestor/descendant pair of the closure table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClosureRow {
    /// Row identifier.
    pub link_id: i64,
    /// The ancestor end of the pair.
    pub ancestor_id: NodeId,
    /// The descendant end of the pair.
    pub descendant_id: NodeId,
    /// Number of edges between the two. Zero for the self row.
    pub depth: i32,
}

/// A closure row flattened together with the node it describes.
///
/// For descendant queries the described node is the descendant; for
/// ancestor queries it is the ancestor. `node_id` always names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClosureJoinedRow {
    /// Row identifier.
    pub link_id: i64,
    /// The ancestor end of the pair.
    pub ancestor_id: NodeId,
    /// The descendant end of the pair.
    pub descendant_id: NodeId,
    /// Number of edges between the two.
    pub depth: i32,
    /// The node this row describes.
    pub node_id: NodeId,
    /// That node's parent.
    pub parent_id: Option<NodeId>,
    /// That node's name.
    pub name: String,
    /// When that node was created.
    pub created_at: DateTime<Utc>,
    /// When that node was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ClosureJoinedRow {
    /// The node portion of the row.
    pub fn to_node(&self) -> Node {
        Node {
            id: self.node_id,
            parent_id: self.parent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            name: self.name.clone(),
        }
    }
}
