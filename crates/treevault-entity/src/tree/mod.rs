//! Arena tree assembled from flat parent/child rows.
//!
//! The tree owns its values in a `Vec`; nodes refer to each other by
//! index. The root is always index 0.

pub mod arena;
pub mod builder;

pub use arena::{Tree, TreeNode};
pub use builder::TreeBuilder;

use treevault_core::types::NodeId;

use crate::node::ClosureJoinedRow;

/// A row that knows its own node id and its parent's.
pub trait TreeRow {
    /// The node this row describes.
    fn row_id(&self) -> NodeId;
    /// The parent of that node.
    fn row_parent_id(&self) -> Option<NodeId>;
    /// The node's name.
    fn row_name(&self) -> &str;
}

impl TreeRow for ClosureJoinedRow {
    fn row_id(&self) -> NodeId {
        self.node_id
    }

    fn row_parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    fn row_name(&self) -> &str {
        &self.name
    }
}
