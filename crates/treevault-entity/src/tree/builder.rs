//! Assembly of flat rows into an arena tree.

use std::collections::{HashMap, HashSet};

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::NodeId;

use super::TreeRow;
use super::arena::{Tree, TreeNode};

/// Builds [`Tree`]s from rows returned by descendant and ancestor queries.
///
/// The builder knows nothing about permissions; it only links rows by
/// their node and parent ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeBuilder;

impl TreeBuilder {
    /// Build a tree rooted at `root_id` from a descendant query.
    ///
    /// Children keep the order in which their rows appear. Rows whose
    /// parent never appears are not attached.
    pub fn build_top_down<T: TreeRow>(rows: Vec<T>, root_id: NodeId) -> AppResult<Tree<T>> {
        let mut root = None;
        let mut by_parent: HashMap<NodeId, Vec<T>> = HashMap::new();

        for row in rows {
            if row.row_id() == root_id {
                root = Some(row);
            } else if let Some(parent) = row.row_parent_id() {
                by_parent.entry(parent).or_default().push(row);
            }
        }

        let root =
            root.ok_or_else(|| AppError::not_found(format!("Tree root {root_id} not in rows")))?;

        let mut tree = Tree::with_root(root);
        let mut pending = vec![(Tree::<T>::ROOT, root_id)];
        while let Some((index, node_id)) = pending.pop() {
            if let Some(children) = by_parent.remove(&node_id) {
                for child in children {
                    let child_id = child.row_id();
                    let child_index = tree.push_child(index, child);
                    pending.push((child_index, child_id));
                }
            }
        }

        Ok(tree)
    }

    /// Build the chain from the root-most ancestor down to the leaf of an
    /// ancestor query.
    ///
    /// The root is the row whose parent is not among the rows.
    pub fn build_bottom_up<T: TreeRow>(rows: Vec<T>) -> AppResult<Tree<T>> {
        let ids: HashSet<NodeId> = rows.iter().map(|r| r.row_id()).collect();
        let root_id = rows
            .iter()
            .find(|r| r.row_parent_id().is_none_or(|p| !ids.contains(&p)))
            .map(|r| r.row_id())
            .ok_or_else(|| AppError::not_found("Ancestor rows have no root"))?;

        Self::build_top_down(rows, root_id)
    }

    /// Reverse a linear chain so the former leaf becomes the root.
    ///
    /// Fails with a structural error if any node has more than one child.
    pub fn reverse_linear_chain<T>(tree: Tree<T>) -> AppResult<Tree<T>> {
        let mut chain = Vec::with_capacity(tree.len());
        let mut current = Some(Tree::<T>::ROOT);
        while let Some(index) = current {
            chain.push(index);
            current = match tree.children(index) {
                [] => None,
                [only] => Some(*only),
                many => {
                    return Err(AppError::structural(format!(
                        "Cannot reverse a chain: node at position {index} has {} children",
                        many.len()
                    )));
                }
            };
        }

        let mut slots: Vec<Option<T>> = tree.into_nodes().into_iter().map(|n| Some(n.value)).collect();
        let last = chain.len() - 1;
        let mut nodes = Vec::with_capacity(chain.len());
        for (position, original) in chain.iter().rev().enumerate() {
            let value = slots[*original]
                .take()
                .ok_or_else(|| AppError::internal("Chain visited a node twice"))?;
            nodes.push(TreeNode {
                value,
                parent: position.checked_sub(1),
                children: if position < last {
                    vec![position + 1]
                } else {
                    Vec::new()
                },
            });
        }

        Ok(Tree::from_nodes(nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treevault_core::error::ErrorKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
        parent: Option<i64>,
        name: &'static str,
    }

    impl TreeRow for Row {
        fn row_id(&self) -> NodeId {
            NodeId(self.id)
        }

        fn row_parent_id(&self) -> Option<NodeId> {
            self.parent.map(NodeId)
        }

        fn row_name(&self) -> &str {
            self.name
        }
    }

    fn row(id: i64, parent: Option<i64>, name: &'static str) -> Row {
        Row { id, parent, name }
    }

    #[test]
    fn test_top_down_keeps_row_order() {
        // Rows as a descendant query returns them: ordered by (depth, name).
        let rows = vec![
            row(1, None, "root"),
            row(3, Some(1), "alpha"),
            row(2, Some(1), "beta"),
            row(4, Some(3), "inner"),
        ];
        let tree = TreeBuilder::build_top_down(rows, NodeId(1)).expect("build");

        assert_eq!(tree.len(), 4);
        let names: Vec<_> = tree.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["root", "alpha", "inner", "beta"]);
    }

    #[test]
    fn test_top_down_subtree_root_with_parent() {
        let rows = vec![row(5, Some(1), "sub"), row(6, Some(5), "leaf")];
        let tree = TreeBuilder::build_top_down(rows, NodeId(5)).expect("build");
        assert_eq!(tree.root().name, "sub");
        assert_eq!(tree.children(0).len(), 1);
    }

    #[test]
    fn test_top_down_missing_root() {
        let rows = vec![row(2, Some(1), "child")];
        let err = TreeBuilder::build_top_down(rows, NodeId(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_bottom_up_then_reverse() {
        // Ancestor query ordered by depth DESC: root-most first, leaf last.
        let rows = vec![
            row(1, None, "root"),
            row(2, Some(1), "a"),
            row(3, Some(2), "b"),
            row(4, Some(3), "leaf"),
        ];
        let chain = TreeBuilder::build_bottom_up(rows).expect("build");
        assert_eq!(chain.root().name, "root");

        let reversed = TreeBuilder::reverse_linear_chain(chain).expect("reverse");
        let names: Vec<_> = reversed.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["leaf", "b", "a", "root"]);
        assert_eq!(reversed.parent(0), None);
        assert_eq!(reversed.children(3), &[] as &[usize]);
    }

    #[test]
    fn test_bottom_up_partial_chain() {
        // A depth-limited ancestor query does not reach the store root.
        let rows = vec![row(2, Some(1), "a"), row(3, Some(2), "leaf")];
        let chain = TreeBuilder::build_bottom_up(rows).expect("build");
        assert_eq!(chain.root().name, "a");
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_reverse_rejects_branching() {
        let rows = vec![
            row(1, None, "root"),
            row(2, Some(1), "a"),
            row(3, Some(1), "b"),
        ];
        let tree = TreeBuilder::build_top_down(rows, NodeId(1)).expect("build");
        let err = TreeBuilder::reverse_linear_chain(tree).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
    }
}
