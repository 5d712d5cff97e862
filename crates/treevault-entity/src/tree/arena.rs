//! Index-based tree storage.

use serde::{Deserialize, Serialize};

/// One slot of the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode<T> {
    /// The row stored at this position.
    pub value: T,
    /// Index of the parent slot. `None` only for the root.
    pub parent: Option<usize>,
    /// Indices of the child slots, in row order.
    pub children: Vec<usize>,
}

/// A rooted tree. Index 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree<T> {
    nodes: Vec<TreeNode<T>>,
}

impl<T> Tree<T> {
    /// Create a single-node tree.
    pub fn with_root(value: T) -> Self {
        Self {
            nodes: vec![TreeNode {
                value,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Append a child under `parent` and return its index.
    pub fn push_child(&mut self, parent: usize, value: T) -> usize {
        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            value,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        index
    }

    /// Index of the root slot.
    pub const ROOT: usize = 0;

    /// The root value.
    pub fn root(&self) -> &T {
        &self.nodes[Self::ROOT].value
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always has a root, so this is never true.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The slot at `index`.
    pub fn node(&self, index: usize) -> &TreeNode<T> {
        &self.nodes[index]
    }

    /// The value at `index`.
    pub fn value(&self, index: usize) -> &T {
        &self.nodes[index].value
    }

    /// Mutable value at `index`.
    pub fn value_mut(&mut self, index: usize) -> &mut T {
        &mut self.nodes[index].value
    }

    /// Child indices of `index`.
    pub fn children(&self, index: usize) -> &[usize] {
        &self.nodes[index].children
    }

    /// Parent index of `index`.
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    /// Number of edges between `index` and the root.
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[index].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }

    /// Indices in pre-order: parents before children, siblings in row order.
    pub fn pre_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.nodes[index].children.iter().rev().copied());
        }
        order
    }

    /// Indices in post-order: children before parents.
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(Self::ROOT, false)];
        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
            } else {
                stack.push((index, true));
                stack.extend(self.nodes[index].children.iter().rev().map(|c| (*c, false)));
            }
        }
        order
    }

    /// Iterate over all values in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pre_order().into_iter().map(move |i| &self.nodes[i].value)
    }

    /// Index of the first value, in pre-order, matching `predicate`.
    pub fn position(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        self.pre_order()
            .into_iter()
            .find(|i| predicate(&self.nodes[*i].value))
    }

    /// Consume the tree and return the root value.
    pub fn into_root(self) -> T {
        self.into_values().swap_remove(Self::ROOT)
    }

    /// Consume the tree and return values in arena order.
    pub fn into_values(self) -> Vec<T> {
        self.nodes.into_iter().map(|n| n.value).collect()
    }

    /// Consume the tree and return the slots in arena order.
    pub(crate) fn into_nodes(self) -> Vec<TreeNode<T>> {
        self.nodes
    }

    /// Build a tree from raw slots. Index 0 must be the root.
    pub(crate) fn from_nodes(nodes: Vec<TreeNode<T>>) -> Self {
        Self { nodes }
    }

    /// Transform every value, keeping the shape.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Tree<U> {
        Tree {
            nodes: self
                .nodes
                .into_iter()
                .map(|n| TreeNode {
                    value: f(n.value),
                    parent: n.parent,
                    children: n.children,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree<&'static str> {
        // root -> (a -> (a1, a2), b)
        let mut tree = Tree::with_root("root");
        let a = tree.push_child(0, "a");
        tree.push_child(0, "b");
        tree.push_child(a, "a1");
        tree.push_child(a, "a2");
        tree
    }

    #[test]
    fn test_pre_order() {
        let tree = sample();
        let values: Vec<_> = tree.pre_order().into_iter().map(|i| *tree.value(i)).collect();
        assert_eq!(values, vec!["root", "a", "a1", "a2", "b"]);
    }

    #[test]
    fn test_post_order() {
        let tree = sample();
        let values: Vec<_> = tree.post_order().into_iter().map(|i| *tree.value(i)).collect();
        assert_eq!(values, vec!["a1", "a2", "a", "b", "root"]);
    }

    #[test]
    fn test_depth_and_position() {
        let tree = sample();
        let a2 = tree.position(|v| *v == "a2").expect("present");
        assert_eq!(tree.depth(a2), 2);
        assert_eq!(tree.depth(Tree::<&str>::ROOT), 0);
        assert!(tree.position(|v| *v == "zzz").is_none());
    }
}
