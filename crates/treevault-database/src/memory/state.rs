//! Table state of the in-memory backend.
//!
//! Each method validates before it mutates, so a failed call leaves the
//! state unchanged. Callers hold the write lock for the whole call.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, StoreId};
use treevault_entity::node::{ClosureJoinedRow, ClosureRow, Node};
use treevault_entity::resource::{AccessBits, PathResource, Resource, ResourceType};
use treevault_entity::store::{AccessRule, Store};

#[derive(Debug, Clone)]
pub(crate) struct StoreRecord {
    pub(crate) id: StoreId,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) path: String,
    pub(crate) root_dir_node_id: NodeId,
    pub(crate) max_mirrored_file_size_bytes: i64,
    pub(crate) access_rule: AccessRule,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    next_node_id: i64,
    next_link_id: i64,
    next_store_id: i64,
    nodes: BTreeMap<NodeId, Node>,
    /// Keyed by `(ancestor, descendant)`.
    closure: BTreeMap<(NodeId, NodeId), ClosureRow>,
    pub(crate) resources: HashMap<NodeId, Resource>,
    pub(crate) binaries: HashMap<NodeId, Vec<u8>>,
    pub(crate) stores: BTreeMap<StoreId, StoreRecord>,
}

impl MemoryState {
    pub(crate) fn ensure_node(&self, node_id: NodeId) -> AppResult<&Node> {
        self.nodes
            .get(&node_id)
            .ok_or_else(|| AppError::not_found(format!("Node {node_id} not found")))
    }

    pub(crate) fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    fn next_link(&mut self) -> i64 {
        self.next_link_id += 1;
        self.next_link_id
    }

    pub(crate) fn next_store(&mut self) -> StoreId {
        self.next_store_id += 1;
        StoreId(self.next_store_id)
    }

    fn insert_link(&mut self, ancestor_id: NodeId, descendant_id: NodeId, depth: i32) {
        let link_id = self.next_link();
        self.closure.insert(
            (ancestor_id, descendant_id),
            ClosureRow {
                link_id,
                ancestor_id,
                descendant_id,
                depth,
            },
        );
    }

    pub(crate) fn insert_node(&mut self, parent_id: Option<NodeId>, name: &str) -> AppResult<Node> {
        if let Some(parent) = parent_id {
            self.ensure_node(parent)?;
        }

        self.next_node_id += 1;
        let now = Utc::now();
        let node = Node {
            id: NodeId(self.next_node_id),
            parent_id,
            created_at: now,
            updated_at: now,
            name: name.to_string(),
        };
        self.nodes.insert(node.id, node.clone());
        self.insert_link(node.id, node.id, 0);

        if let Some(parent) = parent_id {
            let above: Vec<(NodeId, i32)> = self
                .closure
                .values()
                .filter(|row| row.descendant_id == parent)
                .map(|row| (row.ancestor_id, row.depth))
                .collect();
            for (ancestor, depth) in above {
                self.insert_link(ancestor, node.id, depth + 1);
            }
        }

        Ok(node)
    }

    pub(crate) fn rename_node(&mut self, node_id: NodeId, name: &str) -> AppResult<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| AppError::not_found(format!("Node {node_id} not found")))?;
        node.name = name.to_string();
        node.updated_at = Utc::now();
        Ok(())
    }

    fn joined(&self, row: &ClosureRow, described: NodeId) -> Option<ClosureJoinedRow> {
        let node = self.nodes.get(&described)?;
        Some(ClosureJoinedRow {
            link_id: row.link_id,
            ancestor_id: row.ancestor_id,
            descendant_id: row.descendant_id,
            depth: row.depth,
            node_id: node.id,
            parent_id: node.parent_id,
            name: node.name.clone(),
            created_at: node.created_at,
            updated_at: node.updated_at,
        })
    }

    pub(crate) fn descendants(&self, node_id: NodeId, max_depth: Option<i32>) -> Vec<ClosureJoinedRow> {
        let mut rows: Vec<ClosureJoinedRow> = self
            .closure
            .range((node_id, NodeId(i64::MIN))..=(node_id, NodeId(i64::MAX)))
            .map(|(_, row)| row)
            .filter(|row| max_depth.is_none_or(|max| row.depth <= max))
            .filter_map(|row| self.joined(row, row.descendant_id))
            .collect();
        rows.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.name.cmp(&b.name)));
        rows
    }

    pub(crate) fn ancestors(&self, node_id: NodeId, max_levels: Option<i32>) -> Vec<ClosureJoinedRow> {
        let mut rows: Vec<ClosureJoinedRow> = self
            .closure
            .values()
            .filter(|row| row.descendant_id == node_id)
            .filter(|row| max_levels.is_none_or(|max| row.depth <= max))
            .filter_map(|row| self.joined(row, row.ancestor_id))
            .collect();
        rows.sort_by(|a, b| b.depth.cmp(&a.depth));
        rows
    }

    pub(crate) fn is_descendant(&self, ancestor_id: NodeId, node_id: NodeId) -> bool {
        self.closure.contains_key(&(ancestor_id, node_id))
    }

    pub(crate) fn prune(&mut self, node_id: NodeId, include_self: bool) -> AppResult<Vec<NodeId>> {
        self.ensure_node(node_id)?;

        let mut doomed: Vec<(i32, NodeId)> = self
            .closure
            .range((node_id, NodeId(i64::MIN))..=(node_id, NodeId(i64::MAX)))
            .map(|(_, row)| row)
            .filter(|row| include_self || row.depth > 0)
            .map(|row| (row.depth, row.descendant_id))
            .collect();
        doomed.sort_by(|a, b| b.0.cmp(&a.0));

        let ids: HashSet<NodeId> = doomed.iter().map(|(_, id)| *id).collect();
        for id in &ids {
            self.binaries.remove(id);
            self.resources.remove(id);
            self.nodes.remove(id);
        }
        self.closure
            .retain(|(ancestor, descendant), _| !ids.contains(ancestor) && !ids.contains(descendant));

        Ok(doomed.into_iter().map(|(_, id)| id).collect())
    }

    pub(crate) fn check_relocation(&self, node_id: NodeId, new_parent_id: NodeId) -> AppResult<()> {
        self.ensure_node(node_id)?;
        self.ensure_node(new_parent_id)?;
        if self.is_descendant(node_id, new_parent_id) {
            return Err(AppError::structural(format!(
                "Cannot move node {node_id} under its own subtree ({new_parent_id})"
            )));
        }
        Ok(())
    }

    /// Caller must run [`Self::check_relocation`] first.
    pub(crate) fn relocate(&mut self, node_id: NodeId, new_parent_id: NodeId) {
        let subtree: Vec<(NodeId, i32)> = self
            .closure
            .range((node_id, NodeId(i64::MIN))..=(node_id, NodeId(i64::MAX)))
            .map(|(_, row)| (row.descendant_id, row.depth))
            .collect();
        let members: HashSet<NodeId> = subtree.iter().map(|(id, _)| *id).collect();

        self.closure.retain(|(ancestor, descendant), _| {
            !(members.contains(descendant) && !members.contains(ancestor))
        });

        let above: Vec<(NodeId, i32)> = self
            .closure
            .values()
            .filter(|row| row.descendant_id == new_parent_id)
            .map(|row| (row.ancestor_id, row.depth))
            .collect();
        for (ancestor, up) in &above {
            for (descendant, down) in &subtree {
                self.insert_link(*ancestor, *descendant, up + down + 1);
            }
        }

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.parent_id = Some(new_parent_id);
            node.updated_at = Utc::now();
        }
    }

    pub(crate) fn find_child(
        &self,
        dir_id: NodeId,
        name: &str,
        resource_type: ResourceType,
        exclude: Option<NodeId>,
    ) -> Option<&Resource> {
        let wanted = name.to_lowercase();
        self.resources.values().find(|r| {
            let path = r.path();
            path.parent_node_id == Some(dir_id)
                && r.resource_type() == resource_type
                && Some(path.node_id) != exclude
                && path.path_name.to_lowercase() == wanted
        })
    }

    pub(crate) fn ensure_unique_sibling(
        &self,
        dir_id: NodeId,
        name: &str,
        resource_type: ResourceType,
        exclude: Option<NodeId>,
    ) -> AppResult<()> {
        if self.find_child(dir_id, name, resource_type, exclude).is_some() {
            return Err(AppError::conflict(
                "A resource with the same name and type already exists in this directory",
            ));
        }
        Ok(())
    }

    pub(crate) fn resource(&self, node_id: NodeId) -> AppResult<&Resource> {
        self.resources
            .get(&node_id)
            .ok_or_else(|| AppError::not_found(format!("Resource {node_id} not found")))
    }

    /// Validate a batch of path updates against the current rows.
    pub(crate) fn check_updates(&self, updates: &[PathResource]) -> AppResult<()> {
        for path in updates {
            let current = self.resource(path.node_id)?;
            if let Some(parent) = path.parent_node_id {
                self.ensure_unique_sibling(parent, &path.path_name, current.resource_type(), Some(path.node_id))?;
            }
        }
        Ok(())
    }

    /// Caller must run [`Self::check_updates`] first.
    pub(crate) fn apply_updates(&mut self, updates: &[PathResource]) {
        let now = Utc::now();
        for path in updates {
            if let Some(resource) = self.resources.get_mut(&path.node_id) {
                let kept = resource.path().clone();
                *resource.path_mut() = PathResource {
                    resource_type: kept.resource_type,
                    access: AccessBits::default(),
                    created_at: kept.created_at,
                    updated_at: now,
                    ..path.clone()
                };
            }
            if let Some(node) = self.nodes.get_mut(&path.node_id) {
                node.name = path.path_name.clone();
                node.updated_at = now;
            }
        }
    }

    pub(crate) fn store(&self, record: &StoreRecord) -> AppResult<Store> {
        let root_dir = self
            .resource(record.root_dir_node_id)?
            .clone()
            .into_directory()?;
        Ok(Store {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            path: record.path.clone(),
            root_dir_node_id: record.root_dir_node_id,
            max_mirrored_file_size_bytes: record.max_mirrored_file_size_bytes,
            access_rule: record.access_rule,
            created_at: record.created_at,
            updated_at: record.updated_at,
            root_dir,
        })
    }
}
