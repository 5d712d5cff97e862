//! Permission resolution while assembling resource trees.
//!
//! Each of read, write, and execute is resolved independently, top-down:
//!
//! 1. A node that declares a group for the kind gets the bit iff the
//!    caller's groups intersect it, and that group becomes the branch's
//!    inherited group.
//! 2. Otherwise the bit is true under an `Allow` store rule; under `Deny`
//!    it is true if the inherited group intersects the caller's groups,
//!    and else equals the parent's bit.

use treevault_core::result::AppResult;
use treevault_core::types::Permission;
use treevault_entity::resource::{AccessBits, PathResource, Resource};
use treevault_entity::store::AccessRule;
use treevault_entity::tree::{Tree, TreeBuilder};

use super::groups::GroupSet;

/// Resolution state carried from a node to its children.
#[derive(Debug, Clone, Default)]
struct Inherited {
    groups: [Option<String>; 3],
    bits: AccessBits,
}

impl Inherited {
    fn from_resolved(resource: &PathResource) -> Self {
        Self {
            groups: Permission::ALL.map(|p| declared(resource, p).map(str::to_string)),
            bits: resource.access,
        }
    }
}

fn declared(resource: &PathResource, permission: Permission) -> Option<&str> {
    resource
        .groups
        .get(permission)
        .filter(|group| !group.trim().is_empty())
}

/// Builds resource trees stamped with the caller's resolved access bits.
#[derive(Debug, Clone, Copy)]
pub struct PermissionTreeBuilder<'a> {
    groups: &'a GroupSet,
    rule: AccessRule,
}

impl<'a> PermissionTreeBuilder<'a> {
    /// Resolve for a caller with `groups` in a store whose default is `rule`.
    pub fn new(groups: &'a GroupSet, rule: AccessRule) -> Self {
        Self { groups, rule }
    }

    fn resolve(&self, resource: &mut PathResource, parent: &Inherited) -> Inherited {
        let mut next = parent.clone();
        for permission in Permission::ALL {
            let slot = permission.index();
            let bit = match declared(resource, permission) {
                Some(group) => {
                    next.groups[slot] = Some(group.to_string());
                    self.groups.intersects(group)
                }
                None if self.rule == AccessRule::Allow => true,
                None => match &parent.groups[slot] {
                    Some(group) if self.groups.intersects(group) => true,
                    _ => parent.bits.get(permission),
                },
            };
            next.bits.set(permission, bit);
        }
        resource.access = next.bits;
        next
    }

    fn stamp(&self, tree: &mut Tree<Resource>, seed: impl Fn(&Resource) -> Option<Inherited>) {
        let mut states: Vec<Option<Inherited>> = vec![None; tree.len()];
        for index in tree.pre_order() {
            let parent = match tree.parent(index) {
                Some(p) => states[p].clone().unwrap_or_default(),
                None => match seed(tree.value(index)) {
                    Some(state) => {
                        states[index] = Some(state);
                        continue;
                    }
                    None => Inherited::default(),
                },
            };
            let state = self.resolve(tree.value_mut(index).path_mut(), &parent);
            states[index] = Some(state);
        }
    }

    /// Resolve the subtree rooted at `root` in one top-down walk.
    ///
    /// `rows` comes from a descendant query and includes the root row;
    /// `root` carries already resolved bits, which seed the walk.
    pub fn build_path_resource_tree(
        &self,
        rows: Vec<Resource>,
        root: &Resource,
    ) -> AppResult<Tree<Resource>> {
        let mut tree = TreeBuilder::build_top_down(rows, root.node_id())?;
        tree.value_mut(Tree::<Resource>::ROOT).path_mut().access = root.path().access;

        let seed = Inherited::from_resolved(root.path());
        self.stamp(&mut tree, |_| Some(seed.clone()));
        Ok(tree)
    }

    /// Resolve a leaf's ancestor chain from the store root down.
    ///
    /// The root-most row starts from denied bits and no inherited groups.
    /// With `reverse` the returned chain has the leaf as its root, so
    /// `tree.root()` is the resolved leaf.
    pub fn build_parent_path_resource_tree(
        &self,
        rows: Vec<Resource>,
        reverse: bool,
    ) -> AppResult<Tree<Resource>> {
        let mut tree = TreeBuilder::build_bottom_up(rows)?;
        self.stamp(&mut tree, |_| None);
        if reverse {
            TreeBuilder::reverse_linear_chain(tree)
        } else {
            Ok(tree)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use treevault_core::types::{NodeId, StoreId};
    use treevault_entity::resource::{AccessGroups, DirectoryResource, ResourceType};

    fn dir(id: i64, parent: Option<i64>, groups: AccessGroups) -> Resource {
        DirectoryResource {
            resource: PathResource {
                node_id: NodeId(id),
                parent_node_id: parent.map(NodeId),
                store_id: StoreId(1),
                resource_type: ResourceType::Directory,
                path_name: format!("d{id}"),
                relative_path: String::new(),
                description: None,
                groups,
                access: AccessBits::default(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
        .into()
    }

    /// root(G1 for all) -> 2 -> 3 -> 4, nothing declared below the root.
    fn chain() -> Vec<Resource> {
        vec![
            dir(1, None, AccessGroups::all("G1")),
            dir(2, Some(1), AccessGroups::inherit()),
            dir(3, Some(2), AccessGroups::inherit()),
            dir(4, Some(3), AccessGroups::inherit()),
        ]
    }

    #[test]
    fn test_member_reads_three_levels_down() {
        let groups: GroupSet = ["G1"].into_iter().collect();
        let builder = PermissionTreeBuilder::new(&groups, AccessRule::Deny);
        let tree = builder.build_parent_path_resource_tree(chain(), true).unwrap();

        assert_eq!(tree.root().node_id(), NodeId(4));
        assert!(tree.root().path().can(Permission::Read));
        assert!(tree.root().path().can(Permission::Write));
    }

    #[test]
    fn test_non_member_denied_under_deny_rule() {
        let groups: GroupSet = ["OTHER"].into_iter().collect();
        let builder = PermissionTreeBuilder::new(&groups, AccessRule::Deny);
        let tree = builder.build_parent_path_resource_tree(chain(), true).unwrap();

        assert!(!tree.root().path().can(Permission::Read));
        assert!(tree.iter().all(|r| !r.path().can(Permission::Execute)));
    }

    #[test]
    fn test_allow_rule_grants_undeclared_kinds() {
        let groups = GroupSet::empty();
        let builder = PermissionTreeBuilder::new(&groups, AccessRule::Allow);
        let tree = builder.build_parent_path_resource_tree(chain(), false).unwrap();

        // The root declares groups, so it is still denied.
        assert!(!tree.root().path().can(Permission::Read));
        let leaf = tree.position(|r| r.node_id() == NodeId(4)).unwrap();
        assert!(tree.value(leaf).path().can(Permission::Read));
    }

    #[test]
    fn test_declared_group_overrides_inherited() {
        let groups: GroupSet = ["G1"].into_iter().collect();
        let mut rows = chain();
        rows[2] = dir(
            3,
            Some(2),
            AccessGroups {
                read: None,
                write: Some("G2".into()),
                execute: None,
            },
        );
        let builder = PermissionTreeBuilder::new(&groups, AccessRule::Deny);
        let tree = builder.build_parent_path_resource_tree(rows, true).unwrap();

        let leaf = tree.root().path();
        assert!(leaf.can(Permission::Read));
        assert!(!leaf.can(Permission::Write));
    }

    #[test]
    fn test_subtree_seeded_from_resolved_root() {
        let groups: GroupSet = ["G1"].into_iter().collect();
        let builder = PermissionTreeBuilder::new(&groups, AccessRule::Deny);

        let mut root = dir(2, Some(1), AccessGroups::inherit());
        root.path_mut().access = AccessBits {
            can_read: true,
            can_write: false,
            can_execute: false,
        };
        let rows = vec![
            root.clone(),
            dir(3, Some(2), AccessGroups::inherit()),
            dir(
                5,
                Some(2),
                AccessGroups {
                    read: None,
                    write: Some("G1".into()),
                    execute: None,
                },
            ),
        ];

        let tree = builder.build_path_resource_tree(rows, &root).unwrap();
        assert_eq!(tree.len(), 3);
        for r in tree.iter() {
            assert!(r.path().can(Permission::Read));
        }
        let plain = tree.position(|r| r.node_id() == NodeId(3)).unwrap();
        let declared = tree.position(|r| r.node_id() == NodeId(5)).unwrap();
        assert!(!tree.value(plain).path().can(Permission::Write));
        assert!(tree.value(declared).path().can(Permission::Write));
    }
}
