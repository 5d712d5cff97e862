//! Permission checks against resolved access bits.

use tracing::debug;

use treevault_core::error::{AppError, DeniedAccess};
use treevault_core::result::AppResult;
use treevault_core::types::{Permission, UserId};
use treevault_entity::resource::PathResource;

/// Turns a missing bit into a permission error naming the acting user.
#[derive(Debug, Clone, Copy)]
pub struct PermissionChecker {
    user_id: UserId,
}

impl PermissionChecker {
    /// A checker acting for `user_id`.
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    /// Fail unless `resource` has the resolved `permission` bit.
    pub fn require(&self, resource: &PathResource, permission: Permission) -> AppResult<()> {
        if resource.can(permission) {
            return Ok(());
        }
        debug!(
            user_id = %self.user_id,
            node_id = %resource.node_id,
            permission = %permission,
            "Permission denied"
        );
        Err(AppError::permission_denied(DeniedAccess {
            node_id: resource.node_id,
            path: resource.relative_path.clone(),
            permission,
            user_id: self.user_id,
        }))
    }

    /// Fail on the first missing bit of `permissions`.
    pub fn require_all(&self, resource: &PathResource, permissions: &[Permission]) -> AppResult<()> {
        permissions
            .iter()
            .try_for_each(|permission| self.require(resource, *permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use treevault_core::error::ErrorKind;
    use treevault_core::types::{NodeId, StoreId};
    use treevault_entity::resource::{AccessBits, AccessGroups, ResourceType};

    #[test]
    fn test_denied_error_carries_context() {
        let user = UserId::new();
        let resource = PathResource {
            node_id: NodeId(9),
            parent_node_id: Some(NodeId(1)),
            store_id: StoreId(1),
            resource_type: ResourceType::File,
            path_name: "a.txt".into(),
            relative_path: "/a.txt".into(),
            description: None,
            groups: AccessGroups::inherit(),
            access: AccessBits {
                can_read: true,
                can_write: false,
                can_execute: false,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let checker = PermissionChecker::new(user);
        assert!(checker.require(&resource, Permission::Read).is_ok());

        let err = checker
            .require_all(&resource, &[Permission::Read, Permission::Write])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
        let denied = err.denied.expect("denied context");
        assert_eq!(denied.node_id, NodeId(9));
        assert_eq!(denied.permission, Permission::Write);
        assert_eq!(denied.user_id, user);
    }
}
