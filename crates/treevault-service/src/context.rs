//! The acting user of a request.

use chrono::{DateTime, Utc};

use treevault_auth::acl::{GroupMembershipProvider, GroupSet, PermissionChecker};
use treevault_core::result::AppResult;
use treevault_core::types::UserId;

/// Who is acting, and the groups they were resolved to for this request.
///
/// Groups are looked up once per request, so a membership change takes
/// effect on the next request rather than halfway through a task.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The acting user.
    pub user_id: UserId,
    /// The user's group codes.
    pub groups: GroupSet,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// A context with explicit groups.
    pub fn new(user_id: UserId, groups: GroupSet) -> Self {
        Self {
            user_id,
            groups,
            request_time: Utc::now(),
        }
    }

    /// Look up the user's groups through `provider`.
    pub async fn resolve(user_id: UserId, provider: &dyn GroupMembershipProvider) -> AppResult<Self> {
        let groups = provider.user_group_codes(user_id).await?;
        Ok(Self::new(user_id, groups))
    }

    /// A permission checker acting for this user.
    pub fn checker(&self) -> PermissionChecker {
        PermissionChecker::new(self.user_id)
    }
}
