//! Group membership of the acting user.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;
use uuid::Uuid;

use treevault_core::config::GroupsConfig;
use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::UserId;

/// Group codes a user belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSet(HashSet<String>);

impl GroupSet {
    /// An empty set; such a user matches no declared group.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the user is in the group `code`.
    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    /// Whether any code of a declared group value is in the set.
    ///
    /// Declared values may list several codes separated by commas.
    pub fn intersects(&self, declared: &str) -> bool {
        declared
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .any(|code| self.0.contains(code))
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for GroupSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Source of users' group codes.
#[async_trait]
pub trait GroupMembershipProvider: Send + Sync + Debug + 'static {
    /// The group codes of `user_id`. Unknown users have no groups.
    async fn user_group_codes(&self, user_id: UserId) -> AppResult<GroupSet>;
}

/// Memberships listed in configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticGroupMembership {
    memberships: HashMap<UserId, GroupSet>,
}

impl StaticGroupMembership {
    /// Build from the `groups.memberships` table, keyed by user UUID.
    pub fn from_config(config: &GroupsConfig) -> AppResult<Self> {
        let mut memberships = HashMap::with_capacity(config.memberships.len());
        for (user, codes) in &config.memberships {
            let id = Uuid::parse_str(user).map_err(|e| {
                AppError::configuration(format!("Invalid user id in group memberships '{user}': {e}"))
            })?;
            memberships.insert(UserId::from_uuid(id), codes.iter().cloned().collect());
        }
        Ok(Self { memberships })
    }

    /// Add or replace one user's codes.
    pub fn with_user(mut self, user_id: UserId, groups: GroupSet) -> Self {
        self.memberships.insert(user_id, groups);
        self
    }
}

#[async_trait]
impl GroupMembershipProvider for StaticGroupMembership {
    async fn user_group_codes(&self, user_id: UserId) -> AppResult<GroupSet> {
        Ok(self.memberships.get(&user_id).cloned().unwrap_or_default())
    }
}

/// Caches another provider's answers with a TTL.
#[derive(Debug, Clone)]
pub struct CachedGroupMembership {
    inner: Arc<dyn GroupMembershipProvider>,
    cache: Cache<UserId, GroupSet>,
}

impl CachedGroupMembership {
    /// Wrap `inner` using the cache limits of `config`.
    pub fn new(inner: Arc<dyn GroupMembershipProvider>, config: &GroupsConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();
        Self { inner, cache }
    }

    /// Drop a user's cached codes.
    pub async fn invalidate(&self, user_id: UserId) {
        self.cache.invalidate(&user_id).await;
    }
}

#[async_trait]
impl GroupMembershipProvider for CachedGroupMembership {
    async fn user_group_codes(&self, user_id: UserId) -> AppResult<GroupSet> {
        if let Some(groups) = self.cache.get(&user_id).await {
            return Ok(groups);
        }
        let groups = self.inner.user_group_codes(user_id).await?;
        debug!(user_id = %user_id, groups = groups.len(), "Cached group membership");
        self.cache.insert(user_id, groups.clone()).await;
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_intersects_comma_separated() {
        let groups: GroupSet = ["G1", "OPS"].into_iter().collect();
        assert!(groups.intersects("G1"));
        assert!(groups.intersects("ADMIN, OPS"));
        assert!(!groups.intersects("ADMIN"));
        assert!(!groups.intersects(""));
        assert!(!GroupSet::empty().intersects("G1"));
    }

    #[tokio::test]
    async fn test_static_from_config() {
        let user = UserId::new();
        let mut config = GroupsConfig::default();
        config
            .memberships
            .insert(user.to_string(), vec!["G1".into(), "G2".into()]);

        let provider = StaticGroupMembership::from_config(&config).expect("config");
        let groups = provider.user_group_codes(user).await.expect("lookup");
        assert!(groups.contains("G2"));
        assert!(provider.user_group_codes(UserId::new()).await.expect("lookup").is_empty());
    }

    #[test]
    fn test_static_rejects_bad_user_id() {
        let mut config = GroupsConfig::default();
        config.memberships.insert("not-a-uuid".into(), vec![]);
        assert!(StaticGroupMembership::from_config(&config).is_err());
    }

    #[derive(Debug, Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl GroupMembershipProvider for Counting {
        async fn user_group_codes(&self, _user_id: UserId) -> AppResult<GroupSet> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(["G1"].into_iter().collect())
        }
    }

    #[tokio::test]
    async fn test_cache_hits_inner_once() {
        let inner = Arc::new(Counting::default());
        let cached = CachedGroupMembership::new(inner.clone(), &GroupsConfig::default());
        let user = UserId::new();

        cached.user_group_codes(user).await.expect("first");
        cached.user_group_codes(user).await.expect("second");
        assert_eq!(inner.0.load(Ordering::SeqCst), 1);

        cached.invalidate(user).await;
        cached.user_group_codes(user).await.expect("third");
        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
    }
}
