//! Group membership provider configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Group membership configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    /// How long a user's resolved group set stays cached.
    #[serde(default = "default_ttl")]
    pub cache_ttl_seconds: u64,
    /// Maximum number of cached users.
    #[serde(default = "default_capacity")]
    pub cache_max_capacity: u64,
    /// Static memberships: user UUID to group codes.
    #[serde(default)]
    pub memberships: HashMap<String, Vec<String>>,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_ttl(),
            cache_max_capacity: default_capacity(),
            memberships: HashMap::new(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_capacity() -> u64 {
    10_000
}
