//! Store entity model.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use treevault_core::types::{NodeId, StoreId};

use crate::resource::{AccessGroups, DirectoryResource};

/// Default applied when no ancestor declares a group for a permission kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "access_rule", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccessRule {
    /// Undeclared kinds are granted.
    Allow,
    /// Undeclared kinds fall back to inherited groups, then to the parent's bit.
    Deny,
}

impl AccessRule {
    /// Return the rule as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(format!("Unknown access rule: {other}")),
        }
    }
}

/// A store together with its root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    /// Sequence-generated store identifier.
    pub id: StoreId,
    /// Unique store name.
    pub name: String,
    /// Description of this store.
    pub description: Option<String>,
    /// Absolute on-disk root.
    pub path: String,
    /// Node of the root directory.
    pub root_dir_node_id: NodeId,
    /// Files larger than this are never mirrored into the blob table.
    pub max_mirrored_file_size_bytes: i64,
    /// Default for undeclared permission kinds.
    pub access_rule: AccessRule,
    /// When the store was created.
    pub created_at: DateTime<Utc>,
    /// When the store was last updated.
    pub updated_at: DateTime<Utc>,
    /// The root directory resource.
    pub root_dir: DirectoryResource,
}

impl Store {
    /// Sibling directory reserved for this store's search index.
    pub fn index_path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.path.trim_end_matches('/'), suffix))
    }

    /// Whether a file of this size should be mirrored.
    pub fn should_mirror(&self, file_size_bytes: i64) -> bool {
        file_size_bytes <= self.max_mirrored_file_size_bytes
    }
}

/// Data required to create a store and its root directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStore {
    /// Unique store name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Absolute on-disk root.
    pub path: String,
    /// Mirroring threshold in bytes.
    pub max_mirrored_file_size_bytes: i64,
    /// Default for undeclared permission kinds.
    pub access_rule: AccessRule,
    /// Groups of the root directory. All three are required.
    pub root_groups: AccessGroups,
}
