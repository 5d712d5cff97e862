//! Declared access groups and resolved access bits.

use serde::{Deserialize, Serialize};

use treevault_core::types::Permission;

/// Group codes declared on a resource, one per permission kind.
///
/// `None` means the kind is inherited from the nearest ancestor that
/// declares it. A value may list several codes separated by commas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroups {
    /// Group allowed to read.
    pub read: Option<String>,
    /// Group allowed to write.
    pub write: Option<String>,
    /// Group allowed to execute.
    pub execute: Option<String>,
}

impl AccessGroups {
    /// No declared groups; every kind is inherited.
    pub fn inherit() -> Self {
        Self::default()
    }

    /// The same group for all three kinds.
    pub fn all(group: impl Into<String>) -> Self {
        let group = group.into();
        Self {
            read: Some(group.clone()),
            write: Some(group.clone()),
            execute: Some(group),
        }
    }

    /// The declared group for one kind, if any.
    pub fn get(&self, permission: Permission) -> Option<&str> {
        match permission {
            Permission::Read => self.read.as_deref(),
            Permission::Write => self.write.as_deref(),
            Permission::Execute => self.execute.as_deref(),
        }
    }

    /// Whether all three kinds are declared. Required for store roots.
    pub fn is_complete(&self) -> bool {
        Permission::ALL
            .iter()
            .all(|p| self.get(*p).is_some_and(|g| !g.trim().is_empty()))
    }

    /// Whether no kind is declared.
    pub fn is_empty(&self) -> bool {
        Permission::ALL.iter().all(|p| self.get(*p).is_none())
    }
}

/// Resolved permission bits for the acting user. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessBits {
    /// Resolved read bit.
    pub can_read: bool,
    /// Resolved write bit.
    pub can_write: bool,
    /// Resolved execute bit.
    pub can_execute: bool,
}

impl AccessBits {
    /// Read one bit.
    pub fn get(&self, permission: Permission) -> bool {
        match permission {
            Permission::Read => self.can_read,
            Permission::Write => self.can_write,
            Permission::Execute => self.can_execute,
        }
    }

    /// Set one bit.
    pub fn set(&mut self, permission: Permission, value: bool) {
        match permission {
            Permission::Read => self.can_read = value,
            Permission::Write => self.can_write = value,
            Permission::Execute => self.can_execute = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_requires_all_three() {
        assert!(AccessGroups::all("G1").is_complete());
        let partial = AccessGroups {
            read: Some("G1".into()),
            write: Some("G1".into()),
            execute: None,
        };
        assert!(!partial.is_complete());
        assert!(AccessGroups::inherit().is_empty());
    }

    #[test]
    fn test_bits_set_and_get() {
        let mut bits = AccessBits::default();
        bits.set(Permission::Execute, true);
        assert!(bits.get(Permission::Execute));
        assert!(!bits.get(Permission::Read));
    }
}
