//! Task queues keyed by store and concern.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use treevault_core::types::StoreId;

use crate::manager::TaskManager;

/// What a queue serializes within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    /// Metadata and disk mutations.
    General,
    /// Binary mirroring.
    Binary,
    /// Search index updates.
    Index,
}

impl Concern {
    /// All concerns.
    pub const ALL: [Concern; 3] = [Self::General, Self::Binary, Self::Index];

    /// Return the concern as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Binary => "binary",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One [`TaskManager`] per `(store, concern)`, created on first use.
#[derive(Debug, Clone, Default)]
pub struct TaskManagerRegistry {
    managers: Arc<DashMap<(StoreId, Concern), TaskManager>>,
}

impl TaskManagerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The queue for `store_id` and `concern`.
    pub fn manager(&self, store_id: StoreId, concern: Concern) -> TaskManager {
        self.managers
            .entry((store_id, concern))
            .or_insert_with(|| TaskManager::spawn(format!("{store_id}:{concern}")))
            .clone()
    }

    /// Start every queue of a store.
    pub fn register_store(&self, store_id: StoreId) {
        for concern in Concern::ALL {
            self.manager(store_id, concern);
        }
        tracing::info!(store_id = %store_id, "Registered task queues");
    }

    /// Number of running queues.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Whether no queue has been started.
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_queue_per_store_and_concern() {
        let registry = TaskManagerRegistry::new();
        let a = StoreId(1);
        let b = StoreId(2);

        registry.register_store(a);
        assert_eq!(registry.len(), 3);

        let first = registry.manager(a, Concern::General);
        let again = registry.manager(a, Concern::General);
        assert_eq!(first.label(), again.label());
        assert_eq!(first.label(), "1:general");

        registry.manager(b, Concern::Index);
        assert_eq!(registry.len(), 4);
    }
}
