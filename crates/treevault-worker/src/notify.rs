//! Background delivery of directory-changed notifications.

use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use treevault_core::types::{NodeId, UserId};

use crate::sinks::ChangeNotifier;

/// Delivers notifications off the task path.
///
/// With deduplication on, a `(directory, user)` pair that is already
/// waiting for delivery is not queued again.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    pending: Arc<DashSet<(NodeId, UserId)>>,
    tx: mpsc::UnboundedSender<(NodeId, UserId)>,
    dedup: bool,
}

impl NotificationDispatcher {
    /// Start the delivery loop.
    pub fn spawn(notifier: Arc<dyn ChangeNotifier>, dedup: bool) -> Self {
        let pending: Arc<DashSet<(NodeId, UserId)>> = Arc::new(DashSet::new());
        let (tx, mut rx) = mpsc::unbounded_channel::<(NodeId, UserId)>();

        let loop_pending = pending.clone();
        tokio::spawn(async move {
            while let Some((dir_id, user_id)) = rx.recv().await {
                loop_pending.remove(&(dir_id, user_id));
                if let Err(e) = notifier.directory_contents_changed(dir_id, user_id).await {
                    warn!(dir_id = %dir_id, user_id = %user_id, error = %e, "Change notification failed");
                }
            }
        });

        Self { pending, tx, dedup }
    }

    /// Queue a notification. Returns false when it was deduplicated or the
    /// delivery loop is gone.
    pub fn notify(&self, dir_id: NodeId, user_id: UserId) -> bool {
        if self.dedup && !self.pending.insert((dir_id, user_id)) {
            debug!(dir_id = %dir_id, user_id = %user_id, "Notification already pending");
            return false;
        }
        if self.tx.send((dir_id, user_id)).is_err() {
            self.pending.remove(&(dir_id, user_id));
            return false;
        }
        true
    }

    /// Notifications waiting for delivery.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;
    use treevault_core::result::AppResult;

    #[derive(Debug)]
    struct Gated {
        gate: Arc<Semaphore>,
        seen: Mutex<Vec<NodeId>>,
    }

    #[async_trait]
    impl ChangeNotifier for Gated {
        async fn directory_contents_changed(&self, dir_id: NodeId, _user_id: UserId) -> AppResult<()> {
            let _permit = self.gate.acquire().await.unwrap();
            self.seen.lock().unwrap().push(dir_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pending_pair_is_not_queued_twice() {
        let gate = Arc::new(Semaphore::new(0));
        let notifier = Arc::new(Gated {
            gate: gate.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = NotificationDispatcher::spawn(notifier.clone(), true);
        let user = UserId::new();

        // The first one is picked up and blocks on the gate.
        assert!(dispatcher.notify(NodeId(1), user));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(dispatcher.notify(NodeId(2), user));
        assert!(!dispatcher.notify(NodeId(2), user));
        assert!(dispatcher.notify(NodeId(2), UserId::new()));
        assert_eq!(dispatcher.pending(), 2);

        gate.add_permits(10);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(*notifier.seen.lock().unwrap(), vec![NodeId(1), NodeId(2), NodeId(2)]);
        assert_eq!(dispatcher.pending(), 0);
    }
}
