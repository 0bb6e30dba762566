//! Connectivity monitor.
//!
//! Maintains the single source of truth for online/offline state. The flag is
//! written only by connectivity event handlers, never by polling: an earlier
//! revision polled the backend on a fixed interval and produced redundant
//! requests with no benefit over event-driven detection.
//!
//! Dependents observe transitions through a watch channel rather than by
//! patching global state; the sync engine subscribes and runs a pass on every
//! offline-to-online transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::notify::{Notification, Notifier};

pub struct ConnectivityMonitor {
    online: AtomicBool,
    transitions: watch::Sender<bool>,
    notifier: Arc<dyn Notifier>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool, notifier: Arc<dyn Notifier>) -> Self {
        let (transitions, _) = watch::channel(initially_online);
        Self {
            online: AtomicBool::new(initially_online),
            transitions,
            notifier,
        }
    }

    /// Current connection status.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Handle an "online" connectivity event. No-op if already online.
    pub fn set_online(&self) {
        if !self.online.swap(true, Ordering::SeqCst) {
            tracing::info!("Connectivity: online");
            self.notifier.notify(Notification::ConnectionRestored);
            self.transitions.send_replace(true);
        }
    }

    /// Handle an "offline" connectivity event. No-op if already offline.
    pub fn set_offline(&self) {
        if self.online.swap(false, Ordering::SeqCst) {
            tracing::warn!("Connectivity: offline");
            self.notifier.notify(Notification::WorkingOffline);
            self.transitions.send_replace(false);
        }
    }

    /// Subscribe to status transitions. The receiver yields the new status
    /// after each change; duplicate events do not produce a value.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.transitions.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    #[test]
    fn test_transitions_notify_once() {
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = ConnectivityMonitor::new(true, notifier.clone());

        monitor.set_offline();
        monitor.set_offline();
        monitor.set_online();
        monitor.set_online();

        assert!(monitor.is_online());
        assert_eq!(
            notifier.recorded(),
            vec![
                Notification::WorkingOffline,
                Notification::ConnectionRestored,
            ]
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(true, Arc::new(RecordingNotifier::new()));
        let mut rx = monitor.subscribe();

        monitor.set_offline();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());

        monitor.set_online();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
