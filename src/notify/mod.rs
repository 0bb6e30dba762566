//! User-facing notification seam.
//!
//! Connectivity transitions and sync outcomes surface as toast-style
//! notifications in the console UI. The UI is an external collaborator, so
//! the agent only defines the seam; the default implementation logs.

#[cfg(test)]
use std::sync::Mutex;

/// A transient, user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ConnectionRestored,
    WorkingOffline,
    /// A sync pass replayed `count` actions successfully.
    SyncComplete { count: usize },
    /// An action was rejected by the backend and dropped from the queue.
    ActionDropped { id: i64, status: u16 },
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Default notifier: structured log lines instead of a UI surface.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::ConnectionRestored => tracing::info!("Connection restored"),
            Notification::WorkingOffline => tracing::warn!("Working offline"),
            Notification::SyncComplete { count } => {
                tracing::info!("Sync complete: {} actions", count)
            }
            Notification::ActionDropped { id, status } => {
                tracing::warn!("Action {} rejected with status {} and dropped", id, status)
            }
        }
    }
}

/// Test notifier that records everything it is handed.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Notification> {
        self.notifications.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut n) = self.notifications.lock() {
            n.push(notification);
        }
    }
}
