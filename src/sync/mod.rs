//! Sync engine.
//!
//! Replays pending actions against the backend and reconciles the queue.
//! Replay is FIFO within a pass. Outcome handling per action:
//!
//! - 2xx: replayed, removed from the queue
//! - 4xx: rejected by the backend, dropped from the queue with a
//!   user-visible notification (retrying a permanently invalid action is
//!   pointless)
//! - 5xx or network-level error: retained for the next pass, indefinitely
//!
//! At most one pass runs at a time; overlapping timer- and event-triggered
//! calls are coalesced by an in-flight flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::SessionTokens;
use crate::errors::AppError;
use crate::monitor::ConnectivityMonitor;
use crate::notify::{Notification, Notifier};
use crate::store::PendingActionStore;

/// Outcome of one sync pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub dropped: usize,
    pub retained: usize,
}

pub struct SyncEngine {
    client: reqwest::Client,
    backend_url: String,
    store: Arc<PendingActionStore>,
    monitor: Arc<ConnectivityMonitor>,
    tokens: Arc<SessionTokens>,
    notifier: Arc<dyn Notifier>,
    syncing: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        client: reqwest::Client,
        backend_url: impl Into<String>,
        store: Arc<PendingActionStore>,
        monitor: Arc<ConnectivityMonitor>,
        tokens: Arc<SessionTokens>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            backend_url: backend_url.into(),
            store,
            monitor,
            tokens,
            notifier,
            syncing: AtomicBool::new(false),
        }
    }

    /// Run one sync pass. No-op when offline, when the queue is empty, or
    /// when another pass is already in flight.
    pub async fn sync_pending_actions(&self) -> Result<SyncReport, AppError> {
        if !self.monitor.is_online() || self.store.is_empty() {
            return Ok(SyncReport::default());
        }

        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync pass already in flight, skipping");
            return Ok(SyncReport::default());
        }

        let report = self.run_pass().await;
        self.syncing.store(false, Ordering::SeqCst);
        Ok(report)
    }

    async fn run_pass(&self) -> SyncReport {
        let pending = self.store.load_all();
        let mut report = SyncReport {
            attempted: pending.len(),
            ..SyncReport::default()
        };

        tracing::info!("Sync pass: replaying {} pending actions", pending.len());

        let mut finished: Vec<i64> = Vec::new();

        for action in &pending {
            let url = format!("{}{}", self.backend_url, action.url);
            let mut request = self.client.request(action.method.to_reqwest(), &url);

            if let Some(token) = self.tokens.bearer() {
                request = request.bearer_auth(token);
            }
            if !action.data.is_null() {
                request = request.json(&action.data);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("Replayed action {} ({} {})", action.id, action.method, action.url);
                    finished.push(action.id);
                    report.synced += 1;
                }
                Ok(response) if response.status().is_client_error() => {
                    let status = response.status().as_u16();
                    tracing::warn!(
                        "Action {} rejected with {} ({} {}), dropping",
                        action.id,
                        status,
                        action.method,
                        action.url
                    );
                    finished.push(action.id);
                    report.dropped += 1;
                    self.notifier.notify(Notification::ActionDropped {
                        id: action.id,
                        status,
                    });
                }
                Ok(response) => {
                    // Server-side failure, worth retrying on the next pass.
                    tracing::debug!(
                        "Action {} failed with {}, retaining",
                        action.id,
                        response.status()
                    );
                    report.retained += 1;
                }
                Err(e) => {
                    tracing::debug!("Action {} failed ({}), retaining", action.id, e);
                    report.retained += 1;
                }
            }
        }

        // One persisted update for the whole batch.
        self.store.remove_by_ids(&finished);

        if report.synced > 0 {
            self.notifier.notify(Notification::SyncComplete {
                count: report.synced,
            });
        }
        tracing::info!(
            "Sync pass done: {} synced, {} dropped, {} retained",
            report.synced,
            report.dropped,
            report.retained
        );

        report
    }

    /// Drive the engine: sync once at startup if actions survive from a prior
    /// session, then on every offline-to-online transition, and on a fixed
    /// interval while online with a non-empty queue.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut transitions = self.monitor.subscribe();
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately and doubles as the startup sync.
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_pending_actions().await {
                        tracing::error!("Scheduled sync failed: {}", e);
                    }
                }
                changed = transitions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *transitions.borrow_and_update();
                    if online {
                        if let Err(e) = self.sync_pending_actions().await {
                            tracing::error!("Reconnect sync failed: {}", e);
                        }
                    }
                }
            }
        }
    }
}
