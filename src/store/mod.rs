//! Pending action store.
//!
//! Durable, ordered queue of mutating requests that could not reach the
//! backend. The queue is a JSON array persisted under a single fixed file
//! (the `pendingActions` storage key), overwritten whole on every change so a
//! crash can never leave a half-written list. All I/O is local and
//! synchronous: the store must never fail because of connectivity.
//!
//! A corrupt or unreadable file is treated as an empty queue. That loses the
//! queue but keeps the agent running; the condition is logged at warn.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use crate::models::{MutatingMethod, PendingAction};

struct Inner {
    actions: Vec<PendingAction>,
    /// Highest id handed out so far, to keep timestamp-derived ids unique
    /// when several actions are enqueued within the same millisecond.
    last_id: i64,
}

pub struct PendingActionStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl PendingActionStore {
    /// Take the queue lock, recovering the data if a panicked thread left it
    /// poisoned. The store must never fail, so every accessor goes through
    /// this.
    fn locked(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open the store, loading any actions persisted by a prior session.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let actions = read_actions(&path);
        let last_id = actions.iter().map(|a| a.id).max().unwrap_or(0);

        if !actions.is_empty() {
            tracing::info!(
                "Loaded {} pending actions from {}",
                actions.len(),
                path.display()
            );
        }

        Self {
            path,
            inner: Mutex::new(Inner { actions, last_id }),
        }
    }

    /// Append a new pending action and persist the queue. Returns the stored
    /// entry with its assigned id and creation timestamp.
    pub fn enqueue(
        &self,
        url: impl Into<String>,
        method: MutatingMethod,
        data: serde_json::Value,
    ) -> PendingAction {
        let mut inner = self.locked();

        let id = Utc::now().timestamp_millis().max(inner.last_id + 1);
        inner.last_id = id;

        let action = PendingAction {
            id,
            url: url.into(),
            method,
            data,
            timestamp: Utc::now().to_rfc3339(),
        };

        inner.actions.push(action.clone());
        persist(&self.path, &inner.actions);

        tracing::debug!("Queued {} {} as action {}", method, action.url, id);
        action
    }

    /// Full ordered list of currently pending actions.
    pub fn load_all(&self) -> Vec<PendingAction> {
        self.locked().actions.clone()
    }

    /// Remove the entries whose id is in `ids`, keeping the rest in original
    /// order, and persist the new list as a whole. Ids that are not present
    /// are ignored, so repeated removal is safe.
    pub fn remove_by_ids(&self, ids: &[i64]) {
        if ids.is_empty() {
            return;
        }

        let mut inner = self.locked();
        let before = inner.actions.len();
        inner.actions.retain(|a| !ids.contains(&a.id));

        if inner.actions.len() != before {
            persist(&self.path, &inner.actions);
            tracing::debug!(
                "Removed {} pending actions, {} remain",
                before - inner.actions.len(),
                inner.actions.len()
            );
        }
    }

    pub fn len(&self) -> usize {
        self.locked().actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read the persisted queue, treating missing or corrupt data as empty.
fn read_actions(path: &Path) -> Vec<PendingAction> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("Failed to read pending queue {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(actions) => actions,
        Err(e) => {
            tracing::warn!(
                "Pending queue {} is corrupt ({}), starting empty",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Overwrite the persisted queue atomically (write-then-rename).
fn persist(path: &Path, actions: &[PendingAction]) {
    let json = match serde_json::to_vec_pretty(actions) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize pending queue: {}", e);
            return;
        }
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::error!("Failed to create queue directory: {}", e);
            return;
        }
    }

    let tmp = path.with_extension("json.tmp");
    let result = fs::write(&tmp, &json).and_then(|_| fs::rename(&tmp, path));
    if let Err(e) = result {
        tracing::error!("Failed to persist pending queue {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn queue_path(dir: &TempDir) -> PathBuf {
        dir.path().join("pendingActions.json")
    }

    #[test]
    fn test_enqueue_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = PendingActionStore::open(queue_path(&dir));

        let a = store.enqueue("/api/assets", MutatingMethod::Post, json!({"tag": "AX-1"}));
        let b = store.enqueue("/api/assets/1", MutatingMethod::Put, json!({"tag": "AX-2"}));
        let c = store.enqueue("/api/assets/2", MutatingMethod::Delete, serde_json::Value::Null);

        // A fresh store over the same file sees the identical list.
        let reloaded = PendingActionStore::open(queue_path(&dir));
        assert_eq!(reloaded.load_all(), vec![a, b, c]);
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let dir = TempDir::new().unwrap();
        let store = PendingActionStore::open(queue_path(&dir));

        let ids: Vec<i64> = (0..10)
            .map(|_| {
                store
                    .enqueue("/api/ping", MutatingMethod::Post, serde_json::Value::Null)
                    .id
            })
            .collect();

        for pair in ids.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_id_counter_survives_reload() {
        let dir = TempDir::new().unwrap();
        let first = PendingActionStore::open(queue_path(&dir));
        let a = first.enqueue("/api/x", MutatingMethod::Post, serde_json::Value::Null);

        let second = PendingActionStore::open(queue_path(&dir));
        let b = second.enqueue("/api/y", MutatingMethod::Post, serde_json::Value::Null);
        assert!(b.id > a.id);
    }

    #[test]
    fn test_remove_keeps_order_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = PendingActionStore::open(queue_path(&dir));

        let a = store.enqueue("/api/a", MutatingMethod::Post, serde_json::Value::Null);
        let b = store.enqueue("/api/b", MutatingMethod::Post, serde_json::Value::Null);
        let c = store.enqueue("/api/c", MutatingMethod::Post, serde_json::Value::Null);

        store.remove_by_ids(&[a.id, c.id]);
        assert_eq!(store.load_all(), vec![b.clone()]);

        // Second removal of the same ids is a no-op.
        store.remove_by_ids(&[a.id, c.id]);
        assert_eq!(store.load_all(), vec![b]);
    }

    #[test]
    fn test_corrupt_file_fails_soft() {
        let dir = TempDir::new().unwrap();
        let path = queue_path(&dir);
        fs::write(&path, b"{not json[").unwrap();

        let store = PendingActionStore::open(&path);
        assert!(store.is_empty());

        // The store stays usable after recovery.
        store.enqueue("/api/a", MutatingMethod::Patch, json!({"ok": true}));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = PendingActionStore::open(queue_path(&dir));
        assert!(store.is_empty());
        assert_eq!(store.load_all(), Vec::new());
    }
}
