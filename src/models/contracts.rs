//! Wire contracts shared with the console frontend and the cache worker.

use serde::{Deserialize, Serialize};

/// Synthetic response body returned when a mutation is accepted into the
/// queue instead of reaching the backend. Always carried on a 202.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedResponse {
    pub offline: bool,
    pub message: String,
}

impl QueuedResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            offline: true,
            message: message.into(),
        }
    }
}

/// Synthetic error body returned by the cache worker when the network is
/// down and the runtime cache has no entry. Always carried on a 503.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineError {
    pub error: String,
    pub message: String,
    pub offline: bool,
}

impl OfflineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: "Offline".to_string(),
            message: message.into(),
            offline: true,
        }
    }
}

/// Control messages the page posts to the cache worker. Communication with
/// the worker is limited to the fetch contract plus these messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    /// Force the newly installed worker version to activate immediately.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_waiting_tag() {
        let msg: WorkerMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, WorkerMessage::SkipWaiting);
    }

    #[test]
    fn test_offline_error_shape() {
        let value = serde_json::to_value(OfflineError::new("No cached data")).unwrap();
        assert_eq!(value["error"], "Offline");
        assert_eq!(value["offline"], true);
    }
}
