//! Pending action model: a mutating request queued for later replay.

use serde::{Deserialize, Serialize};

/// HTTP verbs that may be queued. `GET` is deliberately unrepresentable:
/// reads are never replayed, they are served from cache or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutatingMethod {
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "PATCH")]
    Patch,
}

impl MutatingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutatingMethod::Post => "POST",
            MutatingMethod::Put => "PUT",
            MutatingMethod::Delete => "DELETE",
            MutatingMethod::Patch => "PATCH",
        }
    }

    /// Classify an arbitrary HTTP method. Returns `None` for non-mutating
    /// verbs (`GET`, `HEAD`, `OPTIONS`, ...).
    pub fn from_method(method: &reqwest::Method) -> Option<Self> {
        match method.as_str() {
            "POST" => Some(MutatingMethod::Post),
            "PUT" => Some(MutatingMethod::Put),
            "DELETE" => Some(MutatingMethod::Delete),
            "PATCH" => Some(MutatingMethod::Patch),
            _ => None,
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            MutatingMethod::Post => reqwest::Method::POST,
            MutatingMethod::Put => reqwest::Method::PUT,
            MutatingMethod::Delete => reqwest::Method::DELETE,
            MutatingMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

impl std::fmt::Display for MutatingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutating request that could not be completed and is queued for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    /// Unique, creation-timestamp-derived id. Immutable after enqueue.
    pub id: i64,
    /// Target endpoint, path-and-query relative to the backend origin.
    pub url: String,
    pub method: MutatingMethod,
    /// Original request body. `Null` means the request had no body.
    #[serde(default)]
    pub data: serde_json::Value,
    /// ISO-8601 creation time, for ordering and display.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_serializes_uppercase() {
        let s = serde_json::to_string(&MutatingMethod::Patch).unwrap();
        assert_eq!(s, "\"PATCH\"");
    }

    #[test]
    fn test_get_is_not_mutating() {
        assert_eq!(MutatingMethod::from_method(&reqwest::Method::GET), None);
        assert_eq!(MutatingMethod::from_method(&reqwest::Method::HEAD), None);
        assert_eq!(
            MutatingMethod::from_method(&reqwest::Method::DELETE),
            Some(MutatingMethod::Delete)
        );
    }

    #[test]
    fn test_action_json_shape() {
        let action = PendingAction {
            id: 1730000000000,
            url: "/api/assets/42/assign".to_string(),
            method: MutatingMethod::Post,
            data: json!({ "userId": "u-7" }),
            timestamp: "2025-08-01T12:00:00Z".to_string(),
        };

        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["id"], 1730000000000i64);
        assert_eq!(value["method"], "POST");
        assert_eq!(value["data"]["userId"], "u-7");

        let back: PendingAction = serde_json::from_value(value).unwrap();
        assert_eq!(back, action);
    }
}
