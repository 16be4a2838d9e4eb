//! Long-running operations and their outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{RequestId, ResourceId};

/// One long-running operation (an image generation, an upload).
///
/// `request_id` is unique per operation instance and supplied by the
/// initiator. `resource_id` names the thing being mutated and is what
/// duplicate starts are checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: RequestId,
    pub resource_id: ResourceId,
    pub created_at: DateTime<Utc>,
}

impl Request {
    pub fn new(request_id: RequestId, resource_id: ResourceId, created_at: DateTime<Utc>) -> Self {
        Self {
            request_id,
            resource_id,
            created_at,
        }
    }
}

/// Completion payload handed to subscribers.
///
/// Failures travel through the same path as successes so a subscriber is
/// invoked exactly once either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// The operation finished and produced `data`
    Succeeded { data: Value },
    /// The operation failed; `error` is a human-readable reason
    Failed { error: String },
}

impl OperationOutcome {
    pub fn success(data: Value) -> Self {
        Self::Succeeded { data }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// The success payload, if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Succeeded { data } => Some(data),
            Self::Failed { .. } => None,
        }
    }
}

/// An outcome that arrived while nobody was listening for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingResult {
    pub request_id: RequestId,
    pub outcome: OperationOutcome,
    pub arrived_at: DateTime<Utc>,
}

impl PendingResult {
    pub fn new(request_id: RequestId, outcome: OperationOutcome, arrived_at: DateTime<Utc>) -> Self {
        Self {
            request_id,
            outcome,
            arrived_at,
        }
    }

    /// Whether this result is older than `ttl` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.arrived_at >= ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_wire_format_is_status_tagged() {
        let ok = OperationOutcome::success(json!({"image_url": "https://cdn/x.png"}));
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["status"], "succeeded");
        assert_eq!(value["data"]["image_url"], "https://cdn/x.png");

        let failed = OperationOutcome::failure("quota exceeded");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "quota exceeded");
    }

    #[test]
    fn outcome_accessors() {
        let ok = OperationOutcome::success(json!({"status": "ok"}));
        assert!(ok.is_success());
        assert_eq!(ok.data(), Some(&json!({"status": "ok"})));

        let failed = OperationOutcome::failure("boom");
        assert!(!failed.is_success());
        assert_eq!(failed.data(), None);
    }

    #[test]
    fn pending_result_expiry() {
        let arrived_at = Utc::now();
        let pending = PendingResult::new(
            RequestId::new("op-1").unwrap(),
            OperationOutcome::success(json!(null)),
            arrived_at,
        );
        let ttl = chrono::Duration::minutes(10);

        assert!(!pending.is_expired(arrived_at + chrono::Duration::minutes(9), ttl));
        assert!(pending.is_expired(arrived_at + chrono::Duration::minutes(10), ttl));
    }
}
