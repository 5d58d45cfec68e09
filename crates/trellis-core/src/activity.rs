//! Activity-log boundary: best-effort, fire-and-forget.
//!
//! A sink failure must never propagate to the operation that emitted the
//! event. Implementations (see `trellis-engine`) hand events to a bounded
//! channel and log dropped events at `warn`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who performed the logged action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
  Member,
  System,
}

/// One activity event. `metadata` is free-form JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
  pub actor_kind: ActorKind,
  pub actor:      String,
  pub action:     String,
  pub metadata:   serde_json::Value,
  pub at:         DateTime<Utc>,
}

impl ActivityEvent {
  pub fn member(actor: impl Into<String>, action: impl Into<String>, metadata: serde_json::Value) -> Self {
    Self {
      actor_kind: ActorKind::Member,
      actor: actor.into(),
      action: action.into(),
      metadata,
      at: Utc::now(),
    }
  }
}

/// A best-effort activity sink. `record` must not block and must not fail
/// the caller; drop-and-warn is the expected degradation.
pub trait ActivityLog: Send + Sync {
  fn record(&self, event: ActivityEvent);
}

/// Discards every event. Useful for tests and minimal deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullActivityLog;

impl ActivityLog for NullActivityLog {
  fn record(&self, _event: ActivityEvent) {}
}
