//! Channel-backed activity sink.
//!
//! Events are handed to a bounded channel and drained by a background task.
//! A full or closed channel drops the event with a `warn`; the emitting
//! operation is never failed or blocked by its activity log.

use tokio::sync::mpsc;

use trellis_core::activity::{ActivityEvent, ActivityLog};

#[derive(Clone)]
pub struct ChannelActivityLog {
  tx: mpsc::Sender<ActivityEvent>,
}

impl ChannelActivityLog {
  /// Create a sink with the given buffer capacity. The caller owns the
  /// receiver; see [`ChannelActivityLog::spawn_tracing_drain`] for the
  /// default consumer.
  pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ActivityEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Self { tx }, rx)
  }

  /// Drain events into `tracing` on a background task.
  pub fn spawn_tracing_drain(mut rx: mpsc::Receiver<ActivityEvent>) {
    tokio::spawn(async move {
      while let Some(event) = rx.recv().await {
        tracing::info!(
          actor = %event.actor,
          action = %event.action,
          metadata = %event.metadata,
          "activity"
        );
      }
    });
  }
}

impl ActivityLog for ChannelActivityLog {
  fn record(&self, event: ActivityEvent) {
    if let Err(e) = self.tx.try_send(event) {
      tracing::warn!(error = %e, "activity event dropped");
    }
  }
}
