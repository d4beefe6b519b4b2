//! Signal Sink Port - Notification and Archival Interface
//!
//! Receives signals that passed the emission policy. Sinks must tolerate
//! seeing the same signal id twice; the policy prevents duplicates but
//! transports are not exactly-once.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::signal::ComposedSignal;

/// Delivery failure of a sink.
#[derive(Error, Debug)]
pub enum SinkError {
  /// Remote endpoint unreachable or answered with an error.
  #[error("delivery failed: {0}")]
  Delivery(String),

  /// Local write failure (file, disk).
  #[error("io failure: {0}")]
  Io(String),

  /// None of the fan-out targets accepted the signal.
  #[error("all {0} sinks failed")]
  AllFailed(usize),
}

/// Trait for signal consumers.
#[async_trait]
pub trait SignalSink: Send + Sync + 'static {
  /// Short name used in logs.
  fn name(&self) -> &'static str;

  /// Deliver one signal.
  async fn emit(&self, signal: &ComposedSignal) -> Result<(), SinkError>;
}
