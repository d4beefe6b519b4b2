//! Fan-out sink: delivers each signal to every configured sink.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::signal::ComposedSignal;
use crate::ports::sink::{SignalSink, SinkError};

/// Delivers to all sinks in order; fails only when every sink failed.
pub struct FanoutSink {
  sinks: Vec<Arc<dyn SignalSink>>,
}

impl FanoutSink {
  pub fn new(sinks: Vec<Arc<dyn SignalSink>>) -> Self {
    Self { sinks }
  }

  pub fn len(&self) -> usize {
    self.sinks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sinks.is_empty()
  }

  /// Names of the wrapped sinks, for the startup log.
  pub fn names(&self) -> Vec<&'static str> {
    self.sinks.iter().map(|s| s.name()).collect()
  }
}

#[async_trait]
impl SignalSink for FanoutSink {
  fn name(&self) -> &'static str {
    "fanout"
  }

  async fn emit(&self, signal: &ComposedSignal) -> Result<(), SinkError> {
    let mut failures = 0;

    for sink in &self.sinks {
      if let Err(e) = sink.emit(signal).await {
        failures += 1;
        warn!(sink = sink.name(), symbol = %signal.symbol, error = %e, "Sink delivery failed");
      }
    }

    if failures > 0 && failures == self.sinks.len() {
      return Err(SinkError::AllFailed(failures));
    }
    Ok(())
  }
}
