//! Log-only sink used in dry-run mode.

use async_trait::async_trait;
use tracing::info;

use crate::domain::signal::ComposedSignal;
use crate::ports::sink::{SignalSink, SinkError};

/// Writes every signal to the structured log and nothing else.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl SignalSink for TracingSink {
  fn name(&self) -> &'static str {
    "tracing"
  }

  async fn emit(&self, signal: &ComposedSignal) -> Result<(), SinkError> {
    info!(
      id = %signal.id,
      symbol = %signal.symbol,
      direction = %signal.direction,
      entry = signal.entry_price,
      tp1 = signal.tp1,
      tp2 = signal.tp2,
      tp3 = signal.tp3,
      stop_loss = signal.stop_loss,
      confidence = signal.confidence,
      trade_type = %signal.trade_type,
      leverage = signal.leverage,
      degraded = signal.degraded,
      "[DRY RUN] Signal"
    );
    Ok(())
  }
}
