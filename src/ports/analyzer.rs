//! Analyzer Port - Indicator and Prediction Interface
//!
//! Wraps the analytic black box: given candle series it returns a
//! directional bias, a confidence score, a reference price and a
//! volatility unit. Implementations are CPU-only and synchronous.

use crate::domain::error::ScanError;
use crate::domain::market::Candle;
use crate::domain::signal::{AnalysisResult, Bias};

/// Trait for indicator/prediction providers.
pub trait SignalAnalyzer: Send + Sync + 'static {
  /// Analyze one symbol from its 15m and 1h series.
  ///
  /// `None` means the analyzer has no opinion (e.g. not enough history).
  fn analyze(
    &self,
    symbol: &str,
    candles_15m: &[Candle],
    candles_1h: &[Candle],
  ) -> Option<AnalysisResult>;

  /// Predict the direction from a single series.
  ///
  /// `Ok(Bias::Neutral)` is a valid "no bias" answer; an output that is
  /// neither LONG, SHORT nor NONE is `ScanError::InvalidDirection`.
  fn predict_direction(&self, symbol: &str, candles: &[Candle]) -> Result<Bias, ScanError>;
}
