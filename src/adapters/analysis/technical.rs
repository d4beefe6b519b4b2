//! Technical Analyzer - Reference Indicator/Prediction Adapter
//!
//! A trend-following implementation of the `SignalAnalyzer` port:
//! - volatility: ATR(14) on 15m
//! - bias: EMA(9)/EMA(21) on 15m, confirmed by close vs EMA(50) on 1h
//! - confidence: trend agreement + RSI(14) momentum + EMA spread
//! - prediction: normalized least-squares slope of the last 20 closes

use tracing::debug;

use super::indicators::{atr, ema, last, linear_slope, rsi};
use crate::domain::error::ScanError;
use crate::domain::market::Candle;
use crate::domain::signal::{AnalysisResult, Bias};
use crate::ports::analyzer::SignalAnalyzer;

/// Minimum candles per timeframe before an opinion is given.
pub const MIN_CANDLES: usize = 50;

const ATR_PERIOD: usize = 14;
const RSI_PERIOD: usize = 14;
const FAST_EMA: usize = 9;
const SLOW_EMA: usize = 21;
const TREND_EMA: usize = 50;
const SLOPE_WINDOW: usize = 20;

/// Reference analyzer used by the binary.
#[derive(Debug, Clone)]
pub struct TechnicalAnalyzer {
    /// Per-candle slope, as a fraction of price, that counts as a trend.
    slope_threshold: f64,
}

impl Default for TechnicalAnalyzer {
    fn default() -> Self {
        Self {
            slope_threshold: 0.0005,
        }
    }
}

impl TechnicalAnalyzer {
    pub fn new(slope_threshold: f64) -> Self {
        Self { slope_threshold }
    }
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

fn bias_of(a: f64, b: f64) -> Bias {
    if a > b {
        Bias::Long
    } else if a < b {
        Bias::Short
    } else {
        Bias::Neutral
    }
}

/// Confidence in [0, 100].
///
/// Agreement between timeframes carries most of the weight; RSI adds
/// momentum in the agreed direction and the EMA spread adds trend
/// strength.
fn confidence(fast: Bias, slow: Bias, rsi_now: f64, spread_pct: f64) -> f64 {
    let agreed = fast == slow && fast != Bias::Neutral;
    let agreement = if agreed { 45.0 } else { 15.0 };

    let momentum = match fast {
        Bias::Long if agreed => rsi_now - 50.0,
        Bias::Short if agreed => 50.0 - rsi_now,
        _ => 0.0,
    }
    .clamp(0.0, 30.0);

    let strength = (spread_pct * 25.0).clamp(0.0, 25.0);

    (agreement + momentum + strength).clamp(0.0, 100.0)
}

impl SignalAnalyzer for TechnicalAnalyzer {
    fn analyze(
        &self,
        symbol: &str,
        candles_15m: &[Candle],
        candles_1h: &[Candle],
    ) -> Option<AnalysisResult> {
        if candles_15m.len() < MIN_CANDLES || candles_1h.len() < MIN_CANDLES {
            debug!(
                symbol,
                m15 = candles_15m.len(),
                h1 = candles_1h.len(),
                "Not enough history"
            );
            return None;
        }

        let close_15m = closes(candles_15m);
        let close_1h = closes(candles_1h);

        let price = last(&close_15m).filter(|p| *p > 0.0)?;
        let volatility = last(&atr(candles_15m, ATR_PERIOD))?;
        let fast = last(&ema(&close_15m, FAST_EMA))?;
        let slow = last(&ema(&close_15m, SLOW_EMA))?;
        let trend = last(&ema(&close_1h, TREND_EMA))?;
        let hourly_close = last(&close_1h)?;
        let rsi_now = last(&rsi(&close_15m, RSI_PERIOD))?;

        let fast_bias = bias_of(fast, slow);
        let slow_bias = bias_of(hourly_close, trend);
        let direction = if fast_bias == slow_bias { fast_bias } else { Bias::Neutral };

        let spread_pct = (fast - slow).abs() / price * 100.0;

        Some(AnalysisResult {
            symbol: symbol.to_string(),
            reference_price: price,
            direction,
            confidence: confidence(fast_bias, slow_bias, rsi_now, spread_pct),
            volatility,
        })
    }

    fn predict_direction(&self, symbol: &str, candles: &[Candle]) -> Result<Bias, ScanError> {
        if candles.len() < SLOPE_WINDOW {
            return Ok(Bias::Neutral);
        }

        let window = closes(&candles[candles.len() - SLOPE_WINDOW..]);
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let slope = linear_slope(&window) / mean;

        if !slope.is_finite() {
            return Err(ScanError::InvalidDirection {
                label: format!("{symbol}: slope {slope}"),
            });
        }

        Ok(if slope > self.slope_threshold {
            Bias::Long
        } else if slope < -self.slope_threshold {
            Bias::Short
        } else {
            Bias::Neutral
        })
    }
}
