//! Signal Composer - Direction-aware Targets, Stops and Reachability.
//!
//! Turns a raw `AnalysisResult` into a `ComposedSignal`:
//! - entry = reference price
//! - targets at `price ± v·k` for k in (1.2, 2.0, 3.0), stop at `price ∓ v·1.0`
//! - heuristic reachability percentages for each target
//!
//! The reachability numbers are monotone penalties on distance scaled by
//! confidence. They are display heuristics, not calibrated probabilities.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use super::error::ScanError;
use super::signal::{AnalysisResult, ComposedSignal, Direction, TradeType};

/// Upper caps for tp1/tp2/tp3 reachability.
pub const PROBABILITY_CAPS: [f64; 3] = [95.0, 85.0, 75.0];

/// Starting values before the distance penalty is applied.
const PROBABILITY_BASES: [f64; 3] = [100.0, 95.0, 90.0];

/// Extra penalty weight for the farther targets.
const PROBABILITY_WEIGHTS: [f64; 3] = [1.0, 1.2, 1.5];

/// What to do when the analyzer reports no directional bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDirection {
    /// No signal (default).
    #[default]
    Skip,
    /// Degraded LONG signal.
    Long,
    /// Degraded SHORT signal.
    Short,
}

impl UnknownDirection {
    fn fallback(self) -> Option<Direction> {
        match self {
            Self::Skip => None,
            Self::Long => Some(Direction::Long),
            Self::Short => Some(Direction::Short),
        }
    }
}

/// Tunables for signal composition.
#[derive(Debug, Clone)]
pub struct ComposerParams {
    /// Volatility multipliers for tp1, tp2, tp3.
    pub target_multipliers: [f64; 3],
    /// Volatility multiplier for the stop.
    pub stop_multiplier: f64,
    /// Decimal places for price levels.
    pub price_decimals: u32,
    /// Decimal places for reachability percentages.
    pub probability_decimals: u32,
    /// Confidence below which a signal is classified as Scalping.
    pub scalping_cutoff: f64,
    pub scalping_leverage: u32,
    pub normal_leverage: u32,
    pub unknown_direction: UnknownDirection,
}

impl Default for ComposerParams {
    fn default() -> Self {
        Self {
            target_multipliers: [1.2, 2.0, 3.0],
            stop_multiplier: 1.0,
            price_decimals: 3,
            probability_decimals: 2,
            scalping_cutoff: 70.0,
            scalping_leverage: 20,
            normal_leverage: 10,
            unknown_direction: UnknownDirection::Skip,
        }
    }
}

/// Builds composed signals from analyzer output.
#[derive(Debug, Clone, Default)]
pub struct SignalComposer {
    params: ComposerParams,
}

impl SignalComposer {
    pub fn new(params: ComposerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ComposerParams {
        &self.params
    }

    /// Compose a signal.
    ///
    /// Returns `Ok(None)` for a neutral bias unless an explicit
    /// unknown-direction fallback is configured, in which case the signal
    /// is marked `degraded` and its confidence halved.
    pub fn compose(
        &self,
        analysis: &AnalysisResult,
        now: DateTime<Utc>,
    ) -> Result<Option<ComposedSignal>, ScanError> {
        validate(analysis)?;

        let confidence = analysis.confidence.clamp(0.0, 100.0);
        let (direction, confidence, degraded) = match analysis.direction.direction() {
            Some(direction) => (direction, confidence, false),
            None => match self.params.unknown_direction.fallback() {
                Some(direction) => {
                    warn!(
                        symbol = %analysis.symbol,
                        fallback = %direction,
                        "No directional bias, applying configured fallback as degraded signal"
                    );
                    (direction, confidence / 2.0, true)
                }
                None => return Ok(None),
            },
        };

        let price = analysis.reference_price;
        let [tp1, tp2, tp3] = target_levels(
            price,
            analysis.volatility,
            direction,
            self.params.target_multipliers,
        );
        let stop_loss = price - direction.sign() * analysis.volatility * self.params.stop_multiplier;
        if [tp1, tp2, tp3, stop_loss].iter().any(|level| *level <= 0.0) {
            return Err(ScanError::InvalidAnalysis {
                symbol: analysis.symbol.clone(),
                reason: format!("volatility {} puts a level at or below zero", analysis.volatility),
            });
        }
        let [p1, p2, p3] = reachability(confidence, price, [tp1, tp2, tp3]);

        let trade_type = TradeType::classify(confidence, self.params.scalping_cutoff);
        let leverage = match trade_type {
            TradeType::Scalping => self.params.scalping_leverage,
            TradeType::Normal => self.params.normal_leverage,
        };

        let px = self.params.price_decimals;
        let pp = self.params.probability_decimals;

        Ok(Some(ComposedSignal {
            id: Uuid::new_v4(),
            symbol: analysis.symbol.clone(),
            direction,
            entry_price: round_to(price, px),
            tp1: round_to(tp1, px),
            tp2: round_to(tp2, px),
            tp3: round_to(tp3, px),
            stop_loss: round_to(stop_loss, px),
            confidence: round_to(confidence, pp),
            trade_type,
            tp1_probability: round_to(p1, pp),
            tp2_probability: round_to(p2, pp),
            tp3_probability: round_to(p3, pp),
            leverage,
            degraded,
            timestamp: now,
        }))
    }
}

fn validate(analysis: &AnalysisResult) -> Result<(), ScanError> {
    let invalid = |reason: &str| ScanError::InvalidAnalysis {
        symbol: analysis.symbol.clone(),
        reason: reason.to_string(),
    };

    if !analysis.reference_price.is_finite() || analysis.reference_price <= 0.0 {
        return Err(invalid("reference price must be positive"));
    }
    if !analysis.volatility.is_finite() || analysis.volatility < 0.0 {
        return Err(invalid("volatility must be non-negative"));
    }
    if !analysis.confidence.is_finite() {
        return Err(invalid("confidence must be finite"));
    }
    Ok(())
}

/// Target levels `price + sign·v·k` for each multiplier.
pub fn target_levels(
    price: f64,
    volatility: f64,
    direction: Direction,
    multipliers: [f64; 3],
) -> [f64; 3] {
    multipliers.map(|k| price + direction.sign() * volatility * k)
}

/// `|x - price| / price`.
pub fn relative_distance(level: f64, price: f64) -> f64 {
    (level - price).abs() / price
}

/// Heuristic reachability percentages for three targets.
///
/// `factor = clamp(confidence / 50, 0.5, 2.0)`; each target starts from its
/// base, loses `distance·100·factor·weight`, is capped at its ceiling and
/// floored at zero.
pub fn reachability(confidence: f64, price: f64, targets: [f64; 3]) -> [f64; 3] {
    let factor = (confidence / 50.0).clamp(0.5, 2.0);

    let mut out = [0.0; 3];
    for (i, level) in targets.into_iter().enumerate() {
        let penalty = relative_distance(level, price) * 100.0 * factor * PROBABILITY_WEIGHTS[i];
        out[i] = (PROBABILITY_BASES[i] - penalty).min(PROBABILITY_CAPS[i]).max(0.0);
    }
    out
}

fn round_to(value: f64, decimals: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}
