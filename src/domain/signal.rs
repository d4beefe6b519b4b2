//! Core signal domain types.
//!
//! Defines the analyzer output (`AnalysisResult`), the fully-formed
//! `ComposedSignal` handed to sinks, and the direction/trade-type enums
//! the emission policy reasons about.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ScanError;
use super::market::Symbol;

// ────────────────────────────────────────────
// Direction enums
// ────────────────────────────────────────────

/// Directional classification as produced by the analyzer.
///
/// `Neutral` is a successful "no directional bias" answer and is kept
/// distinct from an unparseable label, which is `ScanError::InvalidDirection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Long,
    Short,
    #[serde(rename = "NONE")]
    Neutral,
}

impl Bias {
    /// The tradeable direction, if any.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Long => Some(Direction::Long),
            Self::Short => Some(Direction::Short),
            Self::Neutral => None,
        }
    }
}

impl FromStr for Bias {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(Self::Long),
            "SHORT" => Ok(Self::Short),
            "NONE" | "NEUTRAL" => Ok(Self::Neutral),
            _ => Err(ScanError::InvalidDirection {
                label: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Neutral => write!(f, "NONE"),
        }
    }
}

/// A tradeable direction. Every `ComposedSignal` carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    /// +1 for long, -1 for short. Target levels move in this sign.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

// ────────────────────────────────────────────
// Trade type
// ────────────────────────────────────────────

/// Confidence-derived classification selecting which confidence bar applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    Scalping,
    Normal,
}

impl TradeType {
    /// Below the scalping cutoff a signal is a scalp; at or above it, a
    /// normal trade.
    pub fn classify(confidence: f64, scalping_cutoff: f64) -> Self {
        if confidence < scalping_cutoff {
            Self::Scalping
        } else {
            Self::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalping => "Scalping",
            Self::Normal => "Normal",
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────
// Analyzer output and composed signal
// ────────────────────────────────────────────

/// Raw analyzer verdict for one symbol in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: Symbol,
    /// Last traded price the levels are anchored on.
    pub reference_price: f64,
    pub direction: Bias,
    /// Analytic conviction in [0, 100].
    pub confidence: f64,
    /// Average-true-range-like volatility unit (>= 0).
    pub volatility: f64,
}

/// A fully-formed, immutable trade signal.
///
/// All price and probability fields are rounded exactly once, when the
/// composer builds the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedSignal {
    /// Idempotency key for sinks.
    pub id: Uuid,
    pub symbol: Symbol,
    pub direction: Direction,
    pub entry_price: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub stop_loss: f64,
    pub confidence: f64,
    pub trade_type: TradeType,
    pub tp1_probability: f64,
    pub tp2_probability: f64,
    pub tp3_probability: f64,
    pub leverage: u32,
    /// Set when the direction came from the unknown-direction fallback.
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}
