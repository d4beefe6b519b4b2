//! Dedup & Emission Policy - the single gate in front of the sinks.
//!
//! Rules, first match wins:
//! 1. symbol already accepted earlier in this cycle
//! 2. symbol already emitted on the cycle date or the current UTC date
//! 3. confidence below the bar for the signal's trade type
//! 4. an opposite-direction signal for the symbol is still active
//! 5. otherwise accept
//!
//! Rules 1 and 2 defend against different failure modes (duplicate
//! concurrent tasks vs. historical state) and are checked independently.

use chrono::{DateTime, Utc};

use super::active::ActiveSignalBook;
use super::ledger::{CycleContext, EmissionLedger};
use super::signal::{ComposedSignal, TradeType};

/// Minimum confidence per trade type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThresholds {
    pub scalping_min: f64,
    pub normal_min: f64,
}

impl ConfidenceThresholds {
    pub fn required(&self, trade_type: TradeType) -> f64 {
        match trade_type {
            TradeType::Scalping => self.scalping_min,
            TradeType::Normal => self.normal_min,
        }
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            scalping_min: 60.0,
            normal_min: 75.0,
        }
    }
}

/// Why a signal was not emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    AlreadyProcessedThisCycle,
    AlreadySentToday,
    BelowThreshold {
        trade_type: TradeType,
        confidence: f64,
        required: f64,
    },
    OppositeActive,
}

impl Rejection {
    /// Metric/log label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AlreadyProcessedThisCycle => "already_processed_this_cycle",
            Self::AlreadySentToday => "already_sent_today",
            Self::BelowThreshold { .. } => "below_threshold",
            Self::OppositeActive => "opposite_active",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyProcessedThisCycle => write!(f, "already processed this cycle"),
            Self::AlreadySentToday => write!(f, "already sent today"),
            Self::BelowThreshold {
                trade_type,
                confidence,
                required,
            } => write!(f, "{trade_type} confidence {confidence} < {required}"),
            Self::OppositeActive => write!(f, "opposite still active"),
        }
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

/// Stateless rule set. All state is passed in so the caller controls
/// locking and tests can inject fresh stores.
#[derive(Debug, Clone, Default)]
pub struct EmissionPolicy {
    thresholds: ConfidenceThresholds,
}

impl EmissionPolicy {
    pub fn new(thresholds: ConfidenceThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> ConfidenceThresholds {
        self.thresholds
    }

    /// Evaluate `signal` against the cycle, the ledger and the active book.
    pub fn evaluate(
        &self,
        signal: &ComposedSignal,
        cycle: &CycleContext,
        ledger: &EmissionLedger,
        active: &ActiveSignalBook,
        now: DateTime<Utc>,
    ) -> Verdict {
        if cycle.is_processed(&signal.symbol) {
            return Verdict::Reject(Rejection::AlreadyProcessedThisCycle);
        }

        if ledger.emitted_on(&signal.symbol, cycle.date)
            || ledger.emitted_on(&signal.symbol, now.date_naive())
        {
            return Verdict::Reject(Rejection::AlreadySentToday);
        }

        let required = self.thresholds.required(signal.trade_type);
        if signal.confidence < required {
            return Verdict::Reject(Rejection::BelowThreshold {
                trade_type: signal.trade_type,
                confidence: signal.confidence,
                required,
            });
        }

        if active.opposite_active(&signal.symbol, signal.direction, now) {
            return Verdict::Reject(Rejection::OppositeActive);
        }

        Verdict::Accept
    }
}
