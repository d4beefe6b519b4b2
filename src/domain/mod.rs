//! Domain layer - Core signal logic and models.
//!
//! Pure types and rules for the scanner: signal model, composer, emission
//! policy, emission ledger, active-signal book and cycle report. Nothing here performs
//! I/O (hexagonal architecture inner ring).

pub mod active;
pub mod clock;
pub mod composer;
pub mod error;
pub mod ledger;
pub mod market;
pub mod policy;
pub mod report;
pub mod signal;

// Re-export core types for convenience
pub use active::{ActiveSignal, ActiveSignalBook};
pub use clock::{Clock, ManualClock, SystemClock};
pub use composer::{ComposerParams, SignalComposer, UnknownDirection};
pub use error::{MarketDataError, ScanError};
pub use ledger::{CycleContext, EmissionLedger, EmissionRecord};
pub use market::{Candle, Instrument, Symbol, Ticker, Timeframe};
pub use policy::{ConfidenceThresholds, EmissionPolicy, Rejection, Verdict};
pub use report::CycleReport;
pub use signal::{AnalysisResult, Bias, ComposedSignal, Direction, TradeType};
