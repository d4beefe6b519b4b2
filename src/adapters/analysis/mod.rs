//! Analysis Adapters
//!
//! Reference implementation of the `SignalAnalyzer` port built on
//! classic trend indicators.

pub mod indicators;
pub mod technical;

pub use technical::TechnicalAnalyzer;
