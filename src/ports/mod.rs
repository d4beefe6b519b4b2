//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MarketData` / `MarketDataConnector`: exchange universe, candles, tickers
//! - `SignalAnalyzer`: indicator and direction prediction black box
//! - `SignalSink`: notification and archival of emitted signals
//! - `LedgerRepository`: durable once-per-day emission state

pub mod analyzer;
pub mod market_data;
pub mod repository;
pub mod sink;

pub use analyzer::SignalAnalyzer;
pub use market_data::{MarketData, MarketDataConnector, MarketDataError};
pub use repository::LedgerRepository;
pub use sink::{SignalSink, SinkError};
