//! Market Data Port - Exchange Instrument and Candle Interface
//!
//! Defines the trait for pulling the symbol universe, OHLCV series and
//! 24h tickers from an exchange. Connectivity failures are typed
//! (`MarketDataError`) so callers can tell a broken connection from
//! "no data" (an empty series).

use std::sync::Arc;

use async_trait::async_trait;

pub use crate::domain::error::MarketDataError;
use crate::domain::market::{Candle, Instrument, Ticker, Timeframe};

/// Trait for market data providers.
///
/// One instance represents one live connection. After `close()` every
/// call fails with `MarketDataError::Closed` and the instance must be
/// replaced through a `MarketDataConnector`.
#[async_trait]
pub trait MarketData: Send + Sync + 'static {
  /// Load the scan universe, in exchange order, already filtered to
  /// active instruments of the configured quote currency.
  async fn load_symbols(&self) -> Result<Vec<Instrument>, MarketDataError>;

  /// Fetch the most recent `limit` candles, oldest first.
  async fn fetch_candles(
    &self,
    symbol: &str,
    timeframe: Timeframe,
    limit: u32,
  ) -> Result<Vec<Candle>, MarketDataError>;

  /// Fetch 24h rolling statistics.
  async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError>;

  /// Release the connection.
  async fn close(&self);
}

/// Factory for fresh market data connections.
///
/// The orchestrator connects once at startup and again whenever the
/// reconnect policy decides the current connection is stale.
#[async_trait]
pub trait MarketDataConnector: Send + Sync + 'static {
  /// Concrete connection type produced by this connector.
  type Market: MarketData;

  /// Open a new connection.
  async fn connect(&self) -> Result<Arc<Self::Market>, MarketDataError>;
}
