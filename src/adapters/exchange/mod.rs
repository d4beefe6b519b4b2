//! Exchange Market Data Adapter
//!
//! Implements the `MarketData` and `MarketDataConnector` ports over the
//! Binance spot REST API.
//!
//! Sub-modules:
//! - `binance`: rate-limited HTTP session and connector
//! - `types`: wire types, universe filter and kline parsing

pub mod binance;
pub mod types;

pub use binance::{BinanceConfig, BinanceConnector, BinanceMarket};
pub use types::UniverseFilter;
