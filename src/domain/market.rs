//! Market data types shared by the exchange adapter and the analyzer.

use serde::{Deserialize, Serialize};

/// Opaque tradeable-instrument identifier (e.g. "BTCUSDT").
pub type Symbol = String;

/// Candle interval requested from the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// 15-minute candles (primary analysis series).
    M15,
    /// 1-hour candles (trend confirmation series).
    H1,
}

impl Timeframe {
    /// Exchange interval code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::M15 => "15m",
            Self::H1 => "1h",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time (Unix ms).
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base-asset volume.
    pub volume: f64,
}

/// An instrument of the scan universe, tagged active/quote-currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    pub base: String,
    pub quote: String,
    pub active: bool,
}

/// 24h rolling ticker statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: Symbol,
    /// Volume traded in the base asset.
    pub base_volume: f64,
    /// Volume traded in the quote asset.
    pub quote_volume: f64,
    pub last_price: f64,
}
