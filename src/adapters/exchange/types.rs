//! Binance REST Response Types
//!
//! Wire shapes for the public spot endpoints the scanner reads and their
//! conversion into domain types. Binance encodes decimals as strings.

use serde::Deserialize;

use crate::domain::market::{Candle, Instrument, Ticker};

/// `GET /api/v3/exchangeInfo` (only the fields we use).
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
  pub symbols: Vec<SymbolInfo>,
}

/// One listed trading pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
  pub symbol: String,
  /// "TRADING", "BREAK", "HALT", ...
  pub status: String,
  pub base_asset: String,
  pub quote_asset: String,
}

/// `GET /api/v3/ticker/24hr?symbol=...`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hResponse {
  pub symbol: String,
  /// Base-asset volume.
  pub volume: String,
  pub quote_volume: String,
  pub last_price: String,
}

impl Ticker24hResponse {
  /// Convert to the domain ticker; `None` if a number does not parse.
  pub fn into_ticker(self) -> Option<Ticker> {
    Some(Ticker {
      base_volume: self.volume.parse().ok()?,
      quote_volume: self.quote_volume.parse().ok()?,
      last_price: self.last_price.parse().ok()?,
      symbol: self.symbol,
    })
  }
}

/// Which listed pairs make up the scan universe.
#[derive(Debug, Clone)]
pub struct UniverseFilter {
  /// Required quote currency, e.g. "USDT".
  pub quote_asset: String,
  /// Base-asset fragments of leveraged/rebased tokens to drop.
  pub excluded_tokens: Vec<String>,
  /// Universe size cap.
  pub max_symbols: usize,
}

impl Default for UniverseFilter {
  fn default() -> Self {
    Self {
      quote_asset: "USDT".to_string(),
      excluded_tokens: ["UP", "DOWN", "BULL", "BEAR", "1000"]
        .iter()
        .map(ToString::to_string)
        .collect(),
      max_symbols: 100,
    }
  }
}

impl UniverseFilter {
  /// Keep trading pairs in the quote currency, drop excluded tokens,
  /// truncate to the cap. Exchange order is preserved.
  pub fn select(&self, symbols: Vec<SymbolInfo>) -> Vec<Instrument> {
    symbols
      .into_iter()
      .filter(|s| s.status == "TRADING" && s.quote_asset == self.quote_asset)
      .filter(|s| !self.excluded_tokens.iter().any(|t| s.base_asset.contains(t.as_str())))
      .take(self.max_symbols)
      .map(|s| Instrument {
        symbol: s.symbol,
        base: s.base_asset,
        quote: s.quote_asset,
        active: true,
      })
      .collect()
  }
}

/// Parse one kline row:
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
pub fn parse_kline(row: &[serde_json::Value]) -> Option<Candle> {
  if row.len() < 6 {
    return None;
  }
  let num = |i: usize| row[i].as_str()?.parse::<f64>().ok();

  Some(Candle {
    open_time_ms: row[0].as_i64()?,
    open: num(1)?,
    high: num(2)?,
    low: num(3)?,
    close: num(4)?,
    volume: num(5)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn info(symbol: &str, base: &str, quote: &str, status: &str) -> SymbolInfo {
    SymbolInfo {
      symbol: symbol.into(),
      status: status.into(),
      base_asset: base.into(),
      quote_asset: quote.into(),
    }
  }

  #[test]
  fn test_universe_filter() {
    let listed = vec![
      info("BTCUSDT", "BTC", "USDT", "TRADING"),
      info("ETHBTC", "ETH", "BTC", "TRADING"),
      info("BTCUPUSDT", "BTCUP", "USDT", "TRADING"),
      info("1000SATSUSDT", "1000SATS", "USDT", "TRADING"),
      info("LUNAUSDT", "LUNA", "USDT", "BREAK"),
      info("SOLUSDT", "SOL", "USDT", "TRADING"),
    ];
    let universe = UniverseFilter::default().select(listed);
    let symbols: Vec<_> = universe.iter().map(|i| i.symbol.as_str()).collect();
    assert_eq!(symbols, ["BTCUSDT", "SOLUSDT"]);
    assert!(universe.iter().all(|i| i.active && i.quote == "USDT"));
  }

  #[test]
  fn test_universe_cap() {
    let listed = (0..10)
      .map(|i| info(&format!("C{i}USDT"), &format!("C{i}"), "USDT", "TRADING"))
      .collect();
    let filter = UniverseFilter {
      max_symbols: 3,
      ..UniverseFilter::default()
    };
    assert_eq!(filter.select(listed).len(), 3);
  }

  #[test]
  fn test_parse_kline_row() {
    let row = json!([1_700_000_000_000_i64, "1.5", "2.0", "1.0", "1.8", "1234.5", 1_700_000_899_999_i64]);
    let candle = parse_kline(row.as_array().unwrap()).unwrap();
    assert_eq!(candle.open_time_ms, 1_700_000_000_000);
    assert_eq!(candle.close, 1.8);
    assert_eq!(candle.volume, 1234.5);

    let short = json!([1, "1.0"]);
    assert!(parse_kline(short.as_array().unwrap()).is_none());
  }

  #[test]
  fn test_ticker_conversion() {
    let raw: Ticker24hResponse = serde_json::from_value(json!({
      "symbol": "BTCUSDT",
      "volume": "100.5",
      "quoteVolume": "6500000.25",
      "lastPrice": "64000.1",
      "priceChange": "12.0"
    }))
    .unwrap();
    let ticker = raw.into_ticker().unwrap();
    assert_eq!(ticker.quote_volume, 6_500_000.25);
    assert_eq!(ticker.symbol, "BTCUSDT");
  }
}
