//! Binance Spot REST Adapter - Universe, Klines and Tickers
//!
//! Implements the `MarketData` port over the public Binance spot REST
//! API. Every request first waits on a shared `governor` limiter so the
//! configured request budget holds across reconnects, then maps HTTP
//! failures onto typed `MarketDataError`s.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use super::types::{ExchangeInfoResponse, Ticker24hResponse, UniverseFilter, parse_kline};
use crate::domain::market::{Candle, Instrument, Ticker, Timeframe};
use crate::ports::market_data::{MarketData, MarketDataConnector, MarketDataError};

/// Configuration for the Binance REST adapter.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
  /// REST base URL.
  pub base_url: String,
  /// Per-request HTTP timeout.
  pub request_timeout: Duration,
  /// Client-side request budget.
  pub requests_per_minute: u32,
  /// Universe selection.
  pub universe: UniverseFilter,
}

impl Default for BinanceConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.binance.com".to_string(),
      request_timeout: Duration::from_secs(10),
      requests_per_minute: 1_200,
      universe: UniverseFilter::default(),
    }
  }
}

/// Creates `BinanceMarket` connections sharing one rate limiter.
pub struct BinanceConnector {
  config: BinanceConfig,
  limiter: Arc<DefaultDirectRateLimiter>,
}

impl BinanceConnector {
  /// Create a connector.
  ///
  /// # Errors
  /// Fails if `requests_per_minute` is zero.
  pub fn new(config: BinanceConfig) -> anyhow::Result<Self> {
    let rate = NonZeroU32::new(config.requests_per_minute)
      .context("exchange.requests_per_minute must be positive")?;
    let limiter = Arc::new(DefaultDirectRateLimiter::direct(Quota::per_minute(rate)));

    Ok(Self { config, limiter })
  }
}

#[async_trait]
impl MarketDataConnector for BinanceConnector {
  type Market = BinanceMarket;

  #[instrument(skip(self), fields(base_url = %self.config.base_url))]
  async fn connect(&self) -> Result<Arc<BinanceMarket>, MarketDataError> {
    let http = Client::builder()
      .timeout(self.config.request_timeout)
      .pool_max_idle_per_host(8)
      .build()
      .map_err(|e| MarketDataError::Transport(e.to_string()))?;

    let market = BinanceMarket {
      http,
      base_url: self.config.base_url.trim_end_matches('/').to_string(),
      limiter: Arc::clone(&self.limiter),
      universe: self.config.universe.clone(),
      closed: AtomicBool::new(false),
    };

    market.get::<serde_json::Value>("/api/v3/ping", &[]).await?;
    info!("Binance REST connection established");

    Ok(Arc::new(market))
  }
}

/// One Binance REST session.
pub struct BinanceMarket {
  /// Underlying HTTP client.
  http: Client,
  /// REST base URL without trailing slash.
  base_url: String,
  /// Shared request budget.
  limiter: Arc<DefaultDirectRateLimiter>,
  /// Universe selection.
  universe: UniverseFilter,
  /// Set by `close()`.
  closed: AtomicBool,
}

impl BinanceMarket {
  /// Rate-limited GET returning decoded JSON.
  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T, MarketDataError> {
    if self.closed.load(Ordering::Acquire) {
      return Err(MarketDataError::Closed);
    }

    self.limiter.until_ready().await;

    let url = format!("{}{}", self.base_url, path);
    let response = self
      .http
      .get(&url)
      .query(query)
      .send()
      .await
      .map_err(classify_transport)?;

    let status = response.status();
    if let Some(error) = classify_status(status) {
      return Err(match error {
        MarketDataError::Api { status, .. } => MarketDataError::Api {
          status,
          body: response.text().await.unwrap_or_default(),
        },
        other => other,
      });
    }

    response.json::<T>().await.map_err(|e| {
      if e.is_timeout() {
        MarketDataError::Timeout
      } else {
        MarketDataError::Decode(e.to_string())
      }
    })
  }
}

#[async_trait]
impl MarketData for BinanceMarket {
  #[instrument(skip(self))]
  async fn load_symbols(&self) -> Result<Vec<Instrument>, MarketDataError> {
    let info: ExchangeInfoResponse = self.get("/api/v3/exchangeInfo", &[]).await?;
    let listed = info.symbols.len();
    let universe = self.universe.select(info.symbols);

    info!(listed, selected = universe.len(), "Exchange universe loaded");
    Ok(universe)
  }

  async fn fetch_candles(
    &self,
    symbol: &str,
    timeframe: Timeframe,
    limit: u32,
  ) -> Result<Vec<Candle>, MarketDataError> {
    let rows: Vec<Vec<serde_json::Value>> = self
      .get(
        "/api/v3/klines",
        &[
          ("symbol", symbol.to_string()),
          ("interval", timeframe.as_str().to_string()),
          ("limit", limit.to_string()),
        ],
      )
      .await?;

    let total = rows.len();
    let candles: Vec<Candle> = rows.iter().filter_map(|row| parse_kline(row)).collect();
    if candles.len() != total {
      debug!(symbol, dropped = total - candles.len(), "Malformed kline rows skipped");
    }

    Ok(candles)
  }

  async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError> {
    let raw: Ticker24hResponse = self
      .get("/api/v3/ticker/24hr", &[("symbol", symbol.to_string())])
      .await?;

    raw
      .into_ticker()
      .ok_or_else(|| MarketDataError::Decode(format!("unparseable ticker for {symbol}")))
  }

  async fn close(&self) {
    if !self.closed.swap(true, Ordering::AcqRel) {
      info!("Binance REST connection closed");
    }
  }
}

/// Map a non-success status to an error; `None` for 2xx.
///
/// `Api` is returned with an empty body for the caller to fill in.
fn classify_status(status: StatusCode) -> Option<MarketDataError> {
  if status.is_success() {
    return None;
  }
  Some(match status.as_u16() {
    429 | 418 => MarketDataError::RateLimited,
    _ if status.is_server_error() => MarketDataError::Transport(format!("server error {status}")),
    code => MarketDataError::Api {
      status: code,
      body: String::new(),
    },
  })
}

fn classify_transport(e: reqwest::Error) -> MarketDataError {
  if e.is_timeout() {
    MarketDataError::Timeout
  } else {
    MarketDataError::Transport(e.to_string())
  }
}
