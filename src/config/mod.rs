//! Configuration Module - TOML-based Scanner Configuration
//!
//! Loads and validates configuration from `config.toml` (or the path in
//! `SCANNER_CONFIG`). Credentials never live here; they are read from
//! the environment by the adapters that need them.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::composer::{ComposerParams, UnknownDirection};
use crate::domain::policy::ConfidenceThresholds;
use crate::usecases::reconnect::ReconnectPolicy;
use crate::usecases::scanner::ScanSettings;

/// Top-level scanner configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the first cycle runs.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Process identity and logging.
  pub bot: BotConfig,
  /// Cycle cadence, fan-out limits and universe selection.
  pub scanner: ScannerConfig,
  /// Emission policy thresholds.
  pub policy: PolicyConfig,
  /// Signal composition parameters.
  pub composer: ComposerConfig,
  /// Market data reconnect policy.
  pub reconnect: ReconnectConfig,
  /// Exchange REST endpoint.
  pub exchange: ExchangeConfig,
  /// Notification channel.
  pub notifier: NotifierConfig,
  /// Metrics and monitoring.
  pub metrics: MetricsConfig,
  /// Persistence configuration.
  pub persistence: PersistenceConfig,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Log signals instead of notifying.
  #[serde(default)]
  pub dry_run: bool,
}

/// Scan loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
  /// Sleep between cycles (seconds).
  #[serde(default = "default_interval")]
  pub interval_secs: u64,
  /// Per-symbol throttle before network calls (milliseconds).
  #[serde(default = "default_symbol_delay")]
  pub symbol_delay_ms: u64,
  /// Maximum symbols evaluated concurrently.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent_symbols: usize,
  /// Timeout for each network call of a symbol (seconds).
  #[serde(default = "default_symbol_timeout")]
  pub symbol_timeout_secs: u64,
  /// Candles requested per timeframe.
  #[serde(default = "default_candle_limit")]
  pub candle_limit: u32,
  /// Quote currency of the universe.
  #[serde(default = "default_quote_asset")]
  pub quote_asset: String,
  /// Universe size cap.
  #[serde(default = "default_max_symbols")]
  pub max_symbols: usize,
  /// Base-asset fragments marking leveraged or rebased tokens.
  #[serde(default = "default_excluded_tokens")]
  pub excluded_tokens: Vec<String>,
  /// Minimum 24h quote volume (0 disables the filter).
  #[serde(default)]
  pub min_quote_volume: f64,
  /// How long in-flight symbols may finish after shutdown (seconds).
  #[serde(default = "default_shutdown_grace")]
  pub shutdown_grace_secs: u64,
}

/// Emission policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
  /// Confidence below which a signal is a scalp.
  #[serde(default = "default_scalping_cutoff")]
  pub scalping_cutoff: f64,
  /// Minimum confidence for scalping signals.
  #[serde(default = "default_scalping_min")]
  pub scalping_min_confidence: f64,
  /// Minimum confidence for normal signals.
  #[serde(default = "default_normal_min")]
  pub normal_min_confidence: f64,
  /// How long an emitted signal blocks the opposite direction (seconds).
  #[serde(default = "default_active_ttl")]
  pub active_signal_ttl_secs: u64,
  /// What to do with a neutral bias: skip, long or short.
  #[serde(default)]
  pub unknown_direction: UnknownDirection,
}

/// Signal composition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposerConfig {
  /// Volatility multipliers for tp1, tp2, tp3.
  #[serde(default = "default_target_multipliers")]
  pub target_multipliers: [f64; 3],
  /// Volatility multiplier for the stop.
  #[serde(default = "default_stop_multiplier")]
  pub stop_multiplier: f64,
  #[serde(default = "default_price_decimals")]
  pub price_decimals: u32,
  #[serde(default = "default_probability_decimals")]
  pub probability_decimals: u32,
  #[serde(default = "default_scalping_leverage")]
  pub scalping_leverage: u32,
  #[serde(default = "default_normal_leverage")]
  pub normal_leverage: u32,
}

/// Reconnect policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
  /// Share of connectivity failures that makes a cycle suspect.
  #[serde(default = "default_failure_ratio")]
  pub failure_ratio: f64,
  /// Minimum connectivity failures before the ratio is considered.
  #[serde(default = "default_min_failures")]
  pub min_failures: usize,
  /// First backoff delay (milliseconds).
  #[serde(default = "default_base_delay")]
  pub base_delay_ms: u64,
  /// Backoff ceiling (milliseconds).
  #[serde(default = "default_max_delay")]
  pub max_delay_ms: u64,
  /// Consecutive failed attempts before giving up.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
}

/// Exchange endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
  /// REST base URL.
  #[serde(default = "default_exchange_url")]
  pub base_url: String,
  /// HTTP request timeout (seconds).
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  /// Request budget enforced client-side.
  #[serde(default = "default_requests_per_minute")]
  pub requests_per_minute: u32,
}

/// Notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
  /// Deliver signals to Telegram (needs TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID).
  #[serde(default)]
  pub telegram_enabled: bool,
  /// Telegram Bot API base URL.
  #[serde(default = "default_telegram_url")]
  pub telegram_api_url: String,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the state file and the signal log.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
  /// Emission state file name.
  #[serde(default = "default_state_file")]
  pub state_file: String,
  /// CSV signal log file name.
  #[serde(default = "default_signal_log")]
  pub signal_log_file: String,
}

impl AppConfig {
  /// Composer parameters from the `[composer]` and `[policy]` sections.
  pub fn composer_params(&self) -> ComposerParams {
    ComposerParams {
      target_multipliers: self.composer.target_multipliers,
      stop_multiplier: self.composer.stop_multiplier,
      price_decimals: self.composer.price_decimals,
      probability_decimals: self.composer.probability_decimals,
      scalping_cutoff: self.policy.scalping_cutoff,
      scalping_leverage: self.composer.scalping_leverage,
      normal_leverage: self.composer.normal_leverage,
      unknown_direction: self.policy.unknown_direction,
    }
  }

  pub fn thresholds(&self) -> ConfidenceThresholds {
    ConfidenceThresholds {
      scalping_min: self.policy.scalping_min_confidence,
      normal_min: self.policy.normal_min_confidence,
    }
  }

  pub fn active_signal_ttl(&self) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(self.policy.active_signal_ttl_secs).unwrap_or(i64::MAX))
  }

  pub fn scan_settings(&self) -> ScanSettings {
    ScanSettings {
      interval: Duration::from_secs(self.scanner.interval_secs),
      symbol_delay: Duration::from_millis(self.scanner.symbol_delay_ms),
      max_concurrent: self.scanner.max_concurrent_symbols,
      symbol_timeout: Duration::from_secs(self.scanner.symbol_timeout_secs),
      candle_limit: self.scanner.candle_limit,
      min_quote_volume: self.scanner.min_quote_volume,
      shutdown_grace: Duration::from_secs(self.scanner.shutdown_grace_secs),
    }
  }

  pub fn reconnect_policy(&self) -> ReconnectPolicy {
    ReconnectPolicy {
      failure_ratio: self.reconnect.failure_ratio,
      min_failures: self.reconnect.min_failures,
      base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
      max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
      max_attempts: self.reconnect.max_attempts,
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_interval() -> u64 {
  180
}

fn default_symbol_delay() -> u64 {
  200
}

fn default_max_concurrent() -> usize {
  8
}

fn default_symbol_timeout() -> u64 {
  30
}

fn default_candle_limit() -> u32 {
  100
}

fn default_quote_asset() -> String {
  "USDT".to_string()
}

fn default_max_symbols() -> usize {
  100
}

fn default_excluded_tokens() -> Vec<String> {
  ["UP", "DOWN", "BULL", "BEAR", "1000"]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_shutdown_grace() -> u64 {
  10
}

fn default_scalping_cutoff() -> f64 {
  70.0
}

fn default_scalping_min() -> f64 {
  60.0
}

fn default_normal_min() -> f64 {
  75.0
}

fn default_active_ttl() -> u64 {
  14_400 // 4h
}

fn default_target_multipliers() -> [f64; 3] {
  [1.2, 2.0, 3.0]
}

fn default_stop_multiplier() -> f64 {
  1.0
}

fn default_price_decimals() -> u32 {
  3
}

fn default_probability_decimals() -> u32 {
  2
}

fn default_scalping_leverage() -> u32 {
  20
}

fn default_normal_leverage() -> u32 {
  10
}

fn default_failure_ratio() -> f64 {
  0.5
}

fn default_min_failures() -> usize {
  3
}

fn default_base_delay() -> u64 {
  1_000
}

fn default_max_delay() -> u64 {
  60_000
}

fn default_max_attempts() -> u32 {
  5
}

fn default_exchange_url() -> String {
  "https://api.binance.com".to_string()
}

fn default_request_timeout() -> u64 {
  10
}

fn default_requests_per_minute() -> u32 {
  1_200
}

fn default_telegram_url() -> String {
  "https://api.telegram.org".to_string()
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_state_file() -> String {
  "sent_signals.json".to_string()
}

fn default_signal_log() -> String {
  "signals.csv".to_string()
}
