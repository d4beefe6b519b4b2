//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "SCANNER_CONFIG";

/// Config file used when `SCANNER_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Resolve the config path from the environment.
pub fn config_path() -> String {
  std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    interval_secs = config.scanner.interval_secs,
    max_symbols = config.scanner.max_symbols,
    quote = %config.scanner.quote_asset,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  // Scanner validation
  let scanner = &config.scanner;
  anyhow::ensure!(scanner.interval_secs > 0, "scanner.interval_secs must be positive");
  anyhow::ensure!(
    scanner.max_concurrent_symbols > 0,
    "scanner.max_concurrent_symbols must be positive"
  );
  anyhow::ensure!(
    scanner.symbol_timeout_secs > 0,
    "scanner.symbol_timeout_secs must be positive"
  );
  anyhow::ensure!(
    scanner.candle_limit > 0 && scanner.candle_limit <= 1000,
    "scanner.candle_limit must be in (0, 1000], got {}",
    scanner.candle_limit
  );
  anyhow::ensure!(scanner.max_symbols > 0, "scanner.max_symbols must be positive");
  anyhow::ensure!(!scanner.quote_asset.is_empty(), "scanner.quote_asset must not be empty");
  anyhow::ensure!(
    scanner.min_quote_volume >= 0.0,
    "scanner.min_quote_volume must be non-negative"
  );

  // Policy validation
  let policy = &config.policy;
  for (name, value) in [
    ("scalping_cutoff", policy.scalping_cutoff),
    ("scalping_min_confidence", policy.scalping_min_confidence),
    ("normal_min_confidence", policy.normal_min_confidence),
  ] {
    anyhow::ensure!(
      (0.0..=100.0).contains(&value),
      "policy.{name} must be in [0, 100], got {value}"
    );
  }
  anyhow::ensure!(
    policy.active_signal_ttl_secs > 0,
    "policy.active_signal_ttl_secs must be positive"
  );

  // Composer validation
  let composer = &config.composer;
  let [k1, k2, k3] = composer.target_multipliers;
  anyhow::ensure!(
    k1 > 0.0 && k1 < k2 && k2 < k3,
    "composer.target_multipliers must be positive and increasing, got {:?}",
    composer.target_multipliers
  );
  anyhow::ensure!(
    composer.stop_multiplier > 0.0,
    "composer.stop_multiplier must be positive"
  );
  anyhow::ensure!(
    composer.price_decimals <= 12 && composer.probability_decimals <= 12,
    "composer decimals must be at most 12"
  );
  anyhow::ensure!(
    composer.scalping_leverage > 0 && composer.normal_leverage > 0,
    "composer leverage must be positive"
  );

  // Reconnect validation
  let reconnect = &config.reconnect;
  anyhow::ensure!(
    reconnect.failure_ratio > 0.0 && reconnect.failure_ratio <= 1.0,
    "reconnect.failure_ratio must be in (0, 1], got {}",
    reconnect.failure_ratio
  );
  anyhow::ensure!(reconnect.max_attempts > 0, "reconnect.max_attempts must be positive");
  anyhow::ensure!(
    reconnect.base_delay_ms <= reconnect.max_delay_ms,
    "reconnect.base_delay_ms must not exceed max_delay_ms"
  );

  // Exchange validation
  anyhow::ensure!(
    !config.exchange.base_url.is_empty(),
    "exchange.base_url must not be empty"
  );
  anyhow::ensure!(
    config.exchange.requests_per_minute > 0,
    "exchange.requests_per_minute must be positive"
  );

  // Persistence validation
  anyhow::ensure!(
    !config.persistence.state_file.is_empty() && !config.persistence.signal_log_file.is_empty(),
    "persistence file names must not be empty"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::composer::UnknownDirection;

  const MINIMAL: &str = r#"
[bot]
name = "scanner-test"

[scanner]
[policy]
[composer]
[reconnect]
[exchange]
[notifier]
[metrics]
[persistence]
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = parse_config(MINIMAL).unwrap();
    assert_eq!(config.scanner.interval_secs, 180);
    assert_eq!(config.scanner.excluded_tokens.len(), 5);
    assert_eq!(config.policy.unknown_direction, UnknownDirection::Skip);
    assert_eq!(config.thresholds().normal_min, 75.0);
    assert_eq!(config.composer_params().target_multipliers, [1.2, 2.0, 3.0]);
    assert_eq!(config.active_signal_ttl(), chrono::Duration::hours(4));
    assert!(!config.notifier.telegram_enabled);
  }

  #[test]
  fn test_unknown_direction_is_parsed() {
    let text = MINIMAL.replace("[policy]", "[policy]\nunknown_direction = \"long\"");
    let config = parse_config(&text).unwrap();
    assert_eq!(config.policy.unknown_direction, UnknownDirection::Long);
  }

  #[test]
  fn test_rejects_non_increasing_multipliers() {
    let text = MINIMAL.replace("[composer]", "[composer]\ntarget_multipliers = [2.0, 1.2, 3.0]");
    assert!(parse_config(&text).is_err());
  }

  #[test]
  fn test_rejects_threshold_out_of_range() {
    let text = MINIMAL.replace("[policy]", "[policy]\nnormal_min_confidence = 120.0");
    assert!(parse_config(&text).is_err());
  }

  #[test]
  fn test_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, MINIMAL).unwrap();
    let config = load_config(path.to_str().unwrap()).unwrap();
    assert_eq!(config.bot.name, "scanner-test");
  }

  #[test]
  fn test_shipped_config_is_valid() {
    let config = parse_config(include_str!("../../config.toml")).unwrap();
    assert!(config.bot.dry_run);
    assert_eq!(config.scan_settings().max_concurrent, 8);
    assert_eq!(config.reconnect_policy().max_attempts, 5);
  }
}
