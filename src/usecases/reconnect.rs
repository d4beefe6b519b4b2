//! Reconnect Policy - Staleness Detection and Backoff
//!
//! Decides when a cycle's failures indicate a dead market-data
//! connection and re-establishes it with exponential backoff instead of
//! tearing the connection down every cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::domain::error::{MarketDataError, ScanError};
use crate::domain::market::Instrument;
use crate::ports::market_data::{MarketData, MarketDataConnector};

/// When to reconnect and how hard to try.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
  /// Share of connectivity failures among evaluated symbols.
  pub failure_ratio: f64,
  /// Minimum connectivity failures before the ratio applies.
  pub min_failures: usize,
  /// Delay before the second attempt.
  pub base_delay: Duration,
  /// Backoff ceiling.
  pub max_delay: Duration,
  /// Consecutive failed attempts before giving up.
  pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
  fn default() -> Self {
    Self {
      failure_ratio: 0.5,
      min_failures: 3,
      base_delay: Duration::from_secs(1),
      max_delay: Duration::from_secs(60),
      max_attempts: 5,
    }
  }
}

impl ReconnectPolicy {
  /// Whether a cycle with these counts suggests the connection is stale.
  pub fn is_suspect(&self, evaluated: usize, connectivity_failures: usize) -> bool {
    if evaluated == 0 || connectivity_failures < self.min_failures {
      return false;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = connectivity_failures as f64 / evaluated as f64;
    ratio >= self.failure_ratio
  }

  /// Delay after failed attempt number `attempt` (0-based).
  pub fn backoff(&self, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    self
      .base_delay
      .checked_mul(factor)
      .map_or(self.max_delay, |d| d.min(self.max_delay))
  }
}

/// A live connection plus the universe it reported.
pub struct Session<M> {
  pub market: Arc<M>,
  pub universe: Vec<Instrument>,
}

/// Why opening a session failed.
#[derive(Debug)]
pub enum SessionFailure {
  Market(MarketDataError),
  EmptyUniverse,
}

impl std::fmt::Display for SessionFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Market(e) => write!(f, "{e}"),
      Self::EmptyUniverse => write!(f, "symbol universe is empty"),
    }
  }
}

/// Connect and load the universe once.
///
/// A connection that yields no symbols is released and reported as
/// `EmptyUniverse`.
pub async fn open_session<C: MarketDataConnector>(
  connector: &C,
) -> Result<Session<C::Market>, SessionFailure> {
  let market = connector.connect().await.map_err(SessionFailure::Market)?;

  let universe = match market.load_symbols().await {
    Ok(universe) => universe,
    Err(e) => {
      market.close().await;
      return Err(SessionFailure::Market(e));
    }
  };

  if universe.is_empty() {
    market.close().await;
    return Err(SessionFailure::EmptyUniverse);
  }

  Ok(Session { market, universe })
}

/// Re-establish a session with exponential backoff.
///
/// Returns `Ok(None)` when shutdown arrives while backing off.
///
/// # Errors
/// `ScanError::ReconnectExhausted` after `max_attempts` consecutive
/// failures (an empty universe counts as a failure).
#[instrument(skip_all, fields(max_attempts = policy.max_attempts))]
pub async fn reconnect<C: MarketDataConnector>(
  connector: &C,
  policy: &ReconnectPolicy,
  shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<Option<Session<C::Market>>, ScanError> {
  let mut last_error = String::new();

  for attempt in 0..policy.max_attempts {
    match open_session(connector).await {
      Ok(session) => {
        info!(
          attempt = attempt + 1,
          symbols = session.universe.len(),
          "Market data connection re-established"
        );
        return Ok(Some(session));
      }
      Err(e) => {
        last_error = e.to_string();
        if attempt + 1 < policy.max_attempts {
          let delay = policy.backoff(attempt);
          warn!(
            attempt = attempt + 1,
            error = %e,
            delay_ms = delay.as_millis(),
            "Reconnect attempt failed, backing off"
          );
          tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
              info!("Shutdown during reconnect backoff");
              return Ok(None);
            }
            () = sleep(delay) => {}
          }
        }
      }
    }
  }

  Err(ScanError::ReconnectExhausted {
    attempts: policy.max_attempts,
    last_error,
  })
}
