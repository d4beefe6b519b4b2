//! Error Taxonomy - Per-symbol and Process-level Failures
//!
//! Every per-symbol failure is converted into a cycle-local skip at the
//! symbol-task boundary. Only `FatalStartup` and `ReconnectExhausted`
//! propagate to process exit.

use thiserror::Error;

/// Failures surfaced by a Market Data Adapter.
///
/// "No data" is not an error: an empty candle series is `Ok(vec![])`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// Network-level failure (connect refused, reset, DNS, 5xx).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within its deadline.
    #[error("request timed out")]
    Timeout,

    /// The exchange asked us to back off (HTTP 429/418).
    #[error("rate limited by exchange")]
    RateLimited,

    /// Any other non-success HTTP answer.
    #[error("exchange API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The payload did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The adapter was closed and must be replaced.
    #[error("market data connection closed")]
    Closed,
}

impl MarketDataError {
    /// Whether this failure suggests the connection itself is unusable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout | Self::Closed)
    }
}

/// Failures the scan pipeline can raise.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Network or rate-limit failure fetching candles or tickers.
    /// The symbol is skipped this cycle and retried next cycle.
    #[error("transient fetch failure for {symbol}: {source}")]
    TransientFetch {
        symbol: String,
        #[source]
        source: MarketDataError,
    },

    /// The analyzer had nothing to say about this symbol. Not an error
    /// condition, but it travels the same skip path.
    #[error("analysis unavailable for {0}")]
    AnalysisUnavailable(String),

    /// A direction label that is neither LONG, SHORT nor NONE.
    #[error("invalid direction label {label:?}")]
    InvalidDirection { label: String },

    /// Analyzer output that cannot be turned into price levels
    /// (non-positive price, negative or non-finite volatility).
    #[error("invalid analysis for {symbol}: {reason}")]
    InvalidAnalysis { symbol: String, reason: String },

    /// The state store could not be read or written.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Startup cannot proceed (empty universe, missing credentials).
    #[error("fatal startup error: {0}")]
    FatalStartup(String),

    /// The market-data connection could not be re-established.
    #[error("market data reconnect failed after {attempts} attempts: {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },
}

impl ScanError {
    /// Short machine-friendly label used for log fields and metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TransientFetch { .. } => "fetch_failed",
            Self::AnalysisUnavailable(_) => "analysis_unavailable",
            Self::InvalidDirection { .. } => "invalid_direction",
            Self::InvalidAnalysis { .. } => "invalid_analysis",
            Self::Persistence(_) => "persistence",
            Self::FatalStartup(_) => "fatal_startup",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
        }
    }

    /// Whether the failure points at a broken market-data connection.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::TransientFetch { source, .. } if source.is_connectivity())
    }

    /// Whether this error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalStartup(_) | Self::ReconnectExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        let timeout = ScanError::TransientFetch {
            symbol: "BTCUSDT".to_string(),
            source: MarketDataError::Timeout,
        };
        assert!(timeout.is_connectivity());
        assert_eq!(timeout.reason(), "fetch_failed");

        let api = ScanError::TransientFetch {
            symbol: "BTCUSDT".to_string(),
            source: MarketDataError::Api {
                status: 400,
                body: "bad symbol".to_string(),
            },
        };
        assert!(!api.is_connectivity());
    }

    #[test]
    fn test_rate_limit_is_not_connectivity() {
        assert!(!MarketDataError::RateLimited.is_connectivity());
        assert!(MarketDataError::Closed.is_connectivity());
        assert!(!MarketDataError::Decode("eof".into()).is_connectivity());
    }

    #[test]
    fn test_only_startup_and_reconnect_are_fatal() {
        assert!(ScanError::FatalStartup("no symbols".into()).is_fatal());
        assert!(
            ScanError::ReconnectExhausted {
                attempts: 5,
                last_error: "refused".into()
            }
            .is_fatal()
        );
        assert!(!ScanError::Persistence("disk full".into()).is_fatal());
        assert!(!ScanError::AnalysisUnavailable("ETHUSDT".into()).is_fatal());
    }
}
