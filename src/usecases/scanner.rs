//! Scan Cycle Orchestrator - Concurrent Per-symbol Signal Pipeline
//!
//! Drives the repeating cycle:
//! 1. Start the cycle on the emission gate (prune + persist, fresh context)
//! 2. Fan out one task per symbol, bounded by a semaphore
//! 3. Per symbol: candles → liquidity → analyze → predict → compose → gate
//! 4. Fan in outcomes; failures stay local to their symbol
//! 5. Record resource usage, reconnect if the connection looks stale
//! 6. Sleep, repeat
//!
//! Shutdown stops scheduling, lets in-flight symbols finish within a
//! grace period, then abandons the rest and releases the connection.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::clock::Clock;
use crate::domain::composer::SignalComposer;
use crate::domain::error::{MarketDataError, ScanError};
use crate::domain::market::{Symbol, Timeframe};
use crate::domain::policy::Rejection;
use crate::domain::report::CycleReport;
use crate::domain::signal::Direction;
use crate::ports::analyzer::SignalAnalyzer;
use crate::ports::market_data::{MarketData, MarketDataConnector};

use super::gate::{EmissionGate, Submission};
use super::reconnect::{ReconnectPolicy, Session, open_session, reconnect};

/// Cadence and fan-out limits of the scan loop.
#[derive(Debug, Clone)]
pub struct ScanSettings {
  /// Sleep between cycles.
  pub interval: Duration,
  /// Throttle before every network call of a symbol.
  pub symbol_delay: Duration,
  /// Concurrently evaluated symbols.
  pub max_concurrent: usize,
  /// Bound on each network call of a symbol.
  pub symbol_timeout: Duration,
  /// Candles per timeframe.
  pub candle_limit: u32,
  /// Minimum 24h quote volume; 0 disables the ticker check.
  pub min_quote_volume: f64,
  /// How long in-flight symbols may finish after shutdown.
  pub shutdown_grace: Duration,
}

impl Default for ScanSettings {
  fn default() -> Self {
    Self {
      interval: Duration::from_secs(180),
      symbol_delay: Duration::from_millis(200),
      max_concurrent: 8,
      symbol_timeout: Duration::from_secs(30),
      candle_limit: 100,
      min_quote_volume: 0.0,
      shutdown_grace: Duration::from_secs(10),
    }
  }
}

/// Terminal state of one symbol in one cycle.
#[derive(Debug)]
pub enum SymbolOutcome {
  /// Passed the policy and was handed to the sink.
  Emitted { direction: Direction, delivered: bool },
  /// Composed but refused by the policy.
  Suppressed(Rejection),
  /// No signal this cycle, not an error.
  Skipped(&'static str),
  /// Fetch failure; retried next cycle.
  Failed(ScanError),
}

/// Everything a symbol task needs, shared across the cycle's tasks.
struct SymbolPipeline<M, A> {
  market: Arc<M>,
  analyzer: Arc<A>,
  composer: Arc<SignalComposer>,
  gate: Arc<EmissionGate>,
  clock: Arc<dyn Clock>,
  settings: ScanSettings,
}

impl<M: MarketData, A: SignalAnalyzer> SymbolPipeline<M, A> {
  /// Evaluate one symbol, converting every error into a local outcome.
  async fn run(&self, symbol: &str) -> SymbolOutcome {
    match self.evaluate(symbol).await {
      Ok(outcome) => outcome,
      Err(e @ ScanError::TransientFetch { .. }) => {
        warn!(symbol, reason = e.reason(), error = %e, "Symbol fetch failed");
        SymbolOutcome::Failed(e)
      }
      Err(e) => {
        info!(symbol, reason = e.reason(), "Symbol skipped: {e}");
        SymbolOutcome::Skipped(e.reason())
      }
    }
  }

  async fn evaluate(&self, symbol: &str) -> Result<SymbolOutcome, ScanError> {
    let limit = self.settings.candle_limit;
    let candles_15m = self
      .fetch(symbol, self.market.fetch_candles(symbol, Timeframe::M15, limit))
      .await?;
    let candles_1h = self
      .fetch(symbol, self.market.fetch_candles(symbol, Timeframe::H1, limit))
      .await?;

    if self.settings.min_quote_volume > 0.0 {
      let ticker = self.fetch(symbol, self.market.fetch_ticker(symbol)).await?;
      if ticker.quote_volume < self.settings.min_quote_volume {
        info!(
          symbol,
          quote_volume = ticker.quote_volume,
          "Symbol skipped: low liquidity"
        );
        return Ok(SymbolOutcome::Skipped("low_liquidity"));
      }
    }

    let mut analysis = self
      .analyzer
      .analyze(symbol, &candles_15m, &candles_1h)
      .ok_or_else(|| ScanError::AnalysisUnavailable(symbol.to_string()))?;

    let predicted = self.analyzer.predict_direction(symbol, &candles_15m)?;
    if predicted != analysis.direction {
      debug!(
        symbol,
        analyzed = %analysis.direction,
        predicted = %predicted,
        "Prediction overrides analyzed direction"
      );
    }
    analysis.direction = predicted;

    let Some(signal) = self.composer.compose(&analysis, self.clock.now())? else {
      info!(symbol, "Symbol skipped: no directional bias");
      return Ok(SymbolOutcome::Skipped("no_direction"));
    };

    let direction = signal.direction;
    Ok(match self.gate.submit(signal).await {
      Submission::Emitted { delivered, .. } => SymbolOutcome::Emitted {
        direction,
        delivered,
      },
      Submission::Suppressed(rejection) => SymbolOutcome::Suppressed(rejection),
    })
  }

  /// Throttle, then run one network call under the symbol timeout.
  async fn fetch<T>(
    &self,
    symbol: &str,
    call: impl Future<Output = Result<T, MarketDataError>>,
  ) -> Result<T, ScanError> {
    sleep(self.settings.symbol_delay).await;

    let result = match timeout(self.settings.symbol_timeout, call).await {
      Ok(result) => result,
      Err(_) => Err(MarketDataError::Timeout),
    };

    result.map_err(|source| ScanError::TransientFetch {
      symbol: symbol.to_string(),
      source,
    })
  }
}

/// Repeating scan loop over the symbol universe.
pub struct ScanOrchestrator<C: MarketDataConnector, A: SignalAnalyzer> {
  /// Creates market data connections.
  connector: Arc<C>,
  /// Indicator/prediction adapter.
  analyzer: Arc<A>,
  /// Signal composer.
  composer: Arc<SignalComposer>,
  /// Critical section in front of ledger and sink.
  gate: Arc<EmissionGate>,
  /// Time source.
  clock: Arc<dyn Clock>,
  /// Loop cadence.
  settings: ScanSettings,
  /// Staleness detection and backoff.
  reconnect: ReconnectPolicy,
  /// Resident memory probe, recorded once per cycle.
  memory_probe: Option<fn() -> Option<u64>>,
  /// Readiness (false while (re)connecting or stopped).
  ready_tx: watch::Sender<bool>,
  /// Last completed cycle.
  report_tx: watch::Sender<Option<CycleReport>>,
  /// Cycles run so far.
  cycles: AtomicU64,
  /// Sessions replaced after a stale cycle.
  reconnects: AtomicU64,
}

impl<C: MarketDataConnector, A: SignalAnalyzer> ScanOrchestrator<C, A> {
  /// Create a new orchestrator.
  pub fn new(
    connector: Arc<C>,
    analyzer: Arc<A>,
    composer: SignalComposer,
    gate: Arc<EmissionGate>,
    clock: Arc<dyn Clock>,
    settings: ScanSettings,
    reconnect: ReconnectPolicy,
  ) -> Self {
    let (ready_tx, _) = watch::channel(false);
    let (report_tx, _) = watch::channel(None);

    Self {
      connector,
      analyzer,
      composer: Arc::new(composer),
      gate,
      clock,
      settings,
      reconnect,
      memory_probe: None,
      ready_tx,
      report_tx,
      cycles: AtomicU64::new(0),
      reconnects: AtomicU64::new(0),
    }
  }

  /// Record resident memory with `probe` after every cycle.
  #[must_use]
  pub fn with_memory_probe(mut self, probe: fn() -> Option<u64>) -> Self {
    self.memory_probe = Some(probe);
    self
  }

  pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
    self.ready_tx.subscribe()
  }

  pub fn subscribe_reports(&self) -> watch::Receiver<Option<CycleReport>> {
    self.report_tx.subscribe()
  }

  /// Successful reconnects since start.
  pub fn reconnects(&self) -> u64 {
    self.reconnects.load(Ordering::Relaxed)
  }

  /// Open the first connection and load the universe.
  ///
  /// # Errors
  /// `ScanError::FatalStartup` when the exchange is unreachable or the
  /// universe is empty.
  #[instrument(skip(self))]
  pub async fn start(&self) -> Result<Session<C::Market>, ScanError> {
    match open_session(&*self.connector).await {
      Ok(session) => {
        info!(symbols = session.universe.len(), "Symbol universe loaded");
        Ok(session)
      }
      Err(e) => Err(ScanError::FatalStartup(e.to_string())),
    }
  }

  /// Run exactly one cycle over `session` without shutdown handling.
  pub async fn scan_once(&self, session: &Session<C::Market>) -> CycleReport {
    let (_keep_open, mut never) = broadcast::channel(1);
    let report = self.run_cycle(session, &mut never).await;
    self.report_tx.send_replace(Some(report.clone()));
    report
  }

  /// Run cycles until shutdown.
  ///
  /// # Errors
  /// `FatalStartup` if the first connection fails, `ReconnectExhausted`
  /// if a stale connection cannot be replaced.
  #[instrument(skip_all, name = "scan_loop")]
  pub async fn run_forever(
    &self,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> Result<(), ScanError> {
    let mut session = self.start().await?;
    self.ready_tx.send_replace(true);

    loop {
      let report = self.run_cycle(&session, &mut shutdown_rx).await;
      let interrupted = report.interrupted;
      let suspect = self
        .reconnect
        .is_suspect(report.scheduled, report.connectivity_failures);
      self.report_tx.send_replace(Some(report));

      if interrupted {
        break;
      }

      if suspect {
        warn!("Market data connection looks stale, reconnecting");
        self.ready_tx.send_replace(false);
        session.market.close().await;
        session = match reconnect(&*self.connector, &self.reconnect, &mut shutdown_rx).await {
          Ok(Some(session)) => {
            self.reconnects.fetch_add(1, Ordering::Relaxed);
            session
          }
          Ok(None) => {
            info!("Scan loop stopping before a new connection was established");
            return Ok(());
          }
          Err(e) => {
            error!(error = %e, "Giving up on market data connection");
            return Err(e);
          }
        };
        self.ready_tx.send_replace(true);
      }

      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => break,
        () = sleep(self.settings.interval) => {}
      }
    }

    info!("Scan loop stopping, releasing market data connection");
    self.ready_tx.send_replace(false);
    session.market.close().await;
    Ok(())
  }

  /// One full pass over the universe.
  async fn run_cycle(
    &self,
    session: &Session<C::Market>,
    shutdown_rx: &mut broadcast::Receiver<()>,
  ) -> CycleReport {
    let started = Instant::now();
    let date = self.gate.begin_cycle().await;
    let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

    let mut report = CycleReport {
      cycle,
      date: Some(date),
      ..CycleReport::default()
    };

    info!(cycle, %date, symbols = session.universe.len(), "Scan cycle started");

    let pipeline = Arc::new(SymbolPipeline {
      market: Arc::clone(&session.market),
      analyzer: Arc::clone(&self.analyzer),
      composer: Arc::clone(&self.composer),
      gate: Arc::clone(&self.gate),
      clock: Arc::clone(&self.clock),
      settings: self.settings.clone(),
    });
    let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
    let mut tasks = JoinSet::new();
    let mut interrupted = false;

    // ── Fan-out ──
    for instrument in &session.universe {
      let permit = tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          interrupted = true;
          break;
        }
        permit = Arc::clone(&semaphore).acquire_owned() => match permit {
          Ok(permit) => permit,
          Err(_) => break,
        },
      };

      let pipeline = Arc::clone(&pipeline);
      let symbol = instrument.symbol.clone();
      tasks.spawn(async move {
        let _permit = permit;
        let outcome = pipeline.run(&symbol).await;
        (symbol, outcome)
      });
      report.scheduled += 1;
    }

    // ── Fan-in ──
    while !interrupted {
      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => interrupted = true,
        next = tasks.join_next() => match next {
          Some(joined) => tally(&mut report, joined),
          None => break,
        },
      }
    }

    if interrupted {
      report.interrupted = true;
      let in_flight = tasks.len();
      info!(in_flight, "Shutdown requested, waiting for in-flight symbols");

      let drain = async {
        while let Some(joined) = tasks.join_next().await {
          tally(&mut report, joined);
        }
      };
      if timeout(self.settings.shutdown_grace, drain).await.is_err() {
        warn!(abandoned = tasks.len(), "Grace period over, abandoning symbols");
        tasks.abort_all();
      }
    }

    report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    report.resident_memory_bytes = self.memory_probe.and_then(|probe| probe());

    info!(
      cycle,
      scheduled = report.scheduled,
      emitted = report.emitted,
      suppressed = report.suppressed,
      skipped = report.skipped,
      failed = report.failed,
      connectivity_failures = report.connectivity_failures,
      duration_ms = report.duration_ms,
      resident_memory_bytes = ?report.resident_memory_bytes,
      "Scan cycle complete"
    );

    report
  }
}

/// Fold one task result into the cycle report.
fn tally(report: &mut CycleReport, joined: Result<(Symbol, SymbolOutcome), JoinError>) {
  match joined {
    Ok((_, SymbolOutcome::Emitted { direction, .. })) => {
      report.emitted += 1;
      CycleReport::bump(&mut report.emitted_by_direction, &direction.to_string());
    }
    Ok((_, SymbolOutcome::Suppressed(rejection))) => {
      report.suppressed += 1;
      CycleReport::bump(&mut report.suppressed_by_reason, rejection.reason());
    }
    Ok((_, SymbolOutcome::Skipped(reason))) => {
      report.skipped += 1;
      CycleReport::bump(&mut report.skipped_by_reason, reason);
    }
    Ok((_, SymbolOutcome::Failed(e))) => {
      report.failed += 1;
      if e.is_connectivity() {
        report.connectivity_failures += 1;
      }
      CycleReport::bump(&mut report.skipped_by_reason, e.reason());
    }
    Err(e) => {
      error!(error = %e, "Symbol task panicked");
      report.failed += 1;
      CycleReport::bump(&mut report.skipped_by_reason, "task_panicked");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tally_counts_connectivity_failures() {
    let mut report = CycleReport::default();
    tally(
      &mut report,
      Ok((
        "A".into(),
        SymbolOutcome::Failed(ScanError::TransientFetch {
          symbol: "A".into(),
          source: MarketDataError::Transport("reset".into()),
        }),
      )),
    );
    tally(
      &mut report,
      Ok((
        "B".into(),
        SymbolOutcome::Failed(ScanError::TransientFetch {
          symbol: "B".into(),
          source: MarketDataError::RateLimited,
        }),
      )),
    );
    tally(&mut report, Ok(("C".into(), SymbolOutcome::Skipped("low_liquidity"))));
    tally(
      &mut report,
      Ok((
        "D".into(),
        SymbolOutcome::Emitted {
          direction: Direction::Short,
          delivered: true,
        },
      )),
    );

    assert_eq!(report.failed, 2);
    assert_eq!(report.connectivity_failures, 1);
    assert_eq!(report.skipped_by_reason["fetch_failed"], 2);
    assert_eq!(report.skipped_by_reason["low_liquidity"], 1);
    assert_eq!(report.emitted_by_direction["SHORT"], 1);
    assert_eq!(report.completed(), 4);
  }
}
