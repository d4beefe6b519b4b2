//! Emission Gate - Serialized Policy, Persistence and Delivery
//!
//! The single critical section of a scan cycle. Symbol tasks finish at
//! unpredictable times; every one of them funnels its composed signal
//! through `EmissionGate::submit`, which holds one mutex across:
//! 1. policy evaluation against cycle context, ledger and active book
//! 2. marking the symbol processed and recording it in the ledger
//! 3. write-through persistence of the ledger
//! 4. registering the signal as active
//! 5. handing it to the sink

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, instrument, warn};

use crate::domain::active::{ActiveSignal, ActiveSignalBook};
use crate::domain::clock::Clock;
use crate::domain::ledger::{CycleContext, EmissionLedger};
use crate::domain::policy::{EmissionPolicy, Rejection, Verdict};
use crate::domain::signal::ComposedSignal;
use crate::ports::repository::LedgerRepository;
use crate::ports::sink::SignalSink;

/// Outcome of submitting a composed signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
  /// Accepted and forwarded.
  Emitted {
    /// Ledger reached durable storage.
    persisted: bool,
    /// Sink reported success.
    delivered: bool,
  },
  /// Refused by the policy.
  Suppressed(Rejection),
}

/// State guarded by the gate mutex.
struct GateState {
  ledger: EmissionLedger,
  active: ActiveSignalBook,
  cycle: CycleContext,
}

/// Serialization point in front of the state store and the sink.
pub struct EmissionGate {
  /// Stateless rule set.
  policy: EmissionPolicy,
  /// Ledger, active book and cycle context.
  state: Mutex<GateState>,
  /// Durable ledger storage.
  repository: Arc<dyn LedgerRepository>,
  /// Notification/archival target.
  sink: Arc<dyn SignalSink>,
  /// Time source.
  clock: Arc<dyn Clock>,
  /// Active-signal snapshots for the health surface.
  active_tx: watch::Sender<Vec<ActiveSignal>>,
}

impl EmissionGate {
  /// Create a gate around a previously loaded ledger.
  pub fn new(
    policy: EmissionPolicy,
    ledger: EmissionLedger,
    active_ttl: chrono::Duration,
    repository: Arc<dyn LedgerRepository>,
    sink: Arc<dyn SignalSink>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let (active_tx, _) = watch::channel(Vec::new());
    let today = clock.today();

    Self {
      policy,
      state: Mutex::new(GateState {
        ledger,
        active: ActiveSignalBook::new(active_ttl),
        cycle: CycleContext::new(today),
      }),
      repository,
      sink,
      clock,
      active_tx,
    }
  }

  /// Subscribe to active-signal snapshots.
  pub fn subscribe_active(&self) -> watch::Receiver<Vec<ActiveSignal>> {
    self.active_tx.subscribe()
  }

  /// Start a new cycle: prune and persist the ledger, purge expired
  /// active signals, reset the cycle context. Returns the cycle date.
  #[instrument(skip(self))]
  pub async fn begin_cycle(&self) -> NaiveDate {
    let now = self.clock.now();
    let today = now.date_naive();
    let mut state = self.state.lock().await;

    match self.repository.prune(&mut state.ledger, today).await {
      Ok(dropped) if dropped > 0 => info!(dropped, %today, "Pruned stale emission records"),
      Ok(_) => {}
      Err(e) => error!(error = %e, "Failed to persist pruned ledger, continuing in memory"),
    }

    let expired = state.active.purge_expired(now);
    if expired > 0 {
      info!(expired, "Expired active signals purged");
    }

    state.cycle = CycleContext::new(today);
    self.active_tx.send_replace(state.active.snapshot(now));
    today
  }

  /// Run a composed signal through the policy and, if accepted, persist
  /// and deliver it.
  #[instrument(skip(self, signal), fields(symbol = %signal.symbol, direction = %signal.direction))]
  pub async fn submit(&self, signal: ComposedSignal) -> Submission {
    let mut state = self.state.lock().await;
    let now = self.clock.now();

    let verdict = {
      let GateState { ledger, active, cycle } = &*state;
      self.policy.evaluate(&signal, cycle, ledger, active, now)
    };

    if let Verdict::Reject(rejection) = verdict {
      info!(
        reason = rejection.reason(),
        confidence = signal.confidence,
        trade_type = %signal.trade_type,
        "Signal suppressed: {rejection}"
      );
      return Submission::Suppressed(rejection);
    }

    state.cycle.mark_processed(&signal.symbol);
    state.ledger.record(&signal.symbol, now);

    let persisted = match self.repository.save(&state.ledger).await {
      Ok(()) => true,
      Err(e) => {
        error!(error = %e, "Failed to persist emission record, dedup holds in memory only");
        false
      }
    };

    state.active.register(signal.clone(), now);
    self.active_tx.send_replace(state.active.snapshot(now));

    let delivered = match self.sink.emit(&signal).await {
      Ok(()) => true,
      Err(e) => {
        warn!(sink = self.sink.name(), error = %e, "Signal delivery failed");
        false
      }
    };

    info!(
      confidence = signal.confidence,
      trade_type = %signal.trade_type,
      entry = signal.entry_price,
      degraded = signal.degraded,
      persisted,
      delivered,
      "Signal emitted"
    );

    Submission::Emitted { persisted, delivered }
  }

  /// Copy of the in-memory ledger.
  pub async fn ledger(&self) -> EmissionLedger {
    self.state.lock().await.ledger.clone()
  }

  /// Live active signals.
  pub async fn active_signals(&self) -> Vec<ActiveSignal> {
    let now = self.clock.now();
    self.state.lock().await.active.snapshot(now)
  }
}
