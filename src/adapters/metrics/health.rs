//! Health Check Server - Liveness, Readiness and Status
//!
//! Exposes probes and a small read-only status surface via axum 0.7:
//! - `/live`: process is running
//! - `/ready`: a market data session is open
//! - `/health`: JSON status, uptime, cycle count, last cycle and memory
//! - `/signals`: currently active signals
//! - `/signals/history`: rows read back from the signal log

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, instrument};

use crate::adapters::persistence::signal_log::read_signal_log;
use crate::domain::active::ActiveSignal;
use crate::domain::clock::Clock;
use crate::domain::report::CycleReport;

/// Shared health state, fed by watch channels from the scanner.
#[derive(Clone)]
pub struct HealthState {
    /// Process start, for uptime.
    started: Instant,
    /// Scanner readiness.
    ready: watch::Receiver<bool>,
    /// Last completed cycle.
    reports: watch::Receiver<Option<CycleReport>>,
    /// Active-signal snapshots from the emission gate.
    active: watch::Receiver<Vec<ActiveSignal>>,
    /// Time source used to filter expired signals.
    clock: Arc<dyn Clock>,
    /// Signal log served by `/signals/history`.
    signal_log_path: PathBuf,
}

/// Body of `/health`.
#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub cycles_completed: u64,
    pub active_signals: usize,
    pub resident_memory_bytes: Option<u64>,
    pub last_cycle: Option<CycleReport>,
}

impl HealthState {
    pub fn new(
        ready: watch::Receiver<bool>,
        reports: watch::Receiver<Option<CycleReport>>,
        active: watch::Receiver<Vec<ActiveSignal>>,
        clock: Arc<dyn Clock>,
        signal_log_path: PathBuf,
    ) -> Self {
        Self {
            started: Instant::now(),
            ready,
            reports,
            active,
            clock,
            signal_log_path,
        }
    }

    /// Check if the scanner holds a live session.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Active signals that have not expired yet.
    pub fn live_signals(&self) -> Vec<ActiveSignal> {
        let now = self.clock.now();
        self.active
            .borrow()
            .iter()
            .filter(|a| a.is_live(now))
            .cloned()
            .collect()
    }

    pub fn body(&self) -> HealthBody {
        let last_cycle = self.reports.borrow().clone();
        HealthBody {
            status: if self.is_ready() { "ok" } else { "degraded" },
            uptime_secs: self.started.elapsed().as_secs(),
            cycles_completed: last_cycle.as_ref().map_or(0, |r| r.cycle),
            active_signals: self.live_signals().len(),
            resident_memory_bytes: last_cycle.as_ref().and_then(|r| r.resident_memory_bytes),
            last_cycle,
        }
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    /// Health state shared with all handlers.
    state: Arc<HealthState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/health", get(Self::health))
            .route("/signals", get(Self::signals))
            .route("/signals/history", get(Self::history))
            .with_state(Arc::clone(&self.state))
    }

    /// Start the health check server in the background.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 only while a market data session is open.
    async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        Json(state.body())
    }

    async fn signals(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        Json(state.live_signals())
    }

    async fn history(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        match read_signal_log(&state.signal_log_path).await {
            Ok(rows) => Json(rows).into_response(),
            Err(e) => {
                error!(error = %e, "Failed to read signal log");
                (StatusCode::INTERNAL_SERVER_ERROR, "signal log unavailable").into_response()
            }
        }
    }
}
