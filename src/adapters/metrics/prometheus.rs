//! Prometheus Metrics Registry - Scanner Observability
//!
//! Registers and exposes Prometheus metrics on :9090 for Grafana
//! dashboards. Covers cycle throughput and latency, emission and
//! suppression counts, connectivity and resident memory.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use crate::domain::report::CycleReport;

/// Centralized Prometheus metrics for the scanner.
///
/// All metrics follow the naming convention `signal_scanner_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Completed cycles, labelled `completed` or `interrupted`.
    pub cycles: IntCounterVec,
    /// Cycle wall time histogram (milliseconds).
    pub cycle_duration_ms: HistogramVec,
    /// Emitted signals by direction.
    pub signals_emitted: IntCounterVec,
    /// Suppressed signals by policy reason.
    pub signals_suppressed: IntCounterVec,
    /// Skipped or failed symbols by reason.
    pub symbols_skipped: IntCounterVec,
    /// Symbol failures attributed to the market data connection.
    pub connectivity_failures: IntCounter,
    /// Symbols scheduled across all cycles.
    pub symbols_evaluated: IntCounter,
    /// Market data sessions replaced after a stale cycle.
    pub reconnects: IntCounter,
    /// Resident set size after the last cycle.
    pub resident_memory_bytes: Gauge,
    /// Live entries in the active-signal book.
    pub active_signals: IntGauge,
    /// Scanner readiness (1 = connected and scanning).
    pub ready: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cycles = IntCounterVec::new(
            Opts::new("signal_scanner_cycles_total", "Total scan cycles run"),
            &["outcome"],
        )?;

        let cycle_duration_ms = HistogramVec::new(
            HistogramOpts::new(
                "signal_scanner_cycle_duration_ms",
                "Scan cycle wall time in milliseconds",
            )
            .buckets(vec![
                1_000.0, 5_000.0, 15_000.0, 30_000.0, 60_000.0, 120_000.0, 300_000.0,
            ]),
            &["outcome"],
        )?;

        let signals_emitted = IntCounterVec::new(
            Opts::new(
                "signal_scanner_signals_emitted_total",
                "Signals accepted by the emission policy",
            ),
            &["direction"],
        )?;

        let signals_suppressed = IntCounterVec::new(
            Opts::new(
                "signal_scanner_signals_suppressed_total",
                "Signals rejected by the emission policy",
            ),
            &["reason"],
        )?;

        let symbols_skipped = IntCounterVec::new(
            Opts::new(
                "signal_scanner_symbols_skipped_total",
                "Symbols that produced no signal",
            ),
            &["reason"],
        )?;

        let connectivity_failures = IntCounter::new(
            "signal_scanner_connectivity_failures_total",
            "Symbol failures caused by the market data connection",
        )?;

        let symbols_evaluated = IntCounter::new(
            "signal_scanner_symbols_evaluated_total",
            "Symbols scheduled for evaluation",
        )?;

        let reconnects = IntCounter::new(
            "signal_scanner_reconnects_total",
            "Market data sessions replaced after a stale cycle",
        )?;

        let resident_memory_bytes = Gauge::new(
            "signal_scanner_resident_memory_bytes",
            "Resident set size measured after the last cycle",
        )?;

        let active_signals = IntGauge::new(
            "signal_scanner_active_signals",
            "Signals still inside their active window",
        )?;

        let ready = IntGauge::new(
            "signal_scanner_ready",
            "Whether the scanner holds a live market data session (1=yes, 0=no)",
        )?;

        // Register all metrics
        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(cycle_duration_ms.clone()))?;
        registry.register(Box::new(signals_emitted.clone()))?;
        registry.register(Box::new(signals_suppressed.clone()))?;
        registry.register(Box::new(symbols_skipped.clone()))?;
        registry.register(Box::new(connectivity_failures.clone()))?;
        registry.register(Box::new(symbols_evaluated.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(resident_memory_bytes.clone()))?;
        registry.register(Box::new(active_signals.clone()))?;
        registry.register(Box::new(ready.clone()))?;

        Ok(Self {
            registry,
            cycles,
            cycle_duration_ms,
            signals_emitted,
            signals_suppressed,
            symbols_skipped,
            connectivity_failures,
            symbols_evaluated,
            reconnects,
            resident_memory_bytes,
            active_signals,
            ready,
        })
    }

    /// Fold one cycle report into the counters.
    pub fn observe_cycle(&self, report: &CycleReport) {
        let outcome = if report.interrupted { "interrupted" } else { "completed" };

        self.cycles.with_label_values(&[outcome]).inc();
        self.cycle_duration_ms
            .with_label_values(&[outcome])
            .observe(report.duration_ms as f64);

        for (direction, n) in &report.emitted_by_direction {
            self.signals_emitted
                .with_label_values(&[direction.as_str()])
                .inc_by(*n as u64);
        }
        for (reason, n) in &report.suppressed_by_reason {
            self.signals_suppressed
                .with_label_values(&[reason.as_str()])
                .inc_by(*n as u64);
        }
        for (reason, n) in &report.skipped_by_reason {
            self.symbols_skipped
                .with_label_values(&[reason.as_str()])
                .inc_by(*n as u64);
        }

        self.connectivity_failures
            .inc_by(report.connectivity_failures as u64);
        self.symbols_evaluated.inc_by(report.scheduled as u64);

        if let Some(bytes) = report.resident_memory_bytes {
            self.resident_memory_bytes.set(bytes as f64);
        }
    }

    /// Catch the reconnect counter up to the scanner's running total.
    pub fn observe_reconnects(&self, total: u64) {
        let seen = self.reconnects.get();
        if total > seen {
            self.reconnects.inc_by(total - seen);
        }
    }

    /// Encode every registered metric in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => {
                            error!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
