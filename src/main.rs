//! Signal Scanner - Entry Point
//!
//! Initializes configuration, logging, persistence and sinks, then runs
//! the scan loop until SIGINT or a fatal error.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from SCANNER_CONFIG) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Load the emission ledger from the state store
//! 4. Build sinks (CSV log + Telegram, or the dry-run log sink)
//! 5. Create the emission gate, Binance connector and orchestrator
//! 6. Spawn health server and Prometheus exporter
//! 7. Spawn the scan loop
//! 8. Wait for SIGINT or scanner exit → graceful shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use signal_scanner::adapters::analysis::TechnicalAnalyzer;
use signal_scanner::adapters::exchange::{BinanceConfig, BinanceConnector, UniverseFilter};
use signal_scanner::adapters::metrics::{
    resident_memory_bytes, HealthServer, HealthState, MetricsRegistry,
};
use signal_scanner::adapters::notify::{FanoutSink, TelegramNotifier, TracingSink};
use signal_scanner::adapters::persistence::{SignalLogWriter, StateStore};
use signal_scanner::config::{self, AppConfig};
use signal_scanner::domain::clock::{Clock, SystemClock};
use signal_scanner::domain::composer::SignalComposer;
use signal_scanner::domain::error::ScanError;
use signal_scanner::domain::policy::EmissionPolicy;
use signal_scanner::ports::repository::LedgerRepository;
use signal_scanner::ports::sink::SignalSink;
use signal_scanner::usecases::gate::EmissionGate;
use signal_scanner::usecases::scanner::ScanOrchestrator;

type Orchestrator = ScanOrchestrator<BinanceConnector, TechnicalAnalyzer>;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = config::loader::config_path();
    let config = config::loader::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        dry_run = config.bot.dry_run,
        interval_secs = config.scanner.interval_secs,
        "Starting signal scanner"
    );

    // ── 3. Shutdown channel + clock ─────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── 4. Emission ledger (crash recovery) ─────────────────
    let store = Arc::new(
        StateStore::new(&config.persistence.data_dir, &config.persistence.state_file)
            .await
            .context("Failed to open state store")?,
    );
    let ledger = store.load().await;

    // ── 5. Sinks ────────────────────────────────────────────
    let signal_log = Arc::new(
        SignalLogWriter::new(&config.persistence.data_dir, &config.persistence.signal_log_file)
            .await
            .context("Failed to open signal log")?,
    );
    let signal_log_path = signal_log.path().to_path_buf();
    let sink = Arc::new(build_sinks(&config, signal_log)?);
    info!(sinks = ?sink.names(), "Signal sinks configured");

    // ── 6. Emission gate ────────────────────────────────────
    let repository: Arc<dyn LedgerRepository> = store;
    let gate = Arc::new(EmissionGate::new(
        EmissionPolicy::new(config.thresholds()),
        ledger,
        config.active_signal_ttl(),
        repository,
        sink,
        Arc::clone(&clock),
    ));

    // ── 7. Market data + orchestrator ───────────────────────
    let connector = Arc::new(
        BinanceConnector::new(BinanceConfig {
            base_url: config.exchange.base_url.clone(),
            request_timeout: Duration::from_secs(config.exchange.request_timeout_secs),
            requests_per_minute: config.exchange.requests_per_minute,
            universe: UniverseFilter {
                quote_asset: config.scanner.quote_asset.clone(),
                excluded_tokens: config.scanner.excluded_tokens.clone(),
                max_symbols: config.scanner.max_symbols,
            },
        })
        .context("Failed to create exchange connector")?,
    );

    let orchestrator: Arc<Orchestrator> = Arc::new(
        ScanOrchestrator::new(
            connector,
            Arc::new(TechnicalAnalyzer::default()),
            SignalComposer::new(config.composer_params()),
            Arc::clone(&gate),
            Arc::clone(&clock),
            config.scan_settings(),
            config.reconnect_policy(),
        )
        .with_memory_probe(resident_memory_bytes),
    );

    // ── 8. Health server ────────────────────────────────────
    let health_state = Arc::new(HealthState::new(
        orchestrator.subscribe_ready(),
        orchestrator.subscribe_reports(),
        gate.subscribe_active(),
        Arc::clone(&clock),
        signal_log_path,
    ));
    let health_server = HealthServer::new(health_state, config.metrics.health_port);
    let health_shutdown = shutdown_tx.subscribe();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run(health_shutdown).await {
            error!(error = %e, "Health server failed");
        }
    });

    // ── 9. Prometheus exporter + report observer ────────────
    let metrics_handles = if config.metrics.enabled {
        let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);

        let serve_shutdown = shutdown_tx.subscribe();
        let bind_address = config.metrics.bind_address.clone();
        let exporter = Arc::clone(&metrics);
        let serve_handle = tokio::spawn(async move {
            if let Err(e) = exporter.serve(bind_address, serve_shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        });

        let observer_handle = tokio::spawn(observe_scanner(
            metrics,
            Arc::clone(&orchestrator),
            Arc::clone(&gate),
            shutdown_tx.subscribe(),
        ));

        vec![serve_handle, observer_handle]
    } else {
        Vec::new()
    };

    // ── 10. Scan loop ───────────────────────────────────────
    let scan_shutdown = shutdown_tx.subscribe();
    let scanner = Arc::clone(&orchestrator);
    let mut scan_handle: JoinHandle<Result<(), ScanError>> =
        tokio::spawn(async move { scanner.run_forever(scan_shutdown).await });

    info!("All tasks spawned, scanner is running");

    // ── 11. Wait for SIGINT or scanner exit ─────────────────
    let scan_result = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
            None
        }
        joined = &mut scan_handle => Some(joined),
    };

    // ── Graceful shutdown ──
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    let scan_result = match scan_result {
        Some(joined) => joined,
        None => {
            let grace = Duration::from_secs(config.scanner.shutdown_grace_secs + 5);
            match tokio::time::timeout(grace, scan_handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Scanner did not stop in time");
                    Ok(Ok(()))
                }
            }
        }
    };

    for handle in metrics_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;

    match scan_result {
        Ok(Ok(())) => {
            info!("Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, reason = e.reason(), "Scanner stopped on fatal error");
            Err(e.into())
        }
        Err(e) => Err(anyhow::anyhow!("scan task panicked: {e}")),
    }
}

/// Build the sink fan-out.
///
/// The CSV log always receives signals. Dry runs add the log-only sink;
/// otherwise Telegram is added when enabled, and missing credentials
/// abort startup.
fn build_sinks(config: &AppConfig, signal_log: Arc<SignalLogWriter>) -> Result<FanoutSink> {
    let mut sinks: Vec<Arc<dyn SignalSink>> = vec![signal_log];

    if config.bot.dry_run {
        if config.notifier.telegram_enabled {
            warn!("Dry-run mode, Telegram delivery disabled");
        }
        sinks.push(Arc::new(TracingSink));
    } else if config.notifier.telegram_enabled {
        let notifier = TelegramNotifier::from_env(
            &config.notifier.telegram_api_url,
            Duration::from_secs(config.exchange.request_timeout_secs),
        )?;
        sinks.push(Arc::new(notifier));
    }

    Ok(FanoutSink::new(sinks))
}

/// Mirror scanner state into Prometheus until shutdown.
async fn observe_scanner(
    metrics: Arc<MetricsRegistry>,
    orchestrator: Arc<Orchestrator>,
    gate: Arc<EmissionGate>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut reports = orchestrator.subscribe_reports();
    let mut ready = orchestrator.subscribe_ready();
    let mut active = gate.subscribe_active();

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = reports.borrow_and_update().clone();
                if let Some(report) = report {
                    metrics.observe_cycle(&report);
                }
                metrics.observe_reconnects(orchestrator.reconnects());
            }
            changed = ready.changed() => {
                if changed.is_err() {
                    break;
                }
                metrics.ready.set(i64::from(*ready.borrow_and_update()));
            }
            changed = active.changed() => {
                if changed.is_err() {
                    break;
                }
                let live = active.borrow_and_update().len();
                metrics.active_signals.set(i64::try_from(live).unwrap_or(i64::MAX));
            }
        }
    }
}
