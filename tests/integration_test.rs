//! Integration Tests - End-to-end Scanner Component Testing
//!
//! Tests the interaction between the orchestrator, the emission gate,
//! the file-backed state store and mock adapters.
//! Uses mockall for trait mocking, tokio::test for async tests and
//! tokio-test for result assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mockall::mock;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

use signal_scanner::adapters::persistence::StateStore;
use signal_scanner::domain::clock::{Clock, ManualClock};
use signal_scanner::domain::composer::SignalComposer;
use signal_scanner::domain::error::{MarketDataError, ScanError};
use signal_scanner::domain::market::{Candle, Instrument, Ticker, Timeframe};
use signal_scanner::domain::policy::EmissionPolicy;
use signal_scanner::domain::signal::{AnalysisResult, Bias, ComposedSignal};
use signal_scanner::ports::analyzer::SignalAnalyzer;
use signal_scanner::ports::market_data::{MarketData, MarketDataConnector};
use signal_scanner::ports::repository::LedgerRepository;
use signal_scanner::ports::sink::{SignalSink, SinkError};
use signal_scanner::usecases::gate::EmissionGate;
use signal_scanner::usecases::reconnect::ReconnectPolicy;
use signal_scanner::usecases::scanner::{ScanOrchestrator, ScanSettings};

// ---- Mock Definitions ----

mock! {
    pub Market {}

    #[async_trait::async_trait]
    impl MarketData for Market {
        async fn load_symbols(&self) -> Result<Vec<Instrument>, MarketDataError>;

        async fn fetch_candles(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            limit: u32,
        ) -> Result<Vec<Candle>, MarketDataError>;

        async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError>;

        async fn close(&self);
    }
}

mock! {
    pub Analyzer {}

    impl SignalAnalyzer for Analyzer {
        fn analyze(
            &self,
            symbol: &str,
            candles_15m: &[Candle],
            candles_1h: &[Candle],
        ) -> Option<AnalysisResult>;

        fn predict_direction(&self, symbol: &str, candles: &[Candle]) -> Result<Bias, ScanError>;
    }
}

mock! {
    pub Sink {}

    #[async_trait::async_trait]
    impl SignalSink for Sink {
        fn name(&self) -> &'static str;
        async fn emit(&self, signal: &ComposedSignal) -> Result<(), SinkError>;
    }
}

/// Market whose candle requests for one symbol never complete.
struct HangingMarket {
    universe: Vec<Instrument>,
    hung: String,
}

#[async_trait]
impl MarketData for HangingMarket {
    async fn load_symbols(&self) -> Result<Vec<Instrument>, MarketDataError> {
        Ok(self.universe.clone())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        _limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        if symbol == self.hung {
            std::future::pending::<()>().await;
        }
        Ok(candles())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError> {
        Ok(ticker(symbol, 100_000.0))
    }

    async fn close(&self) {}
}

/// Hands out pre-built markets in order, then refuses to connect.
struct ScriptedConnector<M = MockMarket> {
    sessions: Mutex<VecDeque<M>>,
    connects: AtomicUsize,
}

impl<M> ScriptedConnector<M> {
    fn new(sessions: Vec<M>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
            connects: AtomicUsize::new(0),
        })
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<M: MarketData> MarketDataConnector for ScriptedConnector<M> {
    type Market = M;

    async fn connect(&self) -> Result<Arc<M>, MarketDataError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().unwrap().pop_front();
        next.map(Arc::new)
            .ok_or_else(|| MarketDataError::Transport("connection refused".to_string()))
    }
}

// ---- Fixtures ----

type Orchestrator = ScanOrchestrator<ScriptedConnector, MockAnalyzer>;

fn instrument(symbol: &str) -> Instrument {
    Instrument {
        symbol: symbol.to_string(),
        base: symbol.trim_end_matches("USDT").to_string(),
        quote: "USDT".to_string(),
        active: true,
    }
}

fn candles() -> Vec<Candle> {
    (0..60)
        .map(|i| Candle {
            open_time_ms: i64::from(i) * 900_000,
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 5.0,
        })
        .collect()
}

fn ticker(symbol: &str, quote_volume: f64) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        base_volume: quote_volume / 100.0,
        quote_volume,
        last_price: 100.0,
    }
}

/// A market listing `symbols` whose fetches fail for anything in `broken`.
fn market(symbols: &[&str], broken: &[&str]) -> MockMarket {
    let universe: Vec<Instrument> = symbols.iter().map(|s| instrument(s)).collect();
    let broken: Vec<String> = broken.iter().map(ToString::to_string).collect();

    let mut market = MockMarket::new();
    market
        .expect_load_symbols()
        .returning(move || Ok(universe.clone()));
    market
        .expect_fetch_candles()
        .returning(move |symbol, _, _| {
            if broken.iter().any(|b| b == symbol) {
                Err(MarketDataError::Transport("connection reset".to_string()))
            } else {
                Ok(candles())
            }
        });
    market
        .expect_fetch_ticker()
        .returning(|symbol| Ok(ticker(symbol, 100_000.0)));
    market.expect_close().returning(|| ());
    market
}

fn analyzer(bias: Bias, confidence: f64) -> Arc<MockAnalyzer> {
    let mut analyzer = MockAnalyzer::new();
    analyzer.expect_analyze().returning(move |symbol, _, _| {
        Some(AnalysisResult {
            symbol: symbol.to_string(),
            reference_price: 100.0,
            direction: bias,
            confidence,
            volatility: 2.0,
        })
    });
    analyzer
        .expect_predict_direction()
        .returning(move |_, _| Ok(bias));
    Arc::new(analyzer)
}

fn sink(expected_emits: usize) -> Arc<MockSink> {
    let mut sink = MockSink::new();
    sink.expect_name().return_const("mock");
    sink.expect_emit()
        .times(expected_emits)
        .returning(|_| Ok(()));
    Arc::new(sink)
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap(),
    ))
}

fn settings() -> ScanSettings {
    ScanSettings {
        interval: Duration::from_millis(20),
        symbol_delay: Duration::ZERO,
        max_concurrent: 4,
        symbol_timeout: Duration::from_secs(1),
        candle_limit: 60,
        min_quote_volume: 0.0,
        shutdown_grace: Duration::from_secs(1),
    }
}

fn reconnect_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        failure_ratio: 0.5,
        min_failures: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_attempts,
    }
}

async fn store(dir: &tempfile::TempDir) -> Arc<StateStore> {
    Arc::new(
        StateStore::new(dir.path().to_str().unwrap(), "sent_signals.json")
            .await
            .unwrap(),
    )
}

async fn gate(
    store: Arc<StateStore>,
    sink: Arc<MockSink>,
    clock: Arc<ManualClock>,
) -> Arc<EmissionGate> {
    let ledger = store.load().await;
    Arc::new(EmissionGate::new(
        EmissionPolicy::default(),
        ledger,
        chrono::Duration::hours(4),
        store,
        sink,
        clock,
    ))
}

fn orchestrator(
    connector: Arc<ScriptedConnector>,
    analyzer: Arc<MockAnalyzer>,
    gate: Arc<EmissionGate>,
    clock: Arc<ManualClock>,
    reconnect: ReconnectPolicy,
) -> Arc<Orchestrator> {
    orchestrator_with(connector, analyzer, gate, clock, settings(), reconnect)
}

fn orchestrator_with<M: MarketData>(
    connector: Arc<ScriptedConnector<M>>,
    analyzer: Arc<MockAnalyzer>,
    gate: Arc<EmissionGate>,
    clock: Arc<ManualClock>,
    settings: ScanSettings,
    reconnect: ReconnectPolicy,
) -> Arc<ScanOrchestrator<ScriptedConnector<M>, MockAnalyzer>> {
    Arc::new(ScanOrchestrator::new(
        connector,
        analyzer,
        SignalComposer::default(),
        gate,
        clock,
        settings,
        reconnect,
    ))
}

/// Poll `check` every 10ms for up to 5s.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ---- Integration Tests ----

#[tokio::test]
async fn test_symbol_emits_once_per_utc_day() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(4), clock.clone()).await;
    let connector = ScriptedConnector::new(vec![market(&["BTCUSDT", "ETHUSDT"], &[])]);
    let scanner = orchestrator(
        connector,
        analyzer(Bias::Long, 80.0),
        gate,
        clock.clone(),
        reconnect_policy(1),
    );

    let session = assert_ok!(scanner.start().await);

    let first = scanner.scan_once(&session).await;
    assert_eq!(first.emitted, 2);
    assert_eq!(first.emitted_by_direction["LONG"], 2);

    clock.advance(chrono::Duration::hours(3));
    let second = scanner.scan_once(&session).await;
    assert_eq!(second.emitted, 0);
    assert_eq!(second.suppressed, 2);
    assert_eq!(second.suppressed_by_reason["already_sent_today"], 2);

    clock.set(Utc.with_ymd_and_hms(2026, 4, 2, 0, 5, 0).unwrap());
    let next_day = scanner.scan_once(&session).await;
    assert_eq!(next_day.emitted, 2);
    assert_eq!(next_day.cycle, 3);
}

#[tokio::test]
async fn test_duplicate_symbol_in_universe_emits_once() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(1), clock.clone()).await;
    let connector = ScriptedConnector::new(vec![market(&["SOLUSDT", "SOLUSDT"], &[])]);
    let scanner = orchestrator(
        connector,
        analyzer(Bias::Short, 80.0),
        gate,
        clock,
        reconnect_policy(1),
    );

    let session = scanner.start().await.unwrap();
    let report = scanner.scan_once(&session).await;

    assert_eq!(report.scheduled, 2);
    assert_eq!(report.emitted, 1);
    assert_eq!(report.suppressed_by_reason["already_processed_this_cycle"], 1);
}

#[tokio::test]
async fn test_restart_same_day_does_not_reemit() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();

    // First process lifetime
    {
        let gate = gate(store(&dir).await, sink(1), clock.clone()).await;
        let connector = ScriptedConnector::new(vec![market(&["BTCUSDT"], &[])]);
        let scanner = orchestrator(
            connector,
            analyzer(Bias::Long, 80.0),
            gate,
            clock.clone(),
            reconnect_policy(1),
        );
        let session = scanner.start().await.unwrap();
        assert_eq!(scanner.scan_once(&session).await.emitted, 1);
    }

    // Restart later the same day
    clock.advance(chrono::Duration::hours(6));
    let reloaded = store(&dir).await;
    assert!(reloaded.load().await.emitted_on("BTCUSDT", clock.today()));

    let gate = gate(reloaded, sink(0), clock.clone()).await;
    let connector = ScriptedConnector::new(vec![market(&["BTCUSDT"], &[])]);
    let scanner = orchestrator(
        connector,
        analyzer(Bias::Long, 80.0),
        gate,
        clock,
        reconnect_policy(1),
    );
    let session = scanner.start().await.unwrap();
    let report = scanner.scan_once(&session).await;

    assert_eq!(report.emitted, 0);
    assert_eq!(report.suppressed_by_reason["already_sent_today"], 1);
}

#[tokio::test]
async fn test_failing_symbol_does_not_abort_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(2), clock.clone()).await;
    let connector = ScriptedConnector::new(vec![market(
        &["BTCUSDT", "BADUSDT", "ETHUSDT"],
        &["BADUSDT"],
    )]);
    let scanner = orchestrator(
        connector,
        analyzer(Bias::Long, 80.0),
        gate,
        clock,
        reconnect_policy(1),
    );

    let session = scanner.start().await.unwrap();
    let report = scanner.scan_once(&session).await;

    assert_eq!(report.emitted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.connectivity_failures, 1);
    assert_eq!(report.skipped_by_reason["fetch_failed"], 1);
    assert_eq!(report.completed(), 3);
}

#[tokio::test]
async fn test_low_confidence_is_suppressed_and_neutral_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();

    let gate_low = gate(store(&dir).await, sink(0), clock.clone()).await;
    let scanner = orchestrator(
        ScriptedConnector::new(vec![market(&["XRPUSDT"], &[])]),
        analyzer(Bias::Long, 50.0),
        gate_low,
        clock.clone(),
        reconnect_policy(1),
    );
    let session = scanner.start().await.unwrap();
    let report = scanner.scan_once(&session).await;
    assert_eq!(report.suppressed_by_reason["below_threshold"], 1);

    let gate_neutral = gate(store(&dir).await, sink(0), clock.clone()).await;
    let scanner = orchestrator(
        ScriptedConnector::new(vec![market(&["XRPUSDT"], &[])]),
        analyzer(Bias::Neutral, 90.0),
        gate_neutral,
        clock,
        reconnect_policy(1),
    );
    let session = scanner.start().await.unwrap();
    let report = scanner.scan_once(&session).await;
    assert_eq!(report.skipped_by_reason["no_direction"], 1);
}

#[tokio::test]
async fn test_empty_universe_is_fatal_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(0), clock.clone()).await;

    let mut empty = MockMarket::new();
    empty.expect_load_symbols().returning(|| Ok(Vec::new()));
    empty.expect_close().times(1).returning(|| ());

    let scanner = orchestrator(
        ScriptedConnector::new(vec![empty]),
        analyzer(Bias::Long, 80.0),
        gate,
        clock,
        reconnect_policy(1),
    );

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let err = assert_err!(scanner.run_forever(shutdown_rx).await);
    assert!(matches!(err, ScanError::FatalStartup(_)));
    assert_eq!(err.reason(), "fatal_startup");
}

#[tokio::test]
async fn test_stale_connection_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(3), clock.clone()).await;

    let symbols = ["BTCUSDT", "ETHUSDT", "SOLUSDT"];
    let connector = ScriptedConnector::new(vec![
        market(&symbols, &symbols),
        market(&symbols, &[]),
    ]);
    let scanner = orchestrator(
        Arc::clone(&connector),
        analyzer(Bias::Long, 80.0),
        Arc::clone(&gate),
        clock,
        reconnect_policy(3),
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = Arc::clone(&scanner);
    let handle = tokio::spawn(async move { runner.run_forever(shutdown_rx).await });

    let recovered = eventually(|| {
        let gate = Arc::clone(&gate);
        let scanner = Arc::clone(&scanner);
        async move { scanner.reconnects() == 1 && gate.ledger().await.len() == 3 }
    })
    .await;
    assert!(recovered, "scanner never recovered on the new connection");

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_ok!(result);
    assert_eq!(connector.connects(), 2);
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(0), clock.clone()).await;

    let symbols = ["BTCUSDT", "ETHUSDT"];
    let connector = ScriptedConnector::new(vec![market(&symbols, &symbols)]);
    let scanner = orchestrator(
        Arc::clone(&connector),
        analyzer(Bias::Long, 80.0),
        gate,
        clock,
        reconnect_policy(2),
    );

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let finished = tokio::time::timeout(Duration::from_secs(5), scanner.run_forever(shutdown_rx)).await;
    let err = assert_err!(assert_ok!(finished));

    assert!(matches!(err, ScanError::ReconnectExhausted { attempts: 2, .. }));
    assert_eq!(connector.connects(), 3);
}

#[tokio::test]
async fn test_shutdown_stops_loop_and_releases_connection() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(1), clock.clone()).await;

    let mut healthy = MockMarket::new();
    healthy
        .expect_load_symbols()
        .returning(|| Ok(vec![instrument("BTCUSDT")]));
    healthy.expect_fetch_candles().returning(|_, _, _| Ok(candles()));
    healthy.expect_close().times(1).returning(|| ());

    let scanner = orchestrator(
        ScriptedConnector::new(vec![healthy]),
        analyzer(Bias::Long, 80.0),
        gate,
        clock,
        reconnect_policy(1),
    );
    let mut ready = scanner.subscribe_ready();
    let mut reports = scanner.subscribe_reports();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = Arc::clone(&scanner);
    let handle = tokio::spawn(async move { runner.run_forever(shutdown_rx).await });

    tokio::time::timeout(Duration::from_secs(5), ready.wait_for(|r| *r))
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), reports.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_ok!(result);
    assert!(!*scanner.subscribe_ready().borrow());
}

#[tokio::test]
async fn test_hung_symbol_times_out_without_stalling_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(1), clock.clone()).await;

    let connector = ScriptedConnector::new(vec![HangingMarket {
        universe: vec![instrument("BTCUSDT"), instrument("HUNGUSDT")],
        hung: "HUNGUSDT".to_string(),
    }]);
    let scanner = orchestrator_with(
        connector,
        analyzer(Bias::Long, 80.0),
        gate,
        clock,
        ScanSettings {
            symbol_timeout: Duration::from_millis(200),
            ..settings()
        },
        reconnect_policy(1),
    );

    let session = assert_ok!(scanner.start().await);
    let report = assert_ok!(
        tokio::time::timeout(Duration::from_secs(5), scanner.scan_once(&session)).await
    );

    assert_eq!(report.emitted, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.connectivity_failures, 1);
    assert_eq!(report.skipped_by_reason["fetch_failed"], 1);
}

#[tokio::test]
async fn test_low_liquidity_symbol_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(1), clock.clone()).await;

    let mut market = MockMarket::new();
    market
        .expect_load_symbols()
        .returning(|| Ok(vec![instrument("BTCUSDT"), instrument("THINUSDT")]));
    market.expect_fetch_candles().returning(|_, _, _| Ok(candles()));
    market.expect_fetch_ticker().times(2).returning(|symbol| {
        let volume = if symbol == "THINUSDT" { 10_000.0 } else { 5_000_000.0 };
        Ok(ticker(symbol, volume))
    });
    market.expect_close().returning(|| ());

    let scanner = orchestrator_with(
        ScriptedConnector::new(vec![market]),
        analyzer(Bias::Long, 80.0),
        gate,
        clock,
        ScanSettings {
            min_quote_volume: 1_000_000.0,
            ..settings()
        },
        reconnect_policy(1),
    );

    let session = assert_ok!(scanner.start().await);
    let report = scanner.scan_once(&session).await;

    assert_eq!(report.emitted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.skipped_by_reason["low_liquidity"], 1);
}

#[tokio::test]
async fn test_shutdown_interrupts_reconnect_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let gate = gate(store(&dir).await, sink(0), clock.clone()).await;

    let symbols = ["BTCUSDT", "ETHUSDT"];
    let connector = ScriptedConnector::new(vec![market(&symbols, &symbols)]);
    let scanner = orchestrator(
        Arc::clone(&connector),
        analyzer(Bias::Long, 80.0),
        gate,
        clock,
        ReconnectPolicy {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
            ..reconnect_policy(5)
        },
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = Arc::clone(&scanner);
    let handle = tokio::spawn(async move { runner.run_forever(shutdown_rx).await });

    let backing_off = eventually(|| {
        let connector = Arc::clone(&connector);
        async move { connector.connects() == 2 }
    })
    .await;
    assert!(backing_off, "scanner never attempted to reconnect");

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();

    assert_ok!(result);
    assert_eq!(connector.connects(), 2);
    assert!(!*scanner.subscribe_ready().borrow());
}
