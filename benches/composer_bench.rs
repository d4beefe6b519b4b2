//! Composer and Policy Benchmarks - Per-symbol Hot Path
//!
//! Benchmarks the CPU-bound work every symbol goes through once per
//! cycle: composing a signal from analyzer output and evaluating the
//! emission policy against a populated ledger.
//!
//! Run with: cargo bench --bench composer_bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use signal_scanner::domain::active::ActiveSignalBook;
use signal_scanner::domain::composer::SignalComposer;
use signal_scanner::domain::ledger::{CycleContext, EmissionLedger};
use signal_scanner::domain::policy::EmissionPolicy;
use signal_scanner::domain::signal::{AnalysisResult, Bias};

fn analysis() -> AnalysisResult {
    AnalysisResult {
        symbol: "BTCUSDT".to_string(),
        reference_price: 67_250.5,
        direction: Bias::Long,
        confidence: 78.4,
        volatility: 412.7,
    }
}

/// Benchmark signal composition (levels, reachability, rounding).
fn bench_compose(c: &mut Criterion) {
    let composer = SignalComposer::default();
    let analysis = analysis();
    let now = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();

    c.bench_function("compose_signal", |b| {
        b.iter(|| {
            let _signal = composer.compose(black_box(&analysis), now);
        });
    });
}

/// Benchmark policy evaluation against a 500-symbol ledger.
fn bench_evaluate(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
    let policy = EmissionPolicy::default();
    let composer = SignalComposer::default();

    let mut ledger = EmissionLedger::new();
    let mut active = ActiveSignalBook::new(Duration::hours(4));
    for i in 0..500 {
        let mut a = analysis();
        a.symbol = format!("SYM{i}USDT");
        ledger.record(&a.symbol, now);
        if let Ok(Some(signal)) = composer.compose(&a, now) {
            active.register(signal, now);
        }
    }
    let cycle = CycleContext::new(now.date_naive());

    let Ok(Some(signal)) = composer.compose(&analysis(), now) else {
        return;
    };

    c.bench_function("evaluate_policy", |b| {
        b.iter(|| {
            let _verdict = policy.evaluate(black_box(&signal), &cycle, &ledger, &active, now);
        });
    });
}

criterion_group!(benches, bench_compose, bench_evaluate);
criterion_main!(benches);
