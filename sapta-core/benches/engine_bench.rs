//! Criterion benchmarks for SAPTA hot paths.
//!
//! Benchmarks:
//! 1. Single evaluation over a full analysis window
//! 2. Per-module scoring
//! 3. Feature extraction
//! 4. Universe scan

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sapta_core::engine::aggregate;
use sapta_core::features::extract;
use sapta_core::modules::ScoringModule;
use sapta_core::synthetic::synthetic_series;
use sapta_core::{ModuleWeights, OhlcvSeries, SaptaEngine, Status};

fn start() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
}

fn series(ticker: &str, n: usize) -> OhlcvSeries {
    synthetic_series(ticker, start(), n, 42).unwrap()
}

fn bench_evaluate(c: &mut Criterion) {
    let engine = SaptaEngine::with_defaults();
    let mut group = c.benchmark_group("evaluate");
    for n in [150usize, 250, 1000] {
        let s = series("BENCH", n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &s, |b, s| {
            b.iter(|| engine.evaluate(black_box(s)).unwrap())
        });
    }
    group.finish();
}

fn bench_modules(c: &mut Criterion) {
    let s = series("BENCH", 250);
    let mut group = c.benchmark_group("module");
    for module in ScoringModule::all() {
        group.bench_function(module.id().name(), |b| {
            b.iter(|| module.analyze(black_box(s.bars())))
        });
    }
    group.finish();
}

fn bench_features(c: &mut Criterion) {
    let s = series("BENCH", 250);
    let breakdown: Vec<_> = ScoringModule::all()
        .iter()
        .map(|m| m.analyze(s.bars()))
        .collect();
    let agg = aggregate(&breakdown, &ModuleWeights::default());
    c.bench_function("extract_features", |b| {
        b.iter(|| extract(black_box(&breakdown), black_box(&agg), black_box(s.bars())))
    });
}

fn bench_scan(c: &mut Criterion) {
    let engine = SaptaEngine::with_defaults();
    let universe: Vec<OhlcvSeries> = (0..100).map(|i| series(&format!("T{i:03}"), 250)).collect();
    c.bench_function("scan_100", |b| {
        b.iter(|| engine.scan(black_box(&universe), Status::Skip))
    });
}

criterion_group!(benches, bench_evaluate, bench_modules, bench_features, bench_scan);
criterion_main!(benches);
