//! End-to-end offline path: synthetic CSVs on disk, dataset, training,
//! artifact on disk, hot-swapped into a live engine.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::atomic::AtomicBool;

use sapta_core::model::{ClassifierKind, ClassifierParams, ModelArtifact, TrainingMode};
use sapta_core::synthetic::synthetic_series;
use sapta_core::{LabelingConfig, OhlcvSeries, SaptaEngine, StatusBasis, FEATURE_SCHEMA_VERSION};
use sapta_trainer::{
    analyze_feature_importance, build_dataset, format_importance_report, format_threshold_report,
    format_training_summary, label_series, load_dir, write_csv, Dataset, ModeSelection, TrainError,
    Trainer, TrainerConfig,
};

const TICKERS: [&str; 6] = ["AAAA", "BBBB", "CCCC", "DDDD", "EEEE", "FFFF"];

fn universe(n_bars: usize) -> Vec<OhlcvSeries> {
    let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
    TICKERS
        .iter()
        .map(|t| synthetic_series(t, start, n_bars, 11).unwrap())
        .collect()
}

fn labeling() -> LabelingConfig {
    LabelingConfig {
        stride: 3,
        ..LabelingConfig::default()
    }
}

fn trainer(mode: ModeSelection) -> Trainer {
    Trainer::new(TrainerConfig {
        mode,
        min_samples: 50,
        train_months: 12,
        test_months: 3,
        workers: 2,
        classifier: ClassifierParams {
            kind: ClassifierKind::GradientBoosting,
            n_estimators: 25,
            max_depth: 3,
            min_samples_split: 10,
            min_samples_leaf: 5,
            ..ClassifierParams::default()
        },
        ..TrainerConfig::default()
    })
    .unwrap()
}

fn fixed_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

#[test]
fn csv_directory_to_calibrated_engine() {
    let dir = tempfile::tempdir().unwrap();
    for series in universe(400) {
        write_csv(&dir.path().join(format!("{}.csv", series.ticker())), &series).unwrap();
    }

    let loaded = load_dir(dir.path()).unwrap();
    assert_eq!(loaded.len(), TICKERS.len());
    assert_eq!(loaded[0].ticker(), "AAAA");

    let engine = SaptaEngine::with_defaults();
    let dataset = build_dataset(&engine, &loaded, &labeling(), 2, None).unwrap();
    assert_eq!(dataset.schema_version, FEATURE_SCHEMA_VERSION);
    assert!(dataset.len() > 100);
    assert!(dataset.positive_rate() > 0.0 && dataset.positive_rate() < 1.0);

    let artifact = trainer(ModeSelection::Holdout)
        .train_at(&dataset, None, fixed_time())
        .unwrap();
    assert_eq!(artifact.summary.mode, TrainingMode::Holdout);
    assert_eq!(artifact.summary.n_samples, dataset.len());
    assert!(artifact.thresholds.validate().is_ok());

    let model_path = dir.path().join("model.json");
    artifact.save(&model_path).unwrap();
    let reloaded = ModelArtifact::load(&model_path).unwrap();
    assert_eq!(reloaded.model_id, artifact.model_id);

    let generation = engine.load_model(&model_path).unwrap();
    assert!(generation > 0);
    let result = engine.evaluate(&loaded[0]).unwrap();
    assert_eq!(result.status_basis, StatusBasis::Calibrated);
    let p = result.ml_probability.unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert_eq!(result.model_id.as_deref(), Some(artifact.model_id.as_str()));
}

#[test]
fn training_is_reproducible_for_a_seed() {
    let engine = SaptaEngine::with_defaults();
    let dataset = build_dataset(&engine, &universe(400), &labeling(), 3, None).unwrap();
    let t = trainer(ModeSelection::Holdout);
    let a = t.train_at(&dataset, None, fixed_time()).unwrap();
    let b = t.train_at(&dataset, None, fixed_time()).unwrap();
    assert_eq!(a.model_id, b.model_id);
    assert_eq!(a.thresholds, b.thresholds);
    assert_eq!(a.validation_metrics, b.validation_metrics);
}

#[test]
fn walk_forward_over_long_history() {
    let engine = SaptaEngine::with_defaults();
    let dataset = build_dataset(&engine, &universe(900), &labeling(), 2, None).unwrap();
    let artifact = trainer(ModeSelection::WalkForward)
        .train_at(&dataset, None, fixed_time())
        .unwrap();
    assert_eq!(artifact.summary.mode, TrainingMode::WalkForward);
    assert!(!artifact.summary.windows.is_empty());
    for w in &artifact.summary.windows {
        assert!(w.train_end <= w.test_start);
        assert!(w.n_train >= 50);
    }
    let pooled: usize = artifact.summary.windows.iter().map(|w| w.n_test).sum();
    assert_eq!(artifact.validation_metrics.n_samples, pooled);
}

#[test]
fn dataset_csv_feeds_training() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SaptaEngine::with_defaults();
    let dataset = build_dataset(&engine, &universe(400), &labeling(), 2, None).unwrap();
    let path = dir.path().join("samples.csv");
    dataset.write_csv(&path).unwrap();

    let read = Dataset::read_csv(&path).unwrap();
    assert_eq!(read.len(), dataset.len());
    let t = trainer(ModeSelection::Holdout);
    let from_disk = t.train_at(&read, None, fixed_time()).unwrap();
    assert_eq!(from_disk.summary.n_samples, dataset.len());
}

#[test]
fn labels_never_use_bars_past_the_series() {
    let universe = universe(300);
    let series = &universe[0];
    let cfg = LabelingConfig::default();
    let labels = label_series(series, &cfg);
    assert!(!labels.is_empty());
    let last = labels.last().unwrap();
    assert!(last.index + cfg.target_days < series.len());
    assert_eq!(labels[0].index, cfg.min_history_bars - 1);
}

#[test]
fn pre_cancelled_build_returns_cancelled() {
    let engine = SaptaEngine::with_defaults();
    let cancel = AtomicBool::new(true);
    let err = build_dataset(&engine, &universe(300), &labeling(), 2, Some(&cancel)).unwrap_err();
    assert!(matches!(err, TrainError::Cancelled));
}

#[test]
fn inspection_reports_render() {
    let engine = SaptaEngine::with_defaults();
    let dataset = build_dataset(&engine, &universe(400), &labeling(), 2, None).unwrap();
    let artifact = trainer(ModeSelection::Holdout)
        .train_at(&dataset, None, fixed_time())
        .unwrap();

    let analysis = analyze_feature_importance(&artifact);
    assert_eq!(analysis.total_features, artifact.feature_names.len());
    assert!(analysis.top_features.len() <= 15);
    let total: f64 = analysis.group_totals.iter().map(|(_, v)| v).sum();
    assert!(total <= 1.0 + 1e-9);

    let report = format_importance_report(&analysis);
    assert!(report.contains("SAPTA Feature Importance"));
    assert!(format_threshold_report(&artifact.thresholds).contains("TIER RANGES"));
    assert!(format_training_summary(&artifact).contains("holdout"));
}
