//! Labeled feature datasets.
//!
//! Tickers are labeled and featurized concurrently on a private rayon pool;
//! the result is sorted by (date, ticker) so everything downstream is
//! independent of scheduling.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use sapta_core::features::feature_names;
use sapta_core::{LabelingConfig, OhlcvSeries, SaptaEngine, FEATURE_SCHEMA_VERSION};

use crate::labeler::label_series;
use crate::trainer::TrainError;

/// One (ticker, date) observation with its features and forward outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub ticker: String,
    pub date: NaiveDate,
    pub features: Vec<f64>,
    pub label: u8,
    pub forward_return: f64,
    pub max_forward_return: f64,
    pub days_to_target: Option<u32>,
    /// Last date the label depends on.
    pub horizon_end: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub schema_version: u32,
    pub samples: Vec<LabeledSample>,
}

const META_COLUMNS: [&str; 7] = [
    "ticker",
    "date",
    "horizon_end",
    "label",
    "forward_return",
    "max_forward_return",
    "days_to_target",
];

impl Dataset {
    pub fn new(mut samples: Vec<LabeledSample>) -> Self {
        samples.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        Self {
            schema_version: FEATURE_SCHEMA_VERSION,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn positive_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().filter(|s| s.label == 1).count() as f64 / self.samples.len() as f64
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.samples.first()?.date, self.samples.last()?.date))
    }

    /// Feature rows for the given sample indices.
    pub fn rows(&self, indices: &[usize]) -> Vec<Vec<f64>> {
        indices.iter().map(|&i| self.samples[i].features.clone()).collect()
    }

    pub fn labels(&self, indices: &[usize]) -> Vec<u8> {
        indices.iter().map(|&i| self.samples[i].label).collect()
    }

    /// Export as CSV: metadata columns followed by one column per feature.
    pub fn write_csv(&self, path: &Path) -> Result<(), TrainError> {
        let mut writer = csv::Writer::from_path(path)?;
        let header: Vec<&str> = META_COLUMNS
            .iter()
            .copied()
            .chain(feature_names().iter().map(String::as_str))
            .collect();
        writer.write_record(&header)?;
        for s in &self.samples {
            let mut record = vec![
                s.ticker.clone(),
                s.date.to_string(),
                s.horizon_end.to_string(),
                s.label.to_string(),
                s.forward_return.to_string(),
                s.max_forward_return.to_string(),
                s.days_to_target.map(|d| d.to_string()).unwrap_or_default(),
            ];
            record.extend(s.features.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        info!(samples = self.len(), path = %path.display(), "dataset exported");
        Ok(())
    }

    /// Read a CSV written by [`Dataset::write_csv`]. The feature columns
    /// must match the running schema exactly.
    pub fn read_csv(path: &Path) -> Result<Self, TrainError> {
        let mut reader = csv::Reader::from_path(path)?;
        let header = reader.headers()?.clone();
        let expected: Vec<&str> = META_COLUMNS
            .iter()
            .copied()
            .chain(feature_names().iter().map(String::as_str))
            .collect();
        if header.iter().ne(expected.iter().copied()) {
            return Err(TrainError::InvalidDataset(format!(
                "'{}' columns do not match feature schema v{FEATURE_SCHEMA_VERSION}",
                path.display()
            )));
        }

        let invalid = |line: usize, what: &str| {
            TrainError::InvalidDataset(format!("{}:{line}: bad {what}", path.display()))
        };
        let mut samples = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let line = line + 2;
            let field = |i: usize| record.get(i).unwrap_or("");
            let number = |i: usize, what: &str| {
                field(i).parse::<f64>().map_err(|_| invalid(line, what))
            };
            let days = field(6);
            samples.push(LabeledSample {
                ticker: field(0).to_string(),
                date: field(1).parse().map_err(|_| invalid(line, "date"))?,
                horizon_end: field(2).parse().map_err(|_| invalid(line, "horizon_end"))?,
                label: field(3).parse().map_err(|_| invalid(line, "label"))?,
                forward_return: number(4, "forward_return")?,
                max_forward_return: number(5, "max_forward_return")?,
                days_to_target: if days.is_empty() {
                    None
                } else {
                    Some(days.parse().map_err(|_| invalid(line, "days_to_target"))?)
                },
                features: (META_COLUMNS.len()..record.len())
                    .map(|i| number(i, "feature"))
                    .collect::<Result<_, _>>()?,
            });
        }
        Ok(Self::new(samples))
    }
}

/// Label and featurize one series. Features at bar `t` see only `[..=t]`.
pub fn samples_for_series(
    engine: &SaptaEngine,
    series: &OhlcvSeries,
    labeling: &LabelingConfig,
) -> Vec<LabeledSample> {
    label_series(series, labeling)
        .into_iter()
        .filter_map(|label| match engine.evaluate_with_features(series, label.index) {
            Ok((_, features)) => Some(LabeledSample {
                ticker: series.ticker().to_string(),
                date: label.date,
                features: features.values,
                label: label.label,
                forward_return: label.forward_return,
                max_forward_return: label.max_forward_return,
                days_to_target: label.days_to_target,
                horizon_end: label.horizon_end,
            }),
            Err(e) => {
                warn!(ticker = series.ticker(), index = label.index, "sample skipped: {e}");
                None
            }
        })
        .collect()
}

/// Build a dataset from a universe on a pool of `workers` threads.
///
/// `cancel` is checked before each ticker; a cancelled build returns
/// `TrainError::Cancelled`.
pub fn build_dataset(
    engine: &SaptaEngine,
    universe: &[OhlcvSeries],
    labeling: &LabelingConfig,
    workers: usize,
    cancel: Option<&AtomicBool>,
) -> Result<Dataset, TrainError> {
    labeling.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    let per_ticker: Vec<Option<Vec<LabeledSample>>> = pool.install(|| {
        universe
            .par_iter()
            .map(|series| {
                if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                    return None;
                }
                let samples = samples_for_series(engine, series, labeling);
                debug!(ticker = series.ticker(), samples = samples.len(), "ticker labeled");
                Some(samples)
            })
            .collect()
    });

    if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) || per_ticker.iter().any(Option::is_none) {
        info!("dataset build cancelled");
        return Err(TrainError::Cancelled);
    }

    let dataset = Dataset::new(per_ticker.into_iter().flatten().flatten().collect());
    info!(
        tickers = universe.len(),
        samples = dataset.len(),
        positive_rate = dataset.positive_rate(),
        "dataset built"
    );
    Ok(dataset)
}
