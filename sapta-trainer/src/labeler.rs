//! Forward-return labels over historical series.
//!
//! A bar `t` is labeled when it has at least `min_history_bars` bars up to
//! and including itself and a full `target_days` forward window after it.
//! The label is 1 when the best close inside the window reaches the target
//! gain over `close[t]`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sapta_core::{LabelingConfig, OhlcvSeries};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Bar index within the series.
    pub index: usize,
    pub date: NaiveDate,
    pub label: u8,
    /// `close[t + target_days] / close[t] - 1`.
    pub forward_return: f64,
    /// Best close in `(t, t + target_days]` relative to `close[t]`.
    pub max_forward_return: f64,
    /// First forward day on which the target gain was reached.
    pub days_to_target: Option<u32>,
    /// Date of the last bar the label reads, `date[t + target_days]`.
    pub horizon_end: NaiveDate,
}

/// Bar indices eligible for labeling, in order.
pub fn labelable_indices(len: usize, config: &LabelingConfig) -> impl Iterator<Item = usize> {
    let first = config.min_history_bars.saturating_sub(1);
    let end = len.saturating_sub(config.target_days);
    (first..end).step_by(config.stride.max(1))
}

/// Label one bar, or `None` when the bar is not eligible.
pub fn label_at(series: &OhlcvSeries, index: usize, config: &LabelingConfig) -> Option<Label> {
    let bars = series.bars();
    let horizon = config.target_days;
    if horizon == 0 || index + 1 < config.min_history_bars || index + horizon >= bars.len() {
        return None;
    }
    let entry = bars[index].close;
    if !(entry > 0.0) {
        return None;
    }

    let target = config.target_gain();
    let mut best = f64::NEG_INFINITY;
    let mut days_to_target = None;
    for (k, bar) in bars[index + 1..=index + horizon].iter().enumerate() {
        let ret = bar.close / entry - 1.0;
        best = best.max(ret);
        if days_to_target.is_none() && ret >= target {
            days_to_target = Some(k as u32 + 1);
        }
    }

    Some(Label {
        index,
        date: bars[index].date,
        label: u8::from(best >= target),
        forward_return: bars[index + horizon].close / entry - 1.0,
        max_forward_return: best,
        days_to_target,
        horizon_end: bars[index + horizon].date,
    })
}

/// Label every eligible bar of a series.
pub fn label_series(series: &OhlcvSeries, config: &LabelingConfig) -> Vec<Label> {
    labelable_indices(series.len(), config)
        .filter_map(|i| label_at(series, i, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapta_core::Bar;

    fn series(closes: &[f64]) -> OhlcvSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1000,
            })
            .collect();
        OhlcvSeries::new("T", bars).unwrap()
    }

    fn config(min_history: usize, target_days: usize) -> LabelingConfig {
        LabelingConfig {
            target_days,
            target_gain_pct: 10.0,
            min_history_bars: min_history,
            stride: 1,
        }
    }

    #[test]
    fn boundary_target_days_before_end() {
        let s = series(&[100.0; 30]);
        let cfg = config(1, 5);
        let labels = label_series(&s, &cfg);
        // Last eligible bar is exactly target_days before the end.
        assert_eq!(labels.last().unwrap().index, 30 - 1 - 5);
        assert!(label_at(&s, 24, &cfg).is_some());
        assert!(label_at(&s, 25, &cfg).is_none());
    }

    #[test]
    fn min_history_respected() {
        let s = series(&[100.0; 40]);
        let labels = label_series(&s, &config(10, 5));
        assert_eq!(labels[0].index, 9);
        assert!(label_at(&s, 8, &config(10, 5)).is_none());
    }

    #[test]
    fn positive_label_and_days_to_target() {
        let mut closes = vec![100.0; 10];
        closes.extend([102.0, 105.0, 111.0, 104.0, 101.0]);
        let s = series(&closes);
        let l = label_at(&s, 9, &config(1, 5)).unwrap();
        assert_eq!(l.label, 1);
        assert_eq!(l.days_to_target, Some(3));
        assert_eq!(l.horizon_end, s.bars()[14].date);
        assert!((l.max_forward_return - 0.11).abs() < 1e-12);
        assert!((l.forward_return - 0.01).abs() < 1e-12);
    }

    #[test]
    fn negative_label_has_no_target_day() {
        let s = series(&[100.0, 101.0, 103.0, 109.9, 100.0, 95.0]);
        let l = label_at(&s, 0, &config(1, 5)).unwrap();
        assert_eq!(l.label, 0);
        assert_eq!(l.days_to_target, None);
    }

    #[test]
    fn idempotent_and_strided() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin() * 8.0).collect();
        let s = series(&closes);
        let cfg = config(20, 10);
        assert_eq!(label_series(&s, &cfg), label_series(&s, &cfg));

        let strided = LabelingConfig { stride: 5, ..cfg };
        let labels = label_series(&s, &strided);
        assert!(labels.windows(2).all(|w| w[1].index - w[0].index == 5));
    }
}
