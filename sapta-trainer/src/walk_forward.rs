//! Walk-forward window construction over sample dates.
//!
//! Windows roll: each has a fixed `train_months` training span followed by a
//! `test_months` test span, and the next window starts `test_months` later.
//! All bounds are half-open `[start, end)`, so every test date in a window
//! is strictly after every training date of that window.
//!
//! Labels look forward, so a training sample dated just before the test span
//! would be labeled from test-span prices. `split` purges those: a sample
//! trains only when its label horizon ends before `test_start`.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

/// Calendar bounds of one walk-forward window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub index: usize,
    pub train_start: NaiveDate,
    /// Exclusive.
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    /// Exclusive.
    pub test_end: NaiveDate,
}

impl WindowSpec {
    pub fn in_train(&self, date: NaiveDate) -> bool {
        date >= self.train_start && date < self.train_end
    }

    pub fn in_test(&self, date: NaiveDate) -> bool {
        date >= self.test_start && date < self.test_end
    }
}

/// Rolling windows covering `[first, last]`. A window is emitted while its
/// test span starts on or before `last`; the final test span may be partial.
pub fn rolling_windows(
    first: NaiveDate,
    last: NaiveDate,
    train_months: u32,
    test_months: u32,
) -> Vec<WindowSpec> {
    let mut windows = Vec::new();
    if train_months == 0 || test_months == 0 {
        return windows;
    }
    let mut train_start = first;
    loop {
        let Some(train_end) = train_start.checked_add_months(Months::new(train_months)) else {
            break;
        };
        let Some(test_end) = train_end.checked_add_months(Months::new(test_months)) else {
            break;
        };
        if train_end > last {
            break;
        }
        windows.push(WindowSpec {
            index: windows.len(),
            train_start,
            train_end,
            test_start: train_end,
            test_end,
        });
        match train_start.checked_add_months(Months::new(test_months)) {
            Some(next) => train_start = next,
            None => break,
        }
    }
    windows
}

/// Sample indices of `dataset` falling in the window's train and test spans.
/// Training samples whose label horizon reaches the test span are dropped.
pub fn split(dataset: &Dataset, window: &WindowSpec) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (i, s) in dataset.samples.iter().enumerate() {
        if window.in_train(s.date) {
            if s.horizon_end < window.test_start {
                train.push(i);
            }
        } else if window.in_test(s.date) {
            test.push(i);
        }
    }
    (train, test)
}
