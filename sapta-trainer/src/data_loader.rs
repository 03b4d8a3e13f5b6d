//! Local OHLCV loading.
//!
//! Each ticker lives in `<dir>/<TICKER>.csv` with a header row
//! `date,open,high,low,close,volume` and ISO dates. Rows are sorted by
//! date on load; duplicate dates keep the last row and NaN rows are dropped,
//! both with a warning.

use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use sapta_core::{Bar, OhlcvSeries, SaptaError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid series: {0}")]
    Series(#[from] SaptaError),

    #[error("no CSV files found in '{0}'")]
    EmptyDirectory(PathBuf),
}

/// Ticker name from a file path (`data/BBCA.csv` → `BBCA`).
pub fn ticker_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_uppercase())
}

/// Load one ticker's CSV into a validated series.
pub fn load_csv(path: &Path) -> Result<OhlcvSeries, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let mut bars = Vec::new();
    for row in reader.deserialize() {
        let bar: Bar = row.map_err(csv_err)?;
        bars.push(bar);
    }

    let ticker = ticker_from_path(path).unwrap_or_else(|| "UNKNOWN".to_string());
    let bars = clean(&ticker, bars);
    Ok(OhlcvSeries::new(ticker, bars)?)
}

fn clean(ticker: &str, mut bars: Vec<Bar>) -> Vec<Bar> {
    let before = bars.len();
    bars.retain(|b| b.is_sane());
    if bars.len() < before {
        warn!(ticker, dropped = before - bars.len(), "dropped NaN or malformed rows");
    }

    bars.sort_by_key(|b| b.date);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    let mut duplicates = 0usize;
    for bar in bars {
        match out.last_mut() {
            Some(prev) if prev.date == bar.date => {
                *prev = bar;
                duplicates += 1;
            }
            _ => out.push(bar),
        }
    }
    if duplicates > 0 {
        warn!(ticker, duplicates, "duplicate dates, kept last row");
    }
    out
}

/// Load every `*.csv` under `dir`, sorted by ticker. Files that fail to
/// load are skipped with a warning.
pub fn load_dir(dir: &Path) -> Result<Vec<OhlcvSeries>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    if paths.is_empty() {
        return Err(LoadError::EmptyDirectory(dir.to_path_buf()));
    }
    paths.sort();

    let mut universe = Vec::with_capacity(paths.len());
    for path in &paths {
        match load_csv(path) {
            Ok(series) => universe.push(series),
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }
    universe.sort_by(|a, b| a.ticker().cmp(b.ticker()));
    debug!(files = paths.len(), loaded = universe.len(), "universe loaded");
    Ok(universe)
}

/// Write a series in the format `load_csv` reads.
pub fn write_csv(path: &Path, series: &OhlcvSeries) -> Result<(), LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for bar in series.bars() {
        writer.serialize(bar).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sapta_core::synthetic::synthetic_series;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let series = synthetic_series("BBCA", start(), 150, 1).unwrap();
        let path = dir.path().join("BBCA.csv");
        write_csv(&path, &series).unwrap();

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded.ticker(), "BBCA");
        assert_eq!(loaded.len(), 150);
        assert_eq!(loaded.bars()[0].date, series.bars()[0].date);
        assert!((loaded.bars()[10].close - series.bars()[10].close).abs() < 1e-9);
    }

    #[test]
    fn unsorted_rows_with_duplicates_are_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(
            &path,
            "date,open,high,low,close,volume\n\
             2024-01-03,10,11,9,10.5,100\n\
             2024-01-02,10,11,9,10.0,100\n\
             2024-01-03,10,11,9,10.8,200\n",
        )
        .unwrap();
        let s = load_csv(&path).unwrap();
        assert_eq!(s.ticker(), "X");
        assert_eq!(s.len(), 2);
        assert_eq!(s.last().close, 10.8);
        assert_eq!(s.last().volume, 200);
    }

    #[test]
    fn insane_rows_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("y.csv");
        std::fs::write(
            &path,
            "date,open,high,low,close,volume\n\
             2024-01-02,10,11,9,10.0,100\n\
             2024-01-03,10,inf,9,10.5,100\n\
             2024-01-04,10,9,11,10.2,100\n\
             2024-01-05,0,11,0,10.1,100\n\
             2024-01-08,10,11,9,10.6,100\n",
        )
        .unwrap();
        let s = load_csv(&path).unwrap();
        assert_eq!(s.len(), 2);
        assert!(s.bars().iter().all(|b| b.is_sane()));
        assert_eq!(s.last().close, 10.6);
    }

    #[test]
    fn malformed_row_is_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BAD.csv");
        std::fs::write(&path, "date,open,high,low,close,volume\nnot-a-date,1,1,1,1,1\n").unwrap();
        assert!(matches!(load_csv(&path), Err(LoadError::Csv { .. })));
    }

    #[test]
    fn load_dir_skips_bad_files_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for t in ["ZZZ", "AAA"] {
            let s = synthetic_series(t, start(), 130, 2).unwrap();
            write_csv(&dir.path().join(format!("{t}.csv")), &s).unwrap();
        }
        std::fs::write(dir.path().join("EMPTY.csv"), "date,open,high,low,close,volume\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let universe = load_dir(dir.path()).unwrap();
        let tickers: Vec<&str> = universe.iter().map(|s| s.ticker()).collect();
        assert_eq!(tickers, vec!["AAA", "ZZZ"]);
    }

    #[test]
    fn empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_dir(dir.path()), Err(LoadError::EmptyDirectory(_))));
    }
}
