//! The six scoring modules.
//!
//! Modules are pure functions of an OHLCV window: bars in, `ModuleScore` out.
//! They never see the model, the config file or any other module's output,
//! and they never fail. A window shorter than the module's lookback becomes
//! an abstention carrying the `InsufficientData` message as its note.

pub mod absorption;
pub mod anti_distribution;
pub mod bb_squeeze;
pub mod compression;
pub mod elliott;
pub mod swing;
pub mod time_projection;

pub use absorption::Absorption;
pub use anti_distribution::AntiDistribution;
pub use bb_squeeze::BbSqueeze;
pub use compression::Compression;
pub use elliott::{Elliott, WavePhase};
pub use time_projection::TimeProjection;

use std::collections::BTreeMap;

use crate::domain::{Bar, ModuleId, ModuleScore};
use crate::error::SaptaError;

/// Scoring logic of one module.
///
/// `score` is only called with at least `lookback()` bars; the length check
/// and the abstention live in [`ScoringModule::analyze`].
pub trait Detector: Send + Sync {
    fn id(&self) -> ModuleId;

    /// Positive ceiling. For penalty-only modules this is the penalty budget.
    fn max_score(&self) -> f64;

    fn lookback(&self) -> usize;

    fn score(&self, bars: &[Bar]) -> ModuleScore;
}

/// Closed set of scoring modules, in canonical order.
#[derive(Debug, Clone)]
pub enum ScoringModule {
    Absorption(Absorption),
    Compression(Compression),
    BbSqueeze(BbSqueeze),
    Elliott(Elliott),
    TimeProjection(TimeProjection),
    AntiDistribution(AntiDistribution),
}

impl ScoringModule {
    /// All six modules with their default parameters, in `ModuleId::ALL` order.
    pub fn all() -> Vec<ScoringModule> {
        ModuleId::ALL.into_iter().map(Self::default_for).collect()
    }

    pub fn default_for(id: ModuleId) -> Self {
        match id {
            ModuleId::Absorption => Self::Absorption(Absorption::default()),
            ModuleId::Compression => Self::Compression(Compression::default()),
            ModuleId::BbSqueeze => Self::BbSqueeze(BbSqueeze::default()),
            ModuleId::Elliott => Self::Elliott(Elliott::default()),
            ModuleId::TimeProjection => Self::TimeProjection(TimeProjection::default()),
            ModuleId::AntiDistribution => Self::AntiDistribution(AntiDistribution::default()),
        }
    }

    fn detector(&self) -> &dyn Detector {
        match self {
            Self::Absorption(m) => m,
            Self::Compression(m) => m,
            Self::BbSqueeze(m) => m,
            Self::Elliott(m) => m,
            Self::TimeProjection(m) => m,
            Self::AntiDistribution(m) => m,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.detector().id()
    }

    pub fn max_score(&self) -> f64 {
        self.detector().max_score()
    }

    pub fn lookback(&self) -> usize {
        self.detector().lookback()
    }

    /// Score a window, abstaining when it is shorter than the lookback.
    pub fn analyze(&self, bars: &[Bar]) -> ModuleScore {
        let detector = self.detector();
        if bars.len() < detector.lookback() {
            let err = SaptaError::InsufficientData {
                module: detector.id(),
                required: detector.lookback(),
                available: bars.len(),
            };
            tracing::debug!(module = %detector.id(), "{err}");
            return ModuleScore::abstain(detector.id(), detector.max_score(), err.to_string());
        }
        detector.score(bars)
    }
}

/// Accumulates fired conditions and diagnostics for one module evaluation.
#[derive(Debug, Default)]
pub(crate) struct Scorecard {
    raw: f64,
    notes: Vec<String>,
    diagnostics: BTreeMap<String, f64>,
}

impl Scorecard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `points` (negative for penalties) with an explanatory note.
    pub(crate) fn fire(&mut self, points: f64, note: impl Into<String>) {
        self.raw += points;
        self.notes.push(note.into());
    }

    pub(crate) fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Record a diagnostic. Non-finite values are stored as 0.0.
    pub(crate) fn diag(&mut self, key: &str, value: f64) {
        let v = if value.is_finite() { value } else { 0.0 };
        self.diagnostics.insert(key.to_string(), v);
    }

    pub(crate) fn flag(&mut self, key: &str, on: bool) {
        self.diag(key, if on { 1.0 } else { 0.0 });
    }

    pub(crate) fn finish(self, module: ModuleId, max_score: f64) -> ModuleScore {
        debug_assert!(self.raw <= max_score, "{module} raw score above ceiling");
        ModuleScore {
            module,
            raw_score: self.raw,
            max_score,
            active: self.raw != 0.0,
            notes: self.notes,
            diagnostics: self.diagnostics,
        }
    }
}

/// `a / b`, or 0.0 when `b` is zero or either side is not finite.
pub(crate) fn ratio(a: f64, b: f64) -> f64 {
    if b != 0.0 && a.is_finite() && b.is_finite() {
        a / b
    } else {
        0.0
    }
}

/// Mean volume of the `period` bars strictly before `index`.
pub(crate) fn prior_mean_volume(bars: &[Bar], index: usize, period: usize) -> Option<f64> {
    let start = index.checked_sub(period)?;
    Some(crate::indicators::mean_volume(&bars[start..index]))
}

#[cfg(test)]
pub(crate) mod test_bars {
    use crate::domain::Bar;
    use chrono::NaiveDate;

    pub fn bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Constant price and volume.
    pub fn flat(n: usize) -> Vec<Bar> {
        (0..n).map(|i| bar(i, 100.0, 100.0, 100.0, 100.0, 1000)).collect()
    }

    /// Bars following a close path with a fixed half-range around each close.
    pub fn from_closes(closes: &[f64], half_range: f64, volume: u64) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open = if i == 0 { c } else { closes[i - 1] };
                bar(
                    i,
                    open,
                    open.max(c) + half_range,
                    open.min(c) - half_range,
                    c,
                    volume,
                )
            })
            .collect()
    }

    /// Wide, noisy bars followed by a tight base and a 2.5x volume spike
    /// with three higher closes on narrowing ranges.
    pub fn accumulation_scenario() -> Vec<Bar> {
        let mut bars = Vec::new();
        for i in 0..110 {
            let close = if i % 2 == 0 { 101.0 } else { 99.0 };
            bars.push(bar(i, 100.0, 104.0, 96.0, close, 1000));
        }
        for i in 110..150 {
            bars.push(bar(i, 100.0, 100.5, 99.5, 100.1, 1000));
        }
        bars.push(bar(150, 100.0, 100.8, 99.8, 100.6, 2500));
        bars.push(bar(151, 100.6, 100.9, 100.1, 100.8, 1000));
        bars.push(bar(152, 100.8, 101.0, 100.4, 100.9, 1000));
        bars.push(bar(153, 100.9, 101.2, 100.7, 101.1, 1000));
        bars
    }
}

#[cfg(test)]
mod tests {
    use super::test_bars::flat;
    use super::*;

    #[test]
    fn canonical_order_and_ceilings() {
        let modules = ScoringModule::all();
        let ids: Vec<ModuleId> = modules.iter().map(|m| m.id()).collect();
        assert_eq!(ids, ModuleId::ALL.to_vec());
        let maxes: Vec<f64> = modules.iter().map(|m| m.max_score()).collect();
        assert_eq!(maxes, vec![20.0, 20.0, 15.0, 20.0, 15.0, 17.0]);
    }

    #[test]
    fn short_window_abstains_with_note() {
        let bars = flat(10);
        for m in ScoringModule::all() {
            let s = m.analyze(&bars);
            assert!(!s.active, "{} should abstain", m.id());
            assert_eq!(s.raw_score, 0.0);
            assert!(s.notes[0].contains("insufficient data"), "{:?}", s.notes);
            assert!(s.notes[0].contains(m.id().name()));
        }
    }

    #[test]
    fn flat_window_fires_nothing() {
        let bars = flat(250);
        for m in ScoringModule::all() {
            let s = m.analyze(&bars);
            assert_eq!(s.raw_score, 0.0, "{} fired on flat input: {:?}", m.id(), s.notes);
            assert!(!s.active);
        }
    }

    #[test]
    fn scorecard_activity_follows_raw_score() {
        let mut card = Scorecard::new();
        card.fire(-4.0, "penalty");
        card.diag("x", f64::NAN);
        let s = card.finish(ModuleId::AntiDistribution, 17.0);
        assert!(s.active);
        assert_eq!(s.diagnostic("x"), Some(0.0));
    }

    #[test]
    fn ratio_guards_zero() {
        assert_eq!(ratio(1.0, 0.0), 0.0);
        assert_eq!(ratio(1.0, 4.0), 0.25);
    }
}
