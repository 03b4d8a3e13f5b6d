//! Elliott wave position from zigzag pivots.
//!
//! At most one label per evaluation, checked in this order on the most
//! recent pivots (which must end on a low):
//! - Wave 5 setup `L0 H1 L2 H3 L4`: H3 > H1, L4 > H1, L2 > L0, close > L4: +12
//! - Wave 3 setup `L0 H1 L2`: L2 > L0, close > L2: +15
//! - Wave C completion `H0 LA HB LC`: HB < H0, LC < LA, close > LC: +10
//!
//! A labeled setup whose last retracement sits in [0.382, 0.618] earns a
//! Fibonacci bonus of +5.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::swing::{zigzag, Pivot, PivotKind};
use super::{ratio, Detector, Scorecard};
use crate::domain::{Bar, ModuleId, ModuleScore};
use crate::indicators::{Indicator, Rsi, Sma};

const MAX_SCORE: f64 = 20.0;
const LOOKBACK: usize = 60;

const WAVE3_POINTS: f64 = 15.0;
const WAVE5_POINTS: f64 = 12.0;
const WAVEC_POINTS: f64 = 10.0;
const FIB_POINTS: f64 = 5.0;

const FIB_LOW: f64 = 0.382;
const FIB_HIGH: f64 = 0.618;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WavePhase {
    Wave3,
    Wave5,
    WaveC,
}

impl WavePhase {
    /// Numeric code used in diagnostics and features (0 = no label).
    pub fn code(self) -> f64 {
        match self {
            WavePhase::Wave3 => 1.0,
            WavePhase::Wave5 => 2.0,
            WavePhase::WaveC => 3.0,
        }
    }

    pub fn from_code(code: f64) -> Option<Self> {
        match code as i64 {
            1 => Some(WavePhase::Wave3),
            2 => Some(WavePhase::Wave5),
            3 => Some(WavePhase::WaveC),
            _ => None,
        }
    }

    pub fn points(self) -> f64 {
        match self {
            WavePhase::Wave3 => WAVE3_POINTS,
            WavePhase::Wave5 => WAVE5_POINTS,
            WavePhase::WaveC => WAVEC_POINTS,
        }
    }
}

impl fmt::Display for WavePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WavePhase::Wave3 => "WAVE_3",
            WavePhase::Wave5 => "WAVE_5",
            WavePhase::WaveC => "WAVE_C",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Elliott {
    pub swing_threshold: f64,
    /// Bars scanned for pivots.
    pub span: usize,
    pub trend_period: usize,
}

impl Default for Elliott {
    fn default() -> Self {
        Self {
            swing_threshold: 0.03,
            span: 120,
            trend_period: 50,
        }
    }
}

/// A candidate pattern: how many of its rules failed and the retracement of
/// its last corrective leg.
struct Candidate {
    phase: WavePhase,
    violations: usize,
    retracement: f64,
}

fn shape_matches(pivots: &[Pivot], first: PivotKind) -> bool {
    pivots.first().map(|p| p.kind) == Some(first) && pivots.last().map_or(false, |p| p.is_low())
}

fn wave5(p: &[Pivot], close: f64) -> Option<Candidate> {
    let w = p.get(p.len().checked_sub(5)?..)?;
    if !shape_matches(w, PivotKind::Low) {
        return None;
    }
    let (l0, h1, l2, h3, l4) = (w[0].price, w[1].price, w[2].price, w[3].price, w[4].price);
    let violations = [h3 > h1, l4 > h1, l2 > l0, close > l4]
        .iter()
        .filter(|ok| !**ok)
        .count();
    Some(Candidate {
        phase: WavePhase::Wave5,
        violations,
        retracement: ratio(h3 - l4, h3 - l2),
    })
}

fn wave3(p: &[Pivot], close: f64) -> Option<Candidate> {
    let w = p.get(p.len().checked_sub(3)?..)?;
    if !shape_matches(w, PivotKind::Low) {
        return None;
    }
    let (l0, h1, l2) = (w[0].price, w[1].price, w[2].price);
    let violations = [l2 > l0, close > l2].iter().filter(|ok| !**ok).count();
    Some(Candidate {
        phase: WavePhase::Wave3,
        violations,
        retracement: ratio(h1 - l2, h1 - l0),
    })
}

fn wave_c(p: &[Pivot], close: f64) -> Option<Candidate> {
    let w = p.get(p.len().checked_sub(4)?..)?;
    if !shape_matches(w, PivotKind::High) {
        return None;
    }
    let (h0, la, hb, lc) = (w[0].price, w[1].price, w[2].price, w[3].price);
    let violations = [hb < h0, lc < la, close > lc].iter().filter(|ok| !**ok).count();
    Some(Candidate {
        phase: WavePhase::WaveC,
        violations,
        retracement: ratio(hb - la, h0 - la),
    })
}

/// Bullish divergence: the last pivot low undercuts the previous one while
/// RSI makes a higher low.
fn rsi_divergence(pivots: &[Pivot], rsi: &[f64]) -> bool {
    let mut lows = pivots.iter().rev().filter(|p| p.is_low());
    match (lows.next(), lows.next()) {
        (Some(last), Some(prev)) => {
            let (r_last, r_prev) = (rsi[last.index], rsi[prev.index]);
            last.price < prev.price && r_last.is_finite() && r_prev.is_finite() && r_last > r_prev
        }
        _ => false,
    }
}

impl Detector for Elliott {
    fn id(&self) -> ModuleId {
        ModuleId::Elliott
    }

    fn max_score(&self) -> f64 {
        MAX_SCORE
    }

    fn lookback(&self) -> usize {
        LOOKBACK
    }

    fn score(&self, bars: &[Bar]) -> ModuleScore {
        let mut card = Scorecard::new();
        let window = &bars[bars.len().saturating_sub(self.span)..];
        let n = window.len();
        let close = window[n - 1].close;
        let pivots = zigzag(window, self.swing_threshold);

        let candidates: Vec<Candidate> = [
            wave5(&pivots, close),
            wave3(&pivots, close),
            wave_c(&pivots, close),
        ]
        .into_iter()
        .flatten()
        .collect();
        let label = candidates.iter().find(|c| c.violations == 0);
        let violations = candidates.iter().map(|c| c.violations).min().unwrap_or(0);
        card.diag("rule_violations", violations as f64);

        match label {
            Some(c) => {
                card.diag("wave_code", c.phase.code());
                card.diag("fib_retracement", c.retracement);
                card.fire(c.phase.points(), format!("{} setup identified", c.phase));
                if (FIB_LOW..=FIB_HIGH).contains(&c.retracement) {
                    card.fire(
                        FIB_POINTS,
                        format!("retracement {:.3} inside Fibonacci zone", c.retracement),
                    );
                }
            }
            None => {
                card.diag("wave_code", 0.0);
                card.note(format!("no wave label from {} pivots", pivots.len()));
            }
        }
        card.flag("abc_pattern", matches!(label, Some(c) if c.phase == WavePhase::WaveC));

        let sma = Sma::new(self.trend_period).compute(bars);
        let last = bars.len() - 1;
        let slope = last
            .checked_sub(10)
            .map_or(0.0, |prev| ratio(sma[last] - sma[prev], sma[prev]));
        card.diag("trend_context", slope);

        let rsi = Rsi::new(14).compute(window);
        card.flag("rsi_divergence", rsi_divergence(&pivots, &rsi));

        card.finish(ModuleId::Elliott, MAX_SCORE)
    }
}
