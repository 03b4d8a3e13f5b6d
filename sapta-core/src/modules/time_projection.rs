//! Fibonacci time projection from the last significant low.
//!
//! `d` = bars since the most recent 5% zigzag low.
//! - `d` within 2 bars of a Fibonacci count (21/34/55/89/144): +8
//! - the previous low-to-low cycle is within max(3, 10%) of `d`: +4
//! - the next Fibonacci count is 3 to 5 bars away: +3

use super::swing::{zigzag, Pivot};
use super::{Detector, Scorecard};
use crate::domain::{Bar, BreakoutWindow, ModuleId, ModuleScore};

const MAX_SCORE: f64 = 15.0;
const LOOKBACK: usize = 120;

const FIB_WINDOW_POINTS: f64 = 8.0;
const CYCLE_POINTS: f64 = 4.0;
const TURN_POINTS: f64 = 3.0;

pub const FIB_COUNTS: [usize; 5] = [21, 34, 55, 89, 144];

#[derive(Debug, Clone)]
pub struct TimeProjection {
    pub swing_threshold: f64,
    pub window_tolerance: usize,
    pub turn_min: usize,
    pub turn_max: usize,
}

impl Default for TimeProjection {
    fn default() -> Self {
        Self {
            swing_threshold: 0.05,
            window_tolerance: 2,
            turn_min: 3,
            turn_max: 5,
        }
    }
}

/// Breakout window around a target `days_to_target` bars ahead.
pub fn breakout_window(days_to_target: u32) -> BreakoutWindow {
    BreakoutWindow {
        from_days: days_to_target.saturating_sub(2),
        to_days: days_to_target + 2,
    }
}

/// Smallest Fibonacci count strictly after `days`, as (count, distance).
pub fn next_target(days: usize) -> Option<(usize, usize)> {
    FIB_COUNTS.iter().find(|&&f| f > days).map(|&f| (f, f - days))
}

impl Detector for TimeProjection {
    fn id(&self) -> ModuleId {
        ModuleId::TimeProjection
    }

    fn max_score(&self) -> f64 {
        MAX_SCORE
    }

    fn lookback(&self) -> usize {
        LOOKBACK
    }

    fn score(&self, bars: &[Bar]) -> ModuleScore {
        let mut card = Scorecard::new();
        let last = bars.len() - 1;
        let pivots = zigzag(bars, self.swing_threshold);
        let lows: Vec<&Pivot> = pivots.iter().filter(|p| p.is_low()).collect();

        let Some(low) = lows.last() else {
            card.note("no significant swing low in window");
            return card.finish(ModuleId::TimeProjection, MAX_SCORE);
        };
        let days = last - low.index;
        card.diag("days_since_low", days as f64);

        let hit = FIB_COUNTS
            .iter()
            .find(|&&f| days.abs_diff(f) <= self.window_tolerance);
        card.flag("in_fib_window", hit.is_some());
        if let Some(f) = hit {
            card.fire(
                FIB_WINDOW_POINTS,
                format!("{days} bars since low, inside the {f}-bar Fibonacci window"),
            );
        }

        if lows.len() >= 2 {
            let cycle = low.index - lows[lows.len() - 2].index;
            card.diag("cycle_length", cycle as f64);
            let tolerance = (0.1 * days as f64).max(3.0);
            let matched = (cycle as f64 - days as f64).abs() <= tolerance;
            card.flag("cycle_match", matched);
            if matched {
                card.fire(
                    CYCLE_POINTS,
                    format!("current leg of {days} bars repeats prior {cycle}-bar cycle"),
                );
            }
        }

        if let Some((target, dist)) = next_target(days) {
            card.diag("days_to_next_target", dist as f64);
            if (self.turn_min..=self.turn_max).contains(&dist) {
                card.fire(
                    TURN_POINTS,
                    format!("turn window in {dist} bars (Fibonacci {target})"),
                );
            }
        }

        card.finish(ModuleId::TimeProjection, MAX_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_bars::{flat, from_closes};

    /// Declines into a low `days` bars before the end, after `lead` flat bars.
    fn low_then_rally(lead: usize, days: usize) -> Vec<Bar> {
        let mut closes = vec![100.0; lead];
        for i in 1..=20 {
            closes.push(100.0 - i as f64);
        }
        for i in 1..=days {
            closes.push(80.0 + 0.5 * i as f64);
        }
        from_closes(&closes, 0.1, 1000)
    }

    #[test]
    fn inside_fibonacci_window() {
        let s = TimeProjection::default().score(&low_then_rally(100, 34));
        assert_eq!(s.diagnostic("days_since_low"), Some(34.0));
        assert_eq!(s.diagnostic("in_fib_window"), Some(1.0));
        assert!(s.raw_score >= 8.0, "notes: {:?}", s.notes);
    }

    #[test]
    fn turn_window_ahead() {
        // 50 bars since the low → 55 is 5 away.
        let s = TimeProjection::default().score(&low_then_rally(100, 50));
        assert_eq!(s.diagnostic("days_to_next_target"), Some(5.0));
        assert_eq!(s.diagnostic("in_fib_window"), Some(0.0));
        assert_eq!(s.raw_score, 3.0, "notes: {:?}", s.notes);
    }

    #[test]
    fn no_low_no_score() {
        let s = TimeProjection::default().score(&flat(150));
        assert_eq!(s.raw_score, 0.0);
        assert!(!s.active);
    }

    #[test]
    fn window_bounds() {
        assert_eq!(breakout_window(1), BreakoutWindow { from_days: 0, to_days: 3 });
        assert_eq!(breakout_window(5), BreakoutWindow { from_days: 3, to_days: 7 });
        assert_eq!(next_target(21), Some((34, 13)));
        assert_eq!(next_target(200), None);
    }
}
