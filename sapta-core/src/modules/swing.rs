//! Zigzag swing detection.
//!
//! A pivot is confirmed once price reverses from the running extreme by at
//! least `threshold` (fractional, 0.03 = 3%). Pivots strictly alternate
//! between highs and lows; the final, still-unconfirmed extreme is not
//! reported.

use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

impl Pivot {
    fn high(index: usize, price: f64) -> Self {
        Self {
            index,
            price,
            kind: PivotKind::High,
        }
    }

    fn low(index: usize, price: f64) -> Self {
        Self {
            index,
            price,
            kind: PivotKind::Low,
        }
    }

    pub fn is_low(&self) -> bool {
        self.kind == PivotKind::Low
    }
}

#[derive(Clone, Copy)]
enum Leg {
    Unknown { hi: (usize, f64), lo: (usize, f64) },
    Up { hi: (usize, f64) },
    Down { lo: (usize, f64) },
}

/// Extract confirmed zigzag pivots from bar highs and lows.
pub fn zigzag(bars: &[Bar], threshold: f64) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    let Some(first) = bars.first() else {
        return pivots;
    };
    let up = 1.0 + threshold;
    let down = 1.0 - threshold;

    let mut leg = Leg::Unknown {
        hi: (0, first.high),
        lo: (0, first.low),
    };

    for (i, bar) in bars.iter().enumerate().skip(1) {
        leg = match leg {
            Leg::Unknown { mut hi, mut lo } => {
                if bar.high > hi.1 {
                    hi = (i, bar.high);
                }
                if bar.low < lo.1 {
                    lo = (i, bar.low);
                }
                if lo.1 > 0.0 && hi.1 >= lo.1 * up {
                    if lo.0 < hi.0 {
                        pivots.push(Pivot::low(lo.0, lo.1));
                        Leg::Up { hi }
                    } else {
                        pivots.push(Pivot::high(hi.0, hi.1));
                        Leg::Down { lo }
                    }
                } else {
                    Leg::Unknown { hi, lo }
                }
            }
            Leg::Up { hi } => {
                if bar.high > hi.1 {
                    Leg::Up { hi: (i, bar.high) }
                } else if bar.low <= hi.1 * down {
                    pivots.push(Pivot::high(hi.0, hi.1));
                    Leg::Down { lo: (i, bar.low) }
                } else {
                    Leg::Up { hi }
                }
            }
            Leg::Down { lo } => {
                if bar.low < lo.1 {
                    Leg::Down { lo: (i, bar.low) }
                } else if bar.high >= lo.1 * up {
                    pivots.push(Pivot::low(lo.0, lo.1));
                    Leg::Up { hi: (i, bar.high) }
                } else {
                    Leg::Down { lo }
                }
            }
        };
    }
    pivots
}
