//! On-Balance Volume (OBV).
//!
//! OBV[0] = 0; each bar adds its volume on an up close and subtracts it on a
//! down close. Lookback: 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Default)]
pub struct Obv;

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut acc = 0.0;
        bars.iter()
            .enumerate()
            .map(|(i, bar)| {
                if i > 0 {
                    let prev = bars[i - 1].close;
                    if bar.close > prev {
                        acc += bar.volume_f64();
                    } else if bar.close < prev {
                        acc -= bar.volume_f64();
                    }
                }
                acc
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn obv_accumulates_signed_volume() {
        let bars = make_bars(&[10.0, 11.0, 10.5, 10.5, 12.0]);
        let obv = Obv.compute(&bars);
        assert_eq!(obv, vec![0.0, 1000.0, 0.0, 0.0, 1000.0]);
    }
}
