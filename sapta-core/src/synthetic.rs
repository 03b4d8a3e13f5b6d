//! Deterministic synthetic OHLCV histories for tests, benches and demos.
//!
//! Each ticker gets its own BLAKE3-derived seed, so the same ticker always
//! yields the same bars. The walk alternates between noisy drift, quiet
//! base-building with falling volatility, and sharp markups, which gives
//! the scoring modules and the labeler something to find.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, OhlcvSeries};
use crate::error::SaptaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    Drift,
    Base,
    Markup,
}

/// Generate `n_bars` weekday bars for `ticker` starting at `start`.
pub fn synthetic_bars(ticker: &str, start: NaiveDate, n_bars: usize, seed: u64) -> Vec<Bar> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ticker.as_bytes());
    hasher.update(&seed.to_le_bytes());
    let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

    let mut bars = Vec::with_capacity(n_bars);
    let mut price = rng.gen_range(50.0..150.0_f64);
    let mut date = start;
    let mut regime = Regime::Drift;
    let mut remaining = rng.gen_range(40..120usize);
    let mut base_len = 1usize;
    let mut base_day = 0usize;

    while bars.len() < n_bars {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date += Duration::days(1);
            continue;
        }
        if remaining == 0 {
            (regime, remaining) = match regime {
                Regime::Drift => (Regime::Base, rng.gen_range(40..90)),
                Regime::Base => (Regime::Markup, rng.gen_range(8..20)),
                Regime::Markup => (Regime::Drift, rng.gen_range(40..120)),
            };
            if regime == Regime::Base {
                base_len = remaining;
                base_day = 0;
            }
        }

        let (ret, span, volume) = match regime {
            Regime::Drift => (
                rng.gen_range(-0.025..0.025),
                rng.gen_range(0.005..0.02),
                rng.gen_range(800_000..2_000_000u64),
            ),
            Regime::Base => {
                // Volatility decays across the base; occasional absorption day.
                let decay = 1.0 - base_day as f64 / base_len as f64;
                base_day += 1;
                let volume = if rng.gen_bool(0.05) {
                    rng.gen_range(2_500_000..4_000_000u64)
                } else {
                    rng.gen_range(600_000..1_200_000u64)
                };
                (
                    rng.gen_range(-0.006..0.007) * (0.3 + decay),
                    rng.gen_range(0.002..0.008) * (0.3 + decay),
                    volume,
                )
            }
            Regime::Markup => (
                rng.gen_range(0.005..0.04),
                rng.gen_range(0.01..0.025),
                rng.gen_range(1_500_000..4_000_000u64),
            ),
        };

        let open = price;
        let close = (price * (1.0 + ret)).max(0.01);
        let high = open.max(close) * (1.0 + span * rng.gen_range(0.2..1.0));
        let low = open.min(close) * (1.0 - span * rng.gen_range(0.2..1.0));
        bars.push(Bar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        remaining -= 1;
        date += Duration::days(1);
    }
    bars
}

/// Synthetic bars wrapped in a validated series.
pub fn synthetic_series(
    ticker: &str,
    start: NaiveDate,
    n_bars: usize,
    seed: u64,
) -> Result<OhlcvSeries, SaptaError> {
    OhlcvSeries::new(ticker, synthetic_bars(ticker, start, n_bars, seed))
}
