//! RSI (Relative Strength Index) using Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); 100 when avg_loss == 0.
//! The zero-loss check comes first, so a perfectly flat series reads 100.
//! The first n points are undefined (n changes are needed for the seed).

use crate::domain::error::GravionError;
use crate::domain::indicator::{closes, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Series;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_rsi(series: &Series, period: usize) -> Result<IndicatorSeries, GravionError> {
    let indicator_type = IndicatorType::Rsi(period);
    indicator_type.check(series)?;
    let values = wilder_rsi(&closes(series), period);
    Ok(IndicatorSeries::simple(indicator_type, series, values))
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

fn wilder_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;
    out[period] = Some(rsi_from(avg_gain, avg_loss));

    for (i, &change) in changes.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        out[i + 1] = Some(rsi_from(avg_gain, avg_loss));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::series_from_closes;
    use crate::domain::indicator::IndicatorField;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn rsi_warmup_first_n_undefined() {
        let s = series_from_closes(&[1.0, 2.0, 3.0, 2.0, 3.0, 4.0]);
        let rsi = calculate_rsi(&s, 3).unwrap();
        for i in 0..3 {
            assert!(rsi.values[i].value.is_none());
        }
        assert!(rsi.values[3].value.is_some());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let s = series_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let rsi = calculate_rsi(&s, 3).unwrap();
        assert_relative_eq!(rsi.get(4, IndicatorField::Value).unwrap(), 100.0);
    }

    #[test]
    fn rsi_flat_series_is_100() {
        let s = series_from_closes(&[7.0; 6]);
        let rsi = calculate_rsi(&s, 3).unwrap();
        assert_eq!(rsi.get(5, IndicatorField::Value), Some(100.0));
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let s = series_from_closes(&[5.0, 4.0, 3.0, 2.0, 1.0]);
        let rsi = calculate_rsi(&s, 3).unwrap();
        assert_relative_eq!(rsi.get(3, IndicatorField::Value).unwrap(), 0.0);
    }

    #[test]
    fn rsi_seed_value() {
        // changes +2, -1, +1: avg_gain = 1, avg_loss = 1/3, rs = 3 -> 75
        let s = series_from_closes(&[10.0, 12.0, 11.0, 12.0]);
        let rsi = calculate_rsi(&s, 3).unwrap();
        assert_relative_eq!(rsi.get(3, IndicatorField::Value).unwrap(), 75.0, epsilon = 1e-9);
    }

    #[test]
    fn rsi_needs_period_plus_one_bars() {
        let s = series_from_closes(&[1.0, 2.0, 3.0]);
        assert!(calculate_rsi(&s, 3).is_err());
    }

    proptest! {
        #[test]
        fn rsi_is_bounded(prices in prop::collection::vec(1.0f64..1000.0, 16..80)) {
            let s = series_from_closes(&prices);
            let rsi = calculate_rsi(&s, DEFAULT_PERIOD).unwrap();
            for i in 0..rsi.len() {
                if let Some(v) = rsi.get(i, IndicatorField::Value) {
                    prop_assert!((0.0..=100.0).contains(&v));
                }
            }
        }
    }
}
