//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). The first (n-1) points are undefined.

use crate::domain::error::GravionError;
use crate::domain::indicator::{closes, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Series;

pub fn calculate_ema(series: &Series, period: usize) -> Result<IndicatorSeries, GravionError> {
    let indicator_type = IndicatorType::Ema(period);
    indicator_type.check(series)?;
    let values = ema_from(&closes(series), 0, period);
    Ok(IndicatorSeries::simple(indicator_type, series, values))
}

/// EMA over `values[start..]`, output aligned to `values`.
///
/// Everything before `start + period - 1` is undefined.
pub(crate) fn ema_from(values: &[f64], start: usize, period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || start + period > values.len() {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed_end = start + period - 1;
    let mut ema = values[start..=seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end] = Some(ema);

    for i in (seed_end + 1)..values.len() {
        ema = values[i] * k + ema * (1.0 - k);
        out[i] = Some(ema);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::series_from_closes;
    use crate::domain::indicator::IndicatorField;
    use approx::assert_relative_eq;

    #[test]
    fn ema_warmup() {
        let s = series_from_closes(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let ema = calculate_ema(&s, 3).unwrap();
        assert!(ema.values[0].value.is_none());
        assert!(ema.values[1].value.is_none());
        assert_eq!(ema.get(2, IndicatorField::Value), Some(20.0));
    }

    #[test]
    fn ema_recurrence() {
        let s = series_from_closes(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let ema = calculate_ema(&s, 3).unwrap();
        // k = 0.5: 40*0.5 + 20*0.5 = 30, then 50*0.5 + 30*0.5 = 40
        assert_relative_eq!(ema.get(3, IndicatorField::Value).unwrap(), 30.0);
        assert_relative_eq!(ema.get(4, IndicatorField::Value).unwrap(), 40.0);
    }

    #[test]
    fn ema_from_offset_start() {
        let out = ema_from(&[0.0, 0.0, 2.0, 4.0, 6.0], 2, 2);
        assert!(out[..3].iter().all(Option::is_none));
        assert_eq!(out[3], Some(3.0));
        // k = 2/3: 6*2/3 + 3/3 = 5
        assert_relative_eq!(out[4].unwrap(), 5.0);
    }

    #[test]
    fn ema_flat_series_is_constant() {
        let s = series_from_closes(&[7.0; 12]);
        let ema = calculate_ema(&s, 5).unwrap();
        for i in 4..12 {
            assert_relative_eq!(ema.get(i, IndicatorField::Value).unwrap(), 7.0);
        }
    }
}
