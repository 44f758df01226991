//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]); the first (n-1) points are undefined.

use crate::domain::error::GravionError;
use crate::domain::indicator::{closes, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Series;

pub fn calculate_sma(series: &Series, period: usize) -> Result<IndicatorSeries, GravionError> {
    let indicator_type = IndicatorType::Sma(period);
    indicator_type.check(series)?;
    let values = rolling_mean(&closes(series), period);
    Ok(IndicatorSeries::simple(indicator_type, series, values))
}

/// Window mean over each full window of `period` values.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                None
            } else {
                let window = &values[i + 1 - period..=i];
                Some(window.iter().sum::<f64>() / period as f64)
            }
        })
        .collect()
}
