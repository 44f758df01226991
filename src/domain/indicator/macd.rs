//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded from the first `signal`
//! defined line values
//! Histogram = MACD Line - Signal Line
//!
//! The line is defined from index slow-1, signal and histogram from
//! slow+signal-2.

use crate::domain::error::GravionError;
use crate::domain::indicator::ema::ema_from;
use crate::domain::indicator::{closes, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Series;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    series: &Series,
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<IndicatorSeries, GravionError> {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    indicator_type.check(series)?;

    let closes = closes(series);
    let ema_fast = ema_from(&closes, 0, fast);
    let ema_slow = ema_from(&closes, 0, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    // Signal EMA runs over the defined part of the line only.
    let line_start = slow - 1;
    let dense_line: Vec<f64> = line.iter().map(|v| v.unwrap_or(0.0)).collect();
    let signal = ema_from(&dense_line, line_start, signal_period);

    let values = series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            date: bar.date,
            value: line[i].map(|l| IndicatorValue::Macd {
                line: l,
                signal: signal[i],
                histogram: signal[i].map(|s| l - s),
            }),
        })
        .collect();

    Ok(IndicatorSeries {
        indicator_type,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::series_from_closes;
    use crate::domain::indicator::IndicatorField;
    use approx::assert_relative_eq;

    fn rising(n: usize) -> Series {
        let prices: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        series_from_closes(&prices)
    }

    #[test]
    fn macd_warmup_boundaries() {
        let s = rising(60);
        let macd = calculate_macd(&s, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL).unwrap();
        assert!(macd.values[24].value.is_none());
        assert!(macd.get(25, IndicatorField::MacdLine).is_some());
        assert!(macd.get(32, IndicatorField::MacdSignal).is_none());
        assert!(macd.get(33, IndicatorField::MacdSignal).is_some());
        assert!(macd.get(33, IndicatorField::MacdHistogram).is_some());
    }

    #[test]
    fn macd_rising_series_line_positive() {
        let s = rising(60);
        let macd = calculate_macd(&s, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL).unwrap();
        assert!(macd.get(59, IndicatorField::MacdLine).unwrap() > 0.0);
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let s = series_from_closes(&[50.0; 60]);
        let macd = calculate_macd(&s, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL).unwrap();
        assert_relative_eq!(macd.get(59, IndicatorField::MacdLine).unwrap(), 0.0);
        assert_relative_eq!(macd.get(59, IndicatorField::MacdHistogram).unwrap(), 0.0);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let prices: Vec<f64> = (0..70).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let s = series_from_closes(&prices);
        let macd = calculate_macd(&s, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL).unwrap();
        for i in 33..70 {
            let line = macd.get(i, IndicatorField::MacdLine).unwrap();
            let signal = macd.get(i, IndicatorField::MacdSignal).unwrap();
            let hist = macd.get(i, IndicatorField::MacdHistogram).unwrap();
            assert_relative_eq!(hist, line - signal, epsilon = 1e-12);
        }
    }

    #[test]
    fn macd_requires_padded_history() {
        let s = rising(45);
        let err = calculate_macd(&s, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL).unwrap_err();
        assert!(matches!(err, GravionError::InsufficientData { minimum: 46, .. }));
    }

    #[test]
    fn macd_fast_not_below_slow_is_invalid() {
        let s = rising(60);
        assert!(matches!(
            calculate_macd(&s, 26, 12, 9),
            Err(GravionError::InvalidStrategy { .. })
        ));
    }
}
