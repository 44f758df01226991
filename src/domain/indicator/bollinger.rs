//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Defaults: period=20, multiplier=2.0. The first (period-1) points are undefined.

use crate::domain::error::GravionError;
use crate::domain::indicator::sma::rolling_mean;
use crate::domain::indicator::stddev::rolling_stddev;
use crate::domain::indicator::{closes, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Series;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    series: &Series,
    period: usize,
    stddev_mult_x100: u32,
) -> Result<IndicatorSeries, GravionError> {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    indicator_type.check(series)?;

    let closes = closes(series);
    let middle = rolling_mean(&closes, period);
    let spread = rolling_stddev(&closes, period);
    let mult = stddev_mult_x100 as f64 / 100.0;

    let values = series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            date: bar.date,
            value: middle[i].zip(spread[i]).map(|(m, sd)| IndicatorValue::Bollinger {
                upper: m + mult * sd,
                middle: m,
                lower: m - mult * sd,
            }),
        })
        .collect();

    Ok(IndicatorSeries {
        indicator_type,
        values,
    })
}
