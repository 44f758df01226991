//! Daily change percent: (C[i] - C[i-1]) / C[i-1] * 100.

use crate::domain::error::GravionError;
use crate::domain::indicator::{closes, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Series;

pub fn calculate_daily_change(series: &Series) -> Result<IndicatorSeries, GravionError> {
    let indicator_type = IndicatorType::DailyChange;
    indicator_type.check(series)?;

    let closes = closes(series);
    let mut values = Vec::with_capacity(closes.len());
    values.push(None);
    values.extend(closes.windows(2).map(|w| {
        if w[0] == 0.0 {
            None
        } else {
            Some((w[1] - w[0]) / w[0] * 100.0)
        }
    }));
    Ok(IndicatorSeries::simple(indicator_type, series, values))
}
