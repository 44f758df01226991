//! Technical indicator implementations.
//!
//! - `IndicatorType`: indicator identity + parameters (serves as HashMap key)
//! - `IndicatorValue`: output shape of a single point
//! - `IndicatorSeries`: values aligned one-to-one with the bars of a `Series`
//! - `IndicatorFrame`: the set of series a consumer needs, computed together
//!
//! A point whose window is not yet full holds `None`. Callers must treat
//! `None` as "unknown", never as zero.

pub mod bollinger;
pub mod change;
pub mod ema;
pub mod frame;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::calculate_bollinger;
pub use change::calculate_daily_change;
pub use ema::calculate_ema;
pub use frame::{FrameSpec, IndicatorFrame};
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::error::GravionError;
use crate::domain::ohlcv::Series;

/// Extra history required on top of the slow period for composite
/// (EMA-of-EMA) indicators so the seeded averages settle.
pub const COMPOSITE_PADDING: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: Option<IndicatorValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum IndicatorValue {
    Simple(f64),
    /// The line is defined before the signal line finishes warming up.
    Macd {
        line: f64,
        signal: Option<f64>,
        histogram: Option<f64>,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

/// Which output of a multi-valued indicator to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    Upper,
    Middle,
    Lower,
}

impl IndicatorValue {
    pub fn field(&self, field: IndicatorField) -> Option<f64> {
        match (self, field) {
            (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
            (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine | IndicatorField::Value) => {
                Some(*line)
            }
            (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => *signal,
            (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => *histogram,
            (IndicatorValue::Bollinger { upper, .. }, IndicatorField::Upper) => Some(*upper),
            (
                IndicatorValue::Bollinger { middle, .. },
                IndicatorField::Middle | IndicatorField::Value,
            ) => Some(*middle),
            (IndicatorValue::Bollinger { lower, .. }, IndicatorField::Lower) => Some(*lower),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    DailyChange,
}

impl IndicatorType {
    /// Fewest bars the indicator accepts.
    pub fn minimum_bars(&self) -> usize {
        match *self {
            IndicatorType::Sma(n) | IndicatorType::Ema(n) => n,
            IndicatorType::Rsi(n) => n + 1,
            IndicatorType::Macd { slow, signal, .. } => {
                (slow + COMPOSITE_PADDING).max((slow + signal).saturating_sub(1))
            }
            IndicatorType::Bollinger { period, .. } => period,
            IndicatorType::DailyChange => 2,
        }
    }

    /// Reject parameter sets that cannot describe a real indicator.
    pub fn validate(&self) -> Result<(), GravionError> {
        let bad = |reason: String| -> Result<(), GravionError> {
            Err(GravionError::invalid_strategy(reason))
        };
        match *self {
            IndicatorType::Sma(0) | IndicatorType::Ema(0) | IndicatorType::Rsi(0) => {
                bad(format!("{self}: period must be positive"))
            }
            IndicatorType::Macd { fast, slow, signal } => {
                if fast == 0 || slow == 0 || signal == 0 {
                    bad(format!("{self}: periods must be positive"))
                } else if fast >= slow {
                    bad(format!("{self}: fast period must be below slow period"))
                } else {
                    Ok(())
                }
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                if period == 0 || stddev_mult_x100 == 0 {
                    bad(format!("{self}: period and multiplier must be positive"))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Validate parameters and check the series is long enough.
    pub fn check(&self, series: &Series) -> Result<(), GravionError> {
        self.validate()?;
        let minimum = self.minimum_bars();
        if series.len() < minimum {
            return Err(GravionError::InsufficientData {
                symbol: series.symbol().to_string(),
                bars: series.len(),
                minimum,
            });
        }
        Ok(())
    }

    pub fn compute(&self, series: &Series) -> Result<IndicatorSeries, GravionError> {
        match *self {
            IndicatorType::Sma(n) => calculate_sma(series, n),
            IndicatorType::Ema(n) => calculate_ema(series, n),
            IndicatorType::Rsi(n) => calculate_rsi(series, n),
            IndicatorType::Macd { fast, slow, signal } => calculate_macd(series, fast, slow, signal),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => calculate_bollinger(series, period, stddev_mult_x100),
            IndicatorType::DailyChange => calculate_daily_change(series),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::DailyChange => write!(f, "CHANGE%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Wrap single-valued output, pairing each value with its bar date.
    pub(crate) fn simple(
        indicator_type: IndicatorType,
        series: &Series,
        values: Vec<Option<f64>>,
    ) -> Self {
        let values = series
            .bars()
            .iter()
            .zip(values)
            .map(|(bar, v)| IndicatorPoint {
                date: bar.date,
                value: v.map(IndicatorValue::Simple),
            })
            .collect();
        Self {
            indicator_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize, field: IndicatorField) -> Option<f64> {
        self.values
            .get(index)
            .and_then(|p| p.value.as_ref())
            .and_then(|v| v.field(field))
    }

    /// Index of the first defined point, if any.
    pub fn first_valid(&self) -> Option<usize> {
        self.values.iter().position(|p| p.value.is_some())
    }
}

pub(crate) fn closes(series: &Series) -> Vec<f64> {
    series.bars().iter().map(|b| b.close).collect()
}
