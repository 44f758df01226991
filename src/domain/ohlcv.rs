//! Daily price bars, validated series and date windows.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::GravionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// A halted bar reports no traded volume.
    pub fn is_halted(&self) -> bool {
        self.volume == 0
    }
}

/// Bars for one symbol with strictly increasing dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    symbol: String,
    bars: Vec<Bar>,
}

impl Series {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, GravionError> {
        let symbol = symbol.into();
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(GravionError::data_source(format!(
                    "{symbol}: bar dates not strictly increasing at {} -> {}",
                    pair[0].date, pair[1].date
                )));
            }
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Bars with `start <= date <= end`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Series {
        Series {
            symbol: self.symbol.clone(),
            bars: self
                .bars
                .iter()
                .filter(|b| b.date >= start && b.date <= end)
                .cloned()
                .collect(),
        }
    }

    /// Replace the prices of zero-volume bars with the previous close.
    ///
    /// A halted bar at the start of the series has nothing to carry and is
    /// kept as reported.
    pub fn carry_forward_halted(&self) -> Series {
        let mut bars = Vec::with_capacity(self.bars.len());
        let mut prev_close: Option<f64> = None;
        for bar in &self.bars {
            let mut bar = bar.clone();
            if let (true, Some(close)) = (bar.is_halted(), prev_close) {
                bar.open = close;
                bar.high = close;
                bar.low = close;
                bar.close = close;
            }
            prev_close = Some(bar.close);
            bars.push(bar);
        }
        Series {
            symbol: self.symbol.clone(),
            bars,
        }
    }
}

/// Named look-back period understood by the data collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    /// First date covered by this period when it ends on `end`.
    pub fn start_from(self, end: NaiveDate) -> NaiveDate {
        let months_back = |m: u32| end.checked_sub_months(Months::new(m)).unwrap_or(NaiveDate::MIN);
        match self {
            Period::FiveDays => end - Duration::days(5),
            Period::OneMonth => months_back(1),
            Period::ThreeMonths => months_back(3),
            Period::SixMonths => months_back(6),
            Period::OneYear => months_back(12),
            Period::TwoYears => months_back(24),
            Period::FiveYears => months_back(60),
            Period::YearToDate => NaiveDate::from_ymd_opt(end.year(), 1, 1).unwrap_or(end),
            Period::Max => NaiveDate::MIN,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        };
        f.write_str(s)
    }
}

impl FromStr for Period {
    type Err = GravionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "5d" => Ok(Period::FiveDays),
            "1mo" => Ok(Period::OneMonth),
            "3mo" => Ok(Period::ThreeMonths),
            "6mo" => Ok(Period::SixMonths),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "ytd" => Ok(Period::YearToDate),
            "max" => Ok(Period::Max),
            other => Err(GravionError::ConfigInvalid {
                section: "data".into(),
                key: "window".into(),
                reason: format!("unknown period '{other}'"),
            }),
        }
    }
}

/// Requested history: a named period or explicit inclusive dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    Period(Period),
    Range { start: NaiveDate, end: NaiveDate },
}

impl Window {
    /// Inclusive date bounds, resolving named periods against `latest`.
    pub fn resolve(&self, latest: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            Window::Period(period) => (period.start_from(latest), latest),
            Window::Range { start, end } => (start, end),
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Window::Period(Period::OneYear)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Period(period) => write!(f, "{period}"),
            Window::Range { start, end } => write!(f, "{start}:{end}"),
        }
    }
}

impl FromStr for Window {
    type Err = GravionError;

    /// A period name (`6mo`) or `start:end` dates (`2024-01-01:2024-06-30`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((start, end)) = s.split_once(':') else {
            return s.parse().map(Window::Period);
        };
        let date = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| GravionError::ConfigInvalid {
                section: "data".into(),
                key: "window".into(),
                reason: format!("bad date '{raw}': {e}"),
            })
        };
        let (start, end) = (date(start)?, date(end)?);
        if start > end {
            return Err(GravionError::ConfigInvalid {
                section: "data".into(),
                key: "window".into(),
                reason: format!("start {start} is after end {end}"),
            });
        }
        Ok(Window::Range { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(date: NaiveDate, close: f64, volume: u64) -> Bar {
        Bar {
            date,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume,
        }
    }

    #[test]
    fn series_accepts_increasing_dates() {
        let s = Series::new(
            "AAPL",
            vec![bar(d(2024, 1, 1), 10.0, 1), bar(d(2024, 1, 2), 11.0, 1)],
        )
        .unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.symbol(), "AAPL");
        assert_eq!(s.last_date(), Some(d(2024, 1, 2)));
    }

    #[test]
    fn series_rejects_duplicate_dates() {
        let err = Series::new(
            "AAPL",
            vec![bar(d(2024, 1, 2), 10.0, 1), bar(d(2024, 1, 2), 11.0, 1)],
        )
        .unwrap_err();
        assert!(matches!(err, GravionError::DataSource { .. }));
    }

    #[test]
    fn series_rejects_descending_dates() {
        let result = Series::new(
            "AAPL",
            vec![bar(d(2024, 1, 3), 10.0, 1), bar(d(2024, 1, 2), 11.0, 1)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn carry_forward_replaces_halted_prices() {
        let s = Series::new(
            "X",
            vec![
                bar(d(2024, 1, 1), 10.0, 100),
                bar(d(2024, 1, 2), 55.0, 0),
                bar(d(2024, 1, 3), 12.0, 100),
            ],
        )
        .unwrap();
        let fixed = s.carry_forward_halted();
        let halted = &fixed.bars()[1];
        assert_eq!(halted.close, 10.0);
        assert_eq!(halted.open, 10.0);
        assert_eq!(halted.high, 10.0);
        assert_eq!(halted.low, 10.0);
        assert_eq!(fixed.bars()[2].close, 12.0);
    }

    #[test]
    fn window_filters_inclusive() {
        let s = Series::new(
            "X",
            (1..=10).map(|i| bar(d(2024, 1, i), i as f64, 1)).collect(),
        )
        .unwrap();
        let w = s.window(d(2024, 1, 3), d(2024, 1, 5));
        assert_eq!(w.len(), 3);
        assert_eq!(w.first_date(), Some(d(2024, 1, 3)));
    }

    #[test]
    fn period_parse_and_resolve() {
        let p: Period = "6mo".parse().unwrap();
        assert_eq!(p, Period::SixMonths);
        assert_eq!(p.to_string(), "6mo");
        let (start, end) = Window::Period(p).resolve(d(2024, 7, 15));
        assert_eq!(start, d(2024, 1, 15));
        assert_eq!(end, d(2024, 7, 15));
        assert_eq!(Period::YearToDate.start_from(d(2024, 7, 15)), d(2024, 1, 1));
    }

    #[test]
    fn period_parse_rejects_unknown() {
        assert!("7w".parse::<Period>().is_err());
    }

    #[test]
    fn window_parses_period_and_range() {
        assert_eq!("6mo".parse::<Window>().unwrap(), Window::Period(Period::SixMonths));
        assert_eq!(
            "2024-01-01:2024-06-30".parse::<Window>().unwrap(),
            Window::Range {
                start: d(2024, 1, 1),
                end: d(2024, 6, 30)
            }
        );
        assert!("2024-06-30:2024-01-01".parse::<Window>().is_err());
        assert!("fortnight".parse::<Window>().is_err());
        assert_eq!(Window::default().to_string(), "1y");
    }
}
