//! Fundamentals snapshot with point-in-time quarterly earnings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Quarters between a quarter and the same quarter one year earlier.
const YOY_LAG_QUARTERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyNetIncome {
    pub period_end: NaiveDate,
    /// Date the figure became public; later reports are invisible before it.
    pub reported: NaiveDate,
    pub net_income: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub next_earnings_date: Option<NaiveDate>,
    #[serde(default)]
    pub week52_high: Option<f64>,
    #[serde(default)]
    pub week52_low: Option<f64>,
    #[serde(default)]
    pub quarterly_net_income: Vec<QuarterlyNetIncome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YoyGrowth {
    pub pct: f64,
    /// Net income moved from a loss a year ago to a profit now.
    pub turnaround: bool,
}

impl Fundamentals {
    /// Quarters reported on or before `as_of`, ordered by period end.
    pub fn quarters_as_of(&self, as_of: NaiveDate) -> Vec<&QuarterlyNetIncome> {
        let mut quarters: Vec<&QuarterlyNetIncome> = self
            .quarterly_net_income
            .iter()
            .filter(|q| q.reported <= as_of)
            .collect();
        quarters.sort_by_key(|q| q.period_end);
        quarters
    }

    /// Year-over-year net income growth of the latest quarter known on `as_of`.
    ///
    /// `None` when fewer than five quarters are known or the year-ago
    /// figure is zero.
    pub fn yoy_growth(&self, as_of: NaiveDate) -> Option<YoyGrowth> {
        let quarters = self.quarters_as_of(as_of);
        if quarters.len() <= YOY_LAG_QUARTERS {
            return None;
        }
        let latest = quarters[quarters.len() - 1].net_income;
        let year_ago = quarters[quarters.len() - 1 - YOY_LAG_QUARTERS].net_income;
        if year_ago == 0.0 {
            return None;
        }
        Some(YoyGrowth {
            pct: (latest - year_ago) / year_ago.abs() * 100.0,
            turnaround: year_ago < 0.0 && latest > 0.0,
        })
    }
}
