//! Market state classification and composite 0-100 scoring.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::fundamentals::{Fundamentals, YoyGrowth};
use super::indicator::{FrameSpec, IndicatorField, IndicatorFrame, IndicatorType};
use super::rule_eval::crosses_above;

/// Bars inspected for a recent golden cross, including the scored bar.
pub const GOLDEN_CROSS_LOOKBACK: usize = 5;

const TREND_POINTS: u8 = 30;
const ABOVE_FAST_POINTS: u8 = 20;
const RECENT_CROSS_POINTS: u8 = 10;
const HIGH_GROWTH_POINTS: u8 = 40;
const MODERATE_GROWTH_POINTS: u8 = 20;

const HIGH_GROWTH_PCT: f64 = 50.0;
const MODERATE_GROWTH_PCT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    StrongBull,
    WeakCorrection,
    Bearish,
    Neutral,
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MarketState::StrongBull => "Strong Bull",
            MarketState::WeakCorrection => "Weak/Correction",
            MarketState::Bearish => "Bearish",
            MarketState::Neutral => "Neutral",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    StrongBuy,
    Watch,
    NeutralAvoid,
}

impl Rating {
    pub fn from_score(total: u8) -> Self {
        match total {
            80.. => Rating::StrongBuy,
            50..=79 => Rating::Watch,
            _ => Rating::NeutralAvoid,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rating::StrongBuy => "Strong Buy",
            Rating::Watch => "Watch",
            Rating::NeutralAvoid => "Neutral/Avoid",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScore {
    pub technical: u8,
    pub fundamental: u8,
    pub total: u8,
    pub rating: Rating,
    pub recent_golden_cross: bool,
    pub yoy_growth: Option<YoyGrowth>,
}

struct Trend {
    close: f64,
    open: f64,
    fast: Option<f64>,
    slow: Option<f64>,
}

fn trend_at(frame: &IndicatorFrame<'_>, spec: &FrameSpec, index: usize) -> Option<Trend> {
    Some(Trend {
        close: frame.close(index)?,
        open: frame.open(index)?,
        fast: frame.value(&spec.sma_fast_type(), IndicatorField::Value, index),
        slow: frame.value(&spec.sma_slow_type(), IndicatorField::Value, index),
    })
}

/// State of bar `index`, first matching rule wins.
pub fn classify(frame: &IndicatorFrame<'_>, spec: &FrameSpec, index: usize) -> MarketState {
    let Some(Trend {
        close,
        open,
        fast: Some(fast),
        slow: Some(slow),
    }) = trend_at(frame, spec, index)
    else {
        return MarketState::Neutral;
    };

    if close > fast && fast > slow && close > open {
        MarketState::StrongBull
    } else if fast > slow && close < fast {
        MarketState::WeakCorrection
    } else if fast <= slow {
        MarketState::Bearish
    } else {
        MarketState::Neutral
    }
}

/// Fast SMA crossed above slow SMA on any of the last
/// [`GOLDEN_CROSS_LOOKBACK`] bars ending at `index`.
pub fn recent_golden_cross(frame: &IndicatorFrame<'_>, spec: &FrameSpec, index: usize) -> bool {
    let fast = spec.sma_fast_type();
    let slow = spec.sma_slow_type();
    let value = |t: &IndicatorType, i: usize| frame.value(t, IndicatorField::Value, i);
    let first = index.saturating_sub(GOLDEN_CROSS_LOOKBACK - 1).max(1);

    (first..=index).any(|t| {
        match (
            value(&fast, t - 1),
            value(&slow, t - 1),
            value(&fast, t),
            value(&slow, t),
        ) {
            (Some(pa), Some(pb), Some(ca), Some(cb)) => crosses_above(pa, pb, ca, cb),
            _ => false,
        }
    })
}

/// Points out of 40 for a year-over-year net income growth percentage.
pub fn fundamental_points(growth: Option<&YoyGrowth>) -> u8 {
    match growth {
        Some(g) if g.pct > HIGH_GROWTH_PCT => HIGH_GROWTH_POINTS,
        Some(g) if g.pct >= MODERATE_GROWTH_PCT => MODERATE_GROWTH_POINTS,
        _ => 0,
    }
}

/// Score bar `index`, reading fundamentals as they were known on `as_of`.
pub fn score(
    frame: &IndicatorFrame<'_>,
    spec: &FrameSpec,
    index: usize,
    fundamentals: Option<&Fundamentals>,
    as_of: NaiveDate,
) -> CompositeScore {
    let mut technical = 0u8;
    let recent_golden_cross = recent_golden_cross(frame, spec, index);

    if let Some(trend) = trend_at(frame, spec, index) {
        if let (Some(fast), Some(slow)) = (trend.fast, trend.slow) {
            if fast > slow {
                technical += TREND_POINTS;
            }
        }
        if trend.fast.is_some_and(|fast| trend.close > fast) {
            technical += ABOVE_FAST_POINTS;
        }
    }
    if recent_golden_cross {
        technical += RECENT_CROSS_POINTS;
    }

    let yoy_growth = fundamentals.and_then(|f| f.yoy_growth(as_of));
    let fundamental = fundamental_points(yoy_growth.as_ref());
    let total = technical + fundamental;

    CompositeScore {
        technical,
        fundamental,
        total,
        rating: Rating::from_score(total),
        recent_golden_cross,
        yoy_growth,
    }
}
