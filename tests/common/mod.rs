#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use gravion::domain::batch::BatchInput;
use gravion::domain::error::GravionError;
use gravion::domain::fundamentals::Fundamentals;
pub use gravion::domain::ohlcv::{Bar, Series, Window};
use gravion::domain::strategy::{DeclarativeStrategy, Strategy};
use gravion::ports::data_port::DataPort;
use std::collections::BTreeMap;

pub struct MockDataPort {
    pub series: BTreeMap<String, Vec<Bar>>,
    pub fundamentals: BTreeMap<String, Fundamentals>,
    pub errors: BTreeMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            series: BTreeMap::new(),
            fundamentals: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.series.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_fundamentals(mut self, symbol: &str, fundamentals: Fundamentals) -> Self {
        self.fundamentals.insert(symbol.to_string(), fundamentals);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(&self, symbol: &str, _window: &Window) -> Result<Series, GravionError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(GravionError::data_source(reason.clone()));
        }
        Series::new(symbol, self.series.get(symbol).cloned().unwrap_or_default())
    }

    fn fetch_fundamentals(&self, symbol: &str) -> Result<Option<Fundamentals>, GravionError> {
        Ok(self.fundamentals.get(symbol).cloned())
    }

    fn list_symbols(&self) -> Result<Vec<String>, GravionError> {
        Ok(self.series.keys().cloned().collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bar with open == close and a fixed volume.
pub fn make_bar(date: NaiveDate, close: f64) -> Bar {
    Bar {
        date,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000,
    }
}

/// One bar per calendar day from 2024-01-01.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let start = date(2024, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(start + Duration::days(i as i64), c))
        .collect()
}

pub fn series_from_closes(symbol: &str, closes: &[f64]) -> Series {
    Series::new(symbol, bars_from_closes(closes)).unwrap()
}

/// 15 bars falling by 1 from 100, 13 rising by 2, 12 falling by 2.
///
/// SMA(5) crosses above SMA(10) once (bar 18) and back below once (bar 32).
pub fn v_shape_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
    closes.extend((1..=13).map(|k| 86.0 + 2.0 * k as f64));
    closes.extend((1..=12).map(|k| 112.0 - 2.0 * k as f64));
    closes
}

pub fn flat_closes(n: usize, price: f64) -> Vec<f64> {
    vec![price; n]
}

pub fn sma_cross_strategy(fast: usize, slow: usize) -> Strategy {
    let json = format!(
        r#"{{
            "name": "SMA {fast}/{slow} Cross",
            "buy_conditions": [{{"indicator": "SMA", "period": {fast}, "comparator": "crosses_above",
                                 "value": {{"indicator": "SMA", "period": {slow}}}}}],
            "sell_conditions": [{{"indicator": "SMA", "period": {fast}, "comparator": "crosses_below",
                                  "value": {{"indicator": "SMA", "period": {slow}}}}}]
        }}"#
    );
    Strategy::Declarative(DeclarativeStrategy::from_json(&json).unwrap())
}

/// Buys below `buy_below`, sells above `sell_above`.
pub fn threshold_strategy(buy_below: f64, sell_above: f64) -> Strategy {
    let json = format!(
        r#"{{
            "name": "Threshold",
            "buy_conditions": [{{"indicator": "Price", "comparator": "<", "value": {buy_below}}}],
            "sell_conditions": [{{"indicator": "Price", "comparator": ">", "value": {sell_above}}}]
        }}"#
    );
    Strategy::Declarative(DeclarativeStrategy::from_json(&json).unwrap())
}

pub fn batch_input(symbol: &str, closes: &[f64]) -> BatchInput {
    BatchInput::ok(series_from_closes(symbol, closes))
}
