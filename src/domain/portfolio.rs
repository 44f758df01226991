//! Cash, holding and equity tracking for a single backtest run.

use chrono::NaiveDate;
use serde::Serialize;

use super::position::{ClosedTrade, Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub symbol: String,
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(symbol: impl Into<String>, initial_capital: f64) -> Self {
        Portfolio {
            symbol: symbol.into(),
            cash: initial_capital,
            initial_capital,
            position: None,
            trades: Vec::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Cash plus the holding marked at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.market_value(price))
    }

    pub fn record_equity(&mut self, date: NaiveDate, price: f64) {
        let equity = self.equity(price);
        self.equity_curve.push(EquityPoint { date, equity });
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}
