//! Open positions and trade records.

use chrono::NaiveDate;
use serde::Serialize;

/// A long holding. Only one may be open per backtest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub shares: u64,
    /// Fill price including slippage.
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    /// Per-share commission and platform fee paid on entry.
    pub entry_fees: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    /// Price move since entry, before fees.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.shares as f64 * (price - self.entry_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One fill in the trade ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub price: f64,
    pub shares: u64,
    /// Realised profit, present on SELL only.
    pub pnl: Option<f64>,
    /// Bar whose signal produced this fill.
    pub signal_date: NaiveDate,
}

/// A completed BUY/SELL round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub shares: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub pnl: f64,
}

impl ClosedTrade {
    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}

/// A position still held when the series ends, marked at the final close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPosition {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: u64,
    pub mark_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
}

impl OpenPosition {
    pub fn mark(position: &Position, price: f64) -> Self {
        Self {
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            shares: position.shares,
            mark_price: price,
            market_value: position.market_value(price),
            unrealized_pnl: position.unrealized_pnl(price),
        }
    }
}
