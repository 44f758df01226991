//! Fill simulation: slippage, whole-share sizing and per-share fees.

use chrono::NaiveDate;
use serde::Serialize;

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Position, Trade, TradeSide};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionConfig {
    pub commission_per_share: f64,
    pub platform_fee_per_share: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_share: 0.0,
            platform_fee_per_share: 0.0,
            slippage_pct: 0.0,
        }
    }
}

impl ExecutionConfig {
    /// Fees charged per share on each leg.
    pub fn per_share_fees(&self) -> f64 {
        self.commission_per_share + self.platform_fee_per_share
    }
}

/// Long entry (buy): execution_price = market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Long exit (sell): execution_price = market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        shares: u64,
        execution_price: f64,
        fees: f64,
    },
    InsufficientCapital,
}

/// Open a long position at `market_price`.
///
/// Shares = floor(budget / (fill price + per-share fees)), where the budget
/// is the smaller of `budget_cap` and the cash on hand.
pub fn enter_long(
    portfolio: &mut Portfolio,
    market_price: f64,
    date: NaiveDate,
    signal_date: NaiveDate,
    budget_cap: f64,
    config: &ExecutionConfig,
) -> EntryResult {
    let execution_price = apply_slippage_long_entry(market_price, config.slippage_pct);
    let fee_per_share = config.per_share_fees();
    let unit_cost = execution_price + fee_per_share;
    let budget = budget_cap.min(portfolio.cash);

    if !(unit_cost > 0.0) || budget <= 0.0 {
        return EntryResult::InsufficientCapital;
    }
    let shares = (budget / unit_cost).floor();
    if shares < 1.0 {
        return EntryResult::InsufficientCapital;
    }
    let shares = shares as u64;
    let fees = shares as f64 * fee_per_share;

    portfolio.cash -= shares as f64 * execution_price + fees;
    portfolio.position = Some(Position {
        shares,
        entry_price: execution_price,
        entry_date: date,
        entry_fees: fees,
    });
    portfolio.trades.push(Trade {
        date,
        side: TradeSide::Buy,
        price: execution_price,
        shares,
        pnl: None,
        signal_date,
    });

    EntryResult::Entered {
        shares,
        execution_price,
        fees,
    }
}

/// Close the open position at `market_price`, if any.
///
/// pnl = (exit - entry) * shares - fees on both legs.
pub fn exit_position(
    portfolio: &mut Portfolio,
    market_price: f64,
    date: NaiveDate,
    signal_date: NaiveDate,
    config: &ExecutionConfig,
) -> Option<ClosedTrade> {
    let position = portfolio.position.take()?;
    let exit_price = apply_slippage_long_exit(market_price, config.slippage_pct);
    let shares = position.shares as f64;
    let exit_fees = shares * config.per_share_fees();

    portfolio.cash += shares * exit_price - exit_fees;
    let pnl = (exit_price - position.entry_price) * shares - position.entry_fees - exit_fees;

    portfolio.trades.push(Trade {
        date,
        side: TradeSide::Sell,
        price: exit_price,
        shares: position.shares,
        pnl: Some(pnl),
        signal_date,
    });
    let closed = ClosedTrade {
        symbol: portfolio.symbol.clone(),
        shares: position.shares,
        entry_price: position.entry_price,
        exit_price,
        entry_date: position.entry_date,
        exit_date: date,
        pnl,
    };
    portfolio.closed_trades.push(closed.clone());
    Some(closed)
}
