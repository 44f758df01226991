//! Single-symbol backtest simulation.
//!
//! Signals are evaluated on the close of bar `t` and filled at the open of
//! bar `t + 1`. A run holds at most one long position; a signal on the final
//! bar has nothing to fill against and is dropped.

use serde::Serialize;
use tracing::debug;

use super::error::GravionError;
use super::execution::{self, EntryResult, ExecutionConfig};
use super::indicator::IndicatorFrame;
use super::metrics::{Metrics, TradeStats};
use super::ohlcv::Series;
use super::params::ParamValues;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ClosedTrade, OpenPosition, Trade};
use super::strategy::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub capital_per_symbol: f64,
    pub execution: ExecutionConfig,
    /// Annual rate used for Sharpe and Sortino.
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            capital_per_symbol: 10_000.0,
            execution: ExecutionConfig::default(),
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), GravionError> {
        let invalid = |key: &str, reason: &str| GravionError::ConfigInvalid {
            section: "engine".into(),
            key: key.into(),
            reason: reason.into(),
        };
        if !(self.capital_per_symbol > 0.0) || !self.capital_per_symbol.is_finite() {
            return Err(invalid("capital_per_symbol", "must be a positive number"));
        }
        if !(self.execution.commission_per_share >= 0.0) {
            return Err(invalid("commission_per_share", "must not be negative"));
        }
        if !(self.execution.platform_fee_per_share >= 0.0) {
            return Err(invalid("platform_fee_per_share", "must not be negative"));
        }
        if !(0.0..100.0).contains(&self.execution.slippage_pct) {
            return Err(invalid("slippage_pct", "must be in [0, 100)"));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(invalid("risk_free_rate", "must be a finite number"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub symbol: String,
    pub params: ParamValues,
    pub trades: Vec<Trade>,
    pub total_return_pct: f64,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub open_position: Option<OpenPosition>,
    pub stats: TradeStats,
    #[serde(skip)]
    pub closed_trades: Vec<ClosedTrade>,
}

#[derive(Debug, Clone, Copy)]
enum PendingOrder {
    Buy { signal_index: usize },
    Sell { signal_index: usize },
}

/// Run `strategy` over `series` with the capital and costs in `config`.
pub fn run_backtest(
    series: &Series,
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, GravionError> {
    config.validate()?;
    let bars = series.bars();
    if bars.is_empty() {
        return Err(GravionError::InsufficientData {
            symbol: series.symbol().to_string(),
            bars: 0,
            minimum: 1,
        });
    }

    let frame = IndicatorFrame::compute(series, strategy.required_indicators())?;
    let mut portfolio = Portfolio::new(series.symbol(), config.capital_per_symbol);
    let mut pending: Option<PendingOrder> = None;
    let last = bars.len() - 1;

    for (t, bar) in bars.iter().enumerate() {
        match pending.take() {
            Some(PendingOrder::Buy { signal_index }) => {
                let result = execution::enter_long(
                    &mut portfolio,
                    bar.open,
                    bar.date,
                    bars[signal_index].date,
                    config.capital_per_symbol,
                    &config.execution,
                );
                if result == EntryResult::InsufficientCapital {
                    debug!(symbol = series.symbol(), date = %bar.date, "entry skipped, budget buys zero shares");
                }
            }
            Some(PendingOrder::Sell { signal_index }) => {
                execution::exit_position(
                    &mut portfolio,
                    bar.open,
                    bar.date,
                    bars[signal_index].date,
                    &config.execution,
                );
            }
            None => {}
        }

        portfolio.record_equity(bar.date, bar.close);

        if t == last {
            break;
        }
        let signal = strategy.evaluate(&frame, t);
        pending = if portfolio.is_flat() {
            signal.buy.then_some(PendingOrder::Buy { signal_index: t })
        } else {
            signal.sell.then_some(PendingOrder::Sell { signal_index: t })
        };
    }

    let last_close = bars[last].close;
    let open_position = portfolio
        .position
        .as_ref()
        .map(|p| OpenPosition::mark(p, last_close));
    let metrics = Metrics::compute(
        portfolio.initial_capital,
        &portfolio.equity_curve,
        &portfolio.closed_trades,
        config.risk_free_rate,
    );

    debug!(
        symbol = series.symbol(),
        strategy = strategy.name(),
        trades = portfolio.trades.len(),
        total_return_pct = metrics.total_return_pct,
        "backtest complete"
    );

    Ok(BacktestResult {
        strategy: strategy.name().to_string(),
        symbol: series.symbol().to_string(),
        params: strategy.params(),
        final_equity: portfolio.final_equity(),
        initial_capital: portfolio.initial_capital,
        trades: portfolio.trades,
        total_return_pct: metrics.total_return_pct,
        win_rate_pct: metrics.win_rate_pct,
        profit_factor: metrics.profit_factor,
        max_drawdown_pct: metrics.max_drawdown_pct,
        equity_curve: portfolio.equity_curve,
        open_position,
        stats: metrics.stats,
        closed_trades: portfolio.closed_trades,
    })
}
