//! Batch runner: every (symbol x strategy) backtest on a bounded worker pool,
//! aggregated into one portfolio summary per strategy.
//!
//! Units are independent. A failing unit is recorded against its strategy and
//! never aborts the batch. Results are returned in input order regardless of
//! completion order.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use super::backtest::{run_backtest, BacktestConfig, BacktestResult};
use super::error::GravionError;
use super::metrics::{max_drawdown_pct, profit_factor};
use super::ohlcv::Series;
use super::params::ParamValues;
use super::portfolio::EquityPoint;
use super::position::ClosedTrade;
use super::strategy::Strategy;

/// Data collaborator outcome for one symbol.
#[derive(Debug)]
pub struct BatchInput {
    pub symbol: String,
    pub series: Result<Series, GravionError>,
}

impl BatchInput {
    pub fn ok(series: Series) -> Self {
        Self {
            symbol: series.symbol().to_string(),
            series: Ok(series),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchConfig {
    pub backtest: BacktestConfig,
    /// Worker threads; 0 lets rayon choose.
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            backtest: BacktestConfig::default(),
            workers: 0,
        }
    }
}

/// A unit that produced no result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
    pub cancelled: bool,
}

impl SymbolFailure {
    pub fn new(symbol: &str, err: &GravionError) -> Self {
        Self {
            symbol: symbol.to_string(),
            error: err.to_string(),
            cancelled: matches!(err, GravionError::Cancelled),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    /// Symbols that produced a result.
    pub symbols: usize,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub portfolio_return_pct: f64,
    pub avg_win_rate_pct: f64,
    pub best_symbol: Option<String>,
    pub best_return_pct: Option<f64>,
    pub worst_symbol: Option<String>,
    pub worst_return_pct: Option<f64>,
    pub max_drawdown_pct: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub open_positions: usize,
    /// Equity after each closed trade, ordered by exit date then symbol.
    pub equity_curve: Vec<EquityPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyReport {
    pub strategy: String,
    pub params: ParamValues,
    pub results: Vec<BacktestResult>,
    pub errors: Vec<SymbolFailure>,
    pub summary: PortfolioSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub strategies: Vec<StrategyReport>,
    pub cancelled: bool,
}

pub(crate) fn build_pool(workers: usize) -> Result<rayon::ThreadPool, GravionError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| GravionError::ConfigInvalid {
            section: "engine".into(),
            key: "workers".into(),
            reason: e.to_string(),
        })
}

/// Run every strategy over every input.
pub fn run_batch(
    inputs: &[BatchInput],
    strategies: &[Strategy],
    config: &BatchConfig,
    cancel: &AtomicBool,
) -> Result<BatchReport, GravionError> {
    config.backtest.validate()?;
    let pool = build_pool(config.workers)?;
    let units: Vec<(usize, &BatchInput)> = (0..strategies.len())
        .flat_map(|s| inputs.iter().map(move |input| (s, input)))
        .collect();

    info!(
        symbols = inputs.len(),
        strategies = strategies.len(),
        units = units.len(),
        workers = pool.current_num_threads(),
        "batch started"
    );

    let outcomes: Vec<Result<BacktestResult, SymbolFailure>> = pool.install(|| {
        units
            .par_iter()
            .map(|&(s, input)| run_unit(input, &strategies[s], &config.backtest, cancel))
            .collect()
    });

    let mut outcomes = outcomes.into_iter();
    let mut reports = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let mut results = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes.by_ref().take(inputs.len()) {
            match outcome {
                Ok(result) => results.push(result),
                Err(failure) => errors.push(failure),
            }
        }
        let summary = summarize(&results, config.backtest.capital_per_symbol);
        reports.push(StrategyReport {
            strategy: strategy.name().to_string(),
            params: strategy.params(),
            results,
            errors,
            summary,
        });
    }

    let cancelled = cancel.load(Ordering::Relaxed);
    info!(cancelled, "batch finished");
    Ok(BatchReport {
        strategies: reports,
        cancelled,
    })
}

fn run_unit(
    input: &BatchInput,
    strategy: &Strategy,
    config: &BacktestConfig,
    cancel: &AtomicBool,
) -> Result<BacktestResult, SymbolFailure> {
    if cancel.load(Ordering::Relaxed) {
        return Err(SymbolFailure::new(&input.symbol, &GravionError::Cancelled));
    }
    let series = input
        .series
        .as_ref()
        .map_err(|e| SymbolFailure::new(&input.symbol, e))?;
    run_backtest(series, strategy, config).map_err(|e| {
        warn!(symbol = %input.symbol, strategy = strategy.name(), error = %e, "backtest failed");
        SymbolFailure::new(&input.symbol, &e)
    })
}

/// Aggregate per-symbol results that each started with `capital_per_symbol`.
pub fn summarize(results: &[BacktestResult], capital_per_symbol: f64) -> PortfolioSummary {
    let n = results.len();
    let initial_capital = capital_per_symbol * n as f64;
    let final_equity: f64 = results.iter().map(|r| r.final_equity).sum();
    let portfolio_return_pct = if initial_capital > 0.0 {
        (final_equity - initial_capital) / initial_capital * 100.0
    } else {
        0.0
    };
    let avg_win_rate_pct = if n > 0 {
        results.iter().map(|r| r.win_rate_pct).sum::<f64>() / n as f64
    } else {
        0.0
    };

    let mut best: Option<&BacktestResult> = None;
    let mut worst: Option<&BacktestResult> = None;
    for r in results {
        if best.is_none_or(|b| r.total_return_pct > b.total_return_pct) {
            best = Some(r);
        }
        if worst.is_none_or(|w| r.total_return_pct < w.total_return_pct) {
            worst = Some(r);
        }
    }

    let mut closed: Vec<&ClosedTrade> = results.iter().flat_map(|r| r.closed_trades.iter()).collect();
    closed.sort_by(|a, b| (a.exit_date, &a.symbol).cmp(&(b.exit_date, &b.symbol)));

    let mut equity = initial_capital;
    let equity_curve: Vec<EquityPoint> = closed
        .iter()
        .map(|t| {
            equity += t.pnl;
            EquityPoint {
                date: t.exit_date,
                equity,
            }
        })
        .collect();
    let pnls: Vec<f64> = closed.iter().map(|t| t.pnl).collect();

    PortfolioSummary {
        symbols: n,
        initial_capital,
        final_equity,
        portfolio_return_pct,
        avg_win_rate_pct,
        best_symbol: best.map(|r| r.symbol.clone()),
        best_return_pct: best.map(|r| r.total_return_pct),
        worst_symbol: worst.map(|r| r.symbol.clone()),
        worst_return_pct: worst.map(|r| r.total_return_pct),
        max_drawdown_pct: max_drawdown_pct(initial_capital, &equity_curve),
        profit_factor: profit_factor(&pnls),
        total_trades: pnls.len(),
        winning_trades: pnls.iter().filter(|&&p| p > 0.0).count(),
        losing_trades: pnls.iter().filter(|&&p| p < 0.0).count(),
        open_positions: results.iter().filter(|r| r.open_position.is_some()).count(),
        equity_curve,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Bar;
    use crate::domain::strategy::DeclarativeStrategy;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn series(symbol: &str, closes: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000,
            })
            .collect();
        Series::new(symbol, bars).unwrap()
    }

    fn threshold(name: &str, buy_below: f64, sell_above: f64) -> Strategy {
        let json = format!(
            r#"{{"name": "{name}",
                "buy_conditions": [{{"indicator": "Price", "comparator": "<", "value": {buy_below}}}],
                "sell_conditions": [{{"indicator": "Price", "comparator": ">", "value": {sell_above}}}]}}"#
        );
        Strategy::Declarative(DeclarativeStrategy::from_json(&json).unwrap())
    }

    fn inputs() -> Vec<BatchInput> {
        vec![
            // +20% round trip
            BatchInput::ok(series("AAA", &[9.0, 10.0, 13.0, 12.0, 12.0])),
            // -10% round trip
            BatchInput::ok(series("BBB", &[9.0, 10.0, 13.0, 9.0, 9.0])),
            BatchInput {
                symbol: "ERR".into(),
                series: Err(GravionError::data_source("no file")),
            },
        ]
    }

    #[test]
    fn collects_results_and_errors_per_strategy() {
        let strategies = vec![threshold("t1", 9.5, 12.5), threshold("t2", 1.0, 100.0)];
        let report = run_batch(&inputs(), &strategies, &BatchConfig::default(), &AtomicBool::new(false)).unwrap();

        assert_eq!(report.strategies.len(), 2);
        assert!(!report.cancelled);
        let first = &report.strategies[0];
        assert_eq!(first.strategy, "t1");
        assert_eq!(
            first.results.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>(),
            vec!["AAA", "BBB"]
        );
        assert_eq!(first.errors.len(), 1);
        assert_eq!(first.errors[0].symbol, "ERR");
        assert!(!first.errors[0].cancelled);
        assert_eq!(report.strategies[1].summary.total_trades, 0);
    }

    #[test]
    fn portfolio_return_over_successful_symbols() {
        let strategies = vec![threshold("t1", 9.5, 12.5)];
        let report = run_batch(&inputs(), &strategies, &BatchConfig::default(), &AtomicBool::new(false)).unwrap();
        let summary = &report.strategies[0].summary;

        // AAA sells at 12, BBB at 9; both bought 1000 shares at 10
        assert_eq!(summary.symbols, 2);
        assert_relative_eq!(summary.initial_capital, 20_000.0);
        assert_relative_eq!(summary.final_equity, 12_000.0 + 9_000.0, epsilon = 1e-9);
        assert_relative_eq!(summary.portfolio_return_pct, 5.0, epsilon = 1e-9);
        assert_eq!(summary.best_symbol.as_deref(), Some("AAA"));
        assert_eq!(summary.worst_symbol.as_deref(), Some("BBB"));
        assert_relative_eq!(summary.avg_win_rate_pct, 50.0);
        assert_relative_eq!(summary.profit_factor, 2.0, epsilon = 1e-9);
        assert_eq!(summary.winning_trades, 1);
        assert_eq!(summary.losing_trades, 1);
    }

    #[test]
    fn merged_curve_orders_ties_by_symbol() {
        let strategies = vec![threshold("t1", 9.5, 12.5)];
        let report = run_batch(&inputs(), &strategies, &BatchConfig::default(), &AtomicBool::new(false)).unwrap();
        let summary = &report.strategies[0].summary;

        // both exit on the same day: AAA (+2000) before BBB (-1000)
        let equity: Vec<f64> = summary.equity_curve.iter().map(|p| p.equity).collect();
        assert_eq!(equity, vec![22_000.0, 21_000.0]);
        assert_relative_eq!(summary.max_drawdown_pct, -1_000.0 / 22_000.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn ties_pick_first_symbol() {
        let flat = vec![
            BatchInput::ok(series("FIRST", &[10.0, 10.0])),
            BatchInput::ok(series("SECOND", &[10.0, 10.0])),
        ];
        let report = run_batch(
            &flat,
            &[threshold("t", 1.0, 100.0)],
            &BatchConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();
        let summary = &report.strategies[0].summary;
        assert_eq!(summary.best_symbol.as_deref(), Some("FIRST"));
        assert_eq!(summary.worst_symbol.as_deref(), Some("FIRST"));
    }

    #[test]
    fn cancelled_batch_reports_every_unit() {
        let strategies = vec![threshold("t1", 9.5, 12.5)];
        let report = run_batch(&inputs(), &strategies, &BatchConfig::default(), &AtomicBool::new(true)).unwrap();
        assert!(report.cancelled);
        let errors = &report.strategies[0].errors;
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.cancelled));
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = summarize(&[], 10_000.0);
        assert_eq!(summary.symbols, 0);
        assert_eq!(summary.portfolio_return_pct, 0.0);
        assert_eq!(summary.max_drawdown_pct, 0.0);
        assert!(summary.best_symbol.is_none());
    }

    #[test]
    fn worker_count_is_respected() {
        let config = BatchConfig {
            workers: 2,
            ..BatchConfig::default()
        };
        let strategies = vec![threshold("t1", 9.5, 12.5)];
        let report = run_batch(&inputs(), &strategies, &config, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.strategies[0].results.len(), 2);
    }
}
