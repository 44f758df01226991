//! Parameter sweep optimisation.
//!
//! Sweeps expand to value lists, the cartesian product of the lists is
//! enumerated with the last sweep varying fastest, and every combination is
//! backtested on the worker pool. The combination ceiling is enforced before
//! any backtest runs.
//!
//! Every ranked combination is measured on the same symbol set. Symbols that
//! failed to load are excluded from all combinations and reported once; a
//! combination whose backtest fails on any loaded symbol is an error entry.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::backtest::{run_backtest, BacktestResult};
use super::batch::{build_pool, summarize, BatchConfig, BatchInput, SymbolFailure};
use super::error::GravionError;
use super::ohlcv::Series;
use super::params::ParamValues;
use super::strategy::Strategy;

pub const DEFAULT_MAX_COMBINATIONS: usize = 1000;

/// Slack applied to the upper bound of a range sweep.
const RANGE_EPSILON: f64 = 1e-10;
const ROUND_DECIMALS: f64 = 1e10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SweepValues {
    List(Vec<f64>),
    Range { min: f64, max: f64, step: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub name: String,
    pub values: SweepValues,
}

impl Sweep {
    pub fn list(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: SweepValues::List(values),
        }
    }

    pub fn range(name: impl Into<String>, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            values: SweepValues::Range { min, max, step },
        }
    }

    /// Number of values without materialising them.
    pub fn len(&self) -> Result<usize, GravionError> {
        match &self.values {
            SweepValues::List(values) => Ok(values.len()),
            SweepValues::Range { min, max, step } => {
                if !(min.is_finite() && max.is_finite() && step.is_finite()) {
                    return Err(self.invalid("range bounds must be finite"));
                }
                if *step <= 0.0 {
                    return Err(self.invalid("step must be positive"));
                }
                if max + RANGE_EPSILON < *min {
                    return Ok(0);
                }
                let steps = ((max - min + RANGE_EPSILON) / step).floor();
                Ok(if steps >= usize::MAX as f64 { usize::MAX } else { steps as usize + 1 })
            }
        }
    }

    /// `min + k * step` for every `k` with the value `<= max`, rounded to
    /// ten decimals.
    pub fn expand(&self) -> Result<Vec<f64>, GravionError> {
        let values = match &self.values {
            SweepValues::List(values) => {
                if let Some(v) = values.iter().find(|v| !v.is_finite()) {
                    return Err(self.invalid(&format!("value {v} is not finite")));
                }
                values.clone()
            }
            SweepValues::Range { min, step, .. } => (0..self.len()?)
                .map(|k| ((min + k as f64 * step) * ROUND_DECIMALS).round() / ROUND_DECIMALS)
                .collect(),
        };
        if values.is_empty() {
            return Err(self.invalid("sweep has no values"));
        }
        Ok(values)
    }

    fn invalid(&self, reason: &str) -> GravionError {
        GravionError::invalid_strategy(format!("sweep '{}': {reason}", self.name))
    }
}

impl FromStr for Sweep {
    type Err = GravionError;

    /// `name=min:max:step` or `name=v1,v2,...`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, spec) = s
            .split_once('=')
            .ok_or_else(|| GravionError::invalid_strategy(format!("expected name=values, got '{s}'")))?;
        let name = name.trim();
        let number = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| GravionError::invalid_strategy(format!("sweep '{name}': '{raw}' is not a number")))
        };
        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [min, max, step] => Ok(Sweep::range(name, number(min)?, number(max)?, number(step)?)),
            [list] => {
                let values = list
                    .split(',')
                    .filter(|v| !v.trim().is_empty())
                    .map(number)
                    .collect::<Result<Vec<f64>, _>>()?;
                Ok(Sweep::list(name, values))
            }
            _ => Err(GravionError::invalid_strategy(format!(
                "sweep '{name}': expected min:max:step or a comma list"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    TotalReturnPct,
    WinRatePct,
    ProfitFactor,
    MaxDrawdownPct,
    SharpeRatio,
}

impl Objective {
    pub fn value(self, metrics: &OptimizationMetrics) -> f64 {
        match self {
            Objective::TotalReturnPct => metrics.total_return_pct,
            Objective::WinRatePct => metrics.win_rate_pct,
            Objective::ProfitFactor => metrics.profit_factor,
            Objective::MaxDrawdownPct => metrics.max_drawdown_pct,
            Objective::SharpeRatio => metrics.sharpe_ratio,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Objective::TotalReturnPct => "total_return_pct",
            Objective::WinRatePct => "win_rate_pct",
            Objective::ProfitFactor => "profit_factor",
            Objective::MaxDrawdownPct => "max_drawdown_pct",
            Objective::SharpeRatio => "sharpe_ratio",
        })
    }
}

impl FromStr for Objective {
    type Err = GravionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "total_return_pct" => Ok(Objective::TotalReturnPct),
            "win_rate_pct" => Ok(Objective::WinRatePct),
            "profit_factor" => Ok(Objective::ProfitFactor),
            "max_drawdown_pct" => Ok(Objective::MaxDrawdownPct),
            "sharpe_ratio" => Ok(Objective::SharpeRatio),
            other => Err(GravionError::ConfigInvalid {
                section: "optimizer".into(),
                key: "objective".into(),
                reason: format!("unknown objective '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerConfig {
    pub batch: BatchConfig,
    pub max_combinations: usize,
    pub objective: Objective,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            batch: BatchConfig::default(),
            max_combinations: DEFAULT_MAX_COMBINATIONS,
            objective: Objective::default(),
        }
    }
}

/// Metrics of one combination, aggregated across symbols when more than one
/// series is swept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationMetrics {
    pub total_return_pct: f64,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub total_trades: usize,
    pub symbols: usize,
}

impl OptimizationMetrics {
    fn aggregate(results: &[BacktestResult], capital_per_symbol: f64) -> Self {
        if let [single] = results {
            return OptimizationMetrics {
                total_return_pct: single.total_return_pct,
                win_rate_pct: single.win_rate_pct,
                profit_factor: single.profit_factor,
                max_drawdown_pct: single.max_drawdown_pct,
                sharpe_ratio: single.stats.sharpe_ratio,
                total_trades: single.stats.total_trades,
                symbols: 1,
            };
        }
        let summary = summarize(results, capital_per_symbol);
        let sharpe_ratio = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.stats.sharpe_ratio).sum::<f64>() / results.len() as f64
        };
        OptimizationMetrics {
            total_return_pct: summary.portfolio_return_pct,
            win_rate_pct: summary.avg_win_rate_pct,
            profit_factor: summary.profit_factor,
            max_drawdown_pct: summary.max_drawdown_pct,
            sharpe_ratio,
            total_trades: summary.total_trades,
            symbols: summary.symbols,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub rank: usize,
    pub combination: usize,
    pub params: ParamValues,
    pub metrics: OptimizationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationFailure {
    pub combination: usize,
    pub params: ParamValues,
    pub error: String,
    /// Symbols whose backtest failed under these parameters.
    pub symbol_errors: Vec<SymbolFailure>,
}

/// Why a combination produced no ranked result.
struct Failed {
    error: String,
    symbol_errors: Vec<SymbolFailure>,
}

impl From<GravionError> for Failed {
    fn from(e: GravionError) -> Self {
        Failed {
            error: e.to_string(),
            symbol_errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    pub strategy: String,
    pub objective: Objective,
    pub combinations: usize,
    /// Symbols every combination was measured on.
    pub symbols: Vec<String>,
    pub results: Vec<OptimizationResult>,
    pub errors: Vec<CombinationFailure>,
    /// Symbols that failed to load and were left out of every combination.
    pub data_errors: Vec<SymbolFailure>,
    pub cancelled: bool,
}

/// Product of sweep sizes, saturating on overflow.
pub fn count_combinations(sweeps: &[Sweep]) -> Result<usize, GravionError> {
    sweeps
        .iter()
        .try_fold(1usize, |acc, s| Ok(acc.saturating_mul(s.len()?)))
}

fn check_sweeps(strategy: &Strategy, sweeps: &[Sweep]) -> Result<(), GravionError> {
    let mut seen = BTreeSet::new();
    for sweep in sweeps {
        if !strategy.schema().iter().any(|p| p.name == sweep.name) {
            return Err(GravionError::invalid_strategy(format!(
                "'{}' has no parameter '{}'",
                strategy.name(),
                sweep.name
            )));
        }
        if !seen.insert(sweep.name.as_str()) {
            return Err(GravionError::invalid_strategy(format!(
                "parameter '{}' swept twice",
                sweep.name
            )));
        }
    }
    Ok(())
}

/// Base parameters of `strategy` with each combination of swept values.
pub fn expand_grid(base: &ParamValues, sweeps: &[Sweep]) -> Result<Vec<ParamValues>, GravionError> {
    let mut grid = vec![base.clone()];
    for sweep in sweeps {
        let values = sweep.expand()?;
        grid = grid
            .into_iter()
            .flat_map(|params| {
                values.iter().map(move |&v| {
                    let mut next = params.clone();
                    next.insert(sweep.name.clone(), v);
                    next
                })
            })
            .collect();
    }
    Ok(grid)
}

/// Backtest every combination of `sweeps` over the loaded inputs and rank
/// the results.
pub fn optimize(
    strategy: &Strategy,
    sweeps: &[Sweep],
    inputs: &[BatchInput],
    config: &OptimizerConfig,
    cancel: &AtomicBool,
) -> Result<OptimizationReport, GravionError> {
    check_sweeps(strategy, sweeps)?;
    for sweep in sweeps {
        if sweep.len()? == 0 {
            return Err(sweep.invalid("sweep has no values"));
        }
    }
    let count = count_combinations(sweeps)?;
    if count > config.max_combinations {
        return Err(GravionError::TooManyCombinations {
            count,
            limit: config.max_combinations,
        });
    }
    config.batch.backtest.validate()?;

    let mut series = Vec::with_capacity(inputs.len());
    let mut data_errors = Vec::new();
    for input in inputs {
        match &input.series {
            Ok(s) => series.push(s.clone()),
            Err(e) => {
                warn!(symbol = %input.symbol, error = %e, "symbol excluded from optimization");
                data_errors.push(SymbolFailure::new(&input.symbol, e));
            }
        }
    }
    if series.is_empty() {
        return Err(GravionError::data_source("no symbol could be loaded"));
    }

    let grid = expand_grid(&strategy.params(), sweeps)?;
    let pool = build_pool(config.batch.workers)?;
    info!(
        strategy = strategy.name(),
        combinations = grid.len(),
        symbols = series.len(),
        objective = %config.objective,
        "optimization started"
    );

    let outcomes: Vec<Result<OptimizationMetrics, Failed>> = pool.install(|| {
        grid.par_iter()
            .map(|params| run_combination(strategy, params, &series, config, cancel))
            .collect()
    });

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for (combination, (params, outcome)) in grid.into_iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(metrics) => results.push(OptimizationResult {
                rank: 0,
                combination,
                params,
                metrics,
            }),
            Err(failed) => {
                debug!(combination, error = %failed.error, "combination failed");
                errors.push(CombinationFailure {
                    combination,
                    params,
                    error: failed.error,
                    symbol_errors: failed.symbol_errors,
                });
            }
        }
    }

    rank(&mut results, config.objective);
    let cancelled = cancel.load(Ordering::Relaxed);
    info!(ranked = results.len(), failed = errors.len(), cancelled, "optimization finished");

    Ok(OptimizationReport {
        strategy: strategy.name().to_string(),
        objective: config.objective,
        combinations: count,
        symbols: series.iter().map(|s| s.symbol().to_string()).collect(),
        results,
        errors,
        data_errors,
        cancelled,
    })
}

fn run_combination(
    strategy: &Strategy,
    params: &ParamValues,
    series: &[Series],
    config: &OptimizerConfig,
    cancel: &AtomicBool,
) -> Result<OptimizationMetrics, Failed> {
    if cancel.load(Ordering::Relaxed) {
        return Err(GravionError::Cancelled.into());
    }
    let candidate = strategy.with_params(params)?;
    let mut results = Vec::with_capacity(series.len());
    let mut symbol_errors = Vec::new();
    for s in series {
        match run_backtest(s, &candidate, &config.batch.backtest) {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(symbol = s.symbol(), error = %e, "optimization run failed");
                symbol_errors.push(SymbolFailure::new(s.symbol(), &e));
            }
        }
    }
    if !symbol_errors.is_empty() {
        return Err(Failed {
            error: format!("failed on {} of {} symbols", symbol_errors.len(), series.len()),
            symbol_errors,
        });
    }
    Ok(OptimizationMetrics::aggregate(&results, config.batch.backtest.capital_per_symbol))
}

/// Sort by objective descending, then shallower drawdown, then combination
/// index; assign ranks from 1.
pub fn rank(results: &mut [OptimizationResult], objective: Objective) {
    results.sort_by(|a, b| {
        objective
            .value(&b.metrics)
            .total_cmp(&objective.value(&a.metrics))
            .then_with(|| a.metrics.max_drawdown_pct.abs().total_cmp(&b.metrics.max_drawdown_pct.abs()))
            .then_with(|| a.combination.cmp(&b.combination))
    });
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
}
