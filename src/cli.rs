//! CLI definition and dispatch.
//!
//! This is the only place that wires adapters to the engine. Results go to
//! stdout (text or `--json`); progress and diagnostics go through `tracing`
//! to stderr.

use chrono::Local;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_strategy_store::{self, JsonStrategyStore};
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::batch::{self, BatchConfig, BatchReport};
use crate::domain::config_validation::validate_config;
use crate::domain::error::GravionError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::filter::{builtin_filters, parse_filters, Filter, FilterDefinition};
use crate::domain::indicator::FrameSpec;
use crate::domain::ohlcv::Window;
use crate::domain::optimizer::{self, Objective, OptimizationReport, OptimizerConfig, Sweep};
use crate::domain::params::parse_assignments;
use crate::domain::screen::{self, ScreenConfig, ScreenReport};
use crate::domain::strategy::{BuiltinKind, Strategy};
use crate::domain::universe::{load_screen_inputs, load_series, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::portfolio_port::PortfolioPort;
use crate::ports::strategy_port::{StrategyInfo, StrategyPort};

const DEFAULT_CSV_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "gravion", about = "Stock screening, backtesting and parameter optimization")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the symbols of a run come from.
#[derive(Args, Debug, Default)]
pub struct UniverseArgs {
    /// Comma separated symbols
    #[arg(long, conflicts_with = "portfolio")]
    pub symbols: Option<String>,

    /// Named portfolio from the [portfolios] config section
    #[arg(long)]
    pub portfolio: Option<String>,

    /// History window, e.g. 6mo or 2024-01-01:2024-06-30
    #[arg(long)]
    pub window: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one strategy on one symbol
    Backtest {
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        strategy: String,
        /// Parameter override, name=value
        #[arg(short, long = "param")]
        params: Vec<String>,
        #[arg(long)]
        window: Option<String>,
    },
    /// Backtest strategies across a universe
    Batch {
        #[command(flatten)]
        universe: UniverseArgs,
        #[arg(short, long = "strategy", required = true)]
        strategies: Vec<String>,
    },
    /// Sweep strategy parameters and rank the combinations
    Optimize {
        #[command(flatten)]
        universe: UniverseArgs,
        #[arg(short, long)]
        strategy: String,
        /// name=min:max:step or name=v1,v2,...
        #[arg(long = "sweep", required = true)]
        sweeps: Vec<String>,
        /// Fixed parameter, name=value
        #[arg(short, long = "param")]
        params: Vec<String>,
        #[arg(long)]
        objective: Option<String>,
        /// Show only the best N combinations
        #[arg(long)]
        top: Option<usize>,
    },
    /// Classify and score a universe at its latest bar
    Screen {
        #[command(flatten)]
        universe: UniverseArgs,
        /// JSON file with extra filter definitions
        #[arg(long)]
        filters: Option<PathBuf>,
        /// Evaluate only these filters (default: all)
        #[arg(long = "filter")]
        filter_names: Vec<String>,
        /// Strategy whose intensity is reported per symbol
        #[arg(long)]
        signal: Option<String>,
    },
    /// List available strategies and their parameters
    Strategies,
    /// Validate configuration and optional strategy or filter files
    Validate {
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        #[arg(long)]
        filters: Option<PathBuf>,
    },
}

/// Engine settings resolved from the configuration file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub batch: BatchConfig,
    pub optimizer: OptimizerConfig,
    pub screen: ScreenConfig,
    pub window: Window,
    pub csv_dir: PathBuf,
    pub strategies_dir: Option<PathBuf>,
}

pub fn run(cli: Cli) -> ExitCode {
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn dispatch(cli: Cli) -> Result<(), GravionError> {
    let config = load_config(cli.config.as_deref())?;
    if let Command::Validate { strategy, filters } = &cli.command {
        return run_validate(&config, strategy.as_deref(), filters.as_deref());
    }
    let settings = build_settings(&config)?;
    let json = cli.json;

    match cli.command {
        Command::Backtest {
            symbol,
            strategy,
            params,
            window,
        } => run_backtest(&settings, &symbol, &strategy, &params, window.as_deref(), json),
        Command::Batch {
            universe,
            strategies,
        } => run_batch(&config, &settings, &universe, &strategies, json),
        Command::Optimize {
            universe,
            strategy,
            sweeps,
            params,
            objective,
            top,
        } => run_optimize(
            &config,
            &settings,
            &universe,
            &strategy,
            &sweeps,
            &params,
            objective.as_deref(),
            top,
            json,
        ),
        Command::Screen {
            universe,
            filters,
            filter_names,
            signal,
        } => run_screen(
            &config,
            &settings,
            &universe,
            filters.as_deref(),
            &filter_names,
            signal.as_deref(),
            json,
        ),
        Command::Strategies => run_strategies(&settings, json),
        Command::Validate { .. } => Ok(()),
    }
}

/// Read the INI file, or an empty configuration when none is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, GravionError> {
    match path {
        Some(path) => FileConfigAdapter::from_file(path).map_err(|e| GravionError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        }),
        None => FileConfigAdapter::from_string("").map_err(|reason| GravionError::ConfigParse {
            file: "<empty>".into(),
            reason,
        }),
    }
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<Settings, GravionError> {
    validate_config(config)?;
    let batch = build_batch_config(config);
    Ok(Settings {
        optimizer: build_optimizer_config(config, batch.clone())?,
        batch,
        screen: build_screen_config(config),
        window: match config.get_string("data", "window") {
            Some(raw) => raw.trim().parse()?,
            None => Window::default(),
        },
        csv_dir: config
            .get_string("data", "csv_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_DIR)),
        strategies_dir: config.get_string("data", "strategies_dir").map(PathBuf::from),
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> BacktestConfig {
    let defaults = BacktestConfig::default();
    BacktestConfig {
        capital_per_symbol: config.get_double("engine", "capital_per_symbol", defaults.capital_per_symbol),
        execution: ExecutionConfig {
            commission_per_share: config.get_double("engine", "commission_per_share", 0.0),
            platform_fee_per_share: config.get_double("engine", "platform_fee_per_share", 0.0),
            slippage_pct: config.get_double("engine", "slippage_pct", 0.0),
        },
        risk_free_rate: config.get_double("engine", "risk_free_rate", defaults.risk_free_rate),
    }
}

pub fn build_batch_config(config: &dyn ConfigPort) -> BatchConfig {
    BatchConfig {
        backtest: build_backtest_config(config),
        workers: config.get_int("engine", "workers", 0).max(0) as usize,
    }
}

pub fn build_optimizer_config(config: &dyn ConfigPort, batch: BatchConfig) -> Result<OptimizerConfig, GravionError> {
    let defaults = OptimizerConfig::default();
    let objective = match config.get_string("optimizer", "objective") {
        Some(raw) => raw.parse()?,
        None => defaults.objective,
    };
    let max_combinations = config.get_int("optimizer", "max_combinations", defaults.max_combinations as i64);
    Ok(OptimizerConfig {
        batch,
        max_combinations: max_combinations.max(1) as usize,
        objective,
    })
}

pub fn build_screen_config(config: &dyn ConfigPort) -> ScreenConfig {
    let defaults = ScreenConfig::default();
    let frame = FrameSpec {
        sma_fast: config.get_int("screen", "sma_fast", defaults.frame.sma_fast as i64).max(1) as usize,
        sma_slow: config.get_int("screen", "sma_slow", defaults.frame.sma_slow as i64).max(1) as usize,
        ..defaults.frame
    };
    ScreenConfig {
        frame,
        min_history_bars: config
            .get_int("screen", "min_history_bars", defaults.min_history_bars as i64)
            .max(1) as usize,
        stale_after_hours: config.get_int("screen", "stale_after_hours", defaults.stale_after_hours),
        workers: config.get_int("engine", "workers", 0).max(0) as usize,
    }
}

fn open_store(settings: &Settings) -> Result<JsonStrategyStore, GravionError> {
    match &settings.strategies_dir {
        Some(dir) => JsonStrategyStore::open(dir),
        None => JsonStrategyStore::builtin_only(),
    }
}

fn resolve_window(settings: &Settings, raw: Option<&str>) -> Result<Window, GravionError> {
    match raw {
        Some(raw) => raw.parse(),
        None => Ok(settings.window),
    }
}

/// Symbols from `--symbols`, a named portfolio, or everything the data
/// source holds.
fn resolve_symbols(
    universe: &UniverseArgs,
    portfolios: &dyn PortfolioPort,
    data: &dyn DataPort,
) -> Result<Vec<String>, GravionError> {
    if let Some(raw) = &universe.symbols {
        return parse_symbols(raw).map_err(|e| GravionError::ConfigInvalid {
            section: "cli".into(),
            key: "symbols".into(),
            reason: e.to_string(),
        });
    }
    if let Some(name) = &universe.portfolio {
        return portfolios.symbols(name);
    }
    let symbols = data.list_symbols()?;
    if symbols.is_empty() {
        return Err(GravionError::data_source("no symbols available"));
    }
    Ok(symbols)
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<(), GravionError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn run_backtest(
    settings: &Settings,
    symbol: &str,
    strategy_name: &str,
    params: &[String],
    window: Option<&str>,
    json: bool,
) -> Result<(), GravionError> {
    let store = open_store(settings)?;
    let strategy = store.get(strategy_name)?.with_params(&parse_assignments(params)?)?;
    let window = resolve_window(settings, window)?;
    let data = CsvAdapter::new(settings.csv_dir.clone());

    let symbol = symbol.trim().to_uppercase();
    let series = data.fetch_series(&symbol, &window)?;
    info!(symbol = %symbol, strategy = strategy.name(), bars = series.len(), "running backtest");
    let result = backtest_engine::run_backtest(&series, &strategy, &settings.batch.backtest)?;
    emit(json, &result, print_backtest)
}

fn run_batch(
    config: &FileConfigAdapter,
    settings: &Settings,
    universe: &UniverseArgs,
    strategy_names: &[String],
    json: bool,
) -> Result<(), GravionError> {
    let store = open_store(settings)?;
    let strategies = strategy_names
        .iter()
        .map(|name| store.get(name))
        .collect::<Result<Vec<Strategy>, _>>()?;
    let data = CsvAdapter::new(settings.csv_dir.clone());
    let symbols = resolve_symbols(universe, config, &data)?;
    let window = resolve_window(settings, universe.window.as_deref())?;

    let inputs = load_series(&data, &symbols, &window);
    let cancel = AtomicBool::new(false);
    let report = batch::run_batch(&inputs, &strategies, &settings.batch, &cancel)?;
    emit(json, &report, print_batch)
}

#[allow(clippy::too_many_arguments)]
fn run_optimize(
    config: &FileConfigAdapter,
    settings: &Settings,
    universe: &UniverseArgs,
    strategy_name: &str,
    sweeps: &[String],
    params: &[String],
    objective: Option<&str>,
    top: Option<usize>,
    json: bool,
) -> Result<(), GravionError> {
    let store = open_store(settings)?;
    let strategy = store.get(strategy_name)?.with_params(&parse_assignments(params)?)?;
    let sweeps = sweeps
        .iter()
        .map(|raw| raw.parse::<Sweep>())
        .collect::<Result<Vec<_>, _>>()?;
    let mut optimizer_config = settings.optimizer.clone();
    if let Some(raw) = objective {
        optimizer_config.objective = raw.parse::<Objective>()?;
    }

    let data = CsvAdapter::new(settings.csv_dir.clone());
    let symbols = resolve_symbols(universe, config, &data)?;
    let window = resolve_window(settings, universe.window.as_deref())?;
    let inputs = load_series(&data, &symbols, &window);

    let cancel = AtomicBool::new(false);
    let mut report = optimizer::optimize(&strategy, &sweeps, &inputs, &optimizer_config, &cancel)?;
    if let Some(n) = top {
        report.results.truncate(n);
    }
    emit(json, &report, print_optimization)
}

fn run_screen(
    config: &FileConfigAdapter,
    settings: &Settings,
    universe: &UniverseArgs,
    filters_path: Option<&Path>,
    filter_names: &[String],
    signal: Option<&str>,
    json: bool,
) -> Result<(), GravionError> {
    let store = open_store(settings)?;
    let signal_strategy = match signal {
        Some(name) => store.get(name)?,
        None => Strategy::builtin(BuiltinKind::PriceChangeMomentum)?,
    };
    let filters = select_filters(load_filter_definitions(filters_path)?, filter_names)?;

    let data = CsvAdapter::new(settings.csv_dir.clone());
    let symbols = resolve_symbols(universe, config, &data)?;
    let window = resolve_window(settings, universe.window.as_deref())?;
    let (inputs, failures) = load_screen_inputs(&data, &symbols, &window);

    let now = Local::now().naive_local();
    let mut report = screen::screen_universe(&inputs, &settings.screen, &filters, &signal_strategy, now)?;
    report.errors.extend(failures);
    emit(json, &report, print_screen)
}

fn run_strategies(settings: &Settings, json: bool) -> Result<(), GravionError> {
    let listing = open_store(settings)?.list()?;
    emit(json, &listing, |listing| print_strategies(listing))
}

fn run_validate(
    config: &FileConfigAdapter,
    strategy_path: Option<&Path>,
    filters_path: Option<&Path>,
) -> Result<(), GravionError> {
    validate_config(config)?;
    eprintln!("Config validated successfully");

    if let Some(path) = strategy_path {
        let strategy = json_strategy_store::load_file(path)?;
        eprintln!("\nStrategy: {}", strategy.name());
        for condition in strategy.buy_conditions() {
            eprintln!("  buy:  {condition}");
        }
        for condition in strategy.sell_conditions() {
            eprintln!("  sell: {condition}");
        }
        let mut indicators: Vec<String> = strategy
            .required_indicators()
            .iter()
            .map(|i| i.to_string())
            .collect();
        indicators.sort();
        eprintln!("  indicators: {}", indicators.join(", "));
    }

    if let Some(path) = filters_path {
        let definitions = parse_filters(&fs::read_to_string(path)?)?;
        for definition in definitions {
            let filter = Filter::new(definition)?;
            eprintln!("Filter ok: {}", filter.name());
        }
    }
    Ok(())
}

fn load_filter_definitions(path: Option<&Path>) -> Result<Vec<FilterDefinition>, GravionError> {
    let mut definitions = builtin_filters();
    if let Some(path) = path {
        definitions.extend(parse_filters(&fs::read_to_string(path)?)?);
    }
    Ok(definitions)
}

/// Compile the requested filters; all of them when none are named.
fn select_filters(definitions: Vec<FilterDefinition>, names: &[String]) -> Result<Vec<Filter>, GravionError> {
    if names.is_empty() {
        return definitions.into_iter().map(Filter::new).collect();
    }
    names
        .iter()
        .map(|name| {
            let definition = definitions
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(name.trim()))
                .cloned()
                .ok_or_else(|| GravionError::invalid_strategy(format!("unknown filter '{name}'")))?;
            Filter::new(definition)
        })
        .collect()
}

fn print_backtest(result: &BacktestResult) {
    println!("=== {} on {} ===", result.strategy, result.symbol);
    if !result.params.is_empty() {
        let params: Vec<String> = result.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("Params:           {}", params.join(" "));
    }
    println!("Total Return:     {:.2}%", result.total_return_pct);
    println!("Annualized:       {:.2}%", result.stats.annualized_return_pct);
    println!("Sharpe Ratio:     {:.2}", result.stats.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", result.stats.sortino_ratio);
    println!("Max Drawdown:     {:.2}%", result.max_drawdown_pct);
    println!("Closed Trades:    {}", result.stats.total_trades);
    println!("Win Rate:         {:.1}%", result.win_rate_pct);
    println!("Profit Factor:    {:.2}", result.profit_factor);
    println!("Final Equity:     {:.2}", result.final_equity);
    if let Some(open) = &result.open_position {
        println!(
            "Open Position:    {} shares @ {:.2} since {} (unrealized {:+.2})",
            open.shares, open.entry_price, open.entry_date, open.unrealized_pnl
        );
    }
}

fn print_batch(report: &BatchReport) {
    for strategy in &report.strategies {
        let s = &strategy.summary;
        println!("=== {} ===", strategy.strategy);
        println!(
            "Portfolio: {} symbols, return {:.2}%, max drawdown {:.2}%, profit factor {:.2}",
            s.symbols, s.portfolio_return_pct, s.max_drawdown_pct, s.profit_factor
        );
        println!(
            "Trades:    {} ({} won, {} lost), avg win rate {:.1}%, {} open",
            s.total_trades, s.winning_trades, s.losing_trades, s.avg_win_rate_pct, s.open_positions
        );
        if let (Some(best), Some(worst)) = (&s.best_symbol, &s.worst_symbol) {
            println!(
                "Best:      {best} {:+.2}%   Worst: {worst} {:+.2}%",
                s.best_return_pct.unwrap_or_default(),
                s.worst_return_pct.unwrap_or_default()
            );
        }
        for result in &strategy.results {
            println!(
                "  {:<8} {:>8.2}%  {:>3} trades  win {:>5.1}%",
                result.symbol, result.total_return_pct, result.stats.total_trades, result.win_rate_pct
            );
        }
        for failure in &strategy.errors {
            println!("  {:<8} error: {}", failure.symbol, failure.error);
        }
    }
    if report.cancelled {
        warn!("batch was cancelled before completion");
    }
}

fn print_optimization(report: &OptimizationReport) {
    println!(
        "=== {} : {} combinations ranked by {} ===",
        report.strategy, report.combinations, report.objective
    );
    for result in &report.results {
        let params: Vec<String> = result.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let m = &result.metrics;
        println!(
            "#{:<3} {:<40} return {:>8.2}%  win {:>5.1}%  pf {:>6.2}  dd {:>7.2}%  sharpe {:>5.2}",
            result.rank,
            params.join(" "),
            m.total_return_pct,
            m.win_rate_pct,
            m.profit_factor,
            m.max_drawdown_pct,
            m.sharpe_ratio
        );
    }
    for failure in &report.errors {
        println!("combination {} failed: {}", failure.combination, failure.error);
        for symbol in &failure.symbol_errors {
            println!("  {}: {}", symbol.symbol, symbol.error);
        }
    }
    for failure in &report.data_errors {
        println!("{} not loaded: {}", failure.symbol, failure.error);
    }
}

fn print_screen(report: &ScreenReport) {
    for row in &report.rows {
        let status = serde_json::to_value(row.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        match (&row.score, row.state, row.close) {
            (Some(score), Some(state), Some(close)) => println!(
                "{:<8} {:>10.2} {:>+7.2}%  {:<16} {:>3} {:<14} {:<12} {} {}",
                row.symbol,
                close,
                row.change_pct.unwrap_or_default(),
                state.to_string(),
                score.total,
                score.rating.to_string(),
                row.signal.map(|s| s.to_string()).unwrap_or_default(),
                row.matched_filters.join(", "),
                if status == "OK" { String::new() } else { format!("[{status}]") },
            ),
            _ => println!("{:<8} {status}", row.symbol),
        }
        if let Some(error) = &row.fundamentals_error {
            println!("{:<8} fundamentals unavailable: {error}", "");
        }
    }
    for failure in &report.errors {
        println!("{:<8} error: {}", failure.symbol, failure.error);
    }
}

fn print_strategies(listing: &[StrategyInfo]) {
    for info in listing {
        let kind = if info.builtin { "built-in" } else { "custom" };
        println!("{} ({kind})", info.name);
        if !info.description.is_empty() {
            println!("  {}", info.description);
        }
        for spec in &info.schema {
            println!(
                "  {:<18} {:<22} default {:<8} range [{}, {}] step {}",
                spec.name, spec.label, spec.default, spec.min, spec.max, spec.step
            );
        }
    }
}
