//! Engine logic. Nothing in here performs I/O.

pub mod ohlcv;
pub mod fundamentals;
pub mod indicator;
pub mod rule;
pub mod rule_eval;
pub mod params;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod metrics;
pub mod backtest;
pub mod classifier;
pub mod filter;
pub mod screen;
pub mod batch;
pub mod optimizer;
pub mod universe;
pub mod config_validation;
pub mod error;
