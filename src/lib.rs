//! gravion: stock screening, strategy backtesting and parameter optimization.
//!
//! Hexagonal architecture: engine logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command dispatch in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
