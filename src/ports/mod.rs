//! Port traits the engine uses to reach its collaborators.

pub mod config_port;
pub mod data_port;
pub mod portfolio_port;
pub mod strategy_port;
