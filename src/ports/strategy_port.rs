//! Strategy store port.

use serde::Serialize;

use crate::domain::error::GravionError;
use crate::domain::params::{ParamSpec, ParamValues};
use crate::domain::strategy::Strategy;

/// Listing entry for one stored strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub schema: Vec<ParamSpec>,
    pub params: ParamValues,
}

impl StrategyInfo {
    pub fn from_strategy(strategy: &Strategy) -> Self {
        StrategyInfo {
            name: strategy.name().to_string(),
            description: strategy.description().to_string(),
            builtin: strategy.is_builtin(),
            schema: strategy.schema().to_vec(),
            params: strategy.params(),
        }
    }
}

pub trait StrategyPort {
    /// Strategy with default parameters; unknown names are
    /// [`GravionError::InvalidStrategy`].
    fn get(&self, name: &str) -> Result<Strategy, GravionError>;

    fn list(&self) -> Result<Vec<StrategyInfo>, GravionError>;
}
