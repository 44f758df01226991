//! Named screening filters.
//!
//! A filter is a list of conditions in the same JSON form as declarative
//! strategies, combined with `all` (AND) or `any` (OR). A filter with no
//! conditions matches every symbol.

use serde::{Deserialize, Serialize};

use crate::domain::error::GravionError;
use crate::domain::indicator::{IndicatorFrame, IndicatorType};
use crate::domain::rule::{
    compile_all, extract_indicators, Comparator, Condition, ConditionSpec, IndicatorName, OperandSpec, TargetSpec,
};
use crate::domain::rule_eval::{evaluate_all, evaluate_any};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mode: FilterMode,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub builtin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    definition: FilterDefinition,
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new(definition: FilterDefinition) -> Result<Self, GravionError> {
        if definition.name.trim().is_empty() {
            return Err(GravionError::invalid_strategy("filter name is empty"));
        }
        let conditions = compile_all(&definition.conditions)?;
        Ok(Self {
            definition,
            conditions,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &FilterDefinition {
        &self.definition
    }

    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        extract_indicators(&self.conditions)
    }

    pub fn matches(&self, frame: &IndicatorFrame<'_>, index: usize) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.definition.mode {
            FilterMode::All => evaluate_all(&self.conditions, frame, index),
            FilterMode::Any => evaluate_any(&self.conditions, frame, index),
        }
    }
}

/// Parse a JSON array of filter definitions.
pub fn parse_filters(json: &str) -> Result<Vec<FilterDefinition>, GravionError> {
    serde_json::from_str(json).map_err(|e| GravionError::invalid_strategy(format!("malformed filter JSON: {e}")))
}

fn sma(period: usize) -> OperandSpec {
    OperandSpec {
        indicator: IndicatorName::Sma,
        period,
    }
}

fn against(left: OperandSpec, comparator: Comparator, value: TargetSpec) -> ConditionSpec {
    ConditionSpec {
        indicator: left.indicator,
        period: left.period,
        comparator,
        value,
    }
}

fn builtin(name: &str, description: &str, conditions: Vec<ConditionSpec>) -> FilterDefinition {
    FilterDefinition {
        name: name.to_string(),
        description: description.to_string(),
        mode: FilterMode::All,
        conditions,
        builtin: true,
    }
}

pub fn builtin_filters() -> Vec<FilterDefinition> {
    let price = OperandSpec {
        indicator: IndicatorName::Price,
        period: 14,
    };
    let rsi = OperandSpec {
        indicator: IndicatorName::Rsi,
        period: 14,
    };
    let uptrend = against(sma(50), Comparator::Gt, TargetSpec::Indicator(sma(100)));
    let above_50 = against(price, Comparator::Gt, TargetSpec::Indicator(sma(50)));

    vec![
        builtin("Golden Cross", "50MA above 100MA (uptrend)", vec![uptrend.clone()]),
        builtin(
            "RSI Oversold",
            "RSI(14) below 30, potential buy zone",
            vec![against(rsi.clone(), Comparator::Lt, TargetSpec::Value(30.0))],
        ),
        builtin(
            "RSI Overbought",
            "RSI(14) above 70, potential sell zone",
            vec![against(rsi, Comparator::Gt, TargetSpec::Value(70.0))],
        ),
        builtin(
            "Price Above 50MA",
            "Price trading above the 50-day moving average",
            vec![above_50.clone()],
        ),
        builtin(
            "Strong Momentum",
            "Price above 50MA and 50MA above 100MA",
            vec![above_50, uptrend],
        ),
    ]
}
