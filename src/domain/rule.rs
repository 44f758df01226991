//! Condition AST and its JSON form.
//!
//! - `Operand`: what can be compared (price fields, constants, indicators)
//! - `IndicatorRef`: an indicator with the field to read
//! - `Comparator`: threshold and crossover comparisons
//! - `Condition`: one compiled comparison
//! - `ConditionSpec`: the user-facing JSON shape, compiled with `compile()`

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::GravionError;
use crate::domain::indicator::{bollinger, macd, IndicatorField, IndicatorType};

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Close,
    Volume,
    Constant(f64),
    Indicator(IndicatorRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

impl Operand {
    pub fn indicator(indicator_type: IndicatorType, field: IndicatorField) -> Self {
        Operand::Indicator(IndicatorRef {
            indicator_type,
            field,
        })
    }

    pub fn sma(period: usize) -> Self {
        Self::indicator(IndicatorType::Sma(period), IndicatorField::Value)
    }

    pub fn rsi(period: usize) -> Self {
        Self::indicator(IndicatorType::Rsi(period), IndicatorField::Value)
    }

    pub fn daily_change() -> Self {
        Self::indicator(IndicatorType::DailyChange, IndicatorField::Value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "crosses_above")]
    CrossesAbove,
    #[serde(rename = "crosses_below")]
    CrossesBelow,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparator::Lt => "<",
            Comparator::Gt => ">",
            Comparator::Le => "<=",
            Comparator::Ge => ">=",
            Comparator::CrossesAbove => "crosses above",
            Comparator::CrossesBelow => "crosses below",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: Operand,
    pub comparator: Comparator,
    pub right: Operand,
}

impl Condition {
    pub fn new(left: Operand, comparator: Comparator, right: Operand) -> Self {
        Self {
            left,
            comparator,
            right,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Close => f.write_str("Price"),
            Operand::Volume => f.write_str("Volume"),
            Operand::Constant(v) => write!(f, "{v}"),
            Operand::Indicator(r) => match r.field {
                IndicatorField::Value => write!(f, "{}", r.indicator_type),
                IndicatorField::MacdLine => write!(f, "{}.line", r.indicator_type),
                IndicatorField::MacdSignal => write!(f, "{}.signal", r.indicator_type),
                IndicatorField::MacdHistogram => write!(f, "{}.histogram", r.indicator_type),
                IndicatorField::Upper => write!(f, "{}.upper", r.indicator_type),
                IndicatorField::Middle => write!(f, "{}.middle", r.indicator_type),
                IndicatorField::Lower => write!(f, "{}.lower", r.indicator_type),
            },
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.comparator, self.right)
    }
}

/// Indicators referenced by a set of conditions, deduplicated.
pub fn extract_indicators<'a, I>(conditions: I) -> Vec<IndicatorType>
where
    I: IntoIterator<Item = &'a Condition>,
{
    let mut found: Vec<IndicatorType> = Vec::new();
    for condition in conditions {
        for operand in [&condition.left, &condition.right] {
            if let Operand::Indicator(r) = operand {
                if !found.contains(&r.indicator_type) {
                    found.push(r.indicator_type.clone());
                }
            }
        }
    }
    found
}

/// Indicator names accepted in JSON conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorName {
    #[serde(rename = "SMA")]
    Sma,
    #[serde(rename = "EMA")]
    Ema,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "Price")]
    Price,
    #[serde(rename = "Volume")]
    Volume,
    #[serde(rename = "Daily Change %")]
    DailyChange,
    #[serde(rename = "MACD")]
    MacdLine,
    #[serde(rename = "MACD Signal")]
    MacdSignal,
    #[serde(rename = "MACD Histogram")]
    MacdHistogram,
    #[serde(rename = "BB Upper")]
    BollingerUpper,
    #[serde(rename = "BB Middle")]
    BollingerMiddle,
    #[serde(rename = "BB Lower")]
    BollingerLower,
}

fn default_period() -> usize {
    14
}

/// An indicator reference as written in JSON: `{"indicator": "SMA", "period": 20}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperandSpec {
    pub indicator: IndicatorName,
    #[serde(default = "default_period")]
    pub period: usize,
}

impl OperandSpec {
    /// Period-free indicators ignore `period`; MACD uses the standard
    /// 12/26/9 set and Bollinger uses `period` with a 2.0 multiplier.
    pub fn compile(&self) -> Result<Operand, GravionError> {
        let standard_macd = IndicatorType::Macd {
            fast: macd::DEFAULT_FAST,
            slow: macd::DEFAULT_SLOW,
            signal: macd::DEFAULT_SIGNAL,
        };
        let bands = IndicatorType::Bollinger {
            period: self.period,
            stddev_mult_x100: bollinger::DEFAULT_MULT_X100,
        };
        let operand = match self.indicator {
            IndicatorName::Price => Operand::Close,
            IndicatorName::Volume => Operand::Volume,
            IndicatorName::DailyChange => Operand::daily_change(),
            IndicatorName::Sma => Operand::sma(self.period),
            IndicatorName::Ema => Operand::indicator(IndicatorType::Ema(self.period), IndicatorField::Value),
            IndicatorName::Rsi => Operand::rsi(self.period),
            IndicatorName::MacdLine => Operand::indicator(standard_macd, IndicatorField::MacdLine),
            IndicatorName::MacdSignal => Operand::indicator(standard_macd, IndicatorField::MacdSignal),
            IndicatorName::MacdHistogram => {
                Operand::indicator(standard_macd, IndicatorField::MacdHistogram)
            }
            IndicatorName::BollingerUpper => Operand::indicator(bands, IndicatorField::Upper),
            IndicatorName::BollingerMiddle => Operand::indicator(bands, IndicatorField::Middle),
            IndicatorName::BollingerLower => Operand::indicator(bands, IndicatorField::Lower),
        };
        if let Operand::Indicator(r) = &operand {
            r.indicator_type.validate()?;
        }
        Ok(operand)
    }
}

/// Right-hand side: a plain number or another indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    Value(f64),
    Indicator(OperandSpec),
}

/// One condition as stored in strategy and filter JSON files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub indicator: IndicatorName,
    #[serde(default = "default_period")]
    pub period: usize,
    pub comparator: Comparator,
    pub value: TargetSpec,
}

impl ConditionSpec {
    pub fn compile(&self) -> Result<Condition, GravionError> {
        let left = OperandSpec {
            indicator: self.indicator,
            period: self.period,
        }
        .compile()?;
        let right = match &self.value {
            TargetSpec::Value(v) if v.is_finite() => Operand::Constant(*v),
            TargetSpec::Value(v) => {
                return Err(GravionError::invalid_strategy(format!(
                    "condition value {v} is not a finite number"
                )));
            }
            TargetSpec::Indicator(spec) => spec.compile()?,
        };
        Ok(Condition::new(left, self.comparator, right))
    }
}

pub fn compile_all(specs: &[ConditionSpec]) -> Result<Vec<Condition>, GravionError> {
    specs.iter().map(ConditionSpec::compile).collect()
}
