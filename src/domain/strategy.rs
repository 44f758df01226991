//! Strategies: built-in parametrised families and declarative condition lists.
//!
//! Both variants reduce to a buy list and a sell list of compiled
//! conditions, so evaluation and simulation never branch on the variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::GravionError;
use crate::domain::indicator::{IndicatorField, IndicatorFrame, IndicatorType};
use crate::domain::params::{self, ParamSpec, ParamValues};
use crate::domain::rule::{compile_all, extract_indicators, Comparator, Condition, ConditionSpec, Operand};
use crate::domain::rule_eval::{evaluate_all, resolve_operand};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Signal {
    pub buy: bool,
    pub sell: bool,
}

/// Strength of a strategy's view on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intensity {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intensity::StrongBuy => "STRONG BUY",
            Intensity::Buy => "BUY",
            Intensity::Neutral => "NEUTRAL",
            Intensity::Sell => "SELL",
            Intensity::StrongSell => "STRONG SELL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinKind {
    GoldenCross,
    RsiMeanReversion,
    PriceChangeMomentum,
    PegReversion,
}

const GOLDEN_CROSS_SCHEMA: [ParamSpec; 2] = [
    ParamSpec::int("fast_period", "Fast SMA Period", 50.0, 5.0, 200.0, 5.0),
    ParamSpec::int("slow_period", "Slow SMA Period", 100.0, 10.0, 400.0, 10.0),
];

const RSI_SCHEMA: [ParamSpec; 3] = [
    ParamSpec::int("rsi_period", "RSI Period", 14.0, 2.0, 50.0, 1.0),
    ParamSpec::float("oversold", "Oversold Level", 30.0, 5.0, 50.0, 5.0),
    ParamSpec::float("overbought", "Overbought Level", 70.0, 50.0, 95.0, 5.0),
];

const MOMENTUM_SCHEMA: [ParamSpec; 2] = [
    ParamSpec::float("buy_threshold", "Buy Threshold (%)", 2.0, 0.5, 10.0, 0.5),
    ParamSpec::float("sell_threshold", "Sell Threshold (%)", -2.0, -10.0, -0.5, 0.5),
];

const PEG_SCHEMA: [ParamSpec; 3] = [
    ParamSpec::float("baseline_ratio", "Baseline Ratio", 1.0, 0.99, 1.01, 0.001),
    ParamSpec::float("upper_elasticity", "Upper Elasticity", 0.005, 0.001, 0.02, 0.001),
    ParamSpec::float("lower_elasticity", "Lower Elasticity", 0.005, 0.001, 0.02, 0.001),
];

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 4] = [
        BuiltinKind::GoldenCross,
        BuiltinKind::RsiMeanReversion,
        BuiltinKind::PriceChangeMomentum,
        BuiltinKind::PegReversion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::GoldenCross => "Golden Cross",
            BuiltinKind::RsiMeanReversion => "RSI Mean Reversion",
            BuiltinKind::PriceChangeMomentum => "Price Change Momentum",
            BuiltinKind::PegReversion => "Peg Reversion",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BuiltinKind::GoldenCross => "Buy when the fast SMA crosses above the slow SMA, sell on the reverse cross.",
            BuiltinKind::RsiMeanReversion => "Buy when RSI drops below oversold, sell when it rises above overbought.",
            BuiltinKind::PriceChangeMomentum => "Buy on a daily gain above the buy threshold, sell on a drop below the sell threshold.",
            BuiltinKind::PegReversion => "Trade deviations of a pegged price from its baseline ratio.",
        }
    }

    pub fn schema(self) -> &'static [ParamSpec] {
        match self {
            BuiltinKind::GoldenCross => &GOLDEN_CROSS_SCHEMA,
            BuiltinKind::RsiMeanReversion => &RSI_SCHEMA,
            BuiltinKind::PriceChangeMomentum => &MOMENTUM_SCHEMA,
            BuiltinKind::PegReversion => &PEG_SCHEMA,
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinStrategy {
    kind: BuiltinKind,
    params: ParamValues,
    buy: Vec<Condition>,
    sell: Vec<Condition>,
}

impl BuiltinStrategy {
    pub fn new(kind: BuiltinKind, overrides: &ParamValues) -> Result<Self, GravionError> {
        let params = params::resolve(kind.schema(), overrides)?;
        let p = |name: &str| params::get(&params, name);

        let (buy, sell) = match kind {
            BuiltinKind::GoldenCross => {
                let (fast, slow) = (p("fast_period") as usize, p("slow_period") as usize);
                if fast >= slow {
                    return Err(GravionError::invalid_strategy(format!(
                        "fast_period ({fast}) must be below slow_period ({slow})"
                    )));
                }
                (
                    vec![Condition::new(Operand::sma(fast), Comparator::CrossesAbove, Operand::sma(slow))],
                    vec![Condition::new(Operand::sma(fast), Comparator::CrossesBelow, Operand::sma(slow))],
                )
            }
            BuiltinKind::RsiMeanReversion => {
                let period = p("rsi_period") as usize;
                let (oversold, overbought) = (p("oversold"), p("overbought"));
                if oversold >= overbought {
                    return Err(GravionError::invalid_strategy(format!(
                        "oversold ({oversold}) must be below overbought ({overbought})"
                    )));
                }
                (
                    vec![Condition::new(
                        Operand::rsi(period),
                        Comparator::CrossesBelow,
                        Operand::Constant(oversold),
                    )],
                    vec![Condition::new(
                        Operand::rsi(period),
                        Comparator::CrossesAbove,
                        Operand::Constant(overbought),
                    )],
                )
            }
            BuiltinKind::PriceChangeMomentum => (
                vec![Condition::new(
                    Operand::daily_change(),
                    Comparator::Gt,
                    Operand::Constant(p("buy_threshold")),
                )],
                vec![Condition::new(
                    Operand::daily_change(),
                    Comparator::Lt,
                    Operand::Constant(p("sell_threshold")),
                )],
            ),
            BuiltinKind::PegReversion => {
                let baseline = p("baseline_ratio");
                (
                    vec![Condition::new(
                        Operand::Close,
                        Comparator::CrossesBelow,
                        Operand::Constant(baseline - p("lower_elasticity")),
                    )],
                    vec![Condition::new(
                        Operand::Close,
                        Comparator::CrossesAbove,
                        Operand::Constant(baseline + p("upper_elasticity")),
                    )],
                )
            }
        };

        Ok(Self {
            kind,
            params,
            buy,
            sell,
        })
    }

    pub fn kind(&self) -> BuiltinKind {
        self.kind
    }

    pub fn params(&self) -> &ParamValues {
        &self.params
    }

    fn intensity(&self, frame: &IndicatorFrame<'_>, index: usize) -> Intensity {
        let p = |name: &str| params::get(&self.params, name);
        let grade = |v: f64, strong_buy: f64, buy: f64, sell: f64, strong_sell: f64, direction: Direction| {
            let (sb, b, s, ss) = match direction {
                Direction::LowIsBuy => (v < strong_buy, v < buy, v > sell, v > strong_sell),
                Direction::HighIsBuy => (v > strong_buy, v > buy, v < sell, v < strong_sell),
                // Sell bands include their edge, as the screener signal does.
                Direction::HighIsBuyClosedSell => (v > strong_buy, v > buy, v <= sell, v <= strong_sell),
            };
            if sb {
                Intensity::StrongBuy
            } else if b {
                Intensity::Buy
            } else if ss {
                Intensity::StrongSell
            } else if s {
                Intensity::Sell
            } else {
                Intensity::Neutral
            }
        };

        match self.kind {
            BuiltinKind::GoldenCross => {
                let fast = IndicatorType::Sma(p("fast_period") as usize);
                let slow = IndicatorType::Sma(p("slow_period") as usize);
                let field = IndicatorField::Value;
                match (frame.value(&fast, field, index), frame.value(&slow, field, index)) {
                    (Some(f), Some(s)) if s != 0.0 => {
                        let spread = (f - s) / s * 100.0;
                        grade(spread, 5.0, 0.0, 0.0, -5.0, Direction::HighIsBuy)
                    }
                    _ => Intensity::Neutral,
                }
            }
            BuiltinKind::RsiMeanReversion => {
                match resolve_operand(&Operand::rsi(p("rsi_period") as usize), frame, index) {
                    Some(v) => {
                        let (lo, hi) = (p("oversold"), p("overbought"));
                        grade(v, lo - 10.0, lo, hi, hi + 10.0, Direction::LowIsBuy)
                    }
                    None => Intensity::Neutral,
                }
            }
            BuiltinKind::PriceChangeMomentum => match resolve_operand(&Operand::daily_change(), frame, index) {
                Some(v) => {
                    let (up, down) = (p("buy_threshold"), p("sell_threshold"));
                    grade(v, up, up / 4.0, down / 4.0, down, Direction::HighIsBuyClosedSell)
                }
                None => Intensity::Neutral,
            },
            BuiltinKind::PegReversion => match frame.close(index) {
                Some(price) => {
                    let (base, up, down) = (p("baseline_ratio"), p("upper_elasticity"), p("lower_elasticity"));
                    let (lower, upper) = (base - down, base + up);
                    grade(price, lower - down, lower, upper, upper + up, Direction::LowIsBuy)
                }
                None => Intensity::Neutral,
            },
        }
    }
}

/// Which side of the graded value is bullish.
#[derive(Clone, Copy)]
enum Direction {
    LowIsBuy,
    HighIsBuy,
    HighIsBuyClosedSell,
}

/// Declarative strategy as stored in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub buy_conditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub sell_conditions: Vec<ConditionSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclarativeStrategy {
    definition: StrategyDefinition,
    buy: Vec<Condition>,
    sell: Vec<Condition>,
}

impl DeclarativeStrategy {
    pub fn new(definition: StrategyDefinition) -> Result<Self, GravionError> {
        if definition.name.trim().is_empty() {
            return Err(GravionError::invalid_strategy("strategy name is empty"));
        }
        let buy = compile_all(&definition.buy_conditions)?;
        let sell = compile_all(&definition.sell_conditions)?;
        Ok(Self {
            definition,
            buy,
            sell,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, GravionError> {
        let definition: StrategyDefinition = serde_json::from_str(json)
            .map_err(|e| GravionError::invalid_strategy(format!("malformed strategy JSON: {e}")))?;
        Self::new(definition)
    }

    pub fn definition(&self) -> &StrategyDefinition {
        &self.definition
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Builtin(BuiltinStrategy),
    Declarative(DeclarativeStrategy),
}

impl Strategy {
    pub fn builtin(kind: BuiltinKind) -> Result<Self, GravionError> {
        Ok(Strategy::Builtin(BuiltinStrategy::new(kind, &ParamValues::new())?))
    }

    pub fn name(&self) -> &str {
        match self {
            Strategy::Builtin(b) => b.kind.name(),
            Strategy::Declarative(d) => &d.definition.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Strategy::Builtin(b) => b.kind.description(),
            Strategy::Declarative(d) => &d.definition.description,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Strategy::Builtin(_))
    }

    /// Parameter schema; declarative strategies have none.
    pub fn schema(&self) -> &[ParamSpec] {
        match self {
            Strategy::Builtin(b) => b.kind.schema(),
            Strategy::Declarative(_) => &[],
        }
    }

    pub fn params(&self) -> ParamValues {
        match self {
            Strategy::Builtin(b) => b.params.clone(),
            Strategy::Declarative(_) => ParamValues::new(),
        }
    }

    /// Copy of this strategy with `overrides` applied over its current values.
    pub fn with_params(&self, overrides: &ParamValues) -> Result<Self, GravionError> {
        match self {
            Strategy::Builtin(b) => {
                let mut merged = b.params.clone();
                merged.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
                Ok(Strategy::Builtin(BuiltinStrategy::new(b.kind, &merged)?))
            }
            Strategy::Declarative(d) => match overrides.keys().next() {
                Some(name) => Err(GravionError::invalid_strategy(format!(
                    "unknown parameter '{name}' for '{}'",
                    d.definition.name
                ))),
                None => Ok(self.clone()),
            },
        }
    }

    pub fn buy_conditions(&self) -> &[Condition] {
        match self {
            Strategy::Builtin(b) => &b.buy,
            Strategy::Declarative(d) => &d.buy,
        }
    }

    pub fn sell_conditions(&self) -> &[Condition] {
        match self {
            Strategy::Builtin(b) => &b.sell,
            Strategy::Declarative(d) => &d.sell,
        }
    }

    /// Indicators a frame must hold to evaluate this strategy.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        extract_indicators(self.buy_conditions().iter().chain(self.sell_conditions()))
    }

    pub fn evaluate(&self, frame: &IndicatorFrame<'_>, bar_index: usize) -> Signal {
        Signal {
            buy: evaluate_all(self.buy_conditions(), frame, bar_index),
            sell: evaluate_all(self.sell_conditions(), frame, bar_index),
        }
    }

    /// View on bar `index`. Declarative strategies report their signal,
    /// with sell taking priority.
    pub fn intensity(&self, frame: &IndicatorFrame<'_>, index: usize) -> Intensity {
        match self {
            Strategy::Builtin(b) => b.intensity(frame, index),
            Strategy::Declarative(_) => {
                let signal = self.evaluate(frame, index);
                if signal.sell {
                    Intensity::Sell
                } else if signal.buy {
                    Intensity::Buy
                } else {
                    Intensity::Neutral
                }
            }
        }
    }
}

/// `evaluate(strategy, frame, bar_index) -> {buy, sell}`.
pub fn evaluate(strategy: &Strategy, frame: &IndicatorFrame<'_>, bar_index: usize) -> Signal {
    strategy.evaluate(frame, bar_index)
}
