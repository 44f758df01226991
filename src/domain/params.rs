//! Typed strategy parameters.
//!
//! Each parameter carries a label, default, inclusive bounds and a sweep
//! step. Values are stored as `f64`; integer parameters must hold whole
//! numbers. `ParamValues` is ordered so identical inputs always iterate and
//! serialise the same way.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::error::GravionError;

const TOLERANCE: f64 = 1e-9;

pub type ParamValues = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Int,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamSpec {
    pub const fn int(name: &'static str, label: &'static str, default: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            name,
            label,
            kind: ParamKind::Int,
            default,
            min,
            max,
            step,
        }
    }

    pub const fn float(name: &'static str, label: &'static str, default: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            name,
            label,
            kind: ParamKind::Float,
            default,
            min,
            max,
            step,
        }
    }

    pub fn check(&self, value: f64) -> Result<(), GravionError> {
        if !value.is_finite() {
            return Err(GravionError::invalid_strategy(format!(
                "parameter '{}' must be a finite number",
                self.name
            )));
        }
        if self.kind == ParamKind::Int && (value - value.round()).abs() > TOLERANCE {
            return Err(GravionError::invalid_strategy(format!(
                "parameter '{}' must be a whole number, got {value}",
                self.name
            )));
        }
        if value < self.min - TOLERANCE || value > self.max + TOLERANCE {
            return Err(GravionError::invalid_strategy(format!(
                "parameter '{}' = {value} outside [{}, {}]",
                self.name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Defaults of `schema` overlaid with `overrides`, every value checked.
pub fn resolve(schema: &[ParamSpec], overrides: &ParamValues) -> Result<ParamValues, GravionError> {
    let mut values: ParamValues = schema
        .iter()
        .map(|p| (p.name.to_string(), p.default))
        .collect();

    for (name, &value) in overrides {
        let spec = schema.iter().find(|p| p.name == name.as_str()).ok_or_else(|| {
            GravionError::invalid_strategy(format!("unknown parameter '{name}'"))
        })?;
        spec.check(value)?;
        let value = match spec.kind {
            ParamKind::Int => value.round(),
            ParamKind::Float => value,
        };
        values.insert(name.clone(), value);
    }
    Ok(values)
}

/// Parse `name=value` pairs as given on the command line.
pub fn parse_assignments<S: AsRef<str>>(pairs: &[S]) -> Result<ParamValues, GravionError> {
    let mut values = ParamValues::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (name, raw) = pair.split_once('=').ok_or_else(|| {
            GravionError::invalid_strategy(format!("expected name=value, got '{pair}'"))
        })?;
        let value: f64 = raw.trim().parse().map_err(|_| {
            GravionError::invalid_strategy(format!("parameter '{}' has non-numeric value '{raw}'", name.trim()))
        })?;
        values.insert(name.trim().to_string(), value);
    }
    Ok(values)
}

/// Read a resolved parameter; `resolve` guarantees schema names are present.
pub(crate) fn get(values: &ParamValues, name: &str) -> f64 {
    values.get(name).copied().unwrap_or(f64::NAN)
}
