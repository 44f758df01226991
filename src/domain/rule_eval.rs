//! Condition evaluation against an indicator frame.
//!
//! # Evaluation Semantics
//!
//! - Threshold comparisons read both operands at the given bar index
//! - `crosses_above`/`crosses_below` also read index-1 and are `false` at index 0
//! - Any undefined operand (warm-up, missing indicator, out of range) makes
//!   the condition `false`, never an error
//! - A condition list is AND-combined; an empty list never fires

use crate::domain::indicator::IndicatorFrame;
use crate::domain::rule::{Comparator, Condition, Operand};

/// `a[t-1] <= b[t-1] && a[t] > b[t]`
pub fn crosses_above(prev_a: f64, prev_b: f64, curr_a: f64, curr_b: f64) -> bool {
    prev_a <= prev_b && curr_a > curr_b
}

/// `a[t-1] >= b[t-1] && a[t] < b[t]`
pub fn crosses_below(prev_a: f64, prev_b: f64, curr_a: f64, curr_b: f64) -> bool {
    prev_a >= prev_b && curr_a < curr_b
}

pub fn evaluate(condition: &Condition, frame: &IndicatorFrame<'_>, bar_index: usize) -> bool {
    let at = |i: usize| {
        Some((
            resolve_operand(&condition.left, frame, i)?,
            resolve_operand(&condition.right, frame, i)?,
        ))
    };

    match condition.comparator {
        Comparator::CrossesAbove | Comparator::CrossesBelow => {
            if bar_index == 0 {
                return false;
            }
            let (Some((prev_a, prev_b)), Some((curr_a, curr_b))) = (at(bar_index - 1), at(bar_index))
            else {
                return false;
            };
            if condition.comparator == Comparator::CrossesAbove {
                crosses_above(prev_a, prev_b, curr_a, curr_b)
            } else {
                crosses_below(prev_a, prev_b, curr_a, curr_b)
            }
        }
        comparator => match at(bar_index) {
            Some((a, b)) => match comparator {
                Comparator::Lt => a < b,
                Comparator::Gt => a > b,
                Comparator::Le => a <= b,
                Comparator::Ge => a >= b,
                Comparator::CrossesAbove | Comparator::CrossesBelow => false,
            },
            None => false,
        },
    }
}

/// True when the list is non-empty and every condition holds.
pub fn evaluate_all(conditions: &[Condition], frame: &IndicatorFrame<'_>, bar_index: usize) -> bool {
    !conditions.is_empty() && conditions.iter().all(|c| evaluate(c, frame, bar_index))
}

/// True when at least one condition holds.
pub fn evaluate_any(conditions: &[Condition], frame: &IndicatorFrame<'_>, bar_index: usize) -> bool {
    conditions.iter().any(|c| evaluate(c, frame, bar_index))
}

pub fn resolve_operand(operand: &Operand, frame: &IndicatorFrame<'_>, bar_index: usize) -> Option<f64> {
    match operand {
        Operand::Close => frame.close(bar_index),
        Operand::Volume => frame.volume(bar_index),
        Operand::Constant(v) => (bar_index < frame.len()).then_some(*v),
        Operand::Indicator(r) => frame.value(&r.indicator_type, r.field, bar_index),
    }
}
