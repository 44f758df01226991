//! Market data port.

use crate::domain::error::GravionError;
use crate::domain::fundamentals::Fundamentals;
use crate::domain::ohlcv::{Series, Window};

/// Read-only source of daily bars and fundamentals.
///
/// Failures are reported as [`GravionError::DataSource`] and surfaced to
/// callers unchanged.
pub trait DataPort {
    fn fetch_series(&self, symbol: &str, window: &Window) -> Result<Series, GravionError>;

    /// `Ok(None)` when the source has no fundamentals for `symbol`.
    fn fetch_fundamentals(&self, symbol: &str) -> Result<Option<Fundamentals>, GravionError>;

    fn list_symbols(&self) -> Result<Vec<String>, GravionError>;
}
