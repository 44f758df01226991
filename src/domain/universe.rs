//! Symbol lists and per-symbol data loading.
//!
//! Loading never aborts on a single symbol: each fetch outcome is kept so
//! the batch runner and screener can report it alongside the results.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::domain::batch::{BatchInput, SymbolFailure};
use crate::domain::ohlcv::Window;
use crate::domain::screen::ScreenInput;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("symbol list is empty")]
    Empty,
}

/// Parse a comma separated symbol list; symbols are upper-cased.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    if input.trim().is_empty() {
        return Err(UniverseError::Empty);
    }
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Fetch bars for every symbol, keeping failures in place.
pub fn load_series(data_port: &dyn DataPort, symbols: &[String], window: &Window) -> Vec<BatchInput> {
    let inputs: Vec<BatchInput> = symbols
        .iter()
        .map(|symbol| {
            let series = data_port.fetch_series(symbol, window);
            match &series {
                Ok(s) => info!(symbol = %symbol, bars = s.len(), "loaded"),
                Err(e) => warn!(symbol = %symbol, error = %e, "skipping"),
            }
            BatchInput {
                symbol: symbol.clone(),
                series,
            }
        })
        .collect();
    let loaded = inputs.iter().filter(|i| i.series.is_ok()).count();
    info!(loaded, requested = symbols.len(), window = %window, "universe loaded");
    inputs
}

/// Fetch bars and fundamentals for screening. A source with no fundamentals
/// is not an error; a failed fundamentals fetch is logged and carried on the
/// input so the report can flag the row.
pub fn load_screen_inputs(
    data_port: &dyn DataPort,
    symbols: &[String],
    window: &Window,
) -> (Vec<ScreenInput>, Vec<SymbolFailure>) {
    let mut inputs = Vec::new();
    let mut failures = Vec::new();
    for input in load_series(data_port, symbols, window) {
        let series = match input.series {
            Ok(series) => series,
            Err(e) => {
                failures.push(SymbolFailure::new(&input.symbol, &e));
                continue;
            }
        };
        let screen_input = match data_port.fetch_fundamentals(&input.symbol) {
            Ok(fundamentals) => ScreenInput::new(series, fundamentals),
            Err(e) => {
                warn!(symbol = %input.symbol, error = %e, "fundamentals unavailable");
                ScreenInput {
                    fundamentals_error: Some(e.to_string()),
                    ..ScreenInput::new(series, None)
                }
            }
        };
        inputs.push(screen_input);
    }
    (inputs, failures)
}
