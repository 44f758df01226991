//! CSV file data adapter.
//!
//! Layout: `<dir>/<SYMBOL>.csv` with a `date,open,high,low,close,volume`
//! header, and optional fundamentals in `<dir>/<SYMBOL>.fundamentals.json`.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::domain::error::GravionError;
use crate::domain::fundamentals::Fundamentals;
use crate::domain::ohlcv::{Bar, Series, Window};
use crate::ports::data_port::DataPort;

const FUNDAMENTALS_SUFFIX: &str = ".fundamentals.json";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    fn fundamentals_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}{FUNDAMENTALS_SUFFIX}"))
    }

    fn read_bars(&self, symbol: &str) -> Result<Vec<Bar>, GravionError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            GravionError::data_source(format!("failed to read {}: {e}", path.display()))
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<Bar>().enumerate() {
            let bar = result.map_err(|e| {
                GravionError::data_source(format!("{}: row {}: {e}", path.display(), line + 1))
            })?;
            bars.push(bar);
        }
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    /// Rows must already be in strictly increasing date order; the file is
    /// rejected otherwise rather than sorted.
    fn fetch_series(&self, symbol: &str, window: &Window) -> Result<Series, GravionError> {
        let series = Series::new(symbol, self.read_bars(symbol)?)?;
        let Some(latest) = series.last_date() else {
            return Ok(series);
        };
        let (start, end) = window.resolve(latest);
        let windowed = series.window(start, end);
        debug!(symbol, %start, %end, bars = windowed.len(), "csv series");
        Ok(windowed)
    }

    fn fetch_fundamentals(&self, symbol: &str) -> Result<Option<Fundamentals>, GravionError> {
        let path = self.fundamentals_path(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| {
            GravionError::data_source(format!("failed to read {}: {e}", path.display()))
        })?;
        let fundamentals = serde_json::from_str(&content).map_err(|e| {
            GravionError::data_source(format!("invalid fundamentals {}: {e}", path.display()))
        })?;
        Ok(Some(fundamentals))
    }

    fn list_symbols(&self) -> Result<Vec<String>, GravionError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            GravionError::data_source(format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| GravionError::data_source(format!("directory entry error: {e}")))?;
            let name = entry.file_name();
            if let Some(symbol) = name.to_string_lossy().strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BHP.csv"), csv_content).unwrap();
        fs::write(path.join("CBA.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(
            path.join("BHP.fundamentals.json"),
            r#"{"pe_ratio": 12.5, "quarterly_net_income": [
                {"period_end": "2023-09-30", "reported": "2023-10-20", "net_income": 150.0}
            ]}"#,
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "ignore me").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_series_returns_correct_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let window = Window::Range {
            start: d(2024, 1, 15),
            end: d(2024, 1, 17),
        };
        let series = adapter.fetch_series("BHP", &window).unwrap();

        assert_eq!(series.symbol(), "BHP");
        assert_eq!(series.len(), 3);
        let first = &series.bars()[0];
        assert_eq!(first.date, d(2024, 1, 15));
        assert_eq!(first.open, 100.0);
        assert_eq!(first.high, 110.0);
        assert_eq!(first.low, 90.0);
        assert_eq!(first.close, 105.0);
        assert_eq!(first.volume, 50000);
    }

    #[test]
    fn fetch_series_filters_by_window() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let window = Window::Range {
            start: d(2024, 1, 16),
            end: d(2024, 1, 16),
        };
        let series = adapter.fetch_series("BHP", &window).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.last_date(), Some(d(2024, 1, 16)));
    }

    #[test]
    fn named_period_resolves_against_last_bar() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter.fetch_series("BHP", &"5d".parse().unwrap()).unwrap();
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn missing_file_is_data_source_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_series("XYZ", &Window::default());
        assert!(matches!(result, Err(GravionError::DataSource { .. })));
    }

    #[test]
    fn unordered_rows_are_rejected() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("BAD.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-16,1,1,1,1,10\n\
             2024-01-15,1,1,1,1,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_series("BAD", &Window::default());
        assert!(matches!(result, Err(GravionError::DataSource { .. })));
    }

    #[test]
    fn malformed_row_is_rejected() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("BAD.csv"),
            "date,open,high,low,close,volume\n2024-01-15,abc,1,1,1,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(path);

        let err = adapter.fetch_series("BAD", &Window::default()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn fundamentals_are_optional() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bhp = adapter.fetch_fundamentals("BHP").unwrap().unwrap();
        assert_eq!(bhp.pe_ratio, Some(12.5));
        assert_eq!(bhp.quarterly_net_income.len(), 1);
        assert!(adapter.fetch_fundamentals("CBA").unwrap().is_none());
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_symbols().unwrap(), vec!["BHP", "CBA"]);
    }
}
