//! Configuration validation.
//!
//! Every section is checked before a run. A value that is present but does
//! not parse is rejected here, since the `get_*` accessors on [`ConfigPort`]
//! silently fall back to their defaults.

use std::str::FromStr;

use crate::domain::error::GravionError;
use crate::domain::ohlcv::Window;
use crate::domain::optimizer::Objective;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), GravionError> {
    validate_engine_config(config)?;
    validate_optimizer_config(config)?;
    validate_screen_config(config)?;
    validate_data_config(config)?;
    validate_portfolios(config)?;
    Ok(())
}

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), GravionError> {
    if let Some(capital) = read_number::<f64>(config, "engine", "capital_per_symbol")? {
        if capital <= 0.0 {
            return Err(invalid("engine", "capital_per_symbol", "capital_per_symbol must be positive"));
        }
    }
    for key in ["commission_per_share", "platform_fee_per_share"] {
        if let Some(fee) = read_number::<f64>(config, "engine", key)? {
            if fee < 0.0 {
                return Err(invalid("engine", key, &format!("{key} must be non-negative")));
            }
        }
    }
    if let Some(slippage) = read_number::<f64>(config, "engine", "slippage_pct")? {
        if !(0.0..100.0).contains(&slippage) {
            return Err(invalid("engine", "slippage_pct", "slippage_pct must be in [0, 100)"));
        }
    }
    if let Some(rate) = read_number::<f64>(config, "engine", "risk_free_rate")? {
        if !(0.0..1.0).contains(&rate) {
            return Err(invalid("engine", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
        }
    }
    read_number::<usize>(config, "engine", "workers")?;
    Ok(())
}

pub fn validate_optimizer_config(config: &dyn ConfigPort) -> Result<(), GravionError> {
    if let Some(max) = read_number::<usize>(config, "optimizer", "max_combinations")? {
        if max == 0 {
            return Err(invalid("optimizer", "max_combinations", "max_combinations must be at least 1"));
        }
    }
    if let Some(objective) = config.get_string("optimizer", "objective") {
        Objective::from_str(objective.trim())?;
    }
    Ok(())
}

pub fn validate_screen_config(config: &dyn ConfigPort) -> Result<(), GravionError> {
    let fast = read_number::<usize>(config, "screen", "sma_fast")?.unwrap_or(50);
    let slow = read_number::<usize>(config, "screen", "sma_slow")?.unwrap_or(100);
    if fast == 0 {
        return Err(invalid("screen", "sma_fast", "sma_fast must be at least 1"));
    }
    if fast >= slow {
        return Err(invalid("screen", "sma_fast", "sma_fast must be less than sma_slow"));
    }
    if read_number::<usize>(config, "screen", "min_history_bars")? == Some(0) {
        return Err(invalid("screen", "min_history_bars", "min_history_bars must be at least 1"));
    }
    if let Some(hours) = read_number::<i64>(config, "screen", "stale_after_hours")? {
        if hours <= 0 {
            return Err(invalid("screen", "stale_after_hours", "stale_after_hours must be positive"));
        }
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), GravionError> {
    if let Some(window) = config.get_string("data", "window") {
        Window::from_str(window.trim())?;
    }
    for key in ["csv_dir", "strategies_dir"] {
        if let Some(dir) = config.get_string("data", key) {
            if dir.trim().is_empty() {
                return Err(invalid("data", key, &format!("{key} must not be empty")));
            }
        }
    }
    Ok(())
}

/// Each `[portfolios]` entry must be a well-formed symbol list.
pub fn validate_portfolios(config: &dyn ConfigPort) -> Result<(), GravionError> {
    for name in config.section_keys("portfolios") {
        let raw = config.get_string("portfolios", &name).unwrap_or_default();
        if let Err(e) = parse_symbols(&raw) {
            return Err(invalid("portfolios", &name, &e.to_string()));
        }
    }
    Ok(())
}

fn read_number<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, GravionError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| invalid(section, key, &format!("'{raw}' is not a valid number")))
}

fn invalid(section: &str, key: &str, reason: &str) -> GravionError {
    GravionError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_config_passes() {
        let config = make_config(
            r#"
[engine]
capital_per_symbol = 10000
commission_per_share = 0.005
platform_fee_per_share = 0.001
slippage_pct = 0.1
risk_free_rate = 0.04
workers = 4

[optimizer]
max_combinations = 500
objective = sharpe_ratio

[screen]
sma_fast = 20
sma_slow = 50
min_history_bars = 60
stale_after_hours = 48

[data]
csv_dir = data
strategies_dir = strategies
window = 2023-01-01:2023-12-31

[portfolios]
tech = AAPL,MSFT,NVDA
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = make_config("[engine]\n");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn capital_must_be_positive() {
        let config = make_config("[engine]\ncapital_per_symbol = 0\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "capital_per_symbol"));
    }

    #[test]
    fn non_numeric_capital_fails() {
        let config = make_config("[engine]\ncapital_per_symbol = lots\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "capital_per_symbol"));
    }

    #[test]
    fn negative_fee_fails() {
        let config = make_config("[engine]\nplatform_fee_per_share = -0.01\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(
            matches!(err, GravionError::ConfigInvalid { key, .. } if key == "platform_fee_per_share")
        );
    }

    #[test]
    fn slippage_out_of_range_fails() {
        let config = make_config("[engine]\nslippage_pct = 100\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "slippage_pct"));
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config("[engine]\nrisk_free_rate = 1.5\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "risk_free_rate"));
    }

    #[test]
    fn negative_workers_fails() {
        let config = make_config("[engine]\nworkers = -2\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "workers"));
    }

    #[test]
    fn max_combinations_zero_fails() {
        let config = make_config("[optimizer]\nmax_combinations = 0\n");
        let err = validate_optimizer_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "max_combinations"));
    }

    #[test]
    fn unknown_objective_fails() {
        let config = make_config("[optimizer]\nobjective = luck\n");
        let err = validate_optimizer_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "objective"));
    }

    #[test]
    fn sma_fast_must_be_below_slow() {
        let config = make_config("[screen]\nsma_fast = 100\nsma_slow = 50\n");
        let err = validate_screen_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "sma_fast"));
    }

    #[test]
    fn stale_after_hours_must_be_positive() {
        let config = make_config("[screen]\nstale_after_hours = 0\n");
        let err = validate_screen_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "stale_after_hours"));
    }

    #[test]
    fn malformed_window_fails() {
        let config = make_config("[data]\nwindow = forever\n");
        let err = validate_data_config(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { section, .. } if section == "data"));
    }

    #[test]
    fn duplicate_portfolio_symbol_fails() {
        let config = make_config("[portfolios]\nbanks = CBA,WBC,cba\n");
        let err = validate_portfolios(&config).unwrap_err();
        assert!(matches!(err, GravionError::ConfigInvalid { key, .. } if key == "banks"));
    }
}
