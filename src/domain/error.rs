//! Domain error types.

/// Top-level error type for gravion.
#[derive(Debug, thiserror::Error)]
pub enum GravionError {
    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid strategy: {reason}")]
    InvalidStrategy { reason: String },

    #[error("parameter sweep expands to {count} combinations, limit is {limit}")]
    TooManyCombinations { count: usize, limit: usize },

    #[error("run cancelled")]
    Cancelled,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GravionError {
    pub fn invalid_strategy(reason: impl Into<String>) -> Self {
        GravionError::InvalidStrategy {
            reason: reason.into(),
        }
    }

    pub fn data_source(reason: impl Into<String>) -> Self {
        GravionError::DataSource {
            reason: reason.into(),
        }
    }
}

impl From<&GravionError> for std::process::ExitCode {
    fn from(err: &GravionError) -> Self {
        let code: u8 = match err {
            GravionError::Io(_) | GravionError::Cancelled => 1,
            GravionError::ConfigParse { .. }
            | GravionError::ConfigMissing { .. }
            | GravionError::ConfigInvalid { .. } => 2,
            GravionError::DataSource { .. } => 3,
            GravionError::InvalidStrategy { .. } | GravionError::Json(_) => 4,
            GravionError::InsufficientData { .. } => 5,
            GravionError::TooManyCombinations { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = GravionError::InsufficientData {
            symbol: "AAPL".into(),
            bars: 10,
            minimum: 20,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for AAPL: have 10 bars, need 20"
        );
    }

    #[test]
    fn too_many_combinations_message() {
        let err = GravionError::TooManyCombinations {
            count: 2000,
            limit: 1000,
        };
        assert!(err.to_string().contains("2000"));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn exit_codes_by_category() {
        use std::process::ExitCode;
        // ExitCode has no PartialEq; compare the debug form.
        let same = |a: ExitCode, b: u8| format!("{a:?}") == format!("{:?}", ExitCode::from(b));
        let config = GravionError::ConfigMissing {
            section: "engine".into(),
            key: "capital_per_symbol".into(),
        };
        assert!(same(ExitCode::from(&config), 2));
        let strategy = GravionError::invalid_strategy("bad");
        assert!(same(ExitCode::from(&strategy), 4));
        let sweep = GravionError::TooManyCombinations { count: 2, limit: 1 };
        assert!(same(ExitCode::from(&sweep), 6));
    }
}
