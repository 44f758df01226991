//! Strategy store backed by the built-in registry and a directory of JSON
//! strategy definitions.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::error::GravionError;
use crate::domain::strategy::{BuiltinKind, DeclarativeStrategy, Strategy};
use crate::ports::strategy_port::{StrategyInfo, StrategyPort};

pub struct JsonStrategyStore {
    strategies: Vec<Strategy>,
}

impl JsonStrategyStore {
    /// Built-ins only.
    pub fn builtin_only() -> Result<Self, GravionError> {
        let strategies = BuiltinKind::ALL
            .into_iter()
            .map(Strategy::builtin)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { strategies })
    }

    /// Built-ins plus every `*.json` file in `dir`, ordered by file name.
    ///
    /// Files that fail to parse, or whose name collides with an earlier
    /// strategy, are logged and skipped.
    pub fn open(dir: &Path) -> Result<Self, GravionError> {
        let mut store = Self::builtin_only()?;
        for path in json_files(dir)? {
            match load_file(&path) {
                Ok(strategy) if store.find(strategy.name()).is_some() => {
                    warn!(path = %path.display(), name = strategy.name(), "duplicate strategy name, skipping");
                }
                Ok(strategy) => {
                    debug!(path = %path.display(), name = strategy.name(), "loaded strategy");
                    store.strategies.push(strategy);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping strategy file"),
            }
        }
        Ok(store)
    }

    fn find(&self, name: &str) -> Option<&Strategy> {
        let name = name.trim();
        self.strategies
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

impl StrategyPort for JsonStrategyStore {
    fn get(&self, name: &str) -> Result<Strategy, GravionError> {
        self.find(name)
            .cloned()
            .ok_or_else(|| GravionError::invalid_strategy(format!("unknown strategy '{name}'")))
    }

    fn list(&self) -> Result<Vec<StrategyInfo>, GravionError> {
        Ok(self.strategies.iter().map(StrategyInfo::from_strategy).collect())
    }
}

/// Parse one declarative strategy file.
pub fn load_file(path: &Path) -> Result<Strategy, GravionError> {
    let content = fs::read_to_string(path)?;
    let strategy = DeclarativeStrategy::from_json(&content).map_err(|e| match e {
        GravionError::InvalidStrategy { reason } => {
            GravionError::invalid_strategy(format!("{}: {reason}", path.display()))
        }
        other => other,
    })?;
    Ok(Strategy::Declarative(strategy))
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, GravionError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}
