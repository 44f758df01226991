//! INI file configuration adapter.
//!
//! Also serves named symbol lists from the `[portfolios]` section, one
//! `name = SYM1,SYM2,...` entry per portfolio.

use crate::domain::error::GravionError;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use crate::ports::portfolio_port::PortfolioPort;
use configparser::ini::Ini;
use std::path::Path;

const PORTFOLIOS: &str = "portfolios";

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(|e| std::io::Error::other(e))?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn section_keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl PortfolioPort for FileConfigAdapter {
    fn symbols(&self, name: &str) -> Result<Vec<String>, GravionError> {
        let raw = self
            .get_string(PORTFOLIOS, name)
            .ok_or_else(|| GravionError::ConfigMissing {
                section: PORTFOLIOS.into(),
                key: name.to_string(),
            })?;
        parse_symbols(&raw).map_err(|e| GravionError::ConfigInvalid {
            section: PORTFOLIOS.into(),
            key: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn portfolio_names(&self) -> Vec<String> {
        self.section_keys(PORTFOLIOS)
    }
}
