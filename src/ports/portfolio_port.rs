//! Named symbol lists.

use crate::domain::error::GravionError;

pub trait PortfolioPort {
    fn symbols(&self, name: &str) -> Result<Vec<String>, GravionError>;

    fn portfolio_names(&self) -> Vec<String>;
}
