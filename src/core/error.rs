use serde::Serialize;
use thiserror::Error;

use super::types::AssumptionKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Arithmetic domain error: {0}")]
    ArithmeticDomain(String),

    #[error(
        "Balance sheet does not balance for scenario '{scenario}' in period {period}: \
         assets {assets} vs liabilities + equity {liabilities_and_equity}"
    )]
    BalanceInvariant {
        scenario: String,
        period: usize,
        assets: f64,
        liabilities_and_equity: f64,
    },
}

pub type ModelResult<T> = Result<T, ModelError>;

pub(crate) fn config_error(msg: impl Into<String>) -> ModelError {
    ModelError::Configuration(msg.into())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MissingAssumption {
    /// Key absent entirely, or flagged constant with no value.
    Key,
    /// Explicit sequence ended early; periods from `first_missing` on are zero.
    Periods { first_missing: usize },
}

/// Non-fatal: the missing values resolved to zero effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteAssumptionWarning {
    pub scenario: String,
    pub key: AssumptionKey,
    pub missing: MissingAssumption,
}

impl std::fmt::Display for IncompleteAssumptionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.missing {
            MissingAssumption::Key => write!(
                f,
                "scenario '{}': '{}' not provided, defaulting to 0",
                self.scenario,
                self.key.label()
            ),
            MissingAssumption::Periods { first_missing } => write!(
                f,
                "scenario '{}': '{}' missing from period {} on, defaulting to 0",
                self.scenario,
                self.key.label(),
                first_missing
            ),
        }
    }
}
