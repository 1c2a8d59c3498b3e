use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// What happens when two realizations land in the same (indicator, quarter) slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The record processed last replaces earlier ones.
    #[default]
    LastWins,
    FirstWins,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Nest proxy rows under the row of their parent IKU.
    pub nest_proxies: bool,
    /// Emit a row for every indicator, including ones with no realization yet.
    pub include_unreported: bool,
    /// Only aggregate records of this reporting year. Records without a year are kept.
    pub year: Option<i32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::LastWins,
            nest_proxies: true,
            include_unreported: true,
            year: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Whether a record of `year` belongs to the configured reporting year.
    pub fn accepts_year(&self, year: Option<i32>) -> bool {
        match (self.year, year) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}
