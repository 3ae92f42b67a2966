use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for labeling and reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix labels with the 1-based line number
    pub label_line_numbers: bool,

    /// Stop gathering label text once this many characters are collected
    pub label_max_chars: usize,

    /// Never read more than this many lines for one label
    pub label_max_lines: usize,

    /// Include the enclosing symbol path in labels
    pub breadcrumbs: bool,

    /// Delay before a coalesced re-run of reconciliation
    pub coalesce_delay_ms: u64,

    /// Upper bound on one symbol outline query
    pub symbol_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            label_line_numbers: true,
            label_max_chars: 60,
            label_max_lines: 6,
            breadcrumbs: true,
            coalesce_delay_ms: 10,
            symbol_timeout_ms: 1500,
        }
    }
}

impl EngineConfig {
    /// Plain labels: no line numbers, no symbol lookups
    pub fn minimal() -> Self {
        Self {
            label_line_numbers: false,
            breadcrumbs: false,
            ..Default::default()
        }
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(config)
    }

    #[must_use]
    pub const fn coalesce_delay(&self) -> Duration {
        Duration::from_millis(self.coalesce_delay_ms)
    }

    #[must_use]
    pub const fn symbol_timeout(&self) -> Duration {
        Duration::from_millis(self.symbol_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.label_max_chars == 0 {
            return Err("label_max_chars must be > 0".to_string());
        }
        if self.label_max_lines == 0 {
            return Err("label_max_lines must be > 0".to_string());
        }
        if self.symbol_timeout_ms == 0 {
            return Err("symbol_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}
