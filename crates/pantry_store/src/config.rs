//! Registry configuration
//!
//! A registry can be configured in code or from a TOML table:
//!
//! ```toml
//! label = "checkout"
//! log_getter_evaluations = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for a [`StoreRegistry`](crate::StoreRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Name attached to the registry's tracing spans
    pub label: String,
    /// Emit a debug event every time a getter body runs
    pub log_getter_evaluations: bool,
}

fn default_label() -> String {
    "app".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            log_getter_evaluations: false,
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse registry configuration")
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_getter_logging(mut self, enabled: bool) -> Self {
        self.log_getter_evaluations = enabled;
        self
    }
}
