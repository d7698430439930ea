//! Configuration
//!
//! Layout and viewport defaults for the CLI.
//! Stored in `~/.config/wfgraph/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags
//! 2. Environment variables (`WFGRAPH_DIRECTION`, `WFGRAPH_VIEWPORT_WIDTH`, `WFGRAPH_VIEWPORT_HEIGHT`)
//! 3. Config file
//! 4. Defaults

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::graph::{LayoutConfig, Viewport};

pub const ENV_DIRECTION: &str = "WFGRAPH_DIRECTION";
pub const ENV_VIEWPORT_WIDTH: &str = "WFGRAPH_VIEWPORT_WIDTH";
pub const ENV_VIEWPORT_HEIGHT: &str = "WFGRAPH_VIEWPORT_HEIGHT";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub viewport: Viewport,
}

impl GraphConfig {
    /// `~/.config/wfgraph/` on Unix, `%APPDATA%/wfgraph/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wfgraph")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default location; defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path (must exist)
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| GraphError::ConfigError {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| GraphError::ConfigError {
            reason: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Merge with environment variables
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Merge with variables from `lookup` (empty values are ignored)
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(direction) = get(ENV_DIRECTION) {
            self.layout.direction = direction.parse()?;
        }
        if let Some(width) = get(ENV_VIEWPORT_WIDTH) {
            self.viewport.width = parse_dimension(ENV_VIEWPORT_WIDTH, &width)?;
        }
        if let Some(height) = get(ENV_VIEWPORT_HEIGHT) {
            self.viewport.height = parse_dimension(ENV_VIEWPORT_HEIGHT, &height)?;
        }

        Ok(self)
    }
}

fn parse_dimension(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| GraphError::ConfigError {
            reason: format!("{key} must be a positive number, got '{value}'"),
        })
        .and_then(|v| positive(key, v))
}

/// Viewport sizes and zoom must be finite and > 0
pub fn positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(GraphError::ConfigError {
            reason: format!("{name} must be a positive number, got '{value}'"),
        })
    }
}
