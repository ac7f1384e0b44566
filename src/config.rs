//! Configuration for the analysis engine.
//!
//! All resolution walks are bounded (constant folding is deliberately not
//! whole-program dataflow); the bounds live here instead of being
//! hard-coded so embedders can tighten them for huge sources.
//!
//! # Configuration File Format
//!
//! ```toml
//! [resolver]
//! max_inline_depth = 32
//! max_assignment_sites = 8
//!
//! [dialects]
//! disabled = ["fluent-criteria"]
//! ```

use std::{env, fs, path::PathBuf};

use serde::Deserialize;

use crate::error::{AppResult, config_error};

/// Engine configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub dialects: DialectsConfig
}

/// Bounds for the reference and namespace resolvers
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Maximum definition-follow depth before a value degrades to runtime
    #[serde(default = "default_inline_depth")]
    pub max_inline_depth: u32,
    /// Maximum number of field assignment sites examined for consistency
    #[serde(default = "default_assignment_sites")]
    pub max_assignment_sites: usize
}

fn default_inline_depth() -> u32 {
    32
}

fn default_assignment_sites() -> usize {
    8
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_inline_depth:     default_inline_depth(),
            max_assignment_sites: default_assignment_sites()
        }
    }
}

/// Dialect enablement
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DialectsConfig {
    /// Disabled dialect names (`driver-builder`, `fluent-criteria`)
    #[serde(default)]
    pub disabled: Vec<String>
}

impl DialectsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        !self
            .disabled
            .iter()
            .any(|disabled| disabled.eq_ignore_ascii_case(name))
    }
}

impl AnalyzerConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config: {}", e)))
    }

    /// Load configuration from file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. `MQL_ANALYZER_CONFIG` environment variable (path to a TOML file)
    /// 2. Config file in current directory (.mql-analyzer.toml)
    /// 3. Default values
    pub fn load() -> AppResult<Self> {
        let mut path = PathBuf::from(".mql-analyzer.toml");

        if let Some(override_path) = env::var_os("MQL_ANALYZER_CONFIG") {
            path = PathBuf::from(override_path);
        }

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }
}
