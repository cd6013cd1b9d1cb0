//! Configuration management for kubegraph.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `kubegraph.toml` file
//! 3. User config `~/.config/kubegraph/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::layout::{LayoutOptions, LayoutSeed, StrategyKind};

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Writer loop configuration.
    pub engine: EngineConfig,

    /// Layout configuration.
    pub layout: LayoutConfig,

    /// Snapshot history storage.
    pub storage: StorageConfig,

    /// Export configuration.
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./kubegraph.toml` (project local)
    /// 2. `~/.config/kubegraph/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("kubegraph.toml").exists() {
            return Self::from_file("kubegraph.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("kubegraph").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // Engine overrides
        if let Some(n) = env_parse("KUBEGRAPH_INTAKE_CAPACITY") {
            self.engine.intake_capacity = n;
        }
        if let Some(n) = env_parse("KUBEGRAPH_PENDING_HORIZON_SECS") {
            self.engine.pending_horizon_secs = n;
        }

        // Layout overrides
        if let Ok(strategy) = std::env::var("KUBEGRAPH_LAYOUT_STRATEGY") {
            self.layout.strategy = strategy;
        }
        if let Ok(seed) = std::env::var("KUBEGRAPH_LAYOUT_SEED") {
            self.layout.seed = Some(seed);
        }

        // Storage overrides
        if let Ok(dir) = std::env::var("KUBEGRAPH_DATA_DIR") {
            self.storage.data_dir = dir;
        }
        if let Some(n) = env_parse("KUBEGRAPH_MAX_SNAPSHOTS") {
            self.storage.max_snapshots = n;
        }

        // Export overrides
        if let Some(n) = env_parse("KUBEGRAPH_MAX_NODES") {
            self.export.max_nodes = n;
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.intake_capacity == 0 {
            return Err(ConfigError::Invalid("engine.intake_capacity must be positive".into()));
        }
        if self.engine.max_batch == 0 {
            return Err(ConfigError::Invalid("engine.max_batch must be positive".into()));
        }
        if self.engine.delta_capacity == 0 {
            return Err(ConfigError::Invalid("engine.delta_capacity must be positive".into()));
        }
        self.layout.strategy_kind()?;
        if !self.layout.spacing.is_finite() || self.layout.spacing <= 0.0 {
            return Err(ConfigError::Invalid("layout.spacing must be a positive number".into()));
        }
        if self.export.max_nodes == 0 {
            return Err(ConfigError::Invalid("export.max_nodes must be positive".into()));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Single-writer engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounded intake queue capacity.
    pub intake_capacity: usize,

    /// Maximum messages applied per published snapshot.
    pub max_batch: usize,

    /// Seconds before an unresolved pending edge is dropped.
    pub pending_horizon_secs: u64,

    /// Seconds between expiry sweeps.
    pub expiry_interval_secs: u64,

    /// Delta broadcast buffer per subscriber.
    pub delta_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            max_batch: DEFAULT_MAX_BATCH,
            pending_horizon_secs: DEFAULT_PENDING_HORIZON_SECS,
            expiry_interval_secs: DEFAULT_EXPIRY_INTERVAL_SECS,
            delta_capacity: DEFAULT_DELTA_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn pending_horizon(&self) -> Duration {
        Duration::from_secs(self.pending_horizon_secs)
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_interval_secs.max(1))
    }
}

/// Layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Strategy name: "force", "layered", or "grid".
    pub strategy: String,

    /// Force-directed iterations.
    pub iterations: usize,

    /// Spacing between related nodes.
    pub spacing: f64,

    /// Explicit seed (hex or decimal). Derived from the graph when unset.
    pub seed: Option<String>,

    /// Components above this size fall back to the layered strategy.
    pub force_node_limit: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            strategy: DEFAULT_LAYOUT_STRATEGY.to_string(),
            iterations: DEFAULT_LAYOUT_ITERATIONS,
            spacing: DEFAULT_LAYOUT_SPACING,
            seed: None, // Derive from the node and edge ids
            force_node_limit: DEFAULT_FORCE_NODE_LIMIT,
        }
    }
}

impl LayoutConfig {
    pub fn strategy_kind(&self) -> Result<StrategyKind, ConfigError> {
        self.strategy.parse().map_err(ConfigError::Invalid)
    }

    pub fn options(&self) -> LayoutOptions {
        LayoutOptions {
            iterations: self.iterations,
            spacing: self.spacing,
            force_node_limit: self.force_node_limit,
        }
    }

    pub fn seed(&self) -> Option<LayoutSeed> {
        self.seed.as_deref().map(LayoutSeed::parse)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for kubegraph data (default: ".kubegraph").
    pub data_dir: String,

    /// Snapshot subdirectory name.
    pub snapshots_dir: String,

    /// Snapshots kept before pruning the oldest.
    pub max_snapshots: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            snapshots_dir: DEFAULT_SNAPSHOTS_DIR.to_string(),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        }
    }
}

impl StorageConfig {
    /// Get the full path to the snapshots directory.
    pub fn snapshots_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.snapshots_dir)
    }
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Format used when none is given: "svg", "png", "pdf", "json" or "drawio".
    pub default_format: String,

    /// Node cap for served views and exports.
    pub max_nodes: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: DEFAULT_EXPORT_FORMAT.to_string(),
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.max_batch, DEFAULT_MAX_BATCH);
        assert_eq!(config.layout.strategy, DEFAULT_LAYOUT_STRATEGY);
        assert_eq!(config.storage.data_dir, DEFAULT_DATA_DIR);
        assert_eq!(config.export.max_nodes, DEFAULT_MAX_NODES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_to_toml() {
        let toml_str = Config::default_config_string();
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[layout]"));
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[export]"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[engine]
max_batch = 16

[layout]
strategy = "layered"
seed = "42"

[storage]
data_dir = ".custom-kubegraph"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.max_batch, 16);
        assert_eq!(config.engine.intake_capacity, DEFAULT_INTAKE_CAPACITY);
        assert_eq!(config.layout.strategy_kind().unwrap(), StrategyKind::Layered);
        assert_eq!(config.layout.seed(), Some(LayoutSeed::from_u64(42)));
        assert_eq!(config.storage.snapshots_path(), PathBuf::from(".custom-kubegraph/snapshots"));
    }

    #[test]
    fn test_invalid_strategy() {
        let mut config = Config::default();
        config.layout.strategy = "spiral".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
