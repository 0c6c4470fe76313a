//! Arbor configuration system.
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./arbor.yaml` (current directory - highest priority)
//! 2. `~/.config/arbor/arbor.yaml` (user config directory)
//! 3. `/etc/arbor/arbor.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority
//! files. The YAML structure mirrors the sysctl-style paths used below,
//! e.g. `node.tree.announcement_interval_secs`:
//!
//! ```yaml
//! node:
//!   tree:
//!     announcement_interval_secs: 900
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::{Identity, IdentityError};

/// Default config filename.
const CONFIG_FILENAME: &str = "arbor.yaml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
}

/// Identity configuration (`node.identity.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Hex-encoded secret key (`node.identity.secret`). If not specified,
    /// a new keypair will be generated on startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Spanning tree parameters (`node.tree.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Root announcement interval in seconds
    /// (`node.tree.announcement_interval_secs`).
    #[serde(default = "TreeConfig::default_announcement_interval_secs")]
    pub announcement_interval_secs: u64,
    /// Hysteresis window after a parent regression, in milliseconds
    /// (`node.tree.reparent_wait_ms`).
    #[serde(default = "TreeConfig::default_reparent_wait_ms")]
    pub reparent_wait_ms: u64,
    /// Per-peer outbound protocol queue depth
    /// (`node.tree.peer_queue_capacity`).
    #[serde(default = "TreeConfig::default_peer_queue_capacity")]
    pub peer_queue_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            announcement_interval_secs: 900,
            reparent_wait_ms: 1000,
            peer_queue_capacity: 64,
        }
    }
}

impl TreeConfig {
    fn default_announcement_interval_secs() -> u64 {
        900
    }
    fn default_reparent_wait_ms() -> u64 {
        1000
    }
    fn default_peer_queue_capacity() -> usize {
        64
    }

    /// Interval between root announcements while acting as root.
    pub fn announcement_interval(&self) -> Duration {
        Duration::from_secs(self.announcement_interval_secs)
    }

    /// A peer's announcement is presumed dead after this long: twice the
    /// announcement interval, so one missed refresh is tolerated.
    pub fn announcement_timeout(&self) -> Duration {
        2 * self.announcement_interval()
    }

    /// The anti-flap window after the parent regresses.
    pub fn reparent_wait(&self) -> Duration {
        Duration::from_millis(self.reparent_wait_ms)
    }
}

/// Node configuration (`node.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity settings (`node.identity.*`).
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Spanning tree settings (`node.tree.*`).
    #[serde(default)]
    pub tree: TreeConfig,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node configuration (`node.*`).
    #[serde(default)]
    pub node: NodeConfig,
}

impl Config {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Files are loaded in reverse priority order and merged. Returns the
    /// merged config plus the paths that were actually loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier
    /// ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/arbor").join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("arbor").join(CONFIG_FILENAME));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        if other.node.identity.secret.is_some() {
            self.node.identity.secret = other.node.identity.secret;
        }
        let defaults = TreeConfig::default();
        let tree = other.node.tree;
        if tree.announcement_interval_secs != defaults.announcement_interval_secs {
            self.node.tree.announcement_interval_secs = tree.announcement_interval_secs;
        }
        if tree.reparent_wait_ms != defaults.reparent_wait_ms {
            self.node.tree.reparent_wait_ms = tree.reparent_wait_ms;
        }
        if tree.peer_queue_capacity != defaults.peer_queue_capacity {
            self.node.tree.peer_queue_capacity = tree.peer_queue_capacity;
        }
    }

    /// Create an Identity from this configuration.
    ///
    /// Uses the configured secret if present, otherwise generates a new
    /// random identity.
    pub fn create_identity(&self) -> Result<Identity, ConfigError> {
        match &self.node.identity.secret {
            Some(secret) => Ok(Identity::from_secret_hex(secret)?),
            None => Ok(Identity::generate()),
        }
    }

    /// Check if an identity is configured (vs. will be generated).
    pub fn has_identity(&self) -> bool {
        self.node.identity.secret.is_some()
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
