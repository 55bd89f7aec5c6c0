//! # idxscan-config
//!
//! Configuration management for idxscan.
//!
//! Loads configuration from:
//! 1. `~/.idxscan/config.toml` (global)
//! 2. `.idxscan/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority below CLI flags)

pub mod logging;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name skipped by default: the chunk store itself
pub const DEFAULT_SKIP_DIR: &str = ".chunks";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_API_PORT: u16 = 8080;

pub const ENV_WORKERS: &str = "IDXSCAN_WORKERS";
pub const ENV_QUEUE_CAPACITY: &str = "IDXSCAN_QUEUE_CAPACITY";
pub const ENV_WEB_PORT: &str = "IDXSCAN_WEB_PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML render error: {0}")]
    TomlRender(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub report: ReportConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        let mut config = Self::load_from(global.as_deref(), Some(Path::new(".idxscan/config.toml")))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from explicit global and project files; missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = global.filter(|p| p.exists()) {
            debug!("Loading global config from {:?}", global_path);
            config = Self::from_file(global_path)?;
        }

        if let Some(project_path) = project.filter(|p| p.exists()) {
            debug!("Loading project config from {:?}", project_path);
            let project_config = Self::from_file(project_path)?;
            config.merge(project_config);
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.idxscan/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".idxscan/config.toml"))
    }

    /// Merge a project config: any field that differs from the default wins.
    fn merge(&mut self, other: Config) {
        let defaults = Config::default();

        if other.scan.workers != defaults.scan.workers {
            self.scan.workers = other.scan.workers;
        }
        if other.scan.queue_capacity != defaults.scan.queue_capacity {
            self.scan.queue_capacity = other.scan.queue_capacity;
        }
        if other.scan.skip_dir != defaults.scan.skip_dir {
            self.scan.skip_dir = other.scan.skip_dir;
        }
        if other.scan.follow_links != defaults.scan.follow_links {
            self.scan.follow_links = other.scan.follow_links;
        }
        if other.report.top_chunks != defaults.report.top_chunks {
            self.report.top_chunks = other.report.top_chunks;
        }
        if other.report.top_files != defaults.report.top_files {
            self.report.top_files = other.report.top_files;
        }
        if other.report.print_refs != defaults.report.print_refs {
            self.report.print_refs = other.report.print_refs;
        }
        if other.api.host != defaults.api.host {
            self.api.host = other.api.host;
        }
        if other.api.port != defaults.api.port {
            self.api.port = other.api.port;
        }
    }

    /// Apply environment variable overrides. Unparseable values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = lookup(ENV_WORKERS).and_then(|v| v.parse().ok()) {
            self.scan.workers = n;
        }
        if let Some(n) = lookup(ENV_QUEUE_CAPACITY).and_then(|v| v.parse().ok()) {
            self.scan.queue_capacity = n;
        }
        if let Some(port) = lookup(ENV_WEB_PORT).and_then(|v| v.parse().ok()) {
            self.api.port = port;
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }
}

/// Directory walk and worker pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of decode workers
    pub workers: usize,
    /// Paths buffered between the walker and the workers
    pub queue_capacity: usize,
    /// Directory name whose subtree is never entered
    pub skip_dir: String,
    /// Descend through symlinked directories
    pub follow_links: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            skip_dir: DEFAULT_SKIP_DIR.to_string(),
            follow_links: false,
        }
    }
}

/// Which reports are printed after a scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Top N most referenced chunks (0 = skip)
    pub top_chunks: usize,
    /// Top N files by dedup ratio (0 = skip)
    pub top_files: usize,
    /// Dump every file's reference list
    pub print_refs: bool,
}

/// Read-only HTTP API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    /// 0 disables the API
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_API_PORT,
        }
    }
}

impl ApiConfig {
    pub fn enabled(&self) -> bool {
        self.port != 0
    }
}
