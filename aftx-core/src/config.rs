//! Runtime configuration.
//!
//! Configuration is optional: with no file every field falls back to a built-in default. The
//! loaded value is passed explicitly to the components that need it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "AFTX_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "aftx.toml";
pub const ADB_PATH_ENV: &str = "AFTX_ADB_PATH";
pub const FASTBOOT_PATH_ENV: &str = "AFTX_FASTBOOT_PATH";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub http: HttpConfig,
    pub tools: ToolsConfig,
    pub timeouts: TimeoutConfig,
    pub markers: MarkerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub downloads_dir: PathBuf,
    /// Action log location; defaults to `actions.jsonl` inside `downloads_dir`.
    pub action_log: Option<PathBuf>,
    pub details_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            action_log: None,
            details_file: PathBuf::from("details.txt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Whole-request timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("aftx/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub adb: String,
    pub fastboot: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            adb: "adb".to_string(),
            fastboot: "fastboot".to_string(),
        }
    }
}

/// Per-command-type timeouts in seconds. 0 means block until the tool exits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub list_secs: u64,
    pub flash_secs: u64,
    pub reboot_secs: u64,
    pub extract_secs: u64,
    pub shell_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            list_secs: 30,
            flash_secs: 600,
            reboot_secs: 60,
            extract_secs: 1800,
            shell_secs: 30,
        }
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

impl TimeoutConfig {
    pub fn list(&self) -> Option<Duration> {
        secs(self.list_secs)
    }

    pub fn flash(&self) -> Option<Duration> {
        secs(self.flash_secs)
    }

    pub fn reboot(&self) -> Option<Duration> {
        secs(self.reboot_secs)
    }

    pub fn extract(&self) -> Option<Duration> {
        secs(self.extract_secs)
    }

    pub fn shell(&self) -> Option<Duration> {
        secs(self.shell_secs)
    }
}

/// Output markers used to interpret tool output.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MarkerConfig {
    pub flash_success: Vec<String>,
    /// Opt-in vetoes; empty by default so bootloader chatter cannot fail a good flash.
    pub flash_failure: Vec<String>,
    pub fastboot_states: Vec<String>,
    pub adb_online: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            flash_success: vec!["finished. total time".to_string()],
            flash_failure: Vec::new(),
            fastboot_states: vec!["fastboot".to_string()],
            adb_online: "\tdevice".to_string(),
        }
    }
}

/// Connection parameters for an external audit-record store. Not used by the core.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            schema: "pixel_db".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Lookup order: `explicit` (must exist), `$AFTX_CONFIG`, `./aftx.toml`, then defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = if let Some(path) = explicit {
            Self::from_file(path)?
        } else if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            if path.exists() {
                Self::from_file(&path)?
            } else {
                log::warn!(
                    "{} points at {}, which does not exist; using defaults",
                    CONFIG_ENV,
                    path.display()
                );
                Self::default()
            }
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        } else {
            log::debug!("no configuration file found; using defaults");
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid configuration TOML")
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(adb) = std::env::var(ADB_PATH_ENV) {
            self.tools.adb = adb;
        }
        if let Ok(fastboot) = std::env::var(FASTBOOT_PATH_ENV) {
            self.tools.fastboot = fastboot;
        }
        self
    }

    pub fn action_log_path(&self) -> PathBuf {
        self.paths
            .action_log
            .clone()
            .unwrap_or_else(|| self.paths.downloads_dir.join("actions.jsonl"))
    }
}
