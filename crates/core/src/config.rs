//! Configuration management
//!
//! The configuration file is TOML, stored at `~/.config/ferry/config.toml`
//! unless `FERRY_CONFIG_DIR` points elsewhere.
//!
//! Changes to `schema_version` require migration support.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::copy::OverlapPolicy;
use crate::error::{Error, Result};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "FERRY_CONFIG_DIR";

/// Default output format
const DEFAULT_OUTPUT: &str = "human";

/// Default color setting
const DEFAULT_COLOR: &str = "auto";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Transfer tuning for cp and mirror
    #[serde(default)]
    pub transfer: TransferDefaults,

    /// Configured aliases
    #[serde(default)]
    pub aliases: Vec<Alias>,
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            progress: true,
        }
    }
}

/// Transfer defaults applied when the command line does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDefaults {
    /// Number of concurrent transfers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Extra attempts for a transfer failing with a transient error
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Back-off step between attempts, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Object-store multipart part size, in bytes
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// What happens when two sources produce the same destination key
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

fn default_concurrency() -> usize {
    4
}

fn default_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_part_size() -> u64 {
    64 * 1024 * 1024
}

impl TransferDefaults {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for TransferDefaults {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            part_size: default_part_size(),
            overlap: OverlapPolicy::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            transfer: TransferDefaults::default(),
            aliases: Vec::new(),
        }
    }
}

/// Directory holding ferry's configuration and share history
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join("ferry"))
        .ok_or_else(|| Error::Config("Could not determine config directory".into()))
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_path = config_dir()?.join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// A missing file yields the default configuration. Older schema
    /// versions are migrated; newer ones are rejected.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| Error::from_io(e, self.config_path.display().to_string()))?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade ferry.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories and restricts the file to its owner on Unix.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    fn migrate(&self, mut config: Config) -> Result<Config> {
        // Only one schema exists so far.
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.defaults.output, "human");
        assert_eq!(config.defaults.color, "auto");
        assert!(config.defaults.progress);
        assert_eq!(config.transfer.concurrency, 4);
        assert_eq!(config.transfer.retries, 3);
        assert_eq!(config.transfer.retry_backoff(), Duration::from_millis(200));
        assert_eq!(config.transfer.part_size, 64 * 1024 * 1024);
        assert_eq!(config.transfer.overlap, OverlapPolicy::LastWriteWins);
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let mut config = Config::default();
        config.transfer.concurrency = 16;
        config.transfer.overlap = OverlapPolicy::FirstWriteWins;
        config
            .aliases
            .push(Alias::new("test", "http://localhost:9000", "minioadmin", "minioadmin"));

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded.aliases.len(), 1);
        assert_eq!(loaded.aliases[0].name, "test");
        assert_eq!(loaded.transfer.concurrency, 16);
        assert_eq!(loaded.transfer.overlap, OverlapPolicy::FirstWriteWins);
    }

    #[test]
    fn test_partial_transfer_section_uses_defaults() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            "schema_version = 1\n[transfer]\nretries = 7\noverlap = \"first-write-wins\"\n",
        )
        .unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.transfer.retries, 7);
        assert_eq!(config.transfer.concurrency, 4);
        assert_eq!(config.transfer.overlap, OverlapPolicy::FirstWriteWins);
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!("schema_version = {}\n", SCHEMA_VERSION + 1);
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("newer than supported")
        );
    }
}
