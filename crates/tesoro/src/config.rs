use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// Configuration for the notification subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// How many non-pending records the history list keeps.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Upper bound in seconds for a refresh round-trip; a slower refresh is
    /// discarded unapplied.
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
}

fn default_history_limit() -> usize {
    20
}

fn default_refresh_timeout() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            refresh_timeout_secs: default_refresh_timeout(),
        }
    }
}

/// Top-level configuration for the tesoro back office.
///
/// Loaded from a TOML file (typically `~/.tesoro/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Directory holding the database and other local state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Identity that bypasses capability lookups and holds delete rights.
    #[serde(default = "default_sentinel_identity")]
    pub sentinel_identity: String,

    /// Notification subsystem configuration.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_data_dir() -> PathBuf {
    dirs_or_default(".tesoro")
}

fn default_sentinel_identity() -> String {
    "admin@tesoro.app".to_string()
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sentinel_identity: default_sentinel_identity(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.sentinel_identity.trim().is_empty() || !self.sentinel_identity.contains('@') {
            return Err(RootError::Config(format!(
                "sentinel_identity must be an email address, got '{}'",
                self.sentinel_identity
            )));
        }
        if self.notifications.history_limit == 0 {
            return Err(RootError::Config("history_limit must be > 0".into()));
        }
        if self.notifications.refresh_timeout_secs == 0 {
            return Err(RootError::Config("refresh_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Path of the sqlite database inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("tesoro.db")
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".tesoro/config.toml")
    }
}
