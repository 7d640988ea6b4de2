//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.sealium.toml` files.

use crate::analysis::{MonthScope, DEFAULT_RECENT_LIMIT};
use crate::shell::DashboardSettings;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".sealium.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dashboard presentation settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Watch mode settings.
    #[serde(default)]
    pub watch: WatchConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Path to the store file.
    #[serde(default = "default_store")]
    pub store: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
            verbose: false,
        }
    }
}

fn default_store() -> PathBuf {
    PathBuf::from("sealium-store.json")
}

/// Dashboard presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Number of processed requests shown.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// How "issued this month" is decided.
    #[serde(default)]
    pub month_scope: MonthScope,

    /// Name shown when the admin record has neither name nor user id.
    #[serde(default = "default_fallback_display_name")]
    pub fallback_display_name: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
            month_scope: MonthScope::default(),
            fallback_display_name: default_fallback_display_name(),
        }
    }
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

fn default_fallback_display_name() -> String {
    "Admin".to_string()
}

/// Watch mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// How often the store file is checked for changes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    500
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref store) = args.store {
            self.general.store = store.clone();
        }
        if let Some(limit) = args.recent_limit {
            self.dashboard.recent_limit = limit;
        }
        if let Some(scope) = args.month_scope {
            self.dashboard.month_scope = scope;
        }
        if let Some(interval) = args.poll_interval {
            self.watch.poll_interval_ms = interval;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Reject values that would break rendering or the watch loop.
    ///
    /// Run after [`merge_with_args`](Self::merge_with_args) so file values
    /// get the same checks as flags.
    pub fn validate(&self) -> Result<()> {
        if self.dashboard.recent_limit == 0 {
            bail!("dashboard.recent_limit must be at least 1");
        }
        if self.watch.poll_interval_ms == 0 {
            bail!("watch.poll_interval_ms must be at least 1");
        }
        Ok(())
    }

    /// Settings handed to the dashboard controller.
    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            month_scope: self.dashboard.month_scope,
            recent_limit: self.dashboard.recent_limit,
            fallback_display_name: self.dashboard.fallback_display_name.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
