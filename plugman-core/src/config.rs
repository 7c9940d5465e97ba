//! Manager configuration
//!
//! Stored as TOML, by default in `~/.config/plugman/manager.toml`:
//!
//! ```toml
//! plugin_path = "plugman"
//! auto_init = true
//! reload = "unload-first"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What a `load` does when the plugin's name is already live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadPolicy {
    /// Run the live instance's `unload` hook first; abort the load if it fails
    #[default]
    UnloadFirst,
    /// Replace the table entry without ever calling the old instance's `unload`
    Overwrite,
}

/// Configuration for a lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Plugin search prefix handed to the resolver
    #[serde(default)]
    pub plugin_path: String,
    /// Whether `load` runs the plugin's `load` hook unless told otherwise
    #[serde(default = "default_auto_init")]
    pub auto_init: bool,
    /// Behaviour when loading a name that is already live
    #[serde(default)]
    pub reload: ReloadPolicy,
}

fn default_auto_init() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            plugin_path: String::new(),
            auto_init: default_auto_init(),
            reload: ReloadPolicy::default(),
        }
    }
}

impl ManagerConfig {
    /// Config with the given plugin search prefix and defaults elsewhere
    pub fn with_plugin_path(plugin_path: impl Into<String>) -> Self {
        Self {
            plugin_path: plugin_path.into(),
            ..Self::default()
        }
    }

    /// Builder: set `auto_init`
    pub fn auto_init(mut self, auto_init: bool) -> Self {
        self.auto_init = auto_init;
        self
    }

    /// Builder: set the reload policy
    pub fn reload(mut self, reload: ReloadPolicy) -> Self {
        self.reload = reload;
        self
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        plugman_paths::manager_config_file()
    }

    /// Load configuration from a TOML file
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}
