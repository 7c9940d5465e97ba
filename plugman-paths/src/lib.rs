//! XDG Base Directory paths for plugman.
//!
//! The manager only ever looks in one place on disk: the config directory,
//! where `manager.toml` lives. XDG paths are used on every platform.

use std::path::PathBuf;

/// Name of the application directory under the XDG base directories.
const APP_DIR: &str = "plugman";

/// Get the plugman config directory.
///
/// Returns `$XDG_CONFIG_HOME/plugman` if set, otherwise `~/.config/plugman`.
///
/// # Examples
///
/// ```
/// use plugman_paths::config_dir;
///
/// let config = config_dir();
/// let manager_toml = config.join("manager.toml");
/// ```
pub fn config_dir() -> PathBuf {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config) if !xdg_config.is_empty() => PathBuf::from(xdg_config).join(APP_DIR),
        _ => dirs::home_dir()
            .map(|home| home.join(".config").join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(APP_DIR)),
    }
}

/// Path of the manager configuration file inside [`config_dir`].
pub fn manager_config_file() -> PathBuf {
    config_dir().join("manager.toml")
}
