//! Error types for plugman-core

use thiserror::Error;

pub use crate::plugins::{LifecycleError, ResolutionError};

/// Errors constructing the host facade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// `plugin_path` was empty
    #[error("plugin path is not defined")]
    MissingPluginPath,
}

/// Errors reading or writing the manager configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
