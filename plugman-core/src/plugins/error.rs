//! Lifecycle error types

use thiserror::Error;

/// Errors from turning an identifier into a descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Nothing is registered under any candidate name
    #[error("plugin '{id}' not found (tried: {})", .candidates.join(", "))]
    NotFound { id: String, candidates: Vec<String> },

    /// Something was found but did not produce a usable descriptor
    #[error("plugin '{id}' is malformed: {reason}")]
    Malformed { id: String, reason: String },
}

/// Errors from load/unload.
///
/// None of these reach the host facade: the manager logs them and reports a
/// boolean.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The resolver could not produce a descriptor
    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// The descriptor's factory failed or panicked
    #[error("plugin '{plugin}' init failed: {reason}")]
    Init { plugin: String, reason: String },

    /// The `load` hook failed or panicked; the instance is still registered
    #[error("plugin '{plugin}' load hook failed: {reason}")]
    LoadHook { plugin: String, reason: String },

    /// The `unload` hook failed or panicked; the instance stays live
    #[error("plugin '{plugin}' unload hook failed: {reason}")]
    UnloadHook { plugin: String, reason: String },

    /// No live instance under this name
    #[error("plugin '{plugin}' is not loaded")]
    NotLoaded { plugin: String },
}

impl LifecycleError {
    /// Name of the plugin (or requested id) the error is about
    pub fn plugin(&self) -> &str {
        match self {
            LifecycleError::Resolution(ResolutionError::NotFound { id, .. })
            | LifecycleError::Resolution(ResolutionError::Malformed { id, .. }) => id,
            LifecycleError::Init { plugin, .. }
            | LifecycleError::LoadHook { plugin, .. }
            | LifecycleError::UnloadHook { plugin, .. }
            | LifecycleError::NotLoaded { plugin } => plugin,
        }
    }
}
