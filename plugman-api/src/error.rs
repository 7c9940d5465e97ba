//! Error types for plugin authors and endpoint callers

use std::fmt;

use thiserror::Error;

/// Errors that plugin hooks, factories and endpoint handlers can return
#[derive(Error, Debug)]
pub enum PluginError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input error (bad endpoint arguments, bad options)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A nested endpoint call made from inside a handler failed
    #[error("Call failed: {0}")]
    Call(#[from] Box<CallError>),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

impl PluginError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<CallError> for PluginError {
    fn from(err: CallError) -> Self {
        Self::Call(Box::new(err))
    }
}

/// The party an endpoint call was addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// The host application's own API
    Host,
    /// A plugin, by name
    Plugin(String),
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Host => write!(f, "application api"),
            Callee::Plugin(name) => write!(f, "plugin {name}"),
        }
    }
}

/// Errors from capability-gated endpoint dispatch
///
/// Unlike lifecycle failures these always reach the caller, who needs to be
/// able to branch on "capability absent".
#[derive(Error, Debug)]
pub enum CallError {
    /// The endpoint is not declared, or declared but not implemented
    #[error("{callee} does not expose endpoint {endpoint}")]
    EndpointNotExposed { callee: Callee, endpoint: String },

    /// No live plugin is registered under this name in the contributed map
    #[error("plugin {plugin} is not contributed")]
    NotContributed { plugin: String },

    /// The contribution outlived the host API it was bound to
    #[error("plugin {plugin} is no longer attached to a host")]
    HostUnavailable { plugin: String },

    /// The handler ran and returned an error
    #[error("{callee} endpoint {endpoint} failed: {source}")]
    Handler {
        callee: Callee,
        endpoint: String,
        #[source]
        source: PluginError,
    },

    /// The handler panicked
    #[error("{callee} endpoint {endpoint} panicked: {message}")]
    HandlerPanicked {
        callee: Callee,
        endpoint: String,
        message: String,
    },
}

impl CallError {
    /// True when the call was rejected by the capability check
    pub fn is_not_exposed(&self) -> bool {
        matches!(self, CallError::EndpointNotExposed { .. })
    }
}
