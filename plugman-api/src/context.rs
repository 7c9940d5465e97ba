//! CallContext - the restricted view a hook or handler gets of the host

use crate::host::{Contribution, HostApi};
use crate::types::Descriptor;

/// Who is running: the `info` half of a [`CallContext`]
#[derive(Debug, Clone)]
pub enum CallInfo {
    /// A host endpoint is running
    Host,
    /// A lifecycle hook is running for the plugin behind this descriptor
    Descriptor(Descriptor),
    /// An endpoint of this live plugin is running
    Plugin(Contribution),
}

impl CallInfo {
    /// Name of the plugin the code belongs to, `None` for host endpoints
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            CallInfo::Host => None,
            CallInfo::Descriptor(descriptor) => Some(descriptor.name()),
            CallInfo::Plugin(contribution) => Some(contribution.name()),
        }
    }

    /// The descriptor behind the running code, if it belongs to a plugin
    pub fn descriptor(&self) -> Option<&Descriptor> {
        match self {
            CallInfo::Host => None,
            CallInfo::Descriptor(descriptor) => Some(descriptor),
            CallInfo::Plugin(contribution) => Some(contribution.descriptor()),
        }
    }
}

/// Execution context handed to every hook and endpoint handler.
///
/// Exposes only the host-wide API surface and a reference to the running
/// plugin's own descriptor or contribution. Handlers never see the lifecycle
/// manager's tables.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// The host API, including the contributed map of every live plugin
    pub api: HostApi,
    /// The descriptor or live contribution of the code being run
    pub info: CallInfo,
}

impl CallContext {
    pub fn new(api: HostApi, info: CallInfo) -> Self {
        Self { api, info }
    }

    /// A context bound to a fresh, empty host API.
    ///
    /// Useful for exercising hooks and handlers outside a manager.
    pub fn detached() -> Self {
        Self::new(HostApi::new(), CallInfo::Host)
    }

    fn log_target(&self) -> &str {
        self.info.plugin_name().unwrap_or("host")
    }

    // ─── Logging ─────────────────────────────────────────────────────

    /// Log an info message (tagged with the plugin name)
    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.log_target(), "{}", message);
    }

    /// Log a warning message
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(plugin = %self.log_target(), "{}", message);
    }

    /// Log an error message
    pub fn log_error(&self, message: &str) {
        tracing::error!(plugin = %self.log_target(), "{}", message);
    }

    /// Log a debug message
    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.log_target(), "{}", message);
    }
}
