//! Logger injected into the lifecycle manager

/// Sink for lifecycle diagnostics.
///
/// The manager reports every handled failure through `error` and routine
/// transitions through `debug`. Implementations must not call back into the
/// manager.
pub trait ManagerLogger: Send + Sync {
    fn debug(&self, plugin: &str, message: &str);
    fn error(&self, plugin: &str, message: &str);
}

/// Default logger: forwards to `tracing` with a structured `plugin` field
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ManagerLogger for TracingLogger {
    fn debug(&self, plugin: &str, message: &str) {
        tracing::debug!(plugin = %plugin, "{}", message);
    }

    fn error(&self, plugin: &str, message: &str) {
        tracing::error!(plugin = %plugin, "{}", message);
    }
}
