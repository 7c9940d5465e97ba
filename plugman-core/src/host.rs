//! HostFacade - the application-visible surface over one lifecycle manager

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use plugman_api::{CallContext, CallError, Contribution, HostApi, PluginError};
use serde_json::Value;

use crate::config::ManagerConfig;
use crate::error::HostError;
use crate::logger::{ManagerLogger, TracingLogger};
use crate::plugins::{LifecycleManager, LoadRequest, Resolver};

/// Host endpoint names registered by every facade
pub const LOAD_PLUGIN: &str = "load_plugin";
pub const UNLOAD_PLUGIN: &str = "unload_plugin";
pub const CHECK_PLUGIN: &str = "check_plugin";

/// Application facade.
///
/// Exposes `load_plugin`, `unload_plugin` and `check_plugin` both as methods
/// and as host endpoints, so plugins can drive the lifecycle through
/// `ctx.api.call(..)` the same way the application does.
#[derive(Debug, Clone)]
pub struct HostFacade {
    manager: Arc<LifecycleManager>,
}

impl HostFacade {
    /// Create a facade logging through `tracing`.
    ///
    /// Fails with [`HostError::MissingPluginPath`] when `config.plugin_path`
    /// is empty.
    pub fn new(config: ManagerConfig, resolver: Arc<dyn Resolver>) -> Result<Self, HostError> {
        Self::with_logger(config, resolver, Arc::new(TracingLogger))
    }

    pub fn with_logger(
        config: ManagerConfig,
        resolver: Arc<dyn Resolver>,
        logger: Arc<dyn ManagerLogger>,
    ) -> Result<Self, HostError> {
        if config.plugin_path.is_empty() {
            return Err(HostError::MissingPluginPath);
        }

        let manager = Arc::new(LifecycleManager::with_logger(config, resolver, logger));
        register_lifecycle_endpoints(manager.api(), Arc::downgrade(&manager));
        tracing::debug!(
            plugin_path = %manager.config().plugin_path,
            "plugin host ready"
        );

        Ok(Self { manager })
    }

    /// Load a plugin; `options` are the init arguments for a fresh resolution
    pub fn load_plugin(&self, id: &str, options: Option<Value>) -> bool {
        self.manager.load(
            id,
            LoadRequest {
                args: options,
                ..LoadRequest::default()
            },
        )
    }

    pub fn unload_plugin(&self, id: &str) -> bool {
        self.manager.unload(id)
    }

    pub fn check_plugin(&self, id: &str) -> bool {
        self.manager.check(id)
    }

    /// Snapshot of the contributed map
    pub fn contributed(&self) -> BTreeMap<String, Contribution> {
        self.manager.api().contributed()
    }

    pub fn contribution(&self, plugin: &str) -> Option<Contribution> {
        self.manager.api().contribution(plugin)
    }

    /// Call a host endpoint
    pub fn call(&self, endpoint: &str, args: &[Value]) -> Result<Value, CallError> {
        self.manager.api().call(endpoint, args)
    }

    /// Call a contributed endpoint of a live plugin
    pub fn call_plugin(
        &self,
        plugin: &str,
        endpoint: &str,
        args: &[Value],
    ) -> Result<Value, CallError> {
        self.manager.api().call_plugin(plugin, endpoint, args)
    }

    /// Add an application endpoint to the host API
    pub fn register_endpoint<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&CallContext, &[Value]) -> Result<Value, PluginError> + Send + Sync + 'static,
    {
        self.manager.api().register_endpoint(name, handler);
    }

    pub fn api(&self) -> &HostApi {
        self.manager.api()
    }

    pub fn manager(&self) -> &Arc<LifecycleManager> {
        &self.manager
    }
}

/// Register the lifecycle endpoints.
///
/// Handlers hold a weak reference: the manager owns the API, not the
/// other way round.
fn register_lifecycle_endpoints(api: &HostApi, manager: Weak<LifecycleManager>) {
    let weak = manager.clone();
    api.register_endpoint(LOAD_PLUGIN, move |_, args| {
        let manager = upgrade(&weak)?;
        let id = plugin_id(args)?;
        let request = LoadRequest {
            args: args.get(1).cloned(),
            ..LoadRequest::default()
        };
        Ok(Value::Bool(manager.load(id, request)))
    });

    let weak = manager.clone();
    api.register_endpoint(UNLOAD_PLUGIN, move |_, args| {
        let manager = upgrade(&weak)?;
        Ok(Value::Bool(manager.unload(plugin_id(args)?)))
    });

    api.register_endpoint(CHECK_PLUGIN, move |_, args| {
        let manager = upgrade(&manager)?;
        Ok(Value::Bool(manager.check(plugin_id(args)?)))
    });
}

fn upgrade(manager: &Weak<LifecycleManager>) -> Result<Arc<LifecycleManager>, PluginError> {
    manager
        .upgrade()
        .ok_or_else(|| PluginError::custom("plugin manager has been dropped"))
}

fn plugin_id(args: &[Value]) -> Result<&str, PluginError> {
    args.first()
        .and_then(Value::as_str)
        .ok_or_else(|| PluginError::invalid_input("expected a plugin id as the first argument"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::MemoryResolver;
    use plugman_api::PluginDefinition;
    use serde_json::json;

    fn facade() -> HostFacade {
        let resolver = MemoryResolver::new("acme")
            .with(PluginDefinition::new("echo").contributed_endpoint("ping", |_, args| {
                Ok(args.first().cloned().unwrap_or(Value::Null))
            }));
        HostFacade::new(ManagerConfig::with_plugin_path("acme"), Arc::new(resolver)).unwrap()
    }

    #[test]
    fn test_missing_plugin_path_fails_fast() {
        let err = HostFacade::new(ManagerConfig::default(), Arc::new(MemoryResolver::default()))
            .unwrap_err();
        assert_eq!(err, HostError::MissingPluginPath);
    }

    #[test]
    fn test_lifecycle_endpoints_are_registered() {
        let host = facade();
        let names = host.api().endpoint_names();
        assert!(names.contains(&LOAD_PLUGIN.to_string()));
        assert!(names.contains(&UNLOAD_PLUGIN.to_string()));
        assert!(names.contains(&CHECK_PLUGIN.to_string()));
    }

    #[test]
    fn test_load_call_unload_through_methods() {
        let host = facade();
        assert!(host.load_plugin("echo", None));
        assert_eq!(
            host.call_plugin("echo", "ping", &[json!(42)]).unwrap(),
            json!(42)
        );
        assert!(host.contributed().contains_key("echo"));
        assert!(host.unload_plugin("echo"));
        assert!(host.contribution("echo").is_none());
        assert!(host.check_plugin("echo"));
    }

    #[test]
    fn test_load_through_host_endpoint() {
        let host = facade();
        assert_eq!(
            host.call(LOAD_PLUGIN, &[json!("acme-echo"), json!({})]).unwrap(),
            json!(true)
        );
        assert!(host.manager().is_loaded("echo"));
        assert_eq!(host.call(CHECK_PLUGIN, &[json!("ghost")]).unwrap(), json!(false));
        assert_eq!(host.call(UNLOAD_PLUGIN, &[json!("echo")]).unwrap(), json!(true));
    }

    #[test]
    fn test_endpoint_rejects_missing_id() {
        let host = facade();
        let err = host.call(LOAD_PLUGIN, &[json!(7)]).unwrap_err();
        assert!(matches!(err, CallError::Handler { .. }));
    }

    #[test]
    fn test_unknown_host_endpoint_not_exposed() {
        let host = facade();
        assert!(host.call("reboot", &[]).unwrap_err().is_not_exposed());
    }

    #[test]
    fn test_application_endpoints() {
        let host = facade();
        host.register_endpoint("version", |_, _| Ok(json!("1.0")));
        assert_eq!(host.call("version", &[]).unwrap(), json!("1.0"));
    }

    #[test]
    fn test_endpoint_fails_after_manager_dropped() {
        let host = facade();
        let api = host.api().clone();
        drop(host);

        let err = api.call(CHECK_PLUGIN, &[json!("echo")]).unwrap_err();
        assert!(err.to_string().contains(CHECK_PLUGIN));
    }
}
