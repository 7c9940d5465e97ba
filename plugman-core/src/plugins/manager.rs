//! LifecycleManager - resolve, instantiate, register and tear down plugins

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use plugman_api::{
    CallContext, CallInfo, Contribution, Descriptor, EndpointRouter, HostApi, PluginError,
    panic_message,
};
use serde_json::{Map, Value};

use super::cache::DescriptorCache;
use super::error::{LifecycleError, ResolutionError};
use super::instance::{PluginInfo, PluginInstance, PluginState};
use super::resolver::Resolver;
use crate::config::{ManagerConfig, ReloadPolicy};
use crate::logger::{ManagerLogger, TracingLogger};

/// Options for a single [`LifecycleManager::load`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadRequest {
    /// Init arguments handed to the resolver; `None` means `{}`
    pub args: Option<Value>,
    /// Whether to run the `load` hook; `None` uses the configured default
    pub auto_init: Option<bool>,
    /// Resolve only, without instantiating or registering
    pub check: bool,
}

impl LoadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dry-run resolution
    pub fn check_only() -> Self {
        Self {
            check: true,
            ..Self::default()
        }
    }

    pub fn args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn auto_init(mut self, auto_init: bool) -> Self {
        self.auto_init = Some(auto_init);
        self
    }
}

/// Successful result of [`LifecycleManager::try_load`]
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// `check` request: the identifier resolves to this plugin name
    Checked { name: String },
    /// A new instance is live. Its `load` hook may still have failed.
    Loaded(Arc<PluginInstance>),
}

impl LoadOutcome {
    pub fn name(&self) -> &str {
        match self {
            LoadOutcome::Checked { name } => name,
            LoadOutcome::Loaded(instance) => instance.name(),
        }
    }
}

/// The lifecycle manager.
///
/// Owns the descriptor cache and the live-instance table, and registers every
/// live plugin in the host API's contributed map. Per plugin name the state
/// moves `Unresolved -> Cached -> Live`, and back to `Cached` on unload.
///
/// Every call into plugin code runs behind a failure boundary: errors and
/// panics are turned into [`LifecycleError`]s, and the boolean operations
/// ([`load`](Self::load), [`check`](Self::check), [`unload`](Self::unload))
/// log them instead of returning them.
pub struct LifecycleManager {
    config: ManagerConfig,
    resolver: Arc<dyn Resolver>,
    logger: Arc<dyn ManagerLogger>,
    api: HostApi,
    cache: RwLock<DescriptorCache>,
    live: RwLock<HashMap<String, Arc<PluginInstance>>>,
}

impl LifecycleManager {
    /// Create a manager that logs through `tracing`
    pub fn new(config: ManagerConfig, resolver: Arc<dyn Resolver>) -> Self {
        Self::with_logger(config, resolver, Arc::new(TracingLogger))
    }

    pub fn with_logger(
        config: ManagerConfig,
        resolver: Arc<dyn Resolver>,
        logger: Arc<dyn ManagerLogger>,
    ) -> Self {
        Self::with_api(config, resolver, logger, HostApi::new())
    }

    /// Create a manager that registers plugins into an existing host API
    pub fn with_api(
        config: ManagerConfig,
        resolver: Arc<dyn Resolver>,
        logger: Arc<dyn ManagerLogger>,
        api: HostApi,
    ) -> Self {
        Self {
            config,
            resolver,
            logger,
            api,
            cache: RwLock::default(),
            live: RwLock::default(),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The host API plugins see as `ctx.api`
    pub fn api(&self) -> &HostApi {
        &self.api
    }

    fn cache(&self) -> RwLockReadGuard<'_, DescriptorCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, DescriptorCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<PluginInstance>>> {
        self.live.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<PluginInstance>>> {
        self.live.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Boolean API ─────────────────────────────────────────────────

    /// Load a plugin, returning whether it worked.
    ///
    /// A failing `load` hook still counts as loaded: the instance is
    /// registered with `load_success == false` and the failure is logged.
    pub fn load(&self, id: &str, request: LoadRequest) -> bool {
        match self.try_load(id, request) {
            Ok(LoadOutcome::Checked { name }) => {
                self.logger.debug(&name, "plugin resolves");
                true
            }
            Ok(LoadOutcome::Loaded(instance)) => {
                match instance.load_error() {
                    Some(reason) => {
                        let err = LifecycleError::LoadHook {
                            plugin: instance.name().to_string(),
                            reason: reason.to_string(),
                        };
                        self.logger.error(instance.name(), &err.to_string());
                    }
                    None => self.logger.debug(instance.name(), "plugin loaded"),
                }
                true
            }
            Err(e) => {
                self.logger.error(e.plugin(), &e.to_string());
                false
            }
        }
    }

    /// Whether `id` resolves (from the cache or freshly), with no side effects
    pub fn check(&self, id: &str) -> bool {
        self.load(id, LoadRequest::check_only())
    }

    /// Unload a live plugin, returning whether it worked.
    ///
    /// An id with nothing live returns `false`; a failing `unload` hook returns
    /// `false` and leaves the instance live.
    pub fn unload(&self, id: &str) -> bool {
        match self.try_unload(id) {
            Ok(instance) => {
                self.logger.debug(instance.name(), "plugin unloaded");
                true
            }
            Err(e @ LifecycleError::NotLoaded { .. }) => {
                self.logger.debug(e.plugin(), &e.to_string());
                false
            }
            Err(e) => {
                self.logger.error(e.plugin(), &e.to_string());
                false
            }
        }
    }

    // ─── Typed API ───────────────────────────────────────────────────

    /// Load a plugin.
    ///
    /// A cache hit skips resolution, ignores `request.args` and always runs
    /// the `load` hook. A cache miss resolves `id` with the request's args and
    /// uses `request.auto_init` (or the configured default).
    pub fn try_load(&self, id: &str, request: LoadRequest) -> Result<LoadOutcome, LifecycleError> {
        let cached = self.cache().get(id);

        let (descriptor, auto_init) = match cached {
            Some(descriptor) => {
                if request.check {
                    return Ok(LoadOutcome::Checked {
                        name: descriptor.name().to_string(),
                    });
                }
                if request.args.as_ref().is_some_and(|args| !is_empty_args(args)) {
                    self.logger.debug(
                        descriptor.name(),
                        "descriptor is cached, new init arguments are ignored",
                    );
                }
                (descriptor, true)
            }
            None => {
                let args = request
                    .args
                    .unwrap_or_else(|| Value::Object(Map::new()));
                let descriptor = self.resolve(id, &args)?;
                if request.check {
                    return Ok(LoadOutcome::Checked {
                        name: descriptor.name().to_string(),
                    });
                }
                (
                    descriptor,
                    request.auto_init.unwrap_or(self.config.auto_init),
                )
            }
        };

        let name = descriptor.name().to_string();
        if self.is_loaded(&name) {
            self.prepare_reload(&name)?;
        }

        let instance = Arc::new(self.instantiate(&descriptor, auto_init)?);
        let displaced = self.register(&instance);
        self.cache_mut().insert(id, descriptor);

        if let Some(displaced) = displaced {
            self.release_displaced(&displaced);
        }

        Ok(LoadOutcome::Loaded(instance))
    }

    /// Unload a live plugin by name, or by any id that resolved to it.
    ///
    /// Returns the instance that was removed. The cached descriptor stays.
    /// When several callers race on one instance only one runs its `unload`
    /// hook; the others get [`LifecycleError::NotLoaded`].
    pub fn try_unload(&self, id: &str) -> Result<Arc<PluginInstance>, LifecycleError> {
        let not_loaded = || LifecycleError::NotLoaded {
            plugin: id.to_string(),
        };
        let instance = self.instance(id).ok_or_else(not_loaded)?;
        if !instance.claim_unload() {
            return Err(not_loaded());
        }
        let name = instance.name().to_string();

        let ctx = self.hook_context(instance.descriptor());
        if let Err(reason) = guarded(|| (instance.unload_hook())(&ctx)) {
            instance.release_unload();
            return Err(LifecycleError::UnloadHook {
                plugin: name,
                reason,
            });
        }

        let mut live = self.live_mut();
        if live
            .get(&name)
            .is_some_and(|current| Arc::ptr_eq(current, &instance))
        {
            live.remove(&name);
            self.api.withdraw_if(&name, instance.contribution());
        }

        Ok(instance)
    }

    /// Build a new instance from a descriptor without registering it.
    ///
    /// Runs the factory, then the `load` hook when `auto_init` is set. A
    /// failing factory is an error; a failing hook is recorded on the instance.
    pub fn instantiate(
        &self,
        descriptor: &Descriptor,
        auto_init: bool,
    ) -> Result<PluginInstance, LifecycleError> {
        let name = descriptor.name();
        let parts = guarded(|| descriptor.init())
            .map_err(|reason| LifecycleError::Init {
                plugin: name.to_string(),
                reason,
            })?
            .into_parts();

        for endpoint in EndpointRouter::for_plugin(name, &parts.meta, &parts.api).unimplemented() {
            self.logger.debug(
                name,
                &format!("endpoint '{endpoint}' is declared but not implemented"),
            );
        }

        let load_error = if auto_init {
            let ctx = self.hook_context(descriptor);
            guarded(|| (parts.load)(&ctx, descriptor.options())).err()
        } else {
            None
        };

        let contribution = Contribution::new(&self.api, descriptor.clone(), parts.meta, parts.api);
        Ok(PluginInstance::new(
            contribution,
            parts.unload,
            auto_init,
            load_error,
        ))
    }

    // ─── Queries ─────────────────────────────────────────────────────

    /// Where `id` stands: unresolved, cached, or live
    pub fn state(&self, id: &str) -> PluginState {
        if let Some(instance) = self.instance(id) {
            return PluginState::Live {
                name: instance.name().to_string(),
                load_success: instance.load_success(),
            };
        }
        match self.cache().name_for(id) {
            Some(name) => PluginState::Cached {
                name: name.to_string(),
            },
            None => PluginState::Unresolved,
        }
    }

    /// The live instance for a plugin name, or for an id that resolved to it
    pub fn instance(&self, id: &str) -> Option<Arc<PluginInstance>> {
        if let Some(instance) = self.live().get(id) {
            return Some(instance.clone());
        }
        let name = self.cache().name_for(id)?.to_string();
        self.live().get(&name).cloned()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.instance(id).is_some()
    }

    pub fn is_cached(&self, id: &str) -> bool {
        self.cache().contains(id)
    }

    /// Number of live plugins
    pub fn plugin_count(&self) -> usize {
        self.live().len()
    }

    /// Cached plugin names, sorted
    pub fn cached_names(&self) -> Vec<String> {
        self.cache().names()
    }

    /// Snapshot of every live plugin, sorted by name
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        let mut plugins: Vec<PluginInfo> = self.live().values().map(|p| p.info()).collect();
        plugins.sort_by(|a, b| a.name.cmp(&b.name));
        plugins
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn resolve(&self, id: &str, args: &Value) -> Result<Descriptor, LifecycleError> {
        let descriptor = self.resolver.resolve(id, args)?;
        if descriptor.name().is_empty() {
            return Err(ResolutionError::Malformed {
                id: id.to_string(),
                reason: "descriptor has an empty name".to_string(),
            }
            .into());
        }
        Ok(descriptor)
    }

    fn hook_context(&self, descriptor: &Descriptor) -> CallContext {
        CallContext::new(self.api.clone(), CallInfo::Descriptor(descriptor.clone()))
    }

    /// Apply the reload policy to a name that is about to be re-instantiated
    fn prepare_reload(&self, name: &str) -> Result<(), LifecycleError> {
        match self.config.reload {
            ReloadPolicy::UnloadFirst => {
                self.logger
                    .debug(name, "unloading live instance before reload");
                match self.try_unload(name) {
                    Ok(_) | Err(LifecycleError::NotLoaded { .. }) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            ReloadPolicy::Overwrite => {
                self.logger.debug(
                    name,
                    "replacing live instance without running its unload hook",
                );
                Ok(())
            }
        }
    }

    /// Put an instance in the live table and the contributed map.
    ///
    /// Both tables change under the live-table lock, so they never disagree
    /// about which instance owns a name.
    fn register(&self, instance: &Arc<PluginInstance>) -> Option<Arc<PluginInstance>> {
        let mut live = self.live_mut();
        let displaced = live.insert(instance.name().to_string(), instance.clone());
        self.api.contribute(instance.contribution().clone());
        displaced
    }

    /// Handle an instance pushed out of the live table by a new registration
    fn release_displaced(&self, displaced: &PluginInstance) {
        match self.config.reload {
            ReloadPolicy::Overwrite => {}
            ReloadPolicy::UnloadFirst => {
                // Only reachable when a concurrent load won the race after
                // prepare_reload. An unload already holding the claim owns
                // the hook.
                if !displaced.claim_unload() {
                    return;
                }
                let ctx = self.hook_context(displaced.descriptor());
                if let Err(reason) = guarded(|| (displaced.unload_hook())(&ctx)) {
                    let err = LifecycleError::UnloadHook {
                        plugin: displaced.name().to_string(),
                        reason,
                    };
                    self.logger.error(displaced.name(), &err.to_string());
                }
            }
        }
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("config", &self.config)
            .field("cached", &self.cached_names())
            .field("live", &self.live().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn is_empty_args(args: &Value) -> bool {
    match args {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Run plugin code, turning both an error and a panic into a reason string
fn guarded<T>(f: impl FnOnce() -> Result<T, PluginError>) -> Result<T, String> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}
