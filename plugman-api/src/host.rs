//! HostApi - the host-wide API surface shared by the host and every plugin

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::Value;

use crate::context::{CallContext, CallInfo};
use crate::error::{CallError, Callee, PluginError};
use crate::router::{self, EndpointRouter};
use crate::types::{Descriptor, Endpoints, Handler, Meta};

/// A live plugin's entry in the contributed map: its endpoint table plus `call`
///
/// Bound to the host API it was created for; handlers always see that host
/// as `ctx.api`. The binding is weak, since the host's contributed map holds
/// the contribution.
#[derive(Clone)]
pub struct Contribution {
    inner: Arc<ContributionInner>,
}

struct ContributionInner {
    host: Weak<HostApiInner>,
    descriptor: Descriptor,
    meta: Meta,
    api: Endpoints,
}

impl Contribution {
    pub fn new(host: &HostApi, descriptor: Descriptor, meta: Meta, api: Endpoints) -> Self {
        Self {
            inner: Arc::new(ContributionInner {
                host: Arc::downgrade(&host.inner),
                descriptor,
                meta,
                api,
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.descriptor.name()
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.inner.descriptor
    }

    pub fn meta(&self) -> &Meta {
        &self.inner.meta
    }

    /// The raw endpoint table, declared or not
    pub fn api(&self) -> &Endpoints {
        &self.inner.api
    }

    /// Router over this plugin's capability set
    pub fn router(&self) -> EndpointRouter<'_> {
        EndpointRouter::for_plugin(self.name(), &self.inner.meta, &self.inner.api)
    }

    /// The host API this contribution is bound to, if it is still alive
    pub fn host(&self) -> Option<HostApi> {
        self.inner.host.upgrade().map(|inner| HostApi { inner })
    }

    /// Call one of this plugin's endpoints.
    ///
    /// The handler receives `{api: bound host, info: this contribution}`.
    pub fn call(&self, endpoint: &str, args: &[Value]) -> Result<Value, CallError> {
        let host = self.host().ok_or_else(|| CallError::HostUnavailable {
            plugin: self.name().to_string(),
        })?;
        let ctx = CallContext::new(host, CallInfo::Plugin(self.clone()));
        self.router().dispatch(endpoint, &ctx, args)
    }

    /// Whether two handles point at the same registration
    pub fn same_registration(&self, other: &Contribution) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Contribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contribution")
            .field("name", &self.name())
            .field("meta", &self.inner.meta)
            .field("api", &self.inner.api)
            .finish()
    }
}

/// Cheap, cloneable handle on the host API.
///
/// Holds the host's own endpoints and the contributed map. Clones share state.
/// Locks are only held while reading or mutating a table, never while a
/// handler runs.
#[derive(Clone, Default)]
pub struct HostApi {
    inner: Arc<HostApiInner>,
}

#[derive(Default)]
struct HostApiInner {
    endpoints: RwLock<Endpoints>,
    contributed: RwLock<BTreeMap<String, Contribution>>,
}

impl HostApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn endpoints(&self) -> RwLockReadGuard<'_, Endpoints> {
        self.inner
            .endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn endpoints_mut(&self) -> RwLockWriteGuard<'_, Endpoints> {
        self.inner
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn contributed_map(&self) -> RwLockReadGuard<'_, BTreeMap<String, Contribution>> {
        self.inner
            .contributed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn contributed_map_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Contribution>> {
        self.inner
            .contributed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Host endpoints ──────────────────────────────────────────────

    /// Register (or replace) a host endpoint
    pub fn register_endpoint<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&CallContext, &[Value]) -> Result<Value, PluginError> + Send + Sync + 'static,
    {
        self.endpoints_mut().insert(name, handler);
    }

    /// Register an already shared handler
    pub fn register_handler(&self, name: impl Into<String>, handler: Handler) {
        self.endpoints_mut().insert_handler(name, handler);
    }

    /// Remove a host endpoint, returning whether it existed
    pub fn remove_endpoint(&self, name: &str) -> bool {
        self.endpoints_mut().remove(name).is_some()
    }

    /// Names of the host's own endpoints
    pub fn endpoint_names(&self) -> Vec<String> {
        self.endpoints().names().map(str::to_string).collect()
    }

    /// Call a host endpoint.
    ///
    /// Fails with [`CallError::EndpointNotExposed`] when no such endpoint is
    /// registered.
    pub fn call(&self, endpoint: &str, args: &[Value]) -> Result<Value, CallError> {
        let handler = EndpointRouter::for_host(&self.endpoints()).resolve(endpoint)?;
        let ctx = CallContext::new(self.clone(), CallInfo::Host);
        router::invoke(&Callee::Host, endpoint, &handler, &ctx, args)
    }

    // ─── Contributed map ─────────────────────────────────────────────

    /// Look up a live plugin's contribution
    pub fn contribution(&self, plugin: &str) -> Option<Contribution> {
        self.contributed_map().get(plugin).cloned()
    }

    /// Snapshot of the whole contributed map
    pub fn contributed(&self) -> BTreeMap<String, Contribution> {
        self.contributed_map().clone()
    }

    pub fn contributed_names(&self) -> Vec<String> {
        self.contributed_map().keys().cloned().collect()
    }

    /// Call an endpoint on a contributed plugin
    pub fn call_plugin(
        &self,
        plugin: &str,
        endpoint: &str,
        args: &[Value],
    ) -> Result<Value, CallError> {
        let contribution = self
            .contribution(plugin)
            .ok_or_else(|| CallError::NotContributed {
                plugin: plugin.to_string(),
            })?;
        contribution.call(endpoint, args)
    }

    /// Register a plugin's contribution (used by the lifecycle manager)
    ///
    /// Returns the contribution it displaced, if any.
    pub fn contribute(&self, contribution: Contribution) -> Option<Contribution> {
        self.contributed_map_mut()
            .insert(contribution.name().to_string(), contribution)
    }

    /// Remove a plugin's contribution (used by the lifecycle manager)
    pub fn withdraw(&self, plugin: &str) -> Option<Contribution> {
        self.contributed_map_mut().remove(plugin)
    }

    /// Remove `plugin` only if its entry is still `expected`
    pub fn withdraw_if(&self, plugin: &str, expected: &Contribution) -> bool {
        let mut map = self.contributed_map_mut();
        match map.get(plugin) {
            Some(current) if current.same_registration(expected) => {
                map.remove(plugin);
                true
            }
            _ => false,
        }
    }

    /// Whether both handles share the same underlying API
    pub fn same_api(&self, other: &HostApi) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for HostApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostApi")
            .field("endpoints", &self.endpoint_names())
            .field("contributed", &self.contributed_names())
            .finish()
    }
}
