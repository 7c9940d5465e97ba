//! Plugin types: descriptors, factory exports and the endpoint table

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::CallContext;
use crate::error::PluginError;

/// An endpoint handler: takes the restricted call context and positional arguments
pub type Handler = Arc<dyn Fn(&CallContext, &[Value]) -> Result<Value, PluginError> + Send + Sync>;

/// The `load` hook, called with the descriptor's instantiation options
pub type LoadHook = Arc<dyn Fn(&CallContext, &Value) -> Result<(), PluginError> + Send + Sync>;

/// The `unload` hook
pub type UnloadHook = Arc<dyn Fn(&CallContext) -> Result<(), PluginError> + Send + Sync>;

/// The no-argument factory stored on a [`Descriptor`]
pub type InitFn = Arc<dyn Fn() -> Result<PluginExports, PluginError> + Send + Sync>;

/// Capability declarations of a plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Endpoint names this plugin exposes to callers
    #[serde(default)]
    pub contributes: BTreeSet<String>,
}

impl Meta {
    /// Build a meta block from a list of endpoint names
    pub fn contributing<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            contributes: endpoints.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `endpoint` is declared
    pub fn declares(&self, endpoint: &str) -> bool {
        self.contributes.contains(endpoint)
    }
}

/// Mapping from endpoint name to handler
#[derive(Clone, Default)]
pub struct Endpoints {
    handlers: BTreeMap<String, Handler>,
}

impl Endpoints {
    /// Create an empty endpoint table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a handler
    pub fn insert<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&CallContext, &[Value]) -> Result<Value, PluginError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    /// Add or replace an already shared handler
    pub fn insert_handler(&mut self, name: impl Into<String>, handler: Handler) {
        self.handlers.insert(name.into(), handler);
    }

    /// Builder form of [`Endpoints::insert`]
    pub fn with<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&CallContext, &[Value]) -> Result<Value, PluginError> + Send + Sync + 'static,
    {
        self.insert(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Handler> {
        self.handlers.remove(name)
    }

    /// Endpoint names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Handler> {
        self.handlers.iter()
    }
}

impl fmt::Debug for Endpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// What a descriptor's factory hands back: hooks, capability declarations and handlers
///
/// Missing hooks default to no-ops and a missing `meta` means an empty
/// capability set; see [`PluginExports::into_parts`].
#[derive(Clone, Default)]
pub struct PluginExports {
    pub load: Option<LoadHook>,
    pub unload: Option<UnloadHook>,
    pub meta: Option<Meta>,
    pub api: Endpoints,
}

/// [`PluginExports`] with every default applied
#[derive(Clone)]
pub struct ExportParts {
    pub load: LoadHook,
    pub unload: UnloadHook,
    pub meta: Meta,
    pub api: Endpoints,
}

impl PluginExports {
    /// Exports with only an endpoint table
    pub fn new(api: Endpoints) -> Self {
        Self {
            api,
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_load<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallContext, &Value) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.load = Some(Arc::new(hook));
        self
    }

    pub fn with_unload<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallContext) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.unload = Some(Arc::new(hook));
        self
    }

    /// Fill in no-op hooks and empty meta where the plugin left them out
    pub fn into_parts(self) -> ExportParts {
        ExportParts {
            load: self.load.unwrap_or_else(|| Arc::new(noop_load) as LoadHook),
            unload: self.unload.unwrap_or_else(|| Arc::new(noop_unload) as UnloadHook),
            meta: self.meta.unwrap_or_default(),
            api: self.api,
        }
    }
}

fn noop_load(_: &CallContext, _: &Value) -> Result<(), PluginError> {
    Ok(())
}

fn noop_unload(_: &CallContext) -> Result<(), PluginError> {
    Ok(())
}

impl fmt::Debug for PluginExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginExports")
            .field("load", &self.load.is_some())
            .field("unload", &self.unload.is_some())
            .field("meta", &self.meta)
            .field("api", &self.api)
            .finish()
    }
}

/// The immutable result of resolving a plugin identifier
#[derive(Clone)]
pub struct Descriptor {
    name: String,
    init: InitFn,
    options: Value,
}

impl Descriptor {
    /// Create a descriptor with empty options
    pub fn new<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> Result<PluginExports, PluginError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            init: Arc::new(init),
            options: Value::Object(serde_json::Map::new()),
        }
    }

    /// Builder: set the instantiation options
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// Plugin name, the unique key in every manager table
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instantiation options, passed to the `load` hook
    pub fn options(&self) -> &Value {
        &self.options
    }

    /// Run the factory
    pub fn init(&self) -> Result<PluginExports, PluginError> {
        (self.init)()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_meta_default_is_empty() {
        let meta = Meta::default();
        assert!(meta.contributes.is_empty());
        assert!(!meta.declares("anything"));
    }

    #[test]
    fn test_meta_deserializes_without_contributes() {
        let meta: Meta = serde_json::from_value(json!({})).unwrap();
        assert_eq!(meta, Meta::default());

        let meta: Meta = serde_json::from_value(json!({ "contributes": ["ping"] })).unwrap();
        assert!(meta.declares("ping"));
    }

    #[test]
    fn test_endpoints_insert_and_lookup() {
        let api = Endpoints::new()
            .with("ping", |_, args| Ok(args.first().cloned().unwrap_or(Value::Null)))
            .with("noop", |_, _| Ok(Value::Null));

        assert_eq!(api.len(), 2);
        assert!(api.contains("ping"));
        assert!(api.get("missing").is_none());
        assert_eq!(api.names().collect::<Vec<_>>(), vec!["noop", "ping"]);
    }

    #[test]
    fn test_endpoints_iter_in_name_order() {
        let api = Endpoints::new()
            .with("zeta", |_, _| Ok(json!("z")))
            .with("alpha", |_, _| Ok(json!("a")));

        let ctx = CallContext::detached();
        let seen: Vec<(String, Value)> = api
            .iter()
            .map(|(name, handler)| (name.clone(), handler(&ctx, &[]).unwrap()))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("alpha".to_string(), json!("a")),
                ("zeta".to_string(), json!("z"))
            ]
        );
    }

    #[test]
    fn test_builder_hooks_survive_into_parts() {
        let parts = PluginExports::default()
            .with_load(|_, options| match options.get("fail") {
                Some(_) => Err(PluginError::custom("asked to fail")),
                None => Ok(()),
            })
            .with_unload(|_| Err(PluginError::custom("still busy")))
            .into_parts();

        let ctx = CallContext::detached();
        assert!((parts.load)(&ctx, &json!({})).is_ok());
        assert!((parts.load)(&ctx, &json!({ "fail": true })).is_err());
        assert_eq!(
            (parts.unload)(&ctx).unwrap_err().to_string(),
            PluginError::custom("still busy").to_string()
        );
    }

    #[test]
    fn test_into_parts_defaults() {
        let parts = PluginExports::default().into_parts();
        assert!(parts.meta.contributes.is_empty());
        assert!(parts.api.is_empty());

        let ctx = CallContext::detached();
        assert!((parts.load)(&ctx, &json!({})).is_ok());
        assert!((parts.unload)(&ctx).is_ok());
    }

    #[test]
    fn test_descriptor_init_builds_fresh_exports() {
        let descriptor = Descriptor::new("echo", || {
            Ok(PluginExports::new(Endpoints::new().with("ping", |_, _| Ok(json!(1))))
                .with_meta(Meta::contributing(["ping"])))
        })
        .with_options(json!({ "greeting": "hi" }));

        assert_eq!(descriptor.name(), "echo");
        assert_eq!(descriptor.options()["greeting"], "hi");

        let first = descriptor.init().unwrap();
        let second = descriptor.init().unwrap();
        assert!(first.api.contains("ping"));
        assert!(second.meta.unwrap().declares("ping"));
    }

    #[test]
    fn test_descriptor_debug_hides_factory() {
        let descriptor = Descriptor::new("echo", || Ok(PluginExports::default()));
        let debug = format!("{descriptor:?}");
        assert!(debug.contains("echo"));
        assert!(debug.contains(".."));
    }
}
