//! PluginDefinition - declarative way to write a plugin
//!
//! A definition collects a plugin's hooks, default options, declared
//! capabilities and endpoint handlers, and turns them into a [`Descriptor`]
//! whose factory hands out fresh [`PluginExports`] on every `init()`.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::CallContext;
use crate::error::PluginError;
use crate::types::{Descriptor, Endpoints, LoadHook, Meta, PluginExports, UnloadHook};

/// Builder for a plugin's descriptor
#[derive(Clone)]
pub struct PluginDefinition {
    name: String,
    load: Option<LoadHook>,
    unload: Option<UnloadHook>,
    defaults: Value,
    meta: Meta,
    api: Endpoints,
}

impl PluginDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            load: None,
            unload: None,
            defaults: Value::Object(Map::new()),
            meta: Meta::default(),
            api: Endpoints::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn defaults(&self) -> &Value {
        &self.defaults
    }

    /// Set the `load` hook
    pub fn on_load<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallContext, &Value) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.load = Some(Arc::new(hook));
        self
    }

    /// Set the `unload` hook
    pub fn on_unload<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallContext) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.unload = Some(Arc::new(hook));
        self
    }

    /// Default instantiation options; caller arguments are merged over these
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = if defaults.is_null() {
            Value::Object(Map::new())
        } else {
            defaults
        };
        self
    }

    /// Declare endpoints as contributed
    pub fn contributes<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta
            .contributes
            .extend(endpoints.into_iter().map(Into::into));
        self
    }

    /// Add an endpoint handler. It is only callable once declared with
    /// [`PluginDefinition::contributes`] or [`PluginDefinition::contributed_endpoint`].
    pub fn endpoint<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&CallContext, &[Value]) -> Result<Value, PluginError> + Send + Sync + 'static,
    {
        self.api.insert(name, handler);
        self
    }

    /// Add an endpoint handler and declare it in one go
    pub fn contributed_endpoint<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&CallContext, &[Value]) -> Result<Value, PluginError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.contributes([name.clone()]).endpoint(name, handler)
    }

    /// Build the exports a fresh instantiation receives
    pub fn exports(&self) -> PluginExports {
        PluginExports {
            load: self.load.clone(),
            unload: self.unload.clone(),
            meta: Some(self.meta.clone()),
            api: self.api.clone(),
        }
    }

    /// Produce a descriptor whose options are the defaults with `args` merged on top
    pub fn descriptor(&self, args: &Value) -> Descriptor {
        let options = merge_options(&self.defaults, args);
        let definition = self.clone();
        Descriptor::new(self.name.clone(), move || Ok(definition.exports())).with_options(options)
    }
}

impl fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDefinition")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("meta", &self.meta)
            .field("api", &self.api)
            .finish()
    }
}

/// Merge caller arguments over default options.
///
/// Objects merge key by key, recursively, with `args` winning. Any other
/// non-null `args` value replaces the defaults outright; `null` keeps them.
pub fn merge_options(defaults: &Value, args: &Value) -> Value {
    match (defaults, args) {
        (_, Value::Null) => defaults.clone(),
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let entry = match merged.get(key) {
                    Some(existing) => merge_options(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        _ => args.clone(),
    }
}
