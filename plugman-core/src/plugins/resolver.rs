//! Resolver - turns a plugin identifier into a descriptor

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use plugman_api::{Descriptor, PluginDefinition};
use serde_json::Value;

use super::error::ResolutionError;

/// Maps `(identifier, init args)` to a [`Descriptor`]
pub trait Resolver: Send + Sync {
    fn resolve(&self, id: &str, args: &Value) -> Result<Descriptor, ResolutionError>;
}

impl<F> Resolver for F
where
    F: Fn(&str, &Value) -> Result<Descriptor, ResolutionError> + Send + Sync,
{
    fn resolve(&self, id: &str, args: &Value) -> Result<Descriptor, ResolutionError> {
        self(id, args)
    }
}

/// In-memory registry of plugin definitions.
///
/// An identifier resolves when it names a registered definition either
/// directly (`"echo"`) or behind the search prefix (`"<prefix>-echo"`).
/// The prefixed form is tried first.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    prefix: String,
    definitions: RwLock<HashMap<String, PluginDefinition>>,
}

impl MemoryResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            definitions: RwLock::default(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register a definition under its own name, replacing any previous one
    pub fn register(&self, definition: PluginDefinition) {
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition.name().to_string(), definition);
    }

    /// Builder form of [`MemoryResolver::register`]
    pub fn with(self, definition: PluginDefinition) -> Self {
        self.register(definition);
        self
    }

    /// Names tried for `id`, in lookup order
    pub fn candidates(&self, id: &str) -> Vec<String> {
        let mut candidates = Vec::with_capacity(2);
        let prefixed = format!("{}-", self.prefix);
        if !self.prefix.is_empty() && id.len() > prefixed.len() && id.starts_with(&prefixed) {
            candidates.push(id[prefixed.len()..].to_string());
        }
        candidates.push(id.to_string());
        candidates
    }
}

impl Resolver for MemoryResolver {
    fn resolve(&self, id: &str, args: &Value) -> Result<Descriptor, ResolutionError> {
        let candidates = self.candidates(id);
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let definition = candidates
            .iter()
            .find_map(|name| definitions.get(name))
            .ok_or_else(|| ResolutionError::NotFound {
                id: id.to_string(),
                candidates: candidates.clone(),
            })?;

        if definition.name().is_empty() {
            return Err(ResolutionError::Malformed {
                id: id.to_string(),
                reason: "descriptor has an empty name".to_string(),
            });
        }

        Ok(definition.descriptor(args))
    }
}
