//! Descriptor cache - resolved descriptors kept for re-instantiation

use std::collections::HashMap;

use plugman_api::Descriptor;

/// Resolved descriptors keyed by plugin name.
///
/// Also remembers which requested identifier resolved to which name, so a
/// plugin first loaded as `"acme-echo"` is found again as either
/// `"acme-echo"` or `"echo"`. Entries live until the cache is dropped.
///
/// An identifier stays bound to the plugin it first resolved to, so a later
/// load of the same identifier hits the cache instead of the resolver. The
/// one exception is a plugin whose name equals the identifier: once such a
/// plugin is cached, its name wins over the alias.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    descriptors: HashMap<String, Descriptor>,
    aliases: HashMap<String, String>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugin name an identifier maps to, if anything is cached for it
    pub fn name_for(&self, id: &str) -> Option<&str> {
        if let Some((name, _)) = self.descriptors.get_key_value(id) {
            return Some(name);
        }
        self.aliases.get(id).map(String::as_str)
    }

    /// Cached descriptor for an identifier or plugin name
    pub fn get(&self, id: &str) -> Option<Descriptor> {
        self.name_for(id)
            .and_then(|name| self.descriptors.get(name))
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.name_for(id).is_some()
    }

    /// Store (or refresh) the descriptor under its name, remembering `id` as an alias
    pub fn insert(&mut self, id: &str, descriptor: Descriptor) {
        let name = descriptor.name().to_string();
        if id != name {
            self.aliases.insert(id.to_string(), name.clone());
        }
        self.aliases.remove(&name);
        self.descriptors.insert(name, descriptor);
    }

    /// Cached plugin names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.descriptors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
