//! PluginInstance - one live instantiation of a descriptor

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use plugman_api::{CallError, Contribution, Descriptor, Endpoints, Meta, UnloadHook};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Where a plugin identifier currently stands with the manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PluginState {
    /// Never resolved (or only checked with `check`)
    Unresolved,
    /// Descriptor cached, nothing live
    Cached { name: String },
    /// A live instance is registered
    Live { name: String, load_success: bool },
}

/// A live plugin as tracked by the manager's instance table
pub struct PluginInstance {
    instance_id: Uuid,
    contribution: Contribution,
    unload: UnloadHook,
    load_success: bool,
    load_error: Option<String>,
    auto_init: bool,
    loaded_at: DateTime<Utc>,
    /// Set while (and after) an unload hook owns this instance
    unloading: AtomicBool,
}

impl PluginInstance {
    pub(crate) fn new(
        contribution: Contribution,
        unload: UnloadHook,
        auto_init: bool,
        load_error: Option<String>,
    ) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            contribution,
            unload,
            load_success: load_error.is_none(),
            load_error,
            auto_init,
            loaded_at: Utc::now(),
            unloading: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        self.contribution.name()
    }

    /// Unique per instantiation, so a refreshed instance is distinguishable
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn descriptor(&self) -> &Descriptor {
        self.contribution.descriptor()
    }

    pub fn meta(&self) -> &Meta {
        self.contribution.meta()
    }

    pub fn api(&self) -> &Endpoints {
        self.contribution.api()
    }

    /// The entry this instance occupies in the host's contributed map
    pub fn contribution(&self) -> &Contribution {
        &self.contribution
    }

    /// Whether the `load` hook completed without error.
    ///
    /// Also `true` when the hook was not run at all.
    pub fn load_success(&self) -> bool {
        self.load_success
    }

    /// Failure text of the `load` hook, if it failed
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Whether `load` ran at construction
    pub fn auto_init(&self) -> bool {
        self.auto_init
    }

    /// Call one of this instance's contributed endpoints
    pub fn call(&self, endpoint: &str, args: &[Value]) -> Result<Value, CallError> {
        self.contribution.call(endpoint, args)
    }

    pub(crate) fn unload_hook(&self) -> &UnloadHook {
        &self.unload
    }

    /// Take exclusive ownership of this instance's teardown.
    ///
    /// Only one caller ever wins; the claim is kept after a successful unload.
    pub(crate) fn claim_unload(&self) -> bool {
        self.unloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give the claim back after a failed unload hook
    pub(crate) fn release_unload(&self) {
        self.unloading.store(false, Ordering::Release);
    }

    /// Whether an unload has claimed this instance
    pub fn is_unloading(&self) -> bool {
        self.unloading.load(Ordering::Acquire)
    }

    /// Serializable snapshot
    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            name: self.name().to_string(),
            instance_id: self.instance_id,
            loaded_at: self.loaded_at,
            load_success: self.load_success,
            load_error: self.load_error.clone(),
            auto_init: self.auto_init,
            contributes: self.meta().contributes.iter().cloned().collect(),
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("name", &self.name())
            .field("instance_id", &self.instance_id)
            .field("load_success", &self.load_success)
            .field("auto_init", &self.auto_init)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

/// Information about a live plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub instance_id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub load_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
    pub auto_init: bool,
    /// Declared endpoint names, sorted
    pub contributes: Vec<String>,
}
