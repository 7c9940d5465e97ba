//! Plugin lifecycle for plugman
//!
//! - [`LifecycleManager`]: resolves, instantiates, registers and unloads plugins
//! - [`DescriptorCache`]: resolved descriptors, reused on re-load
//! - [`Resolver`]: turns an identifier into a descriptor ([`MemoryResolver`] in-process)
//! - [`LifecycleError`] / [`ResolutionError`]: what can go wrong
//!
//! # Plugin States
//!
//! Per plugin name: `Unresolved -> Cached -> Live`. Unloading returns a
//! plugin to `Cached`; the descriptor is never evicted.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use plugman_api::PluginDefinition;
//! use plugman_core::config::ManagerConfig;
//! use plugman_core::plugins::{LifecycleManager, LoadRequest, MemoryResolver, PluginState};
//!
//! let resolver = MemoryResolver::new("acme").with(PluginDefinition::new("echo"));
//! let manager = LifecycleManager::new(ManagerConfig::with_plugin_path("acme"), Arc::new(resolver));
//!
//! assert!(manager.load("acme-echo", LoadRequest::new()));
//! assert!(manager.unload("echo"));
//! assert_eq!(manager.state("echo"), PluginState::Cached { name: "echo".into() });
//! ```

mod cache;
mod error;
mod instance;
mod manager;
mod resolver;

pub use cache::DescriptorCache;
pub use error::{LifecycleError, ResolutionError};
pub use instance::{PluginInfo, PluginInstance, PluginState};
pub use manager::{LifecycleManager, LoadOutcome, LoadRequest};
pub use resolver::{MemoryResolver, Resolver};
