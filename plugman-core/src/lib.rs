//! plugman-core: host side of the plugman plugin lifecycle manager
//!
//! This crate provides:
//!
//! - **Lifecycle management** - [`LifecycleManager`] resolves, instantiates,
//!   caches and unloads plugins
//! - **Host facade** - [`HostFacade`] is the application surface
//!   (`load_plugin`, `unload_plugin`, `check_plugin`, `call`)
//! - **Resolution** - the [`Resolver`] trait and the in-process [`MemoryResolver`]
//! - **Configuration** - [`ManagerConfig`], stored as TOML
//! - **Logging** - [`ManagerLogger`], defaulting to `tracing`
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use plugman_api::PluginDefinition;
//! use plugman_core::{HostFacade, ManagerConfig, MemoryResolver};
//! use serde_json::{json, Value};
//!
//! let resolver = MemoryResolver::new("acme").with(
//!     PluginDefinition::new("echo").contributed_endpoint("ping", |_ctx, args| {
//!         Ok(args.first().cloned().unwrap_or(Value::Null))
//!     }),
//! );
//! let host = HostFacade::new(ManagerConfig::with_plugin_path("acme"), Arc::new(resolver))?;
//!
//! assert!(host.load_plugin("echo", None));
//! assert_eq!(host.call_plugin("echo", "ping", &[json!(42)])?, json!(42));
//! assert!(host.unload_plugin("echo"));
//! assert!(host.check_plugin("echo"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! HostFacade ──> LifecycleManager ──> Resolver ──> Descriptor
//!                  │    │                             │ init()
//!                  │    └── DescriptorCache           v
//!                  └── live table ──> PluginInstance ──> HostApi.contributed
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod logger;
pub mod plugins;

pub use config::{ManagerConfig, ReloadPolicy};
pub use error::{ConfigError, HostError, LifecycleError, ResolutionError};
pub use host::HostFacade;
pub use logger::{ManagerLogger, TracingLogger};
pub use plugins::{
    DescriptorCache, LifecycleManager, LoadOutcome, LoadRequest, MemoryResolver, PluginInfo,
    PluginInstance, PluginState, Resolver,
};
