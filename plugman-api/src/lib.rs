//! plugman-api - Plugin API for the plugman lifecycle manager
//!
//! This crate provides the types a plugin is made of and the protocol used to
//! call into it. A plugin is opaque to the host: it is a [`Descriptor`] whose
//! factory yields `load`/`unload` hooks, a capability list ([`Meta`]) and an
//! endpoint table ([`Endpoints`]).
//!
//! Calls are capability-gated by [`EndpointRouter`]: an endpoint is callable
//! only when it is both declared in `meta.contributes` and implemented. The
//! same check applies to the host's own API ([`HostApi`]).
//!
//! # Example
//!
//! ```
//! use plugman_api::{HostApi, PluginDefinition};
//! use serde_json::{json, Value};
//!
//! let definition = PluginDefinition::new("echo")
//!     .with_defaults(json!({ "prefix": "" }))
//!     .on_load(|ctx, _options| {
//!         ctx.log_info("echo loaded");
//!         Ok(())
//!     })
//!     .contributed_endpoint("ping", |_ctx, args| {
//!         Ok(args.first().cloned().unwrap_or(Value::Null))
//!     });
//!
//! let descriptor = definition.descriptor(&Value::Null);
//! assert_eq!(descriptor.name(), "echo");
//!
//! let exports = descriptor.init().unwrap().into_parts();
//! let host = HostApi::new();
//! let contribution =
//!     plugman_api::Contribution::new(&host, descriptor, exports.meta, exports.api);
//! assert_eq!(contribution.call("ping", &[json!(42)]).unwrap(), json!(42));
//! ```

pub mod context;
pub mod definition;
pub mod error;
pub mod host;
pub mod router;
pub mod types;

pub use context::{CallContext, CallInfo};
pub use definition::{PluginDefinition, merge_options};
pub use error::{CallError, Callee, PluginError};
pub use host::{Contribution, HostApi};
pub use router::{EndpointRouter, panic_message};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_api_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HostApi>();
        assert_send_sync::<Contribution>();
        assert_send_sync::<Descriptor>();
        assert_send_sync::<CallContext>();
    }

    #[test]
    fn test_plugin_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<PluginError>();
        assert_send_sync::<CallError>();
    }
}
