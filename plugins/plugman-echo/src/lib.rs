//! plugman-echo - reference plugin
//!
//! Contributes a single endpoint, `ping`, which returns its first argument.
//! It also carries an `options` endpoint that is implemented but not
//! contributed, so callers cannot reach it.
//!
//! # Options
//!
//! ```json
//! { "greeting": "echo ready" }
//! ```

use plugman_api::{PluginDefinition, PluginError};
use serde_json::{Value, json};

/// Plugin name
pub const NAME: &str = "echo";

/// The echo plugin definition
pub fn definition() -> PluginDefinition {
    PluginDefinition::new(NAME)
        .with_defaults(json!({ "greeting": "echo ready" }))
        .on_load(|ctx, options| {
            let greeting = options
                .get("greeting")
                .map(|g| {
                    g.as_str()
                        .ok_or_else(|| PluginError::config("greeting must be a string"))
                })
                .transpose()?
                .unwrap_or_default();
            ctx.log_info(greeting);
            Ok(())
        })
        .on_unload(|ctx| {
            ctx.log_debug("echo unloading");
            Ok(())
        })
        .contributed_endpoint("ping", |_ctx, args| {
            Ok(args.first().cloned().unwrap_or(Value::Null))
        })
        .endpoint("options", |ctx, _args| {
            let options = ctx
                .info
                .descriptor()
                .map(|d| d.options().clone())
                .unwrap_or(Value::Null);
            tracing::trace!(plugin = NAME, "options requested");
            Ok(options)
        })
}
