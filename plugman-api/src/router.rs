//! Capability-gated endpoint dispatch
//!
//! The same two-step check runs whether the host is calling into a plugin or
//! a plugin is calling back into the host: the endpoint must be declared in the
//! callee's capability set AND present in its endpoint table. Only then does the
//! handler run, with panic isolation.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;

use serde_json::Value;

use crate::context::CallContext;
use crate::error::{CallError, Callee};
use crate::types::{Endpoints, Handler, Meta};

/// Dispatches calls against one callee's declared and implemented endpoints
pub struct EndpointRouter<'a> {
    callee: Callee,
    /// `None` means the endpoint table is its own capability set
    declared: Option<&'a BTreeSet<String>>,
    endpoints: &'a Endpoints,
}

impl<'a> EndpointRouter<'a> {
    /// Router for the host API: every registered host endpoint is declared
    pub fn for_host(endpoints: &'a Endpoints) -> Self {
        Self {
            callee: Callee::Host,
            declared: None,
            endpoints,
        }
    }

    /// Router for a plugin: only endpoints listed in `meta.contributes` are declared
    pub fn for_plugin(name: &str, meta: &'a Meta, endpoints: &'a Endpoints) -> Self {
        Self {
            callee: Callee::Plugin(name.to_string()),
            declared: Some(&meta.contributes),
            endpoints,
        }
    }

    pub fn callee(&self) -> &Callee {
        &self.callee
    }

    /// Whether `endpoint` passes both the declared and the implemented check
    pub fn exposes(&self, endpoint: &str) -> bool {
        self.lookup(endpoint).is_some()
    }

    /// Endpoint names that are both declared and implemented
    pub fn exposed(&self) -> Vec<&str> {
        self.endpoints
            .names()
            .filter(|name| self.is_declared(name))
            .collect()
    }

    /// Endpoint names declared but missing a handler
    pub fn unimplemented(&self) -> Vec<&str> {
        match self.declared {
            Some(declared) => declared
                .iter()
                .map(String::as_str)
                .filter(|name| !self.endpoints.contains(name))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Resolve the handler for `endpoint`, or fail with `EndpointNotExposed`
    pub fn resolve(&self, endpoint: &str) -> Result<Handler, CallError> {
        self.lookup(endpoint)
            .cloned()
            .ok_or_else(|| CallError::EndpointNotExposed {
                callee: self.callee.clone(),
                endpoint: endpoint.to_string(),
            })
    }

    /// Check the capability, then run the handler
    pub fn dispatch(
        &self,
        endpoint: &str,
        ctx: &CallContext,
        args: &[Value],
    ) -> Result<Value, CallError> {
        let handler = self.resolve(endpoint)?;
        invoke(&self.callee, endpoint, &handler, ctx, args)
    }

    fn is_declared(&self, endpoint: &str) -> bool {
        self.declared
            .is_none_or(|declared| declared.contains(endpoint))
    }

    fn lookup(&self, endpoint: &str) -> Option<&Handler> {
        if !self.is_declared(endpoint) {
            return None;
        }
        self.endpoints.get(endpoint)
    }
}

/// Run an already resolved handler with panic isolation.
///
/// Callers holding a lock on the endpoint table resolve first, release the
/// lock, then invoke, so handlers can re-enter the host.
pub(crate) fn invoke(
    callee: &Callee,
    endpoint: &str,
    handler: &Handler,
    ctx: &CallContext,
    args: &[Value],
) -> Result<Value, CallError> {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, args)));

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(CallError::Handler {
            callee: callee.clone(),
            endpoint: endpoint.to_string(),
            source,
        }),
        Err(payload) => Err(CallError::HandlerPanicked {
            callee: callee.clone(),
            endpoint: endpoint.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Extract the text of a panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
