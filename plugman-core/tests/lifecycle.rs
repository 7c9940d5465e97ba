//! End-to-end lifecycle behaviour through the host facade

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use plugman_api::{CallError, PluginDefinition, PluginError};
use plugman_core::{
    HostError, HostFacade, LifecycleManager, LoadRequest, ManagerConfig, MemoryResolver,
    PluginState, ReloadPolicy, TracingLogger,
};
use serde_json::{Value, json};
use tempfile::TempDir;

fn resolver() -> MemoryResolver {
    MemoryResolver::new("plugman").with(plugman_echo::definition())
}

fn host_with(resolver: MemoryResolver) -> HostFacade {
    HostFacade::new(ManagerConfig::with_plugin_path("plugman"), Arc::new(resolver)).unwrap()
}

#[test]
fn test_unknown_id_fails_without_side_effects() {
    let host = host_with(resolver());

    for id in ["ghost", "plugman-ghost", ""] {
        assert!(!host.load_plugin(id, None));
        assert_eq!(host.manager().state(id), PluginState::Unresolved);
    }
    assert!(host.manager().cached_names().is_empty());
    assert_eq!(host.manager().plugin_count(), 0);
}

#[test]
fn test_load_unload_check_sequence() {
    let host = host_with(resolver());

    assert!(host.load_plugin("echo", None));
    assert!(host.unload_plugin("echo"));
    assert!(host.check_plugin("echo"));
    assert_eq!(
        host.manager().state("echo"),
        PluginState::Cached {
            name: "echo".into()
        }
    );
}

#[test]
fn test_unload_is_idempotent() {
    let host = host_with(resolver());

    assert!(!host.unload_plugin("echo"));
    host.load_plugin("echo", None);
    assert!(host.unload_plugin("echo"));
    assert!(!host.unload_plugin("echo"));
}

#[test]
fn test_capability_gating() {
    let host = host_with(resolver());
    host.load_plugin("echo", None);

    assert_eq!(
        host.call_plugin("echo", "ping", &[json!("hi")]).unwrap(),
        json!("hi")
    );

    let err = host.call_plugin("echo", "options", &[]).unwrap_err();
    assert!(err.is_not_exposed());
    assert_eq!(err.to_string(), "plugin echo does not expose endpoint options");
}

#[test]
fn test_cached_reload_runs_fresh_load_hook() {
    let healthy = Arc::new(AtomicBool::new(false));
    let flag = healthy.clone();
    let resolver = MemoryResolver::new("plugman").with(PluginDefinition::new("flaky").on_load(
        move |_, _| {
            if flag.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(PluginError::custom("not ready yet"))
            }
        },
    ));
    let host = host_with(resolver);

    assert!(host.load_plugin("flaky", None));
    assert_eq!(
        host.manager().state("flaky"),
        PluginState::Live {
            name: "flaky".into(),
            load_success: false
        }
    );

    assert!(host.unload_plugin("flaky"));
    healthy.store(true, Ordering::SeqCst);
    assert!(host.load_plugin("flaky", None));
    assert_eq!(
        host.manager().state("flaky"),
        PluginState::Live {
            name: "flaky".into(),
            load_success: true
        }
    );
}

#[test]
fn test_echo_scenario() {
    let host = host_with(resolver());

    assert!(host.load_plugin("echo", None));
    let echo = host.contribution("echo").unwrap();
    assert_eq!(echo.call("ping", &[json!(42)]).unwrap(), json!(42));
    assert!(host.unload_plugin("echo"));
    assert!(host.check_plugin("echo"));
}

#[test]
fn test_ghost_scenario() {
    let host = host_with(resolver());

    assert!(!host.load_plugin("ghost", None));
    assert!(!host.check_plugin("ghost"));
    assert!(!host.contributed().contains_key("ghost"));
    assert!(matches!(
        host.call_plugin("ghost", "ping", &[]).unwrap_err(),
        CallError::NotContributed { .. }
    ));
}

#[test]
fn test_facade_requires_plugin_path() {
    let err = HostFacade::new(ManagerConfig::default(), Arc::new(resolver())).unwrap_err();
    assert_eq!(err, HostError::MissingPluginPath);
}

#[test]
fn test_plugin_can_call_other_plugin() {
    let resolver = resolver().with(PluginDefinition::new("relay").contributed_endpoint(
        "relay",
        |ctx, args| Ok(json!({ "echoed": ctx.api.call_plugin("echo", "ping", args)? })),
    ));
    let host = host_with(resolver);
    host.load_plugin("echo", None);
    host.load_plugin("relay", None);

    assert_eq!(
        host.call_plugin("relay", "relay", &[json!(7)]).unwrap(),
        json!({ "echoed": 7 })
    );
}

#[test]
fn test_plugin_loads_dependency_from_load_hook() {
    let resolver = resolver().with(PluginDefinition::new("needs-echo").on_load(|ctx, _| {
        match ctx.api.call("load_plugin", &[json!("plugman-echo")])? {
            Value::Bool(true) => Ok(()),
            _ => Err(PluginError::custom("echo did not load")),
        }
    }));
    let host = host_with(resolver);

    assert!(host.load_plugin("needs-echo", None));
    assert!(host.manager().is_loaded("echo"));
    assert!(host.manager().instance("needs-echo").unwrap().load_success());
}

#[test]
fn test_handler_panic_does_not_take_down_host() {
    let resolver = resolver().with(
        PluginDefinition::new("wild").contributed_endpoint("boom", |_, _| panic!("wild endpoint")),
    );
    let host = host_with(resolver);
    host.load_plugin("wild", None);

    let err = host.call_plugin("wild", "boom", &[]).unwrap_err();
    assert!(matches!(err, CallError::HandlerPanicked { .. }));
    assert!(host.manager().is_loaded("wild"));
    assert!(host.unload_plugin("wild"));
}

#[test]
fn test_load_options_merge_over_defaults() {
    let host = host_with(resolver());
    assert!(host.load_plugin("echo", Some(json!({ "greeting": "hello" }))));

    let instance = host.manager().instance("echo").unwrap();
    assert_eq!(instance.descriptor().options(), &json!({ "greeting": "hello" }));
    assert!(instance.load_success());

    host.unload_plugin("echo");
    assert!(host.load_plugin("echo", Some(json!({ "greeting": 3 }))));
    assert!(host.manager().instance("echo").unwrap().load_success());
}

#[test]
fn test_bad_options_mark_load_failed() {
    let host = host_with(resolver());
    assert!(host.load_plugin("echo", Some(json!({ "greeting": 3 }))));

    let instance = host.manager().instance("echo").unwrap();
    assert!(!instance.load_success());
    assert!(instance.load_error().unwrap().contains("greeting"));
}

#[test]
fn test_list_plugins_reports_live_instances() {
    let host = host_with(resolver().with(PluginDefinition::new("quiet")));
    host.load_plugin("echo", None);
    host.load_plugin("quiet", None);

    let plugins = host.manager().list_plugins();
    assert_eq!(plugins.len(), 2);
    assert_eq!(plugins[0].name, "echo");
    assert_eq!(plugins[0].contributes, vec!["ping".to_string()]);
    assert!(plugins[1].contributes.is_empty());

    let json = serde_json::to_value(&plugins).unwrap();
    assert_eq!(json[0]["name"], "echo");
}

#[test]
fn test_overwrite_policy_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("manager.toml");
    std::fs::write(
        &path,
        "plugin_path = \"plugman\"\nreload = \"overwrite\"\n",
    )
    .unwrap();
    let config = ManagerConfig::load(&path).unwrap();
    assert_eq!(config.reload, ReloadPolicy::Overwrite);

    let unloads = Arc::new(AtomicUsize::new(0));
    let counter = unloads.clone();
    let resolver = MemoryResolver::new("plugman").with(PluginDefinition::new("counted").on_unload(
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    ));
    let manager = LifecycleManager::with_logger(config, Arc::new(resolver), Arc::new(TracingLogger));

    assert!(manager.load("counted", LoadRequest::new()));
    assert!(manager.load("counted", LoadRequest::new()));
    assert_eq!(unloads.load(Ordering::SeqCst), 0);
    assert_eq!(manager.plugin_count(), 1);

    assert!(manager.unload("counted"));
    assert_eq!(unloads.load(Ordering::SeqCst), 1);
}

fn counted(name: &str, loads: &Arc<AtomicUsize>, unloads: &Arc<AtomicUsize>) -> PluginDefinition {
    let (loads, unloads) = (loads.clone(), unloads.clone());
    PluginDefinition::new(name)
        .contributed_endpoint("ping", |_, args| Ok(args.first().cloned().unwrap_or(Value::Null)))
        .on_load(move |_, _| {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .on_unload(move |_| {
            unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
}

#[test]
fn test_concurrent_loads_keep_one_instance_per_name() {
    let loads = Arc::new(AtomicUsize::new(0));
    let unloads = Arc::new(AtomicUsize::new(0));
    let host = host_with(MemoryResolver::new("plugman").with(counted("echo", &loads, &unloads)));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..10 {
                    host.load_plugin("echo", None);
                }
            });
        }
    });

    assert_eq!(host.manager().plugin_count(), 1);
    assert_eq!(
        loads.load(Ordering::SeqCst) - unloads.load(Ordering::SeqCst),
        1
    );
    let live = host.manager().instance("echo").unwrap();
    assert!(!live.is_unloading());
    assert!(
        host.contribution("echo")
            .unwrap()
            .same_registration(live.contribution())
    );

    assert!(host.unload_plugin("echo"));
    assert_eq!(loads.load(Ordering::SeqCst), unloads.load(Ordering::SeqCst));
}

#[test]
fn test_concurrent_unloads_have_one_winner() {
    let unloads = Arc::new(AtomicUsize::new(0));
    let counter = unloads.clone();
    let resolver = resolver().with(PluginDefinition::new("slow").on_unload(move |_| {
        std::thread::sleep(Duration::from_millis(20));
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    let host = host_with(resolver);
    assert!(host.load_plugin("slow", None));

    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| host.unload_plugin("slow")))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|won| **won).count(), 1);
    assert_eq!(unloads.load(Ordering::SeqCst), 1);
    assert!(host.contribution("slow").is_none());
    assert_eq!(
        host.manager().state("slow"),
        PluginState::Cached {
            name: "slow".into()
        }
    );
}
