//! Integration tests for platform-windows
//!
//! These drive the async facade against the real Service Control Manager.
//! Tests that depend on optional services or network access are marked
//! with #[ignore].
#![cfg(windows)]

use serde_json::json;
use svcscope_core::{DesiredState, ErrorKind, ManagerConfig, Request, ServiceManager};
use svcscope_platform_windows::NativeBackend;

fn manager() -> ServiceManager<NativeBackend> {
    let config = ManagerConfig::default();
    ServiceManager::new(NativeBackend::new(config.clone()), config)
        .expect("Should be inside a runtime")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_enumerate_partitions_by_state() {
    let mgr = manager();
    let all = mgr.enumerate_services(DesiredState::All, "").unwrap().await.unwrap();
    let active = mgr.enumerate_services(DesiredState::Active, "").unwrap().await.unwrap();
    let inactive = mgr.enumerate_services(DesiredState::Inactive, "").unwrap().await.unwrap();

    assert!(!all.is_empty());
    // services may change state between the three calls
    let drift = (active.len() + inactive.len()).abs_diff(all.len());
    assert!(drift < 5, "active + inactive should cover all, drift {}", drift);

    let event_log = all
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case("EventLog"))
        .expect("EventLog should be listed");
    assert!(event_log.is_running());
    assert!(event_log.process.id.is_some());
    assert!(event_log.process.name.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_configuration_of_known_service() {
    let mgr = manager();
    let info = mgr
        .get_service_configuration("EventLog")
        .unwrap()
        .await
        .expect("Should read EventLog configuration");

    assert!(!info.binary_path.is_empty());
    assert!(info.description.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_service_is_not_found() {
    let mgr = manager();
    let err = mgr
        .get_service_triggers("svcscope-does-not-exist")
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceNotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dependents_are_keyed_by_name() {
    let mgr = manager();
    let deps = mgr
        .enum_dependent_services("RpcSs", DesiredState::All)
        .unwrap()
        .await
        .unwrap();
    for (key, service) in &deps {
        assert_eq!(key, &service.name);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_walk_dependents_terminates() {
    let mgr = manager();
    let closure = mgr
        .walk_dependents("RpcSs", DesiredState::All, None)
        .await
        .expect("Root query should succeed");
    assert!(closure.len() >= closure.at_depth(1).len());
    assert!(!closure.dependents.keys().any(|k| k.eq_ignore_ascii_case("RpcSs")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dispatch_json_request() {
    let mgr = manager();
    let request = Request::from_json(&json!({"op": "getServiceConfiguration", "args": ["EventLog"]}))
        .unwrap();
    let value = mgr.dispatch(request).await.unwrap();
    assert!(value["startType"].is_u64());
}

/// Unreachable hosts can take a long time to time out
#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn test_unreachable_host() {
    let mgr = manager();
    let err = mgr
        .enumerate_services(DesiredState::All, "svcscope-no-such-host.invalid")
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HostUnreachable);
}
