//! Component lifecycle: event order, auto flags and transition legality.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use organa_runtime::{ComponentInfo, LifecycleState, OrganaError, Runtime, RuntimeConfig, handler};
use organa_testing::{CallLog, recording_handler};
use serde_json::json;
use std::sync::Arc;

const EVENTS: &[&str] = &[
    "beforeStart",
    "afterStart",
    "beforeOpen",
    "doOpen",
    "afterOpen",
    "beforeClose",
    "doClose",
    "afterClose",
    "beforeStop",
    "doStop",
    "afterStop",
    "beforeRefresh",
    "doFill",
    "doRefresh",
    "afterRefresh",
    "beforeSetup",
    "doSetup",
    "afterSetup",
];

fn record_all(component: &organa_runtime::Component, log: &CallLog) {
    for &event in EVENTS {
        component.on(event, recording_handler(log, "ui", event));
    }
}

fn events(log: &CallLog) -> Vec<String> {
    log.entries()
        .into_iter()
        .map(|e| e.trim_start_matches("ui:").to_string())
        .collect()
}

#[tokio::test]
async fn start_opens_with_setup_and_refresh_by_default() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let component = runtime.component("Grid");
    let log = CallLog::new();
    record_all(&component, &log);

    component.start(json!({})).await.unwrap();

    assert_eq!(
        events(&log),
        vec![
            "beforeStart",
            "afterStart",
            "beforeOpen",
            "beforeSetup",
            "doSetup",
            "afterSetup",
            "beforeRefresh",
            "doRefresh",
            "afterRefresh",
            "doOpen",
            "afterOpen",
        ]
    );
    assert_eq!(component.state(), LifecycleState::Opened);
}

#[tokio::test]
async fn auto_flags_shape_the_sequence() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let component = runtime.component("Grid");
    let log = CallLog::new();
    record_all(&component, &log);

    component
        .start(json!({
            "autoSetupOnStart": true,
            "autoSetupOnOpen": false,
            "autoFill": true,
        }))
        .await
        .unwrap();

    assert_eq!(
        events(&log),
        vec![
            "beforeStart",
            "beforeSetup",
            "doSetup",
            "afterSetup",
            "afterStart",
            "beforeOpen",
            "beforeRefresh",
            "doFill",
            "doRefresh",
            "afterRefresh",
            "doOpen",
            "afterOpen",
        ]
    );
}

#[tokio::test]
async fn stop_closes_an_open_component() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let component = runtime.component("Grid");
    component
        .start(json!({"autoSetup": false, "autoRefresh": false}))
        .await
        .unwrap();

    let log = CallLog::new();
    record_all(&component, &log);
    component.stop(&json!({})).await.unwrap();

    assert_eq!(
        events(&log),
        vec![
            "beforeClose",
            "doClose",
            "afterClose",
            "beforeStop",
            "doStop",
            "afterStop",
        ]
    );
    assert_eq!(component.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn closing_mid_open_is_illegal() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let component = runtime.component("Dialog");
    component.on(
        "beforeOpen",
        handler(|component, options| async move { component.close(&options).await }),
    );

    let err = component.start(json!({})).await.unwrap_err();
    assert_eq!(
        err,
        OrganaError::IllegalTransition {
            name: "Dialog".to_string(),
            from: LifecycleState::Opening,
            to: LifecycleState::Closing,
        }
    );
    assert_eq!(component.state(), LifecycleState::Opening);
}

#[tokio::test]
async fn handler_failure_stops_the_lifecycle() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let component = runtime.component("Form");
    let log = CallLog::new();
    component.add_event_handler(
        "afterStart",
        handler(|_, _| async {
            Err(OrganaError::Handler {
                event: "afterStart".to_string(),
                message: "validation failed".to_string(),
            })
        }),
        0,
    );
    component.add_event_handler("afterStart", recording_handler(&log, "late", "afterStart"), 1);

    let err = component.start(json!({})).await.unwrap_err();
    assert!(matches!(err, OrganaError::Handler { .. }));
    assert!(log.is_empty());
    assert_eq!(component.state(), LifecycleState::Starting);
}

#[tokio::test]
async fn handlers_run_in_order() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let component = runtime.component("Form");
    let log = CallLog::new();
    component.add_event_handler("afterOpen", recording_handler(&log, "third", "afterOpen"), 5);
    component.add_event_handler("afterOpen", recording_handler(&log, "first", "afterOpen"), -5);
    component.add_event_handler("afterOpen", recording_handler(&log, "second", "afterOpen"), 0);

    component.start(json!({})).await.unwrap();
    assert_eq!(
        log.entries(),
        vec!["first:afterOpen", "second:afterOpen", "third:afterOpen"]
    );
}

#[tokio::test]
async fn reopening_a_closed_component() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let component = runtime.component("Panel");
    component.start(json!({})).await.unwrap();
    component.close(&json!({})).await.unwrap();
    assert_eq!(component.state(), LifecycleState::Closed);

    component.open(&json!({})).await.unwrap();
    assert_eq!(component.state(), LifecycleState::Opened);
    assert_eq!(
        runtime.engine().state_of(component.id()),
        Some(LifecycleState::Opened)
    );
}

#[tokio::test]
async fn components_are_independent() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let a = runtime.component("A");
    let b = runtime.component("B");
    a.start(json!({"autoOpen": false})).await.unwrap();

    assert_eq!(a.state(), LifecycleState::Started);
    assert_eq!(b.state(), LifecycleState::Initial);
    assert!(!b.is_initialized());
    assert!(!Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn restart_replaces_previous_settings() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let component = runtime.component("Grid");

    component
        .start(json!({"tags": ["x"], "stale": true}))
        .await
        .unwrap();
    component.stop(&json!({})).await.unwrap();
    component.start(json!({"tags": ["x"]})).await.unwrap();

    assert_eq!(component.state(), LifecycleState::Opened);
    assert_eq!(component.settings().get("tags"), Some(json!(["x"])));
    assert_eq!(component.settings().get("stale"), None);
}

#[tokio::test]
async fn global_settings_can_be_opted_out_of() {
    let runtime = Runtime::new(RuntimeConfig::default());
    runtime.settings().set("locale", json!("fr"));

    let shared = runtime.component("Shared");
    shared.start(json!({})).await.unwrap();
    assert_eq!(shared.settings().get("locale"), Some(json!("fr")));

    let isolated = runtime.component("Isolated");
    isolated
        .start(json!({"settings": {"useGlobalSettings": false}}))
        .await
        .unwrap();
    assert_eq!(isolated.settings().get("locale"), None);
    assert_eq!(isolated.state(), LifecycleState::Opened);
}
