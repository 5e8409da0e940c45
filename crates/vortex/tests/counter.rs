//! Counter-style scenarios: text bindings driven by state and click handlers.

mod common;

use serde_json::json;
use vortex::{DiagnosticKind, Engine, HostTree, MountTarget, Value};

#[test]
fn count_plus_one_follows_state() {
    common::init_logging();
    let (mut tree, zone) = common::tree_with_zone();
    let total = tree.append_element(zone, "span", &[("vx-bind", "count + 1")]);

    let mut engine = Engine::new(tree, json!({ "count": 1 }));
    engine.mount(MountTarget::Zones);
    assert_eq!(engine.host().text(&total).unwrap(), "2");

    engine.set_state(json!({ "count": 2 }));
    assert!(engine.is_flush_scheduled());
    let report = engine.flush();
    assert_eq!(report.affected_paths, vec!["count".to_string()]);
    assert_eq!(report.updated, 1);
    assert_eq!(engine.host().text(&total).unwrap(), "3");
}

#[test]
fn click_increments_counter() {
    common::init_logging();
    let (mut tree, zone) = common::tree_with_zone();
    let button = tree.append_element(zone, "button", &[("vx-on", "click: counter++")]);
    let label = tree.append_element(zone, "span", &[("vx-bind", "counter")]);

    let mut engine = Engine::new(tree, json!({ "counter": 0 }));
    engine.mount(MountTarget::Zones);
    assert_eq!(engine.host().text(&label).unwrap(), "0");

    assert_eq!(engine.host().click(button), Ok(1));
    assert_eq!(engine.state().get("counter").into_value(), Value::from(1));

    engine.flush();
    assert_eq!(engine.host().text(&label).unwrap(), "1");

    engine.host().click(button).unwrap();
    engine.host().click(button).unwrap();
    engine.flush();
    assert_eq!(engine.host().text(&label).unwrap(), "3");
}

#[test]
fn unsupported_event_code_never_runs() {
    common::init_logging();
    let (mut tree, zone) = common::tree_with_zone();
    let button = tree.append_element(
        zone,
        "button",
        &[("vx-on", "click: counter += 1; dblclick: alert('x'); mouseover counter++")],
    );

    let mut engine = Engine::new(tree, json!({ "counter": 0 }));
    engine.mount(MountTarget::Zones);

    assert_eq!(engine.host().click(button), Ok(0));
    assert_eq!(engine.host().listener_count(button, "dblclick"), 0);
    assert_eq!(engine.state().get("counter").into_value(), Value::from(0));
    assert!(!engine.is_flush_scheduled());
    assert!(engine.bindings().is_empty());

    let diagnostics = engine.diagnostics();
    assert_eq!(diagnostics.count(DiagnosticKind::UnsupportedEventCode), 2);
    assert_eq!(diagnostics.count(DiagnosticKind::MalformedEvent), 1);
}

#[test]
fn event_list_runs_each_supported_action() {
    common::init_logging();
    let (mut tree, zone) = common::tree_with_zone();
    let button = tree.append_element(
        zone,
        "button",
        &[(
            "vx-on",
            "click: reset(); dblclick: filter = 'done'; focus: copy = source.name; blur: missing()",
        )],
    );

    let state = Value::object_from([
        ("counter", Value::from(5)),
        ("filter", Value::from("all")),
        ("copy", Value::from("")),
        ("source", Value::from(json!({ "name": "Ada" }))),
        (
            "reset",
            Value::function(|state, _event| {
                state.set("counter", 0);
            }),
        ),
    ]);
    let mut engine = Engine::new(tree, state);
    engine.mount(MountTarget::Zones);

    let host = engine.host();
    host.click(button).unwrap();
    host.dispatch(button, &vortex::HostEvent::new("dblclick")).unwrap();
    host.dispatch(button, &vortex::HostEvent::new("focus")).unwrap();
    assert_eq!(host.dispatch(button, &vortex::HostEvent::new("blur")), Ok(1));

    let state = engine.state();
    assert_eq!(state.get("counter").into_value(), Value::from(0));
    assert_eq!(state.get("filter").into_value(), Value::from("done"));
    assert_eq!(state.get("copy").into_value(), Value::from("Ada"));

    let report = engine.flush();
    assert_eq!(
        report.affected_paths,
        vec!["counter".to_string(), "filter".to_string(), "copy".to_string()]
    );
    assert_eq!(engine.bindings().len(), 1);
}
