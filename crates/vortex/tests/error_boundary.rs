mod common;

use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use vortex::{BindingErrorInfo, DiagnosticKind, DirectiveKind, Engine, HostTree, MountTarget};

#[test]
fn one_broken_binding_does_not_stop_the_flush() {
    common::init_logging();
    let (mut tree, zone) = common::tree_with_zone();
    let doomed = tree.append_element(zone, "span", &[("vx-bind", "message")]);
    let healthy = tree.append_element(zone, "span", &[("vx-bind", "message")]);

    let mut engine = Engine::new(tree, json!({ "message": "hello" }));
    let seen: Rc<RefCell<Vec<BindingErrorInfo>>> = Rc::default();
    let sink = seen.clone();
    let handler = engine.on_error(move |info| sink.borrow_mut().push(info.clone()));
    engine.mount(MountTarget::Zones);
    let doomed_id = engine.bindings()[0].id();

    engine.host_mut().destroy(doomed).unwrap();
    engine.set_state(json!({ "message": "bye" }));
    let report = engine.flush();
    assert_eq!((report.updated, report.failed), (1, 1));
    assert_eq!(engine.host().text(&healthy).unwrap(), "bye");

    {
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].binding_id, doomed_id);
        assert_eq!(seen[0].kind, DirectiveKind::Bind);
        assert!(seen[0].message.contains("does not exist"), "{}", seen[0].message);
    }
    assert_eq!(
        engine.diagnostics().count(DiagnosticKind::BindingUpdateError),
        1
    );

    assert!(engine.remove_error_handler(handler));
    assert!(!engine.remove_error_handler(handler));
    engine.set_state(json!({ "message": "again" }));
    let report = engine.flush();
    assert_eq!(report.failed, 1);
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(
        engine.diagnostics().count(DiagnosticKind::BindingUpdateError),
        2
    );
    assert_eq!(engine.host().text(&healthy).unwrap(), "again");
}

#[test]
fn failed_show_and_list_updates_are_captured() {
    common::init_logging();
    let (mut tree, zone) = common::tree_with_zone();
    let panel = tree.append_element(zone, "p", &[("vx-show", "open")]);
    let list = tree.append_element(zone, "ul", &[]);
    tree.append_element(list, "li", &[("vx-for", "item in items"), ("vx-bind", "item")]);

    let mut engine = Engine::new(tree, json!({ "open": true, "items": ["a"] }));
    let kinds: Rc<RefCell<Vec<DirectiveKind>>> = Rc::default();
    let sink = kinds.clone();
    engine.on_error(move |info| sink.borrow_mut().push(info.kind));
    engine.mount(MountTarget::Zones);

    engine.host_mut().destroy(panel).unwrap();
    engine.host_mut().destroy(list).unwrap();
    engine.set_state(json!({ "open": false, "items": ["a", "b"] }));
    let report = engine.flush();
    assert_eq!(report.failed, 2);
    assert_eq!(*kinds.borrow(), vec![DirectiveKind::Show, DirectiveKind::For]);
}

#[test]
fn a_destroyed_clone_does_not_strand_its_siblings() {
    common::init_logging();
    let (mut tree, zone) = common::tree_with_zone();
    let list = tree.append_element(zone, "ul", &[]);
    tree.append_element(list, "li", &[("vx-for", "item in items"), ("vx-bind", "item")]);

    let mut engine = Engine::new(tree, json!({ "items": ["a", "b", "c"] }));
    engine.mount(MountTarget::Zones);
    let first = engine.bindings()[0].rendered()[0];
    engine.host_mut().destroy(first).unwrap();

    engine.set_state(json!({ "items": ["x"] }));
    let report = engine.flush();
    assert_eq!(report.failed, 1);
    let clones = engine.host().element_children(list);
    assert_eq!(common::texts(engine.host(), &clones), vec!["x"]);
    assert_eq!(engine.bindings()[0].rendered(), clones.as_slice());

    engine.set_state(json!({ "items": ["y"] }));
    let report = engine.flush();
    assert_eq!(report.failed, 0);
    let clones = engine.host().element_children(list);
    assert_eq!(common::texts(engine.host(), &clones), vec!["y"]);
    assert_eq!(engine.bindings()[0].rendered().len(), 1);
}
