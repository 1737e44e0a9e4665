//! Chains, triggers and actions driven through the engine.

use futures::executor::block_on;
use serde_json::{json, Value};
use std::rc::Rc;

use crate::actions::{ActionContext, ActionResult};
use crate::config::EngineConfig;
use crate::dom;
use crate::engine::Hyperions;
use crate::error::ErrorKind;
use crate::events::{EngineEvent, EventKind};
use crate::selector::Selector;
use crate::test_support::{engine, events, query, recorder, serve_once};
use crate::transport::{HttpMethod, RequestBody};

fn copies(root: &markup5ever_rcdom::Handle) -> Vec<String> {
    Selector::parse(r"[hyp\:copy]")
        .unwrap()
        .query_all(root)
        .iter()
        .map(dom::text_content)
        .collect()
}

fn error_kinds(errors: &[EngineEvent]) -> Vec<ErrorKind> {
    errors
        .iter()
        .filter_map(|event| match event {
            EngineEvent::Error { error, .. } => Some(error.kind()),
            _ => None,
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAINS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_raw_then_template_renders_into_target() {
    let (engine, _) = engine(
        r##"
        <button id="go" hyp:action1='raw:{"name":"Ada","items":[10,20,30]}' hyp:action2="template:#tpl #out"></button>
        <template id="tpl"><div><h1 hyp:attr="text:name"></h1><ul><li hyp:loop="items" hyp:attr="text:this"></li></ul></div></template>
        <div id="out"><p>placeholder</p></div>
        "##,
    );
    let changes = events(&engine, EventKind::HtmlChange);

    let outcome = engine.dispatch_event(&query(&engine, "#go"), "click");
    assert!(outcome.handled);
    assert!(!outcome.default_prevented);
    engine.run_until_idle();

    let out = query(&engine, "#out");
    assert_eq!(dom::text_content(&query(&engine, "#out h1")), "Ada");
    assert_eq!(copies(&out), vec!["10", "20", "30"]);
    assert!(dom::is_hidden(&query(&engine, "#out li[hyp\\:loop]")));
    assert!(!dom::text_content(&out).contains("placeholder"));
    assert_eq!(changes.borrow().len(), 1);
}

#[test]
fn test_chain_replaces_data_without_keep_params() {
    let (engine, _) = engine(
        r#"
        <input id="plain" name="q" value="x" hyp:action1='raw:{"a":1}' hyp:action2="run:check">
        <input id="kept" name="q" value="x" hyp:options="keepParams:true" hyp:action1='raw:{"a":1}' hyp:action2="run:check">
        "#,
    );
    let seen = recorder(&engine, "check");

    block_on(engine.run_chain(&query(&engine, "#plain"))).unwrap();
    block_on(engine.run_chain(&query(&engine, "#kept"))).unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![json!({ "a": 1 }), json!({ "q": "x", "a": 1 })]
    );
}

#[test]
fn test_missing_result_becomes_empty_object() {
    let (engine, _) = engine(r#"<div id="d" hyp:action1="raw:" hyp:action2="run:check"></div>"#);
    let seen = recorder(&engine, "check");
    block_on(engine.run_chain(&query(&engine, "#d"))).unwrap();
    assert_eq!(*seen.borrow(), vec![json!({})]);
}

#[test]
fn test_steps_run_in_numeric_order() {
    let (engine, _) = engine(
        r#"<div id="d" hyp:action10="run:third" hyp:action2="run:second" hyp:action1="run:first"></div>"#,
    );
    let order = Rc::new(std::cell::RefCell::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let order = order.clone();
        engine.add_action_fn(&format!("run:{}", name), move |_ctx: ActionContext| {
            let order = order.clone();
            async move {
                order.borrow_mut().push(name);
                Ok(ActionResult::empty())
            }
        });
    }
    block_on(engine.run_chain(&query(&engine, "#d"))).unwrap();
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn test_halting_action_stops_chain() {
    let (engine, _) = engine(r#"<div id="d" hyp:action1="run:stop" hyp:action2="run:check"></div>"#);
    engine.add_action_fn("run:stop", |_ctx: ActionContext| async { Ok(ActionResult::halt()) });
    let seen = recorder(&engine, "check");
    block_on(engine.run_chain(&query(&engine, "#d"))).unwrap();
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_unknown_prefix_is_a_soft_stop() {
    let (engine, _) = engine(r#"<div id="d" hyp:action1="nope:x" hyp:action2="run:check"></div>"#);
    let seen = recorder(&engine, "check");
    let errors = events(&engine, EventKind::Error);

    engine.trigger(&query(&engine, "#d"));
    engine.run_until_idle();

    assert!(seen.borrow().is_empty());
    assert!(errors.borrow().is_empty());
}

#[test]
fn test_default_prefix_is_get_for_paths() {
    let (engine, transport) = engine(r#"<div id="d" hyp:action1="/api/items" hyp:action2="run:check"></div>"#);
    transport.respond("/api/items", 200, r#"[1,2]"#);
    let seen = recorder(&engine, "check");

    block_on(engine.run_chain(&query(&engine, "#d"))).unwrap();

    assert_eq!(transport.requests()[0].method, HttpMethod::Get);
    assert_eq!(*seen.borrow(), vec![json!([1, 2])]);
}

#[test]
fn test_legacy_chain() {
    let (engine, _) = engine(
        r#"<button id="b" data-params="page:2" data-input="run:load" data-output="run:check"></button>"#,
    );
    let loaded = recorder(&engine, "load");
    let seen = recorder(&engine, "check");

    block_on(engine.run_chain(&query(&engine, "#b"))).unwrap();

    assert_eq!(*loaded.borrow(), vec![json!({ "page": "2" })]);
    assert_eq!(*seen.borrow(), vec![json!({})]);
}

#[test]
fn test_path_extracts_sub_data() {
    let (engine, _) = engine(
        r#"<div id="d" hyp:path="user" hyp:action1='raw:{"user":{"id":1}}' hyp:action2="run:check"></div>"#,
    );
    let seen = recorder(&engine, "check");
    block_on(engine.run_chain(&query(&engine, "#d"))).unwrap();
    assert_eq!(*seen.borrow(), vec![json!({ "id": 1 })]);
}

#[test]
fn test_deprecated_output_action_shim() {
    let (engine, _) = engine(r#"<div id="d" hyp:action1="run:legacy" hyp:action2="run:check"></div>"#);
    engine.add_output_action("legacy", |_origin, _data: Value, _options| async {
        Ok(Some(json!({ "ok": true })))
    });
    assert!(engine.has_action("run:legacy"));
    let seen = recorder(&engine, "check");

    block_on(engine.run_chain(&query(&engine, "#d"))).unwrap();
    assert_eq!(*seen.borrow(), vec![json!({ "ok": true })]);

    engine.run_output_action("check", None, json!({ "direct": 1 }), Default::default());
    engine.run_until_idle();
    assert_eq!(seen.borrow().len(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════════
// NETWORK
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_get_sends_form_as_query() {
    let (engine, transport) = engine(
        r#"<form id="f" hyp:action1="get:/api/search" hyp:action2="run:check"><input name="q" value="hi"></form>"#,
    );
    transport.respond("/api/search", 200, r#"{"count":2}"#);
    let seen = recorder(&engine, "check");

    let outcome = engine.dispatch_event(&query(&engine, "#f"), "submit");
    assert!(outcome.default_prevented);
    engine.run_until_idle();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://localhost/api/search?q=hi");
    assert_eq!(requests[0].body, RequestBody::None);
    assert_eq!(*seen.borrow(), vec![json!({ "count": 2 })]);
}

#[test]
fn test_default_transport_completes_a_real_request() {
    let (base_url, server) = serve_once(r#"{"count":2}"#);
    let config = EngineConfig {
        base_url,
        ..EngineConfig::default()
    };
    let engine = Hyperions::setup(
        r#"<button id="b" hyp:action1="get:/api/items" hyp:action2="run:check"></button>"#,
        config,
    )
    .unwrap();
    let seen = recorder(&engine, "check");
    let errors = events(&engine, EventKind::Error);

    engine.trigger(&query(&engine, "#b"));
    engine.run_to_completion();

    assert_eq!(server.join().unwrap(), "GET /api/items HTTP/1.1");
    assert!(errors.borrow().is_empty());
    assert_eq!(*seen.borrow(), vec![json!({ "count": 2 })]);
}

#[test]
fn test_error_status_halts_chain() {
    let (engine, transport) = engine(
        r#"<form id="f" hyp:action1="get:/api/search" hyp:action2="run:check"><input name="q" value="hi"></form>"#,
    );
    let seen = recorder(&engine, "check");
    let errors = events(&engine, EventKind::Error);

    engine.dispatch_event(&query(&engine, "#f"), "submit");
    engine.run_until_idle();

    assert_eq!(transport.requests()[0].url, "http://localhost/api/search?q=hi");
    assert!(seen.borrow().is_empty());
    assert_eq!(error_kinds(&errors.borrow()), vec![ErrorKind::Request]);
}

#[test]
fn test_post_sends_json_body() {
    let (engine, transport) = engine(r#"<input id="i" name="title" value="doc" hyp:action1="post:/api/docs">"#);
    transport.respond("/api/docs", 201, "");

    block_on(engine.run_chain(&query(&engine, "#i"))).unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.body, RequestBody::Json(r#"{"title":"doc"}"#.to_string()));
}

#[test]
fn test_multipart_form() {
    let (engine, transport) = engine(
        r#"<form id="f" enctype="multipart/form-data" hyp:action1="put:/api/upload"><input name="name" value="a"></form>"#,
    );
    transport.respond("/api/upload", 200, "{}");

    block_on(engine.run_chain(&query(&engine, "#f"))).unwrap();

    assert_eq!(
        transport.requests()[0].body,
        RequestBody::Multipart(vec![("name".to_string(), "a".to_string())])
    );
}

#[test]
fn test_missing_url_is_configuration_error() {
    let (engine, _) = engine(r#"<div id="d" hyp:action1="delete:"></div>"#);
    let err = block_on(engine.run_chain(&query(&engine, "#d"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRIGGERS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_debounce_runs_once_after_quiet_period() {
    let (engine, _) = engine(r#"<input id="s" name="q" value="a" hyp:trigger="input after:300" hyp:action1="run:search">"#);
    let seen = recorder(&engine, "search");
    let input = query(&engine, "#s");

    engine.dispatch_event(&input, "input");
    engine.advance_time(100);
    engine.dispatch_event(&input, "input");
    engine.advance_time(100);
    engine.dispatch_event(&input, "input");
    assert_eq!(engine.pending_timers(), 1);

    engine.advance_time(299);
    assert!(seen.borrow().is_empty());

    engine.advance_time(1);
    assert_eq!(*seen.borrow(), vec![json!({ "q": "a" })]);
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn test_once_unregisters_listeners() {
    let (engine, _) = engine(r#"<button id="b" hyp:trigger="click once" hyp:action1="run:count"></button>"#);
    let seen = recorder(&engine, "count");
    let button = query(&engine, "#b");

    assert!(engine.dispatch_event(&button, "click").handled);
    assert!(!engine.dispatch_event(&button, "click").handled);
    engine.run_until_idle();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_load_trigger_runs_on_setup_only_once() {
    let (engine, _) = engine(r#"<div id="d" hyp:trigger="load" hyp:action1="run:count"></div>"#);
    let seen = recorder(&engine, "count");
    engine.run_until_idle();
    assert_eq!(seen.borrow().len(), 1);

    engine.init(&engine.body());
    engine.run_until_idle();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_form_fields_trigger_the_form() {
    let (engine, _) = engine(
        r#"<form id="f" hyp:trigger="form:input" hyp:action1="run:count">
            <input id="q" name="q"><textarea name="t">x</textarea><input id="plain">
        </form>"#,
    );
    let seen = recorder(&engine, "count");
    let triggers = events(&engine, EventKind::Trigger);

    let outcome = engine.dispatch_event(&query(&engine, "#q"), "input");
    assert!(outcome.handled);
    assert!(!outcome.default_prevented);
    assert!(!engine.dispatch_event(&query(&engine, "#plain"), "input").handled);
    assert!(!engine.dispatch_event(&query(&engine, "#f"), "submit").handled);
    engine.run_until_idle();

    assert_eq!(*seen.borrow(), vec![json!({ "q": "", "t": "x" })]);
    let first = triggers.borrow()[0].clone();
    match first {
        EngineEvent::Trigger { target, trigger } => {
            assert!(Rc::ptr_eq(&target, &query(&engine, "#f")));
            assert_eq!(trigger, "input");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_trigger_none_registers_nothing() {
    let (engine, _) = engine(r#"<button id="b" hyp:trigger="none" hyp:action1="run:count"></button>"#);
    recorder(&engine, "count");
    assert!(!engine.dispatch_event(&query(&engine, "#b"), "click").handled);
}

#[test]
fn test_hyp_action_triggers_other_element() {
    let (engine, _) = engine(
        r#"<button id="a" hyp:action1="hyp:#b"></button>
           <div id="b" hyp:trigger="none" hyp:action1="run:count"></div>"#,
    );
    let seen = recorder(&engine, "count");
    let triggers = events(&engine, EventKind::Trigger);

    engine.dispatch_event(&query(&engine, "#a"), "click");
    engine.run_until_idle();

    assert_eq!(seen.borrow().len(), 1);
    let names: Vec<String> = triggers
        .borrow()
        .iter()
        .filter_map(|event| match event {
            EngineEvent::Trigger { trigger, .. } => Some(trigger.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["click", "manual"]);
}

#[test]
fn test_removed_action_is_unknown() {
    let (engine, _) = engine(r#"<div id="d" hyp:action1='raw:{"a":1}' hyp:action2="run:check"></div>"#);
    let seen = recorder(&engine, "check");
    assert!(engine.remove_action("raw"));
    assert!(!engine.remove_action("raw"));

    block_on(engine.run_chain(&query(&engine, "#d"))).unwrap();
    assert!(seen.borrow().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_multiple_appends_one_instance_per_entry() {
    let (engine, _) = engine(
        r##"
        <button id="b" hyp:multiple hyp:action1='raw:[{"n":"a"},{"n":"b"}]' hyp:action2="template:#tpl #list append"></button>
        <template id="tpl"><li hyp:attr="text:n"></li></template>
        <ul id="list"><li>existing</li></ul>
        "##,
    );
    let changes = events(&engine, EventKind::HtmlChange);

    block_on(engine.run_chain(&query(&engine, "#b"))).unwrap();

    let list = query(&engine, "#list");
    let items: Vec<String> = dom::child_elements(&list).iter().map(dom::text_content).collect();
    assert_eq!(items, vec!["existing", "a", "b"]);
    assert_eq!(changes.borrow().len(), 2);
}

#[test]
fn test_outer_placement_replaces_location() {
    let (engine, _) = engine(
        r##"
        <button id="b" hyp:action1='raw:{"v":"new"}' hyp:action2="template:#tpl #target outer"></button>
        <template id="tpl"><p id="fresh" hyp:attr="text:v"></p></template>
        <div id="wrap"><span id="target">old</span></div>
        "##,
    );

    block_on(engine.run_chain(&query(&engine, "#b"))).unwrap();

    assert!(engine.locate(None, "#target").is_err());
    assert_eq!(dom::text_content(&query(&engine, "#wrap #fresh")), "new");
}

#[test]
fn test_two_tokens_with_placement_use_origin() {
    let (engine, _) = engine(
        r##"
        <div id="host" hyp:action1='raw:{"v":"x"}' hyp:action2="template:#tpl append"><i>first</i></div>
        <template id="tpl"><b hyp:attr="text:v"></b></template>
        "##,
    );

    block_on(engine.run_chain(&query(&engine, "#host"))).unwrap();

    assert_eq!(dom::text_content(&query(&engine, "#host")), "firstx");
}

#[test]
fn test_template_configuration_errors() {
    let (engine, _) = engine(
        r##"
        <div id="not-template" hyp:action1="template:#plain #out"></div>
        <div id="two-roots" hyp:action1="template:#double #out"></div>
        <div id="bad-placement" hyp:action1="template:#single #out sideways"></div>
        <div id="plain"></div>
        <template id="double"><p></p><p></p></template>
        <template id="single"><p></p></template>
        <div id="out"></div>
        "##,
    );

    for (id, expected) in [
        ("#not-template", "NotATemplate"),
        ("#two-roots", "TemplateRoots"),
        ("#bad-placement", "InvalidPlacement"),
    ] {
        let err = block_on(engine.run_chain(&query(&engine, id))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(format!("{:?}", err).starts_with(expected), "{:?}", err);
    }
}

#[test]
fn test_fill_action_keeps_bindings() {
    let (engine, _) = engine(
        r#"<div id="card" hyp:action1='raw:{"title":"Hi"}' hyp:action2="fill:this"><h2 hyp:attr="text:title"></h2></div>"#,
    );

    block_on(engine.run_chain(&query(&engine, "#card"))).unwrap();

    let title = query(&engine, "#card h2");
    assert_eq!(dom::text_content(&title), "Hi");
    assert!(dom::has_attribute(&title, "hyp:attr"));
    assert_eq!(
        dom::get_attribute(&query(&engine, "#card"), "hyp:action1").as_deref(),
        Some(r#"raw:{"title":"Hi"}"#)
    );
}

#[test]
fn test_not_found_location_reports_error() {
    let (engine, _) = engine(r#"<button id="b" hyp:action1="fill:#missing"></button>"#);
    let errors = events(&engine, EventKind::Error);

    engine.trigger(&query(&engine, "#b"));
    engine.run_until_idle();

    assert_eq!(error_kinds(&errors.borrow()), vec![ErrorKind::NotFound]);
}
