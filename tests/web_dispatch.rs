#![cfg(target_arch = "wasm32")]

use instruction_dom::{
	dom::{Dom, DomEvent},
	web::WebDom,
	Engine,
};
use serde_json::json;
use std::{cell::Cell, rc::Rc};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlElement, Node};

wasm_bindgen_test_configure!(run_in_browser);

static mut LOG_INITIALIZED: bool = false;

fn setup() -> (WebDom, Engine<WebDom>) {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}

	let mut dom = WebDom::new().unwrap();
	let body = dom.body();
	dom.set_inner_html(&body, "").unwrap();
	(dom, Engine::new())
}

#[wasm_bindgen_test]
fn add_update_remove() {
	let (mut dom, engine) = setup();
	engine.apply(
		&mut dom,
		&json!([
			{ "method": "add", "components": [{ "type": "p", "id": "greeting", "slot": "Hello" }] },
			{ "method": "update", "id": "greeting", "attributes": { "class": "loud" } },
		]),
	);
	let body = window().unwrap().document().unwrap().body().unwrap();
	assert_eq!(body.inner_html(), r#"<p id="greeting" class="loud">Hello</p>"#);

	engine.apply(&mut dom, &json!({ "method": "remove", "components": ["#greeting"] }));
	assert_eq!(body.inner_html(), "");
}

#[wasm_bindgen_test]
fn svg_elements_are_namespaced() {
	let (mut dom, engine) = setup();
	engine.apply(&mut dom, &json!({ "method": "add", "components": [{ "type": "svg", "components": [{ "type": "circle", "attributes": { "r": "1" } }] }] }));
	let circle: Node = dom.query_selector(None, "svg circle").unwrap().unwrap();
	assert_eq!(dom.namespace_uri(&circle).as_deref(), Some("http://www.w3.org/2000/svg"));
}

#[wasm_bindgen_test]
fn handlers_receive_clicks() {
	let (mut dom, engine) = setup();
	let clicks = Rc::new(Cell::new(0));
	engine.register_handler("count", {
		let clicks = clicks.clone();
		move |_: &mut WebDom, _: &DomEvent<Node>| clicks.set(clicks.get() + 1)
	});
	engine.apply(&mut dom, &json!({ "method": "add", "components": [{ "type": "button", "id": "b", "events": { "click": "count" } }] }));

	let button: HtmlElement = dom.element_by_id("b").unwrap().dyn_into().unwrap();
	button.click();
	assert_eq!(clicks.get(), 1);
}

#[wasm_bindgen_test]
fn properties_round_trip_as_json() {
	let (mut dom, engine) = setup();
	engine.apply(&mut dom, &json!({ "method": "add", "components": [{ "type": "input", "id": "i", "properties": { "value": "42", "extra": { "a": [1, 2] } } }] }));
	let input = dom.element_by_id("i").unwrap();
	assert_eq!(dom.property(&input, "value"), Some(json!("42")));
	assert_eq!(dom.property(&input, "extra"), Some(json!({ "a": [1, 2] })));
}
