mod common;

use common::{body_html, init_logging};
use instruction_dom::{
	dom::{Dom, FetchResponse},
	include::{wrap_response, TemplateMode, TemplateOptions},
	memory::{ExecutedScript, MemoryDom},
	BatchReport, ComponentSpec, Engine, Error, Result,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map};
use std::{cell::RefCell, rc::Rc};

type Outcome<T> = Rc<RefCell<Option<Result<T>>>>;

fn setup(html: &str) -> (MemoryDom, Engine<MemoryDom>) {
	init_logging();
	let mut dom = MemoryDom::new();
	let body = dom.body();
	dom.set_inner_html(&body, html).unwrap();
	(dom, Engine::new())
}

fn include(dom: &mut MemoryDom, engine: &Engine<MemoryDom>, url: &str, spec: ComponentSpec<instruction_dom::memory::NodeId>) -> Outcome<String> {
	let outcome: Outcome<String> = Rc::default();
	engine.include(dom, url, spec, {
		let outcome = outcome.clone();
		move |_: &mut MemoryDom, result| *outcome.borrow_mut() = Some(result)
	});
	assert!(outcome.borrow().is_none());
	assert_eq!(dom.run_pending(), 1);
	outcome
}

#[test]
fn media_types() {
	let wrap = |content_type: &str, body: &str| wrap_response(&FetchResponse::new("/x", content_type, body));
	assert_eq!(wrap("text/html; charset=utf-8", "<b>hi</b>"), "<div><b>hi</b></div>");
	assert_eq!(wrap("application/json", r#"{"a":1}"#), "<pre class=\"syntax-highlight\">{\n  \"a\": 1\n}</pre>");
	assert_eq!(wrap("multipart/form-data", "a=<1>"), "<pre>a=&lt;1&gt;</pre>");
	assert_eq!(wrap("image/png", ""), "<img src=\"/x\">");
	assert_eq!(wrap("video/mp4", ""), "<video controls=\"\" src=\"/x\"></video>");
	assert_eq!(wrap("application/pdf", ""), "<iframe class=\"pdf\" src=\"/x\"></iframe>");
	assert_eq!(wrap("text/plain", "1 < 2"), "<pre>1 &lt; 2</pre>");
	assert_eq!(wrap("application/zip", ""), "<object data=\"/x\" type=\"application/zip\"></object>");
}

#[test]
fn included_fragments_are_added_to_body() {
	let (mut dom, engine) = setup("<div>first</div>");
	dom.serve("/frag.html", FetchResponse::new("/frag.html", "text/html", "<b>hi</b>"));

	let outcome = include(&mut dom, &engine, "/frag.html", ComponentSpec::default());
	assert_eq!(*outcome.borrow(), Some(Ok("Include successful".to_owned())));
	assert_eq!(body_html(&dom), r#"<div>first</div><div class="included"><div><b>hi</b></div></div>"#);
}

#[test]
fn repeated_includes_with_an_id_swap_content() {
	let (mut dom, engine) = setup("");
	dom.serve("/a.txt", FetchResponse::new("/a.txt", "text/plain", "a"));
	dom.serve("/b.txt", FetchResponse::new("/b.txt", "text/plain", "b"));

	include(&mut dom, &engine, "/a.txt", ComponentSpec::default().with_id("inc"));
	include(&mut dom, &engine, "/b.txt", ComponentSpec::default().with_id("inc"));
	assert_eq!(body_html(&dom), r#"<div class="included" id="inc"><pre>b</pre></div>"#);
}

#[test]
fn failed_includes_report_why() {
	let (mut dom, engine) = setup("");
	dom.serve("/gone", FetchResponse::new("/gone", "text/html", "nope").with_status(404));

	let outcome = include(&mut dom, &engine, "/gone", ComponentSpec::default());
	assert_eq!(
		*outcome.borrow(),
		Some(Err(Error::Fetch {
			url: "/gone".to_owned(),
			message: "status 404".to_owned(),
		}))
	);

	let outcome = include(&mut dom, &engine, "/unserved", ComponentSpec::default());
	assert!(matches!(*outcome.borrow(), Some(Err(Error::Fetch { .. }))));
	assert_eq!(body_html(&dom), "");
}

#[test]
fn remote_ui_documents() {
	let (mut dom, engine) = setup("");
	dom.serve(
		"/ui.json",
		FetchResponse::new("/ui.json", "application/json", r#"{ "_ui": [{ "method": "add", "components": [{ "type": "p", "slot": "remote" }] }, { "method": "?" }] }"#),
	);
	dom.serve("/bare.json", FetchResponse::new("/bare.json", "application/json", r#"[{ "method": "reload" }]"#));
	dom.serve("/broken.json", FetchResponse::new("/broken.json", "application/json", "{"));

	let outcomes: Vec<Outcome<BatchReport>> = ["/ui.json", "/bare.json", "/broken.json"]
		.iter()
		.map(|url| {
			let outcome: Outcome<BatchReport> = Rc::default();
			engine.load_ui(&mut dom, url, {
				let outcome = outcome.clone();
				move |_: &mut MemoryDom, result| *outcome.borrow_mut() = Some(result)
			});
			outcome
		})
		.collect();
	assert_eq!(dom.run_pending(), 3);

	assert_eq!(*outcomes[0].borrow(), Some(Ok(BatchReport { applied: 1, skipped: 1 })));
	assert_eq!(*outcomes[1].borrow(), Some(Ok(BatchReport { applied: 1, skipped: 0 })));
	assert!(matches!(*outcomes[2].borrow(), Some(Err(Error::Serialization(_)))));
	assert_eq!(body_html(&dom), "<p>remote</p>");
	assert_eq!(dom.reload_count(), 1);
}

const TEMPLATE: &str = r#"<template id="tpl"><section class="card"><slot></slot><script>t()</script></section></template><div id="target"><p>old</p></div>"#;

fn target_html(dom: &MemoryDom) -> String {
	dom.inner_html(&dom.element_by_id("target").unwrap()).unwrap()
}

#[test]
fn templates_insert_clones() {
	let (mut dom, engine) = setup(TEMPLATE);
	let first = engine.apply_template(&mut dom, "tpl", "target", &TemplateOptions::default()).unwrap();
	assert_eq!(first.and_then(|first| dom.tag_name(&first)).as_deref(), Some("section"));
	engine.apply_template(&mut dom, "tpl", "target", &TemplateOptions::default()).unwrap();

	assert_eq!(
		target_html(&dom),
		r#"<p>old</p><section class="card"><slot></slot><script>t()</script></section><section class="card"><slot></slot><script>t()</script></section>"#
	);
	assert_eq!(dom.executed_scripts().len(), 2);
	assert_eq!(
		dom.executed_scripts()[0],
		ExecutedScript {
			src: None,
			text: "t()".to_owned(),
		}
	);
}

#[test]
fn templates_replace_and_set_attributes() {
	let (mut dom, engine) = setup(TEMPLATE);
	let mut attributes = Map::new();
	attributes.insert("data-x".to_owned(), json!(1));
	let options = TemplateOptions {
		mode: TemplateMode::Replace,
		attributes,
		..TemplateOptions::default()
	};
	engine.apply_template(&mut dom, "tpl", "target", &options).unwrap();
	assert_eq!(target_html(&dom), r#"<section class="card" data-x="1"><slot></slot><script>t()</script></section>"#);
}

#[test]
fn templates_wrap_previous_content() {
	let (mut dom, engine) = setup(TEMPLATE);
	let options = TemplateOptions {
		mode: TemplateMode::Wrap,
		..TemplateOptions::default()
	};
	engine.apply_template(&mut dom, "tpl", "target", &options).unwrap();
	assert_eq!(target_html(&dom), r#"<section class="card"><slot><p>old</p></slot><script>t()</script></section>"#);
}

#[test]
fn wrapping_without_slot_appends() {
	let (mut dom, engine) = setup(r#"<template id="plain"><b>no slot</b></template><div id="target"><p>old</p></div>"#);
	let options = TemplateOptions {
		mode: TemplateMode::Wrap,
		..TemplateOptions::default()
	};
	engine.apply_template(&mut dom, "plain", "target", &options).unwrap();
	assert_eq!(target_html(&dom), "<b>no slot</b><p>old</p>");
}

#[test]
fn once_only_templates_are_used_up() {
	let (mut dom, engine) = setup(TEMPLATE);
	let options = TemplateOptions {
		once_only: true,
		..TemplateOptions::default()
	};
	assert!(engine.apply_template(&mut dom, "tpl", "target", &options).unwrap().is_some());
	assert_eq!(engine.apply_template(&mut dom, "tpl", "target", &options), Ok(None));
	assert_eq!(dom.inner_html(&dom.element_by_id("tpl").unwrap()).unwrap(), "");
}

#[test]
fn template_errors() {
	let (mut dom, engine) = setup(TEMPLATE);
	let options = TemplateOptions::default();
	assert!(matches!(engine.apply_template(&mut dom, "missing", "target", &options), Err(Error::NotFound(_))));
	assert!(matches!(engine.apply_template(&mut dom, "tpl", "missing", &options), Err(Error::NotFound(_))));
	assert!(matches!(engine.apply_template(&mut dom, "target", "tpl", &options), Err(Error::NotAnElement { .. })));
}
