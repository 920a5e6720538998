mod common;

use common::{body_html, init_logging};
use core::time::Duration;
use instruction_dom::{
	dialog::{DialogKind, DialogSettings, DialogSpec, OverlayKind, OverlayOptions},
	dom::{Dom, EventInit},
	instruction::MessageContext,
	memory::MemoryDom,
	Engine,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn setup() -> (MemoryDom, Engine<MemoryDom>) {
	init_logging();
	(MemoryDom::new(), Engine::new())
}

#[test]
fn notifications_hide_themselves() {
	let (mut dom, engine) = setup();
	engine.ui(&mut dom, &json!({ "_ui": { "method": "notify", "content": "Saved", "autoHideDelay": 100 }, "topic": "Status" }));

	assert_eq!(
		body_html(&dom),
		r#"<div class="toast notify" role="alertdialog" title="Click to clear this notification"><div class="toast-head">Status</div><div class="toast-body"><div>Saved</div></div></div>"#
	);
	assert_eq!(dom.pending_timers(), 1);

	dom.advance(Duration::from_millis(99));
	assert!(dom.query_selector(None, ".toast").unwrap().is_some());
	dom.advance(Duration::from_millis(1));
	assert_eq!(body_html(&dom), "");
	assert_eq!(dom.pending_timers(), 0);
}

#[test]
fn notifications_use_the_configured_default_delay() {
	init_logging();
	let mut dom = MemoryDom::new();
	let engine = Engine::<MemoryDom>::builder()
		.dialog_settings(DialogSettings {
			toast_auto_hide_delay: 20,
			..DialogSettings::default()
		})
		.build();
	engine.show_dialog(&mut dom, DialogKind::Notify, &DialogSpec::new("Hi"), &MessageContext::default()).unwrap();

	dom.advance(Duration::from_millis(20));
	assert_eq!(body_html(&dom), "");
}

#[test]
fn alerts_are_modal_and_stay_until_clicked() {
	let (mut dom, engine) = setup();
	engine.apply(&mut dom, &json!({ "method": "alert", "content": "Stop", "variant": "error" }));

	assert_eq!(
		body_html(&dom),
		r#"<div id="toaster" class="toaster modal" role="dialog"><div class="toast error alert" role="alert" title="Click to clear this notification" aria-modal="true"><div class="toast-body"><div>Stop</div></div></div></div>"#
	);
	assert_eq!(dom.pending_timers(), 0);

	let toast = dom.query_selector(None, ".toast").unwrap().unwrap();
	dom.click(toast).unwrap();
	assert_eq!(body_html(&dom), "");
}

#[test]
fn interactive_content_keeps_toasts_open() {
	let (mut dom, engine) = setup();
	let toast = engine
		.show_dialog(&mut dom, DialogKind::Notify, &DialogSpec::new("Proceed? <button>OK</button>"), &MessageContext::default())
		.unwrap();
	assert_eq!(dom.pending_timers(), 0);

	let button = dom.query_selector(Some(&toast), "button").unwrap().unwrap();
	dom.click(button).unwrap();
	assert!(dom.is_connected(&toast));

	dom.click(toast).unwrap();
	assert!(!dom.is_connected(&toast));
}

#[test]
fn escape_dismisses_every_toast() {
	let (mut dom, engine) = setup();
	engine.apply(
		&mut dom,
		&json!([
			{ "method": "notify", "content": "one" },
			{ "method": "notify", "content": "two", "autohide": false },
			{ "method": "alert", "content": "three" },
		]),
	);
	assert_eq!(dom.query_selector_all(None, ".toast").unwrap().len(), 3);
	assert_eq!(dom.pending_timers(), 1);

	let body = dom.body();
	dom.dispatch_event(&body, EventInit::key("keydown", "Enter")).unwrap();
	assert_eq!(dom.query_selector_all(None, ".toast").unwrap().len(), 3);

	dom.dispatch_event(&body, EventInit::key("keydown", "Escape")).unwrap();
	assert_eq!(body_html(&dom), "");
	assert_eq!(dom.pending_timers(), 0);
}

#[test]
fn payload_is_shown_before_content() {
	let (mut dom, engine) = setup();
	engine.ui(&mut dom, &json!({ "_ui": [{ "method": "notify", "content": "content", "noAutohide": true }], "payload": "payload" }));
	let body = dom.query_selector(None, ".toast-body").unwrap().unwrap();
	assert_eq!(dom.inner_html(&body).unwrap(), "<div>payload</div><div>content</div>");
	assert_eq!(dom.pending_timers(), 0);
}

#[test]
fn nothing_to_show() {
	let (mut dom, engine) = setup();
	assert_eq!(engine.apply(&mut dom, &json!({ "method": "notify", "content": "  " })).applied, 1);
	assert!(engine.show_dialog(&mut dom, DialogKind::Alert, &DialogSpec::default(), &MessageContext::default()).is_none());
	assert_eq!(body_html(&dom), "");
}

#[test]
fn overlay_entries_stack_and_close() {
	let (mut dom, engine) = setup();
	let first = engine
		.show_overlay(
			&mut dom,
			&OverlayOptions {
				content: "Hello <b>world</b>".to_owned(),
				title: Some("T".to_owned()),
				kind: OverlayKind::Warning,
				..OverlayOptions::default()
			},
		)
		.unwrap();
	assert_eq!(first.id, "overlay-entry-0-1");
	assert!(first.timer.is_some());
	assert_eq!(
		dom.outer_html(first.entry).unwrap(),
		r#"<div id="overlay-entry-0-1" class="overlay-entry overlay-warning" role="status"><div class="overlay-icon">⚠️</div><div class="overlay-content"><div class="overlay-title">T</div><div class="overlay-message">Hello <b>world</b></div></div><button class="overlay-close" type="button" aria-label="Close">×</button></div>"#
	);

	let second = engine
		.show_overlay(
			&mut dom,
			&OverlayOptions {
				content: "sticky".to_owned(),
				auto_close: false,
				show_dismiss: false,
				..OverlayOptions::default()
			},
		)
		.unwrap();
	assert_eq!(second.id, "overlay-entry-0-2");
	assert_eq!(second.timer, None);

	let container = dom.element_by_id("uib-info-overlay").unwrap();
	assert_eq!(dom.children(&container), vec![second.entry, first.entry]);

	dom.advance(Duration::from_millis(5_000));
	assert_eq!(dom.children(&container), vec![second.entry]);

	second.close(&mut dom);
	second.close(&mut dom);
	assert!(dom.element_by_id("uib-info-overlay").is_none());
}

#[test]
fn overlay_close_button() {
	let (mut dom, engine) = setup();
	let handle = engine
		.show_overlay(
			&mut dom,
			&OverlayOptions {
				content: "x".to_owned(),
				kind: OverlayKind::Success,
				icon: Some("*".to_owned()),
				time: Some(50),
				..OverlayOptions::default()
			},
		)
		.unwrap();
	let icon = dom.query_selector(Some(&handle.entry), ".overlay-icon").unwrap().unwrap();
	assert_eq!(dom.text_content(&icon), "*");

	let close = dom.query_selector(Some(&handle.entry), ".overlay-close").unwrap().unwrap();
	dom.click(close).unwrap();
	assert_eq!(body_html(&dom), "");
	assert_eq!(dom.pending_timers(), 0);
}
