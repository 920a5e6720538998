//! Toasts (`notify`/`alert`) and the stacked information overlay.
//!
//! Both only touch the document through [`Dom`], and schedule their own auto-hide timers.

use crate::{
	compose::Content,
	dom::{Dom, DomEvent, TimerId},
	error::Result,
	html::escape_text,
	instruction::MessageContext,
};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;
use tracing::{error, instrument, trace};

const TOASTER_ID: &str = "toaster";
const OVERLAY_ID: &str = "uib-info-overlay";
const INTERACTIVE: &str = "button, a, input, select, textarea";
const TIMER_PROPERTY: &str = "__uiTimer";
const ESCAPE_BOUND_PROPERTY: &str = "__uiToastEscapeBound";
const OVERLAY_SEQUENCE_PROPERTY: &str = "__uiOverlaySequence";

/// Host-wide defaults for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DialogSettings {
	/// Milliseconds before a toast hides itself.
	pub toast_auto_hide_delay: u64,
	/// Milliseconds before an overlay entry closes itself.
	pub overlay_auto_close_time: u64,
}

impl Default for DialogSettings {
	fn default() -> Self {
		Self {
			toast_auto_hide_delay: 10_000,
			overlay_auto_close_time: 5_000,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
	Notify,
	Alert,
}

impl DialogKind {
	fn as_str(self) -> &'static str {
		match self {
			DialogKind::Notify => "notify",
			DialogKind::Alert => "alert",
		}
	}
}

/// Options of a toast, as found on `notify`/`alert` instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DialogSpec {
	pub content: Option<Value>,
	pub title: Option<String>,
	pub modal: bool,
	/// `false` disables auto-hiding.
	pub autohide: Option<bool>,
	#[serde(alias = "noAutohide")]
	pub no_auto_hide: bool,
	/// Milliseconds.
	pub auto_hide_delay: Option<u64>,
	/// An extra class, e.g. `"warning"`.
	pub variant: Option<String>,
}

impl DialogSpec {
	#[must_use]
	pub fn new(content: &str) -> Self {
		Self {
			content: Some(Value::String(content.to_owned())),
			..Self::default()
		}
	}
}

/// Shows a toast. Returns it, or [`None`] if there was nothing to show or it couldn't be built.
///
/// `alert`s are always modal and never hide by themselves.
/// Toasts containing interactive elements don't hide by themselves either.
#[instrument(skip(dom, spec, context, settings, content))]
pub fn show_dialog<D: Dom>(dom: &mut D, kind: DialogKind, spec: &DialogSpec, context: &MessageContext, settings: &DialogSettings, content: &Content) -> Option<D::Node> {
	let mut body = String::new();
	if let Some(Value::String(payload)) = &context.payload {
		if !payload.trim().is_empty() {
			body.push_str(&format!("<div>{}</div>", payload));
		}
	}
	match &spec.content {
		None | Some(Value::Null) => (),
		Some(Value::String(text)) if text.trim().is_empty() => (),
		Some(Value::String(text)) => body.push_str(&format!("<div>{}</div>", text)),
		Some(other) => body.push_str(&format!("<div>{}</div>", escape_text(&other.to_string()))),
	}
	if body.is_empty() {
		error!(kind = kind.as_str(), "Nothing to show.");
		return None;
	}

	let title = spec.title.as_ref().or_else(|| context.topic.as_ref());
	let html = match title {
		Some(title) => format!("<div class=\"toast-head\">{}</div><div class=\"toast-body\">{}</div>", escape_text(title), body),
		None => format!("<div class=\"toast-body\">{}</div>", body),
	};

	let modal = spec.modal || kind == DialogKind::Alert;
	let auto_hide = kind != DialogKind::Alert && spec.autohide != Some(false) && !spec.no_auto_hide;

	match build_toast(dom, kind, spec, modal, &content.sanitize(&html)) {
		Ok(toast) => {
			if auto_hide && dom.query_selector(Some(&toast), INTERACTIVE).ok().flatten().is_none() {
				let delay = Duration::from_millis(spec.auto_hide_delay.unwrap_or(settings.toast_auto_hide_delay));
				let target = toast.clone();
				let timer = dom.set_timeout(delay, Box::new(move |dom: &mut D| dismiss(dom, &target)));
				remember_timer(dom, &toast, timer);
			}
			bind_escape(dom);
			Some(toast)
		}
		Err(error) => {
			error!(%error, "Failed to show toast.");
			None
		}
	}
}

fn build_toast<D: Dom>(dom: &mut D, kind: DialogKind, spec: &DialogSpec, modal: bool, html: &str) -> Result<D::Node> {
	let toast = dom.create_element("div")?;
	let class = match &spec.variant {
		Some(variant) => format!("toast {} {}", variant, kind.as_str()),
		None => format!("toast {}", kind.as_str()),
	};
	dom.set_attribute(&toast, "class", &class)?;
	dom.set_attribute(&toast, "role", if kind == DialogKind::Alert { "alert" } else { "alertdialog" })?;
	dom.set_attribute(&toast, "title", "Click to clear this notification")?;
	if modal {
		dom.set_attribute(&toast, "aria-modal", "true")?;
	}
	dom.set_inner_html(&toast, html)?;

	dom.add_event_listener(
		&toast,
		"click",
		Rc::new(|dom: &mut D, event: &DomEvent<D::Node>| {
			if dom.closest(&event.target, INTERACTIVE).ok().flatten().is_none() {
				dismiss(dom, &event.current_target);
			}
		}),
	)?;

	let container = if modal { toaster(dom)? } else { dom.body() };
	dom.prepend_child(&container, &toast)?;
	Ok(toast)
}

/// The shared modal backdrop, created at the start of `<body>` if missing.
fn toaster<D: Dom>(dom: &mut D) -> Result<D::Node> {
	if let Some(toaster) = dom.element_by_id(TOASTER_ID) {
		return Ok(toaster);
	}
	let toaster = dom.create_element("div")?;
	dom.set_attribute(&toaster, "id", TOASTER_ID)?;
	dom.set_attribute(&toaster, "class", "toaster modal")?;
	dom.set_attribute(&toaster, "role", "dialog")?;
	let body = dom.body();
	dom.prepend_child(&body, &toaster)?;
	Ok(toaster)
}

/// Removes a toast (and the backdrop, if it was its last toast). Does nothing for detached toasts.
pub fn dismiss<D: Dom>(dom: &mut D, toast: &D::Node) {
	cancel_timer(dom, toast);
	let parent = dom.parent(toast);
	dom.remove(toast);
	if let Some(parent) = parent {
		if dom.attribute(&parent, "id").as_deref() == Some(TOASTER_ID) && dom.children(&parent).is_empty() {
			trace!("Removing empty toaster.");
			dom.remove(&parent);
		}
	}
}

/// Escape dismisses all toasts. Bound once per document.
fn bind_escape<D: Dom>(dom: &mut D) {
	let document = dom.document();
	if dom.property(&document, ESCAPE_BOUND_PROPERTY) == Some(Value::Bool(true)) {
		return;
	}
	let bound = dom.add_event_listener(
		&document,
		"keydown",
		Rc::new(|dom: &mut D, event: &DomEvent<D::Node>| {
			if event.key.as_deref() == Some("Escape") {
				for toast in dom.query_selector_all(None, ".toast").unwrap_or_default() {
					dismiss(dom, &toast);
				}
			}
		}),
	);
	match bound.and_then(|()| dom.set_property(&document, ESCAPE_BOUND_PROPERTY, &Value::Bool(true))) {
		Ok(()) => (),
		Err(error) => error!(%error, "Failed to bind Escape to toast dismissal."),
	}
}

fn remember_timer<D: Dom>(dom: &mut D, node: &D::Node, timer: TimerId) {
	if let Err(error) = dom.set_property(node, TIMER_PROPERTY, &Value::from(timer.0)) {
		error!(%error, "Failed to remember timer.");
	}
}

fn cancel_timer<D: Dom>(dom: &mut D, node: &D::Node) {
	if let Some(timer) = dom.property(node, TIMER_PROPERTY).as_ref().and_then(Value::as_u64) {
		dom.clear_timeout(TimerId(timer));
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
	Info,
	Success,
	Warning,
	Error,
}

impl Default for OverlayKind {
	fn default() -> Self {
		Self::Info
	}
}

impl OverlayKind {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			OverlayKind::Info => "info",
			OverlayKind::Success => "success",
			OverlayKind::Warning => "warning",
			OverlayKind::Error => "error",
		}
	}

	#[must_use]
	pub fn icon(self) -> &'static str {
		match self {
			OverlayKind::Info => "ℹ️",
			OverlayKind::Success => "✅",
			OverlayKind::Warning => "⚠️",
			OverlayKind::Error => "❌",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayOptions {
	/// HTML, sanitized before display.
	pub content: String,
	pub title: Option<String>,
	#[serde(rename = "type")]
	pub kind: OverlayKind,
	/// Replaces the kind's default icon.
	pub icon: Option<String>,
	pub auto_close: bool,
	/// Milliseconds until auto-closing. Defaults to [`DialogSettings::overlay_auto_close_time`].
	pub time: Option<u64>,
	pub show_dismiss: bool,
}

impl Default for OverlayOptions {
	fn default() -> Self {
		Self {
			content: String::new(),
			title: None,
			kind: OverlayKind::Info,
			icon: None,
			auto_close: true,
			time: None,
			show_dismiss: true,
		}
	}
}

/// A shown overlay entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayHandle<N> {
	pub id: String,
	pub entry: N,
	pub timer: Option<TimerId>,
}

impl<N: Clone + PartialEq + core::fmt::Debug + 'static> OverlayHandle<N> {
	/// Cancels the auto-close timer and removes the entry. Closing twice does nothing.
	pub fn close<D: Dom<Node = N>>(&self, dom: &mut D) {
		close_entry(dom, &self.entry);
	}
}

/// Adds an entry to the top of the overlay stack.
///
/// # Errors
///
/// Iff the entry can't be built or inserted.
#[instrument(skip(dom, options, settings, content))]
pub fn show_overlay<D: Dom>(dom: &mut D, options: &OverlayOptions, settings: &DialogSettings, content: &Content) -> Result<OverlayHandle<D::Node>> {
	let container = match dom.element_by_id(OVERLAY_ID) {
		Some(container) => container,
		None => {
			let container = dom.create_element("div")?;
			dom.set_attribute(&container, "id", OVERLAY_ID)?;
			let body = dom.body();
			dom.append_child(&body, &container)?;
			container
		}
	};

	let document = dom.document();
	let sequence = dom.property(&document, OVERLAY_SEQUENCE_PROPERTY).as_ref().and_then(Value::as_u64).unwrap_or(0) + 1;
	dom.set_property(&document, OVERLAY_SEQUENCE_PROPERTY, &Value::from(sequence))?;
	let id = format!("overlay-entry-{}-{}", dom.now_millis(), sequence);

	let entry = dom.create_element("div")?;
	dom.set_attribute(&entry, "id", &id)?;
	dom.set_attribute(&entry, "class", &format!("overlay-entry overlay-{}", options.kind.as_str()))?;
	dom.set_attribute(&entry, "role", "status")?;

	let mut html = format!(
		"<div class=\"overlay-icon\">{}</div><div class=\"overlay-content\">",
		escape_text(options.icon.as_deref().unwrap_or(options.kind.icon()))
	);
	if let Some(title) = &options.title {
		html.push_str(&format!("<div class=\"overlay-title\">{}</div>", escape_text(title)));
	}
	html.push_str(&format!("<div class=\"overlay-message\">{}</div></div>", content.sanitize(&options.content)));
	if options.show_dismiss {
		html.push_str("<button class=\"overlay-close\" type=\"button\" aria-label=\"Close\">×</button>");
	}
	dom.set_inner_html(&entry, &html)?;

	if let Some(close) = dom.query_selector(Some(&entry), ".overlay-close")? {
		let target = entry.clone();
		dom.add_event_listener(&close, "click", Rc::new(move |dom: &mut D, _: &DomEvent<D::Node>| close_entry(dom, &target)))?;
	}
	dom.prepend_child(&container, &entry)?;

	let timer = if options.auto_close {
		let target = entry.clone();
		let delay = Duration::from_millis(options.time.unwrap_or(settings.overlay_auto_close_time));
		let timer = dom.set_timeout(delay, Box::new(move |dom: &mut D| close_entry(dom, &target)));
		remember_timer(dom, &entry, timer);
		Some(timer)
	} else {
		None
	};

	Ok(OverlayHandle { id, entry, timer })
}

fn close_entry<D: Dom>(dom: &mut D, entry: &D::Node) {
	cancel_timer(dom, entry);
	let Some(container) = dom.parent(entry) else {
		return;
	};
	dom.remove(entry);
	if dom.children(&container).is_empty() {
		trace!("Removing empty overlay container.");
		dom.remove(&container);
	}
}
