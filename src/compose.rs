//! Making one existing node conform to a [`ComponentSpec`].

use crate::{
	dom::{Dom, EventInit, XLINK_NAMESPACE, SVG_NAMESPACE, XMLNS_NAMESPACE},
	error::Result,
	handlers::HandlerRegistry,
	instruction::ComponentSpec,
	markdown::MarkdownRenderer,
	sanitize::Sanitizer,
};
use core::fmt;
use serde_json::Value;
use tracing::{error, instrument, level_filters::STATIC_MAX_LEVEL, trace, warn, Level};

/// Remembers which `event:handler` pairs were bound to a node, so composing the same spec again doesn't bind twice.
pub(crate) const BOUND_EVENTS_PROPERTY: &str = "__uiBoundEvents";

/// The optional content strategies, resolved once.
#[derive(Default)]
pub struct Content {
	pub sanitizer: Option<Box<dyn Sanitizer>>,
	pub markdown: Option<Box<dyn MarkdownRenderer>>,
}

impl fmt::Debug for Content {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Content")
			.field("sanitizer", &self.sanitizer.is_some())
			.field("markdown", &self.markdown.is_some())
			.finish()
	}
}

impl Content {
	/// Passes `html` through unchanged if there is no sanitizer.
	#[must_use]
	pub fn sanitize(&self, html: &str) -> String {
		match &self.sanitizer {
			Some(sanitizer) => sanitizer.sanitize(html),
			None => html.to_owned(),
		}
	}

	/// Unsanitized. Without a renderer, the Markdown source is used as HTML as-is.
	#[must_use]
	pub fn render_markdown(&self, markdown: &str) -> String {
		match &self.markdown {
			Some(renderer) => renderer.render(markdown),
			None => {
				trace!("No Markdown renderer configured. Using the source as-is.");
				markdown.to_owned()
			}
		}
	}

	/// Replaces the content of `node` with sanitized `html`.
	///
	/// The new nodes are inserted structurally, so `<script>`s in them run. `<template>`s get plain `innerHTML` assignment instead.
	///
	/// # Errors
	///
	/// Iff `node` can't take the content.
	#[instrument(skip(self, dom, html))]
	pub fn replace_content<D: Dom>(&self, dom: &mut D, node: &D::Node, html: &str) -> Result<()> {
		let html = self.sanitize(html);
		if cfg!(feature = "dangerous-logging") {
			trace!(html = html.as_str(), "Replacing content.");
		}

		if dom.tag_name(node).as_deref() == Some("template") {
			return dom.set_inner_html(node, &html);
		}
		let fragment = dom.create_fragment(node, &html)?;
		dom.clear_children(node);
		for child in &fragment {
			dom.append_child(node, child)?;
		}
		Ok(())
	}
}

/// Renders a slot or attribute value as text. Strings are used as-is, anything else as JSON.
pub(crate) fn value_text(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

pub struct Composer<'a, D: Dom> {
	pub content: &'a Content,
	pub handlers: &'a HandlerRegistry<D>,
}

impl<'a, D: Dom> Composer<'a, D> {
	/// Mutates `node` in place to match `spec`. Nested `components` are not touched here.
	///
	/// `payload` stands in for a missing or empty `slot`.
	///
	/// Each part is applied best-effort: a failing attribute, property or handler is logged and the rest still applies.
	#[instrument(skip(self, dom, spec, payload))]
	pub fn compose(&self, dom: &mut D, node: &D::Node, spec: &ComponentSpec<D::Node>, payload: Option<&Value>) {
		for (name, value) in &spec.attributes {
			if let Err(error) = self.set_attribute(dom, node, name, value) {
				error!(attribute = name.as_str(), %error, "Failed to set attribute.");
			}
		}

		if let Some(id) = &spec.id {
			if let Err(error) = dom.set_attribute(node, "id", id) {
				error!(%error, "Failed to set id.");
			}
		}

		if dom.tag_name(node).as_deref() == Some("svg") && dom.namespace_uri(node).as_deref() == Some(SVG_NAMESPACE) {
			if let Err(error) = dom.set_attribute_ns(node, XMLNS_NAMESPACE, "xmlns:xlink", XLINK_NAMESPACE) {
				error!(%error, "Failed to declare the XLink namespace.");
			}
		}

		for (event, handler) in &spec.events {
			self.bind_event(dom, node, event, handler);
		}

		for (name, value) in &spec.properties {
			if let Err(error) = dom.set_property(node, name, value) {
				error!(property = name.as_str(), %error, "Failed to set property.");
				continue;
			}
			if name == "value" || name == "checked" {
				notify_change(dom, node);
			}
		}

		let slot = if spec.has_empty_slot() { payload } else { spec.slot.as_ref() };
		if let Some(slot) = slot.filter(|slot| !slot.is_null()) {
			if let Err(error) = self.content.replace_content(dom, node, &value_text(slot)) {
				error!(%error, "Failed to apply slot.");
			}
		}

		// Rendered Markdown overwrites the slot.
		if let Some(markdown) = &spec.slot_markdown {
			let html = self.content.render_markdown(markdown);
			if let Err(error) = self.content.replace_content(dom, node, &html) {
				error!(%error, "Failed to apply slotMarkdown.");
			}
		}
	}

	fn set_attribute(&self, dom: &mut D, node: &D::Node, name: &str, value: &Value) -> Result<()> {
		let text = match (name, value) {
			(_, Value::Null) => return dom.remove_attribute(node, name),
			("class", Value::Array(classes)) => classes.iter().map(value_text).collect::<Vec<_>>().join(" "),
			(_, value) => value_text(value),
		};
		if name.starts_with("xlink:") {
			dom.set_attribute_ns(node, XLINK_NAMESPACE, name, &text)?;
		} else {
			dom.set_attribute(node, name, &text)?;
		}
		if name == "value" {
			dom.set_property(node, "value", &Value::String(text))?;
		}
		Ok(())
	}

	fn bind_event(&self, dom: &mut D, node: &D::Node, event: &str, handler: &Value) {
		let Some(handler_name) = handler.as_str() else {
			error!(event, "Handler references must be names.");
			return;
		};
		let Some(listener) = self.handlers.get(handler_name) else {
			warn!(event, handler = handler_name, "No handler registered under this name. Skipping.");
			return;
		};

		let binding = format!("{}:{}", event, handler_name);
		let mut bound = match dom.property(node, BOUND_EVENTS_PROPERTY) {
			Some(Value::Array(bound)) => bound,
			_ => Vec::new(),
		};
		if bound.iter().any(|existing| existing.as_str() == Some(binding.as_str())) {
			trace!(binding = binding.as_str(), "Already bound.");
			return;
		}

		match dom.add_event_listener(node, event, listener) {
			Ok(()) => {
				bound.push(Value::String(binding));
				if let Err(error) = dom.set_property(node, BOUND_EVENTS_PROPERTY, &Value::Array(bound)) {
					if STATIC_MAX_LEVEL >= Level::WARN {
						warn!(%error, "Failed to remember event binding. Composing again will bind again.");
					}
				}
			}
			Err(error) => error!(event, handler = handler_name, %error, "Failed to bind handler."),
		}
	}
}

/// Lets listeners see programmatic value changes the way they'd see user input.
fn notify_change<D: Dom>(dom: &mut D, node: &D::Node) {
	for kind in ["input", "change"] {
		if let Err(error) = dom.dispatch_event(node, EventInit::new(kind)) {
			error!(kind, %error, "Failed to dispatch synthetic event.");
		}
	}
}
