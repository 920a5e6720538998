//! [`Dom`] over [`web_sys`], for use in browsers.
//!
//! Nodes are plain [`web_sys::Node`]s. Properties are read and written through [`js_sys::Reflect`] as JSON-compatible values.
//!
//! Listeners, timers and fetches receive a fresh [`WebDom`] handle for the same document when called.
//! Their closures are handed over to JavaScript and never reclaimed, so cancelled timers and
//! never-settling requests leak a little memory each.

use crate::{
	dom::{Dom, DomEvent, EventInit, FetchCallback, FetchResponse, Listener, NodeType, TimerCallback, TimerId},
	error::{Error, Result},
};
use core::{cell::RefCell, convert::TryFrom, time::Duration};
use js_sys::{Date, Function, Promise, Reflect, JSON};
use serde_json::Value;
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Document, Element, HtmlTemplateElement, KeyboardEvent, KeyboardEventInit, Node, Window};

fn host_error(value: JsValue) -> Error {
	Error::Host(format!("{:?}", value))
}

#[derive(Debug, Clone)]
pub struct WebDom {
	window: Window,
	document: Document,
}

impl WebDom {
	/// The current window's document, if there is one.
	#[must_use]
	pub fn new() -> Option<Self> {
		let window = web_sys::window()?;
		let document = window.document()?;
		Some(Self { window, document })
	}

	#[must_use]
	pub fn from_parts(window: Window, document: Document) -> Self {
		Self { window, document }
	}

	fn element(node: &Node) -> Result<&Element> {
		node.dyn_ref::<Element>().ok_or_else(|| Error::NotAnElement { found: node.node_name() })
	}
}

fn node_list(list: &web_sys::NodeList) -> Vec<Node> {
	(0..list.length()).filter_map(|i| list.item(i)).collect()
}

impl Dom for WebDom {
	type Node = Node;

	fn document(&self) -> Node {
		self.document.clone().into()
	}

	fn head(&self) -> Node {
		match self.document.query_selector("head") {
			Ok(Some(head)) => head.into(),
			_ => self.document(),
		}
	}

	fn body(&self) -> Node {
		match self.document.body() {
			Some(body) => body.into(),
			None => self.document(),
		}
	}

	fn node_type(&self, node: &Node) -> NodeType {
		match node.node_type() {
			Node::ELEMENT_NODE => NodeType::Element,
			Node::TEXT_NODE => NodeType::Text,
			Node::COMMENT_NODE => NodeType::Comment,
			Node::DOCUMENT_NODE => NodeType::Document,
			_ => NodeType::Other,
		}
	}

	fn create_element(&mut self, tag: &str) -> Result<Node> {
		self.document.create_element(tag).map(Into::into).map_err(host_error)
	}

	fn create_element_ns(&mut self, namespace: &str, tag: &str) -> Result<Node> {
		self.document.create_element_ns(Some(namespace), tag).map(Into::into).map_err(host_error)
	}

	fn create_text_node(&mut self, text: &str) -> Node {
		self.document.create_text_node(text).into()
	}

	fn tag_name(&self, node: &Node) -> Option<String> {
		node.dyn_ref::<Element>().map(Element::local_name)
	}

	fn namespace_uri(&self, node: &Node) -> Option<String> {
		node.dyn_ref::<Element>().and_then(Element::namespace_uri)
	}

	fn attribute(&self, node: &Node, name: &str) -> Option<String> {
		node.dyn_ref::<Element>()?.get_attribute(name)
	}

	fn attributes(&self, node: &Node) -> Vec<(String, String)> {
		let Some(element) = node.dyn_ref::<Element>() else {
			return Vec::new();
		};
		let attributes = element.attributes();
		(0..attributes.length()).filter_map(|i| attributes.item(i)).map(|attribute| (attribute.name(), attribute.value())).collect()
	}

	fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> Result<()> {
		Self::element(node)?.set_attribute(name, value).map_err(host_error)
	}

	fn set_attribute_ns(&mut self, node: &Node, namespace: &str, qualified_name: &str, value: &str) -> Result<()> {
		Self::element(node)?.set_attribute_ns(Some(namespace), qualified_name, value).map_err(host_error)
	}

	fn remove_attribute(&mut self, node: &Node, name: &str) -> Result<()> {
		Self::element(node)?.remove_attribute(name).map_err(host_error)
	}

	fn property(&self, node: &Node, name: &str) -> Option<Value> {
		let value = Reflect::get(node, &JsValue::from_str(name)).ok()?;
		if value.is_undefined() {
			return None;
		}
		let json = JSON::stringify(&value).ok()?.as_string()?;
		serde_json::from_str(&json).ok()
	}

	fn set_property(&mut self, node: &Node, name: &str, value: &Value) -> Result<()> {
		let value = JSON::parse(&serde_json::to_string(value)?).map_err(host_error)?;
		match Reflect::set(node, &JsValue::from_str(name), &value) {
			Ok(true) => Ok(()),
			Ok(false) => Err(Error::Host(format!("Property {:?} is read-only", name))),
			Err(error) => Err(host_error(error)),
		}
	}

	fn text_content(&self, node: &Node) -> String {
		node.text_content().unwrap_or_default()
	}

	fn set_text_content(&mut self, node: &Node, text: &str) -> Result<()> {
		node.set_text_content(Some(text));
		Ok(())
	}

	fn inner_html(&self, node: &Node) -> Result<String> {
		Ok(Self::element(node)?.inner_html())
	}

	fn set_inner_html(&mut self, node: &Node, html: &str) -> Result<()> {
		Self::element(node)?.set_inner_html(html);
		Ok(())
	}

	fn create_fragment(&mut self, context: &Node, html: &str) -> Result<Vec<Node>> {
		let range = self.document.create_range().map_err(host_error)?;
		range.select_node_contents(context).map_err(host_error)?;
		let fragment = range.create_contextual_fragment(html).map_err(host_error)?;
		Ok(node_list(&fragment.child_nodes()))
	}

	fn template_content(&mut self, template: &Node, adopt: bool) -> Result<Vec<Node>> {
		let template = template.dyn_ref::<HtmlTemplateElement>().ok_or_else(|| Error::NotAnElement {
			found: format!("{} instead of <template>", template.node_name()),
		})?;
		node_list(&template.content().child_nodes())
			.iter()
			.map(|child| if adopt { self.document.adopt_node(child) } else { self.document.import_node_with_deep(child, true) }.map_err(host_error))
			.collect()
	}

	fn parent(&self, node: &Node) -> Option<Node> {
		node.parent_node()
	}

	fn child_nodes(&self, node: &Node) -> Vec<Node> {
		node_list(&node.child_nodes())
	}

	fn insert_before(&mut self, parent: &Node, child: &Node, reference: Option<&Node>) -> Result<()> {
		parent.insert_before(child, reference).map(drop).map_err(|error| Error::HierarchyRequest(format!("{:?}", error)))
	}

	fn remove(&mut self, node: &Node) {
		if let Some(parent) = node.parent_node() {
			if let Err(error) = parent.remove_child(node) {
				trace!(?error, "Failed to remove node.");
			}
		}
	}

	fn query_selector_all(&self, scope: Option<&Node>, selector: &str) -> Result<Vec<Node>> {
		let unsupported = |_| Error::UnsupportedSelector(selector.to_owned());
		let list = match scope.map(|scope| scope.dyn_ref::<Element>()) {
			Some(Some(scope)) => scope.query_selector_all(selector).map_err(unsupported)?,
			Some(None) | None => self.document.query_selector_all(selector).map_err(unsupported)?,
		};
		Ok(node_list(&list))
	}

	fn element_by_id(&self, id: &str) -> Option<Node> {
		self.document.get_element_by_id(id).map(Into::into)
	}

	fn matches(&self, node: &Node, selector: &str) -> Result<bool> {
		match node.dyn_ref::<Element>() {
			Some(element) => element.matches(selector).map_err(|_| Error::UnsupportedSelector(selector.to_owned())),
			None => Ok(false),
		}
	}

	#[instrument(skip(self, listener))]
	fn add_event_listener(&mut self, target: &Node, kind: &str, listener: Listener<Self>) -> Result<()> {
		let dom = self.clone();
		let current_target = target.clone();
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
			let span = trace_span!("listener", kind = event.type_().as_str());
			let _enter = span.enter();

			let event = DomEvent {
				kind: event.type_(),
				key: event.dyn_ref::<KeyboardEvent>().map(KeyboardEvent::key),
				target: event.target().and_then(|target| target.dyn_into::<Node>().ok()).unwrap_or_else(|| current_target.clone()),
				current_target: current_target.clone(),
			};
			listener(&mut dom.clone(), &event);
		}) as Box<dyn FnMut(web_sys::Event)>);
		target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref()).map_err(host_error)?;
		closure.forget();
		Ok(())
	}

	fn dispatch_event(&mut self, target: &Node, event: EventInit) -> Result<()> {
		let dispatched = match &event.key {
			Some(key) => {
				let init = KeyboardEventInit::new();
				init.set_bubbles(event.bubbles);
				init.set_key(key);
				KeyboardEvent::new_with_keyboard_event_init_dict(&event.kind, &init).map(Into::<web_sys::Event>::into)
			}
			None => {
				let init = web_sys::EventInit::new();
				init.set_bubbles(event.bubbles);
				web_sys::Event::new_with_event_init_dict(&event.kind, &init)
			}
		}
		.map_err(host_error)?;
		target.dispatch_event(&dispatched).map(drop).map_err(host_error)
	}

	fn set_timeout(&mut self, delay: Duration, callback: TimerCallback<Self>) -> TimerId {
		let dom = self.clone();
		let closure = Closure::once_into_js(move || callback(&mut dom.clone()));
		let timeout = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
		match self.window.set_timeout_with_callback_and_timeout_and_arguments_0(closure.unchecked_ref(), timeout) {
			Ok(handle) => TimerId(u64::from(handle.unsigned_abs())),
			Err(error) => {
				error!(?error, "Failed to set timeout.");
				TimerId(u64::MAX)
			}
		}
	}

	fn clear_timeout(&mut self, timer: TimerId) {
		if let Ok(handle) = i32::try_from(timer.0) {
			self.window.clear_timeout_with_handle(handle);
		}
	}

	#[instrument(skip(self, callback))]
	fn fetch(&mut self, url: &str, callback: FetchCallback<Self>) {
		let dom = self.clone();
		let requested = url.to_owned();
		let pending = Rc::new(RefCell::new(Some(callback)));
		let finish = Rc::new(move |result: Result<FetchResponse>| {
			if let Some(callback) = pending.borrow_mut().take() {
				callback(&mut dom.clone(), result);
			}
		});

		let on_response = {
			let finish = finish.clone();
			let requested = requested.clone();
			Closure::once(move |response: JsValue| {
				let response = match response.dyn_into::<web_sys::Response>() {
					Ok(response) => response,
					Err(value) => return finish(Err(Error::Fetch { url: requested, message: format!("{:?}", value) })),
				};
				let content_type = response.headers().get("content-type").ok().flatten();
				let url = if response.url().is_empty() { requested.clone() } else { response.url() };
				let status = response.status();
				let text = match response.text() {
					Ok(text) => text,
					Err(error) => return finish(Err(Error::Fetch { url, message: format!("{:?}", error) })),
				};
				let on_text = {
					let finish = finish.clone();
					let url = url.clone();
					Closure::once(move |body: JsValue| {
						finish(Ok(FetchResponse {
							url,
							status,
							content_type,
							body: body.as_string().unwrap_or_default(),
						}))
					})
				};
				let on_error = Closure::once(move |error: JsValue| finish(Err(Error::Fetch { url, message: format!("{:?}", error) })));
				drop(text.then2(&on_text, &on_error));
				on_text.forget();
				on_error.forget();
			})
		};
		let on_error = Closure::once(move |error: JsValue| {
			finish(Err(Error::Fetch {
				url: requested,
				message: format!("{:?}", error),
			}))
		});

		let promise: Promise = self.window.fetch_with_str(url);
		drop(promise.then2(&on_response, &on_error));
		on_response.forget();
		on_error.forget();
	}

	fn import_module(&mut self, specifier: &str) {
		let import = Function::new_with_args("specifier", "return import(specifier)");
		if let Err(error) = import.call1(&JsValue::NULL, &JsValue::from_str(specifier)) {
			error!(?error, specifier, "Failed to start module import.");
		}
	}

	fn reload(&mut self) {
		if let Err(error) = self.window.location().reload() {
			error!(?error, "Failed to reload.");
		}
	}

	fn now_millis(&self) -> u64 {
		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		let now = Date::now() as u64;
		now
	}
}
