//! The document capability the engine is written against.
//!
//! Nothing in this crate reaches for a global document: every operation receives a [`Dom`] explicitly.
//! [`crate::memory::MemoryDom`] implements it headlessly, `crate::web::WebDom` (on `wasm32`) over [`web-sys`](https://docs.rs/web-sys).

use crate::error::Result;
use core::{fmt::Debug, time::Duration};
use serde_json::Value;
use std::rc::Rc;

pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
	Document,
	Element,
	Text,
	Comment,
	Other,
}

/// A synthetic event to dispatch through [`Dom::dispatch_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInit {
	pub kind: String,
	/// The [***key***](https://developer.mozilla.org/en-US/docs/Web/API/KeyboardEvent/key) of keyboard events.
	pub key: Option<String>,
	pub bubbles: bool,
}

impl EventInit {
	#[must_use]
	pub fn new(kind: &str) -> Self {
		Self {
			kind: kind.to_owned(),
			key: None,
			bubbles: true,
		}
	}

	#[must_use]
	pub fn key(kind: &str, key: &str) -> Self {
		Self {
			key: Some(key.to_owned()),
			..Self::new(kind)
		}
	}
}

/// What a [`Listener`] receives.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent<N> {
	pub kind: String,
	pub key: Option<String>,
	pub target: N,
	pub current_target: N,
}

pub type Listener<D> = Rc<dyn Fn(&mut D, &DomEvent<<D as Dom>::Node>)>;
pub type TimerCallback<D> = Box<dyn FnOnce(&mut D)>;
pub type FetchCallback<D> = Box<dyn FnOnce(&mut D, Result<FetchResponse>)>;

/// Identifies a pending [`Dom::set_timeout`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
	pub url: String,
	pub status: u16,
	pub content_type: Option<String>,
	pub body: String,
}

impl FetchResponse {
	#[must_use]
	pub fn new(url: &str, content_type: &str, body: &str) -> Self {
		Self {
			url: url.to_owned(),
			status: 200,
			content_type: Some(content_type.to_owned()),
			body: body.to_owned(),
		}
	}

	#[must_use]
	pub fn with_status(self, status: u16) -> Self {
		Self { status, ..self }
	}

	#[must_use]
	pub fn is_ok(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// The media type without parameters, lowercased.
	#[must_use]
	pub fn media_type(&self) -> String {
		self.content_type
			.as_deref()
			.and_then(|content_type| content_type.split(';').next())
			.map(|media_type| media_type.trim().to_ascii_lowercase())
			.unwrap_or_default()
	}
}

/// A mutable document tree plus the few host services (timers, fetch, module import, reload) instructions can reach.
///
/// The engine is the only mutator while it runs. Callbacks ([`Listener`], [`TimerCallback`], [`FetchCallback`]) are
/// invoked by the host later and receive the [`Dom`] again, so they never hold on to it.
pub trait Dom: Sized + 'static {
	type Node: Clone + PartialEq + Debug + 'static;

	fn document(&self) -> Self::Node;
	fn head(&self) -> Self::Node;
	fn body(&self) -> Self::Node;

	fn node_type(&self, node: &Self::Node) -> NodeType;

	/// # Errors
	///
	/// Iff `tag` is not a valid element name.
	fn create_element(&mut self, tag: &str) -> Result<Self::Node>;

	/// # Errors
	///
	/// Iff `tag` is not a valid element name.
	fn create_element_ns(&mut self, namespace: &str, tag: &str) -> Result<Self::Node>;

	fn create_text_node(&mut self, text: &str) -> Self::Node;

	/// The lowercase local name of HTML elements, the local name of other elements, [`None`] for other nodes.
	fn tag_name(&self, node: &Self::Node) -> Option<String>;
	fn namespace_uri(&self, node: &Self::Node) -> Option<String>;

	fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
	fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

	/// # Errors
	///
	/// Iff `node` is not an element or `name` is invalid.
	fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<()>;

	/// # Errors
	///
	/// Iff `node` is not an element or `qualified_name` is invalid for `namespace`.
	fn set_attribute_ns(&mut self, node: &Self::Node, namespace: &str, qualified_name: &str, value: &str) -> Result<()>;

	/// # Errors
	///
	/// Iff `node` is not an element.
	fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<()>;

	/// Reads a live (non-attribute) property.
	fn property(&self, node: &Self::Node, name: &str) -> Option<Value>;

	/// Assigns a live (non-attribute) property, like `node[name] = value`.
	///
	/// # Errors
	///
	/// Iff the host rejects the assignment.
	fn set_property(&mut self, node: &Self::Node, name: &str, value: &Value) -> Result<()>;

	fn text_content(&self, node: &Self::Node) -> String;

	/// # Errors
	///
	/// Iff `node` can't have children.
	fn set_text_content(&mut self, node: &Self::Node, text: &str) -> Result<()>;

	/// # Errors
	///
	/// Iff `node` is not an element.
	fn inner_html(&self, node: &Self::Node) -> Result<String>;

	/// Plain `innerHTML` assignment. Scripts in `html` stay inert.
	///
	/// # Errors
	///
	/// Iff `node` is not an element or `html` can't be parsed.
	fn set_inner_html(&mut self, node: &Self::Node, html: &str) -> Result<()>;

	/// Parses `html` in the context of `context` into detached nodes, like a `Range`'s `createContextualFragment`.
	///
	/// Unlike with [`Dom::set_inner_html`], scripts among the returned nodes run once they are inserted into the document.
	///
	/// # Errors
	///
	/// Iff `html` can't be parsed.
	fn create_fragment(&mut self, context: &Self::Node, html: &str) -> Result<Vec<Self::Node>>;

	/// The content of a `<template>` element, either cloned (`adopt == false`) or moved out of the template.
	///
	/// # Errors
	///
	/// Iff `template` is not a template element.
	fn template_content(&mut self, template: &Self::Node, adopt: bool) -> Result<Vec<Self::Node>>;

	fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
	fn child_nodes(&self, node: &Self::Node) -> Vec<Self::Node>;

	/// Element children only.
	fn children(&self, node: &Self::Node) -> Vec<Self::Node> {
		self.child_nodes(node).into_iter().filter(|child| self.node_type(child) == NodeType::Element).collect()
	}

	/// Inserts (or moves) `child` into `parent` before `reference`, or at the end if `reference` is [`None`].
	///
	/// # Errors
	///
	/// Iff the insertion would create a cycle or `reference` is not a child of `parent`.
	fn insert_before(&mut self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>) -> Result<()>;

	/// # Errors
	///
	/// See [`Dom::insert_before`].
	fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<()> {
		self.insert_before(parent, child, None)
	}

	/// # Errors
	///
	/// See [`Dom::insert_before`].
	fn prepend_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<()> {
		let first = self.child_nodes(parent).into_iter().next();
		self.insert_before(parent, child, first.as_ref())
	}

	/// Puts `new` where `old` is and detaches `old`. Does nothing if `old` is detached.
	///
	/// # Errors
	///
	/// See [`Dom::insert_before`].
	fn replace_with(&mut self, old: &Self::Node, new: &Self::Node) -> Result<()> {
		if let Some(parent) = self.parent(old) {
			self.insert_before(&parent, new, Some(old))?;
			self.remove(old);
		}
		Ok(())
	}

	/// Detaches `node` from its parent. Does nothing if it is already detached.
	fn remove(&mut self, node: &Self::Node);

	fn clear_children(&mut self, node: &Self::Node) {
		for child in self.child_nodes(node) {
			self.remove(&child);
		}
	}

	fn is_connected(&self, node: &Self::Node) -> bool {
		let document = self.document();
		let mut cursor = Some(node.clone());
		while let Some(current) = cursor {
			if current == document {
				return true;
			}
			cursor = self.parent(&current);
		}
		false
	}

	/// All matching elements in document order, within `scope`'s descendants or the whole document.
	///
	/// # Errors
	///
	/// Iff `selector` is not supported.
	fn query_selector_all(&self, scope: Option<&Self::Node>, selector: &str) -> Result<Vec<Self::Node>>;

	/// # Errors
	///
	/// Iff `selector` is not supported.
	fn query_selector(&self, scope: Option<&Self::Node>, selector: &str) -> Result<Option<Self::Node>> {
		Ok(self.query_selector_all(scope, selector)?.into_iter().next())
	}

	fn element_by_id(&self, id: &str) -> Option<Self::Node>;

	/// # Errors
	///
	/// Iff `selector` is not supported.
	fn matches(&self, node: &Self::Node, selector: &str) -> Result<bool>;

	/// The closest inclusive ancestor element matching `selector`.
	///
	/// # Errors
	///
	/// Iff `selector` is not supported.
	fn closest(&self, node: &Self::Node, selector: &str) -> Result<Option<Self::Node>> {
		let mut cursor = Some(node.clone());
		while let Some(current) = cursor {
			if self.node_type(&current) == NodeType::Element && self.matches(&current, selector)? {
				return Ok(Some(current));
			}
			cursor = self.parent(&current);
		}
		Ok(None)
	}

	/// # Errors
	///
	/// Iff `target` can't receive events.
	fn add_event_listener(&mut self, target: &Self::Node, kind: &str, listener: Listener<Self>) -> Result<()>;

	/// Dispatches a synthetic event at `target`, bubbling if requested.
	///
	/// # Errors
	///
	/// Iff the event can't be created.
	fn dispatch_event(&mut self, target: &Self::Node, event: EventInit) -> Result<()>;

	fn set_timeout(&mut self, delay: Duration, callback: TimerCallback<Self>) -> TimerId;

	/// Cancels a pending timer. Cancelling a timer that already ran (or was cancelled) does nothing.
	fn clear_timeout(&mut self, timer: TimerId);

	/// Starts a request for `url`. `callback` runs once it completes, never synchronously.
	fn fetch(&mut self, url: &str, callback: FetchCallback<Self>);

	/// Starts a dynamic `import()` of an ECMAScript module and forgets about it.
	fn import_module(&mut self, specifier: &str);

	fn reload(&mut self);

	/// Milliseconds on the host's clock.
	fn now_millis(&self) -> u64;
}

/// Where to find a node: by selector or directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Target<N> {
	Selector(String),
	Node(N),
}

impl<N: Clone + PartialEq + Debug + 'static> Target<N> {
	/// # Errors
	///
	/// Iff the selector is unsupported.
	pub fn resolve<D: Dom<Node = N>>(&self, dom: &D) -> Result<Option<N>> {
		match self {
			Target::Selector(selector) => dom.query_selector(None, selector),
			Target::Node(node) => Ok(Some(node.clone())),
		}
	}
}

impl<N> From<&str> for Target<N> {
	fn from(selector: &str) -> Self {
		Target::Selector(selector.to_owned())
	}
}
