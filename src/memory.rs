//! A headless, arena-backed [`Dom`].
//!
//! Besides the document tree, [`MemoryDom`] simulates the host services the engine uses:
//! a virtual clock for timers ([`MemoryDom::advance`]), canned fetch responses ([`MemoryDom::serve`], [`MemoryDom::run_pending`]),
//! and logs of executed scripts, imported modules, reloads and synthetic events.
//!
//! Scripts follow browser rules: a `<script>` runs once, when it is first connected to the document,
//! unless it was created through [`Dom::set_inner_html`] outside of a `<template>`.

use crate::{
	compose::value_text,
	dom::{Dom, DomEvent, EventInit, FetchCallback, FetchResponse, Listener, NodeType, TimerCallback, TimerId, HTML_NAMESPACE, SVG_NAMESPACE, XMLNS_NAMESPACE},
	error::{Error, Result},
	html::{self, HtmlNode},
	load,
	selector::{ElementTree, SelectorList},
};
use core::{convert::TryFrom, fmt, time::Duration};
use hashbrown::HashMap;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use tracing::{instrument, trace, trace_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
	Document,
	Element(ElementData),
	Text(String),
	Comment(String),
}

#[derive(Debug, Clone)]
struct ElementData {
	name: String,
	/// [`None`] for HTML elements.
	namespace: Option<String>,
	attributes: Vec<(String, String)>,
	script: ScriptState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptState {
	Runnable,
	Started,
}

#[derive(Debug, Clone)]
struct Slot {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	data: NodeData,
}

/// A script that ran because it was connected to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedScript {
	pub src: Option<String>,
	pub text: String,
}

/// Nodes are never freed: detached nodes keep their arena slot, properties and listeners
/// for as long as the [`MemoryDom`] lives, since a detached [`NodeId`] may be inserted again.
/// Drop the whole instance to reclaim them.
pub struct MemoryDom {
	nodes: Vec<Slot>,
	document: NodeId,
	head: NodeId,
	body: NodeId,
	properties: HashMap<NodeId, HashMap<String, Value>>,
	listeners: HashMap<NodeId, Vec<(String, Listener<Self>)>>,
	clock: u64,
	next_timer: u64,
	timers: BTreeMap<(u64, TimerId), TimerCallback<Self>>,
	timer_due: HashMap<TimerId, u64>,
	responses: HashMap<String, FetchResponse>,
	pending_fetches: VecDeque<(String, FetchCallback<Self>)>,
	executed_scripts: Vec<ExecutedScript>,
	imported_modules: Vec<String>,
	dispatched_events: Vec<(NodeId, String)>,
	reload_count: usize,
}

impl fmt::Debug for MemoryDom {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryDom")
			.field("nodes", &self.nodes.len())
			.field("clock", &self.clock)
			.field("timers", &self.timers.len())
			.field("pending_fetches", &self.pending_fetches.len())
			.finish_non_exhaustive()
	}
}

impl Default for MemoryDom {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryDom {
	/// An empty `<html><head></head><body></body></html>` document at time zero.
	#[must_use]
	pub fn new() -> Self {
		let mut dom = Self {
			nodes: vec![Slot {
				parent: None,
				children: Vec::new(),
				data: NodeData::Document,
			}],
			document: NodeId(0),
			head: NodeId(0),
			body: NodeId(0),
			properties: HashMap::new(),
			listeners: HashMap::new(),
			clock: 0,
			next_timer: 0,
			timers: BTreeMap::new(),
			timer_due: HashMap::new(),
			responses: HashMap::new(),
			pending_fetches: VecDeque::new(),
			executed_scripts: Vec::new(),
			imported_modules: Vec::new(),
			dispatched_events: Vec::new(),
			reload_count: 0,
		};
		let html = dom.alloc(NodeData::Element(ElementData::html("html")));
		let head = dom.alloc(NodeData::Element(ElementData::html("head")));
		let body = dom.alloc(NodeData::Element(ElementData::html("body")));
		dom.attach(dom.document, html, None);
		dom.attach(html, head, None);
		dom.attach(html, body, None);
		dom.head = head;
		dom.body = body;
		dom
	}

	/// Moves the virtual clock forward, running due timers in order.
	#[instrument(skip(self))]
	pub fn advance(&mut self, by: Duration) {
		let target = self.clock + duration_millis(by);
		loop {
			let next = self.timers.keys().next().copied();
			match next {
				Some((due, timer)) if due <= target => {
					self.timer_due.remove(&timer);
					if let Some(callback) = self.timers.remove(&(due, timer)) {
						self.clock = due;
						trace!(?timer, due, "Running timer.");
						callback(self);
					}
				}
				_ => break,
			}
		}
		self.clock = target;
	}

	#[must_use]
	pub fn pending_timers(&self) -> usize {
		self.timers.len()
	}

	/// Registers the response for future fetches of `url`. Unregistered URLs fail like a refused connection.
	pub fn serve(&mut self, url: &str, response: FetchResponse) {
		self.responses.insert(url.to_owned(), response);
	}

	/// Completes the fetches that were pending when called, in request order. Returns how many completed.
	pub fn run_pending(&mut self) -> usize {
		let count = self.pending_fetches.len();
		for _ in 0..count {
			let Some((url, callback)) = self.pending_fetches.pop_front() else {
				break;
			};
			let response = self.responses.get(&url).cloned().ok_or_else(|| Error::Fetch {
				url: url.clone(),
				message: "connection refused".to_owned(),
			});
			callback(self, response);
		}
		count
	}

	#[must_use]
	pub fn executed_scripts(&self) -> &[ExecutedScript] {
		&self.executed_scripts
	}

	#[must_use]
	pub fn imported_modules(&self) -> &[String] {
		&self.imported_modules
	}

	#[must_use]
	pub fn reload_count(&self) -> usize {
		self.reload_count
	}

	/// Every event dispatched through [`Dom::dispatch_event`], by target.
	#[must_use]
	pub fn dispatched_events(&self) -> &[(NodeId, String)] {
		&self.dispatched_events
	}

	/// # Errors
	///
	/// Iff `node` is not an element.
	pub fn outer_html(&self, node: NodeId) -> Result<String> {
		match load::load_node(self, &node) {
			Some(loaded @ HtmlNode::Element(_)) => Ok(html::serialize(&[loaded])),
			_ => Err(self.not_an_element(node)),
		}
	}

	/// Dispatches a bubbling `click` at `node`.
	///
	/// # Errors
	///
	/// Never, currently.
	pub fn click(&mut self, node: NodeId) -> Result<()> {
		self.dispatch_event(&node, EventInit::new("click"))
	}

	fn alloc(&mut self, data: NodeData) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(Slot {
			parent: None,
			children: Vec::new(),
			data,
		});
		id
	}

	fn slot(&self, node: NodeId) -> Option<&Slot> {
		self.nodes.get(node.0)
	}

	fn element(&self, node: NodeId) -> Option<&ElementData> {
		match self.slot(node).map(|slot| &slot.data) {
			Some(NodeData::Element(element)) => Some(element),
			_ => None,
		}
	}

	fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData> {
		let found = self.node_type(&node);
		match self.nodes.get_mut(node.0).map(|slot| &mut slot.data) {
			Some(NodeData::Element(element)) => Ok(element),
			_ => Err(Error::NotAnElement { found: format!("{:?}", found) }),
		}
	}

	fn not_an_element(&self, node: NodeId) -> Error {
		Error::NotAnElement {
			found: format!("{:?}", self.node_type(&node)),
		}
	}

	fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
		self.nodes[child.0].parent = Some(parent);
		let children = &mut self.nodes[parent.0].children;
		match index {
			Some(index) if index < children.len() => children.insert(index, child),
			_ => children.push(child),
		}
	}

	fn detach(&mut self, node: NodeId) {
		if let Some(parent) = self.nodes.get(node.0).and_then(|slot| slot.parent) {
			self.nodes[parent.0].children.retain(|child| *child != node);
			self.nodes[node.0].parent = None;
		}
	}

	fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
		let mut cursor = Some(node);
		while let Some(current) = cursor {
			if current == ancestor {
				return true;
			}
			cursor = self.nodes[current.0].parent;
		}
		false
	}

	fn build(&mut self, node: &HtmlNode, runnable: bool) -> NodeId {
		match node {
			HtmlNode::Text(text) => self.alloc(NodeData::Text(text.clone())),
			HtmlNode::Comment(comment) => self.alloc(NodeData::Comment(comment.clone())),
			HtmlNode::Element(element) => {
				let id = self.alloc(NodeData::Element(ElementData {
					name: element.name.clone(),
					namespace: element.namespace.clone(),
					attributes: element.attributes.clone(),
					script: if runnable { ScriptState::Runnable } else { ScriptState::Started },
				}));
				// Template content keeps its scripts runnable, as they only run once cloned out.
				let runnable = runnable || (element.namespace.is_none() && element.name == "template");
				for child in &element.children {
					let child = self.build(child, runnable);
					self.attach(id, child, None);
				}
				id
			}
		}
	}

	fn clone_deep(&mut self, node: NodeId) -> NodeId {
		let data = self.nodes[node.0].data.clone();
		let clone = self.alloc(data);
		for child in self.nodes[node.0].children.clone() {
			let child = self.clone_deep(child);
			self.attach(clone, child, None);
		}
		clone
	}

	fn run_connected_scripts(&mut self, node: NodeId) {
		if !self.is_connected(&node) {
			return;
		}
		let mut stack = vec![node];
		while let Some(current) = stack.pop() {
			if let NodeData::Element(element) = &mut self.nodes[current.0].data {
				if element.namespace.is_none() && element.name == "script" && element.script == ScriptState::Runnable {
					element.script = ScriptState::Started;
					let src = element.attributes.iter().find(|(name, _)| name == "src").map(|(_, src)| src.clone());
					let text = self.text_content(&current);
					trace!(?src, "Executing script.");
					self.executed_scripts.push(ExecutedScript { src, text });
				}
			}
			stack.extend(self.nodes[current.0].children.iter().rev().copied());
		}
	}

	fn collect_elements(&self, node: NodeId, out: &mut Vec<NodeId>) {
		for &child in &self.nodes[node.0].children {
			if self.element(child).is_some() {
				out.push(child);
			}
			self.collect_elements(child, out);
		}
	}

	fn element_siblings(&self, node: NodeId) -> (Vec<NodeId>, Option<usize>) {
		let siblings: Vec<NodeId> = match self.nodes[node.0].parent {
			Some(parent) => self.nodes[parent.0].children.iter().copied().filter(|&child| self.element(child).is_some()).collect(),
			None => Vec::new(),
		};
		let index = siblings.iter().position(|&sibling| sibling == node);
		(siblings, index)
	}

	fn context_namespace(&self, context: NodeId) -> Option<&'static str> {
		match self.element(context) {
			Some(element) if element.namespace.as_deref() == Some(SVG_NAMESPACE) && element.name != "foreignObject" => Some(SVG_NAMESPACE),
			_ => None,
		}
	}
}

impl ElementData {
	fn html(name: &str) -> Self {
		Self {
			name: name.to_owned(),
			namespace: None,
			attributes: Vec::new(),
			script: ScriptState::Runnable,
		}
	}

	/// HTML attribute names are ASCII-case-insensitive.
	fn attribute_name(&self, name: &str) -> String {
		if self.namespace.is_none() {
			name.to_ascii_lowercase()
		} else {
			name.to_owned()
		}
	}
}

fn duration_millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn validate_name(name: &str) -> Result<()> {
	if name.is_empty() || name.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '/' | '"' | '\'' | '=')) {
		Err(Error::Host(format!("Invalid name {:?}", name)))
	} else {
		Ok(())
	}
}

impl ElementTree for MemoryDom {
	type Id = NodeId;

	fn parent_element(&self, id: NodeId) -> Option<NodeId> {
		self.nodes[id.0].parent.filter(|&parent| self.element(parent).is_some())
	}

	fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
		let (siblings, index) = self.element_siblings(id);
		index.and_then(|index| index.checked_sub(1)).map(|index| siblings[index])
	}

	fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
		let (siblings, index) = self.element_siblings(id);
		index.and_then(|index| siblings.get(index + 1).copied())
	}

	fn local_name(&self, id: NodeId) -> &str {
		self.element(id).map_or("", |element| element.name.as_str())
	}

	fn attribute_value(&self, id: NodeId, name: &str) -> Option<&str> {
		let element = self.element(id)?;
		let name = element.attribute_name(name);
		element.attributes.iter().find(|(n, _)| *n == name).map(|(_, value)| value.as_str())
	}
}

impl Dom for MemoryDom {
	type Node = NodeId;

	fn document(&self) -> NodeId {
		self.document
	}

	fn head(&self) -> NodeId {
		self.head
	}

	fn body(&self) -> NodeId {
		self.body
	}

	fn node_type(&self, node: &NodeId) -> NodeType {
		match self.slot(*node).map(|slot| &slot.data) {
			Some(NodeData::Document) => NodeType::Document,
			Some(NodeData::Element(_)) => NodeType::Element,
			Some(NodeData::Text(_)) => NodeType::Text,
			Some(NodeData::Comment(_)) => NodeType::Comment,
			None => NodeType::Other,
		}
	}

	fn create_element(&mut self, tag: &str) -> Result<NodeId> {
		validate_name(tag)?;
		Ok(self.alloc(NodeData::Element(ElementData::html(&tag.to_ascii_lowercase()))))
	}

	fn create_element_ns(&mut self, namespace: &str, tag: &str) -> Result<NodeId> {
		if namespace == HTML_NAMESPACE {
			return self.create_element(tag);
		}
		validate_name(tag)?;
		Ok(self.alloc(NodeData::Element(ElementData {
			namespace: Some(namespace.to_owned()),
			..ElementData::html(tag)
		})))
	}

	fn create_text_node(&mut self, text: &str) -> NodeId {
		self.alloc(NodeData::Text(text.to_owned()))
	}

	fn tag_name(&self, node: &NodeId) -> Option<String> {
		self.element(*node).map(|element| element.name.clone())
	}

	fn namespace_uri(&self, node: &NodeId) -> Option<String> {
		self.element(*node).map(|element| element.namespace.clone().unwrap_or_else(|| HTML_NAMESPACE.to_owned()))
	}

	fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
		self.attribute_value(*node, name).map(ToOwned::to_owned)
	}

	fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
		self.element(*node).map(|element| element.attributes.clone()).unwrap_or_default()
	}

	fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<()> {
		validate_name(name)?;
		let element = self.element_mut(*node)?;
		let name = element.attribute_name(name);
		match element.attributes.iter_mut().find(|(n, _)| *n == name) {
			Some((_, existing)) => *existing = value.to_owned(),
			None => element.attributes.push((name, value.to_owned())),
		}
		Ok(())
	}

	fn set_attribute_ns(&mut self, node: &NodeId, namespace: &str, qualified_name: &str, value: &str) -> Result<()> {
		validate_name(qualified_name)?;
		let is_xmlns = qualified_name == "xmlns" || qualified_name.starts_with("xmlns:");
		if is_xmlns != (namespace == XMLNS_NAMESPACE) {
			return Err(Error::Host(format!("Namespace error: {:?} in {:?}", qualified_name, namespace)));
		}
		let element = self.element_mut(*node)?;
		match element.attributes.iter_mut().find(|(n, _)| n == qualified_name) {
			Some((_, existing)) => *existing = value.to_owned(),
			None => element.attributes.push((qualified_name.to_owned(), value.to_owned())),
		}
		Ok(())
	}

	fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<()> {
		let element = self.element_mut(*node)?;
		let name = element.attribute_name(name);
		element.attributes.retain(|(n, _)| *n != name);
		Ok(())
	}

	fn property(&self, node: &NodeId, name: &str) -> Option<Value> {
		if let Some(value) = self.properties.get(node).and_then(|properties| properties.get(name)) {
			return Some(value.clone());
		}
		match name {
			"value" => self.attribute_value(*node, "value").map(|value| Value::String(value.to_owned())),
			"checked" => self.element(*node).map(|_| Value::Bool(self.attribute_value(*node, "checked").is_some())),
			"textContent" => Some(Value::String(self.text_content(node))),
			"innerHTML" => self.inner_html(node).ok().map(Value::String),
			_ => None,
		}
	}

	fn set_property(&mut self, node: &NodeId, name: &str, value: &Value) -> Result<()> {
		match name {
			"textContent" | "innerText" => self.set_text_content(node, &value_text(value)),
			"innerHTML" => self.set_inner_html(node, &value_text(value)),
			"className" => self.set_attribute(node, "class", &value_text(value)),
			"id" => self.set_attribute(node, "id", &value_text(value)),
			_ => {
				if self.slot(*node).is_none() {
					return Err(Error::Host(format!("Unknown node {:?}", node)));
				}
				self.properties.entry(*node).or_default().insert(name.to_owned(), value.clone());
				Ok(())
			}
		}
	}

	fn text_content(&self, node: &NodeId) -> String {
		match self.slot(*node).map(|slot| &slot.data) {
			Some(NodeData::Text(text) | NodeData::Comment(text)) => text.clone(),
			Some(NodeData::Document | NodeData::Element(_)) => {
				let mut out = String::new();
				let mut stack: Vec<NodeId> = self.nodes[node.0].children.iter().rev().copied().collect();
				while let Some(current) = stack.pop() {
					match &self.nodes[current.0].data {
						NodeData::Text(text) => out.push_str(text),
						NodeData::Element(_) => stack.extend(self.nodes[current.0].children.iter().rev().copied()),
						NodeData::Comment(_) | NodeData::Document => (),
					}
				}
				out
			}
			None => String::new(),
		}
	}

	fn set_text_content(&mut self, node: &NodeId, text: &str) -> Result<()> {
		match self.slot(*node).map(|slot| &slot.data) {
			Some(NodeData::Text(_) | NodeData::Comment(_)) => {
				match &mut self.nodes[node.0].data {
					NodeData::Text(existing) | NodeData::Comment(existing) => *existing = text.to_owned(),
					NodeData::Document | NodeData::Element(_) => (),
				}
				Ok(())
			}
			Some(NodeData::Element(_)) => {
				self.clear_children(node);
				if !text.is_empty() {
					let text = self.create_text_node(text);
					self.attach(*node, text, None);
				}
				Ok(())
			}
			_ => Err(self.not_an_element(*node)),
		}
	}

	fn inner_html(&self, node: &NodeId) -> Result<String> {
		if self.element(*node).is_none() {
			return Err(self.not_an_element(*node));
		}
		Ok(html::serialize(&load::load_child_nodes(self, node)))
	}

	#[instrument(skip(self, html))]
	fn set_inner_html(&mut self, node: &NodeId, html: &str) -> Result<()> {
		let element = self.element(*node).ok_or_else(|| self.not_an_element(*node))?;
		let is_template = element.namespace.is_none() && element.name == "template";
		let parsed = html::parse_fragment(html, self.context_namespace(*node))?;
		self.clear_children(node);
		for parsed in &parsed {
			let child = self.build(parsed, is_template);
			self.attach(*node, child, None);
		}
		Ok(())
	}

	fn create_fragment(&mut self, context: &NodeId, html: &str) -> Result<Vec<NodeId>> {
		let parsed = html::parse_fragment(html, self.context_namespace(*context))?;
		Ok(parsed.iter().map(|parsed| self.build(parsed, true)).collect())
	}

	fn template_content(&mut self, template: &NodeId, adopt: bool) -> Result<Vec<NodeId>> {
		match self.element(*template) {
			Some(element) if element.namespace.is_none() && element.name == "template" => (),
			_ => {
				return Err(Error::NotAnElement {
					found: format!("{:?} instead of <template>", self.tag_name(template)),
				})
			}
		}
		let children = self.nodes[template.0].children.clone();
		if adopt {
			for &child in &children {
				self.detach(child);
			}
			Ok(children)
		} else {
			Ok(children.into_iter().map(|child| self.clone_deep(child)).collect())
		}
	}

	fn parent(&self, node: &NodeId) -> Option<NodeId> {
		self.slot(*node).and_then(|slot| slot.parent)
	}

	fn child_nodes(&self, node: &NodeId) -> Vec<NodeId> {
		self.slot(*node).map(|slot| slot.children.clone()).unwrap_or_default()
	}

	fn insert_before(&mut self, parent: &NodeId, child: &NodeId, reference: Option<&NodeId>) -> Result<()> {
		match self.node_type(parent) {
			NodeType::Document | NodeType::Element => (),
			other => return Err(Error::HierarchyRequest(format!("{:?} can't have children", other))),
		}
		if self.slot(*child).is_none() || self.node_type(child) == NodeType::Document {
			return Err(Error::HierarchyRequest(format!("{:?} can't be inserted", child)));
		}
		if self.is_inclusive_ancestor(*child, *parent) {
			return Err(Error::HierarchyRequest("The new child is an ancestor of the parent".to_owned()));
		}
		let mut reference = reference.copied();
		if let Some(r) = reference {
			if self.nodes.get(r.0).and_then(|slot| slot.parent) != Some(*parent) {
				return Err(Error::NotFound("The reference node is not a child of the parent".to_owned()));
			}
			if r == *child {
				let siblings = &self.nodes[parent.0].children;
				reference = siblings.iter().position(|&sibling| sibling == r).and_then(|index| siblings.get(index + 1).copied());
			}
		}
		self.detach(*child);
		let index = reference.and_then(|r| self.nodes[parent.0].children.iter().position(|&sibling| sibling == r));
		self.attach(*parent, *child, index);
		self.run_connected_scripts(*child);
		Ok(())
	}

	fn remove(&mut self, node: &NodeId) {
		self.detach(*node);
	}

	fn query_selector_all(&self, scope: Option<&NodeId>, selector: &str) -> Result<Vec<NodeId>> {
		let selector = SelectorList::parse(selector)?;
		let mut candidates = Vec::new();
		self.collect_elements(scope.copied().unwrap_or(self.document), &mut candidates);
		Ok(candidates.into_iter().filter(|&candidate| selector.matches(self, candidate)).collect())
	}

	fn element_by_id(&self, id: &str) -> Option<NodeId> {
		let mut candidates = Vec::new();
		self.collect_elements(self.document, &mut candidates);
		candidates.into_iter().find(|&candidate| self.attribute_value(candidate, "id") == Some(id))
	}

	fn matches(&self, node: &NodeId, selector: &str) -> Result<bool> {
		let selector = SelectorList::parse(selector)?;
		Ok(self.element(*node).is_some() && selector.matches(self, *node))
	}

	fn add_event_listener(&mut self, target: &NodeId, kind: &str, listener: Listener<Self>) -> Result<()> {
		if self.slot(*target).is_none() {
			return Err(Error::Host(format!("Unknown node {:?}", target)));
		}
		self.listeners.entry(*target).or_default().push((kind.to_owned(), listener));
		Ok(())
	}

	fn dispatch_event(&mut self, target: &NodeId, event: EventInit) -> Result<()> {
		let span = trace_span!("dispatch_event", ?target, kind = event.kind.as_str());
		let _enter = span.enter();

		self.dispatched_events.push((*target, event.kind.clone()));
		let mut path = vec![*target];
		if event.bubbles {
			let mut cursor = self.parent(target);
			while let Some(current) = cursor {
				path.push(current);
				cursor = self.parent(&current);
			}
		}
		for current_target in path {
			let listeners: Vec<Listener<Self>> = self
				.listeners
				.get(&current_target)
				.map(|listeners| listeners.iter().filter(|(kind, _)| *kind == event.kind).map(|(_, listener)| listener.clone()).collect())
				.unwrap_or_default();
			for listener in listeners {
				listener(
					self,
					&DomEvent {
						kind: event.kind.clone(),
						key: event.key.clone(),
						target: *target,
						current_target,
					},
				);
			}
		}
		Ok(())
	}

	fn set_timeout(&mut self, delay: Duration, callback: TimerCallback<Self>) -> TimerId {
		let timer = TimerId(self.next_timer);
		self.next_timer += 1;
		let due = self.clock + duration_millis(delay);
		self.timers.insert((due, timer), callback);
		self.timer_due.insert(timer, due);
		timer
	}

	fn clear_timeout(&mut self, timer: TimerId) {
		if let Some(due) = self.timer_due.remove(&timer) {
			self.timers.remove(&(due, timer));
		}
	}

	fn fetch(&mut self, url: &str, callback: FetchCallback<Self>) {
		self.pending_fetches.push_back((url.to_owned(), callback));
	}

	fn import_module(&mut self, specifier: &str) {
		self.imported_modules.push(specifier.to_owned());
	}

	fn reload(&mut self) {
		self.reload_count += 1;
	}

	fn now_millis(&self) -> u64 {
		self.clock
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn selectors_match_in_document_order() {
		let mut dom = MemoryDom::new();
		let body = dom.body();
		dom.set_inner_html(&body, "<div id=\"a\" class=\"x y\"><span name=\"n\">1</span></div><p><span name=\"n\">2</span></p>").unwrap();

		let spans = dom.query_selector_all(None, "[name=\"n\"]").unwrap();
		assert_eq!(spans.len(), 2);
		assert_eq!(dom.text_content(&spans[0]), "1");
		assert_eq!(dom.query_selector_all(None, "div.x.y > span").unwrap(), vec![spans[0]]);
		assert_eq!(dom.query_selector_all(None, "div + p span").unwrap(), vec![spans[1]]);
		assert_eq!(dom.query_selector_all(None, "span:not([name=m]):last-child").unwrap().len(), 2);
		assert!(matches!(dom.query_selector_all(None, "div >"), Err(Error::UnsupportedSelector(_))));
	}

	#[test]
	fn scripts_run_once_and_only_when_structurally_inserted() {
		let mut dom = MemoryDom::new();
		let body = dom.body();
		dom.set_inner_html(&body, "<script>inert()</script>").unwrap();
		assert!(dom.executed_scripts().is_empty());

		let fragment = dom.create_fragment(&body, "<b>x</b><script>live()</script>").unwrap();
		for node in &fragment {
			dom.append_child(&body, node).unwrap();
		}
		dom.append_child(&body, &fragment[1]).unwrap();
		assert_eq!(
			dom.executed_scripts(),
			&[ExecutedScript {
				src: None,
				text: "live()".to_owned()
			}]
		);
	}

	#[test]
	fn timers_run_in_due_order_and_can_be_cancelled() {
		let mut dom = MemoryDom::new();
		let body = dom.body();
		let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
		for (delay, label) in [(30, "c"), (10, "a"), (20, "b")] {
			let log = log.clone();
			dom.set_timeout(Duration::from_millis(delay), Box::new(move |_| log.borrow_mut().push(label)));
		}
		let cancelled = dom.set_timeout(Duration::from_millis(15), Box::new(move |dom: &mut MemoryDom| dom.remove(&body)));
		dom.clear_timeout(cancelled);

		dom.advance(Duration::from_millis(25));
		assert_eq!(*log.borrow(), vec!["a", "b"]);
		assert_eq!(dom.now_millis(), 25);
		dom.advance(Duration::from_millis(5));
		assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
		assert!(dom.is_connected(&dom.body()));
	}
}
