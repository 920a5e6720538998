//! The instruction data model and its normalization from JSON.
//!
//! Messages look like `{"_ui": [ … ], "payload": …, "topic": "…"}`. Each entry of `_ui` becomes one [`Instruction`],
//! with `payload` and `topic` copied onto it.

use crate::{
	dialog::DialogSpec,
	dom::Target,
	error::{Error, Result},
};
use core::{convert::TryFrom, fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, warn};

/// What a [`ComponentSpec`] creates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
	/// A `<div>` whose content is raw (sanitized) HTML. Nested components replace its content instead of nesting.
	Html,
	/// An `<svg>` root. Everything below it is created in the SVG namespace.
	Svg,
	Element(String),
}

impl From<String> for NodeKind {
	fn from(kind: String) -> Self {
		match kind.as_str() {
			"html" => Self::Html,
			"svg" => Self::Svg,
			_ => Self::Element(kind),
		}
	}
}

impl From<&str> for NodeKind {
	fn from(kind: &str) -> Self {
		kind.to_owned().into()
	}
}

impl From<NodeKind> for String {
	fn from(kind: NodeKind) -> Self {
		match kind {
			NodeKind::Html => "html".to_owned(),
			NodeKind::Svg => "svg".to_owned(),
			NodeKind::Element(tag) => tag,
		}
	}
}

/// The structural mode of node creation, inherited by nested components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
	Dom,
	Html,
	Svg,
}

impl NodeKind {
	#[must_use]
	pub fn namespace(&self) -> Namespace {
		match self {
			NodeKind::Html => Namespace::Html,
			NodeKind::Svg => Namespace::Svg,
			NodeKind::Element(_) => Namespace::Dom,
		}
	}
}

/// Where an added node goes among its new siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Position {
	First,
	/// Before the element child currently at this index. Appends if there is none.
	Index(usize),
	Last,
}

impl Default for Position {
	fn default() -> Self {
		Self::Last
	}
}

impl From<Value> for Position {
	fn from(value: Value) -> Self {
		match &value {
			Value::String(first) if first == "first" => Self::First,
			Value::String(index) => index.trim().parse().map_or(Self::Last, Self::Index),
			Value::Number(index) => index.as_u64().and_then(|index| usize::try_from(index).ok()).map_or(Self::Last, Self::Index),
			_ => Self::Last,
		}
	}
}

impl From<Position> for Value {
	fn from(position: Position) -> Self {
		match position {
			Position::First => Value::String("first".to_owned()),
			Position::Index(index) => Value::from(index),
			Position::Last => Value::String("last".to_owned()),
		}
	}
}

/// One node (and optionally its descendants) to create, or to make an existing node conform to.
///
/// `N` is the host's node type, for [`ComponentSpec::parent_el`], which can't come from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "", serialize = ""))]
pub struct ComponentSpec<N> {
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<NodeKind>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, alias = "select", skip_serializing_if = "Option::is_none")]
	pub selector: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub attributes: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub properties: Map<String, Value>,
	/// Event name to registered handler name.
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub events: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub slot: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub slot_markdown: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub components: Vec<ComponentSpec<N>>,
	#[serde(default)]
	pub position: Position,
	/// A parent selector.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent: Option<String>,
	#[serde(skip)]
	pub parent_el: Option<N>,
}

impl<N> Default for ComponentSpec<N> {
	fn default() -> Self {
		Self {
			kind: None,
			id: None,
			selector: None,
			name: None,
			attributes: Map::new(),
			properties: Map::new(),
			events: Map::new(),
			slot: None,
			slot_markdown: None,
			components: Vec::new(),
			position: Position::Last,
			parent: None,
			parent_el: None,
		}
	}
}

impl<N> ComponentSpec<N> {
	#[must_use]
	pub fn new(kind: impl Into<NodeKind>) -> Self {
		Self {
			kind: Some(kind.into()),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_id(self, id: &str) -> Self {
		Self {
			id: Some(id.to_owned()),
			..self
		}
	}

	#[must_use]
	pub fn with_slot(self, slot: impl Into<Value>) -> Self {
		Self {
			slot: Some(slot.into()),
			..self
		}
	}

	#[must_use]
	pub fn with_attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
		self.attributes.insert(name.to_owned(), value.into());
		self
	}

	#[must_use]
	pub fn with_component(mut self, component: ComponentSpec<N>) -> Self {
		self.components.push(component);
		self
	}

	/// Whether the slot is missing or empty, so that a payload may stand in for it.
	#[must_use]
	pub fn has_empty_slot(&self) -> bool {
		match &self.slot {
			None | Some(Value::Null) => true,
			Some(Value::String(slot)) => slot.is_empty(),
			Some(_) => false,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
	Add,
	Remove,
	RemoveAll,
	Replace,
	Update,
	Load,
	Reload,
	Notify,
	Alert,
}

impl Method {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Method::Add => "add",
			Method::Remove => "remove",
			Method::RemoveAll => "removeAll",
			Method::Replace => "replace",
			Method::Update => "update",
			Method::Load => "load",
			Method::Reload => "reload",
			Method::Notify => "notify",
			Method::Alert => "alert",
		}
	}
}

impl FromStr for Method {
	type Err = Error;

	fn from_str(method: &str) -> Result<Self> {
		Ok(match method {
			"add" => Method::Add,
			"remove" => Method::Remove,
			"removeAll" => Method::RemoveAll,
			"replace" => Method::Replace,
			"update" => Method::Update,
			"load" => Method::Load,
			"reload" => Method::Reload,
			"notify" => Method::Notify,
			"alert" => Method::Alert,
			unknown => return Err(Error::UnknownMethod(unknown.to_owned())),
		})
	}
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The parts of the enclosing message every instruction of a batch sees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContext {
	pub payload: Option<Value>,
	pub topic: Option<String>,
}

impl MessageContext {
	#[must_use]
	pub fn from_message(message: &Value) -> Self {
		Self {
			payload: message.get("payload").filter(|payload| !payload.is_null()).cloned(),
			topic: message.get("topic").and_then(Value::as_str).map(ToOwned::to_owned),
		}
	}
}

/// The components of an `add`, `replace` or `update`, with where they go.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement<N> {
	pub components: Vec<ComponentSpec<N>>,
	pub parent: Option<Target<N>>,
	pub context: MessageContext,
}

impl<N> Placement<N> {
	#[must_use]
	pub fn new(components: Vec<ComponentSpec<N>>) -> Self {
		Self {
			components,
			parent: None,
			context: MessageContext::default(),
		}
	}

	#[must_use]
	pub fn with_parent(self, parent: Target<N>) -> Self {
		Self {
			parent: Some(parent),
			..self
		}
	}
}

/// External resources for `method: "load"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadSpec {
	/// ECMAScript module specifiers.
	pub components: Vec<String>,
	pub src_scripts: Vec<String>,
	pub txt_scripts: Vec<String>,
	pub src_styles: Vec<String>,
	pub txt_styles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction<N> {
	Add(Placement<N>),
	Remove(Vec<String>),
	RemoveAll(Vec<String>),
	Replace(Placement<N>),
	Update(Placement<N>),
	Load(LoadSpec),
	Reload,
	Notify(DialogSpec, MessageContext),
	Alert(DialogSpec, MessageContext),
}

impl<N> Instruction<N> {
	#[must_use]
	pub fn method(&self) -> Method {
		match self {
			Instruction::Add(_) => Method::Add,
			Instruction::Remove(_) => Method::Remove,
			Instruction::RemoveAll(_) => Method::RemoveAll,
			Instruction::Replace(_) => Method::Replace,
			Instruction::Update(_) => Method::Update,
			Instruction::Load(_) => Method::Load,
			Instruction::Reload => Method::Reload,
			Instruction::Notify(..) => Method::Notify,
			Instruction::Alert(..) => Method::Alert,
		}
	}

	/// Interprets one `_ui` entry. `method` may also be given as the legacy `mode`.
	///
	/// Components that don't deserialize are logged and left out; the rest of the instruction still applies.
	///
	/// # Errors
	///
	/// Iff `value` is not an object, has no method or names an unknown one.
	pub fn from_value(value: &Value, context: &MessageContext) -> Result<Self> {
		let object = value.as_object().ok_or_else(|| Error::InvalidInstruction(format!("Expected an object, found {}", json_kind(value))))?;
		let method = object
			.get("method")
			.or_else(|| object.get("mode"))
			.and_then(Value::as_str)
			.ok_or_else(|| Error::InvalidInstruction("No method given".to_owned()))?
			.parse::<Method>()?;

		let context = MessageContext {
			payload: context.payload.clone().or_else(|| object.get("payload").filter(|payload| !payload.is_null()).cloned()),
			topic: context.topic.clone().or_else(|| object.get("topic").and_then(Value::as_str).map(ToOwned::to_owned)),
		};
		let placement = |components: Vec<ComponentSpec<N>>| Placement {
			components,
			parent: object.get("parent").and_then(Value::as_str).map(Target::from),
			context: context.clone(),
		};

		Ok(match method {
			Method::Add => Instruction::Add(placement(parse_components(object.get("components")))),
			Method::Replace => Instruction::Replace(placement(parse_components(object.get("components")))),
			Method::Update => match object.get("components") {
				Some(components) if components.as_array().map_or(true, |components| !components.is_empty()) => Instruction::Update(placement(parse_components(Some(components)))),
				_ => Instruction::Update(placement(parse_components(Some(&Value::Array(vec![value.clone()]))))),
			},
			Method::Remove => Instruction::Remove(parse_selectors(object.get("components"))),
			Method::RemoveAll => Instruction::RemoveAll(parse_selectors(object.get("components"))),
			Method::Load => Instruction::Load(serde_json::from_value(value.clone())?),
			Method::Reload => Instruction::Reload,
			Method::Notify => Instruction::Notify(serde_json::from_value(value.clone())?, context),
			Method::Alert => Instruction::Alert(serde_json::from_value(value.clone())?, context),
		})
	}
}

/// Splits a message into its `_ui` entries (an array or a single object) and its [`MessageContext`].
///
/// [`None`] iff there is no `_ui` property.
#[must_use]
pub fn split_message(message: &Value) -> Option<(Vec<Value>, MessageContext)> {
	let ui = message.get("_ui")?;
	let entries = match ui {
		Value::Array(entries) => entries.clone(),
		single => vec![single.clone()],
	};
	Some((entries, MessageContext::from_message(message)))
}

fn parse_components<N>(components: Option<&Value>) -> Vec<ComponentSpec<N>> {
	let components = match components {
		None | Some(Value::Null) => return Vec::new(),
		Some(Value::Array(components)) => components.as_slice(),
		Some(single) => core::slice::from_ref(single),
	};
	components
		.iter()
		.enumerate()
		.filter_map(|(index, component)| match serde_json::from_value(component.clone()) {
			Ok(component) => Some(component),
			Err(error) => {
				error!(index, %error, "Skipping invalid component.");
				None
			}
		})
		.collect()
}

fn parse_selectors(components: Option<&Value>) -> Vec<String> {
	let selectors = match components {
		None | Some(Value::Null) => return Vec::new(),
		Some(Value::Array(selectors)) => selectors.as_slice(),
		Some(single) => core::slice::from_ref(single),
	};
	selectors
		.iter()
		.filter_map(|selector| {
			let selector = selector.as_str();
			if selector.is_none() {
				warn!("Skipping non-string selector.");
			}
			selector.map(ToOwned::to_owned)
		})
		.collect()
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	type Spec = ComponentSpec<u32>;

	#[test]
	fn component_spec_fields() {
		let spec: Spec = serde_json::from_value(json!({
			"type": "svg",
			"select": "#x",
			"slotMarkdown": "*a*",
			"position": "2",
			"components": [{ "type": "circle" }],
		}))
		.unwrap();
		assert_eq!(spec.kind, Some(NodeKind::Svg));
		assert_eq!(spec.selector.as_deref(), Some("#x"));
		assert_eq!(spec.slot_markdown.as_deref(), Some("*a*"));
		assert_eq!(spec.position, Position::Index(2));
		assert_eq!(spec.components[0].kind, Some(NodeKind::Element("circle".to_owned())));
	}

	#[test]
	fn positions() {
		assert_eq!(Position::from(json!("first")), Position::First);
		assert_eq!(Position::from(json!(0)), Position::Index(0));
		assert_eq!(Position::from(json!(-1)), Position::Last);
		assert_eq!(Position::from(json!("last")), Position::Last);
		assert_eq!(Position::from(json!(null)), Position::Last);
	}

	#[test]
	fn legacy_mode_and_context() {
		let context = MessageContext {
			payload: Some(json!("p")),
			topic: Some("t".to_owned()),
		};
		let instruction = Instruction::<u32>::from_value(&json!({ "mode": "add", "components": [{ "type": "p" }], "parent": "#main" }), &context).unwrap();
		match instruction {
			Instruction::Add(placement) => {
				assert_eq!(placement.components.len(), 1);
				assert_eq!(placement.parent, Some(Target::Selector("#main".to_owned())));
				assert_eq!(placement.context, context);
			}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn malformed_instructions() {
		let context = MessageContext::default();
		assert_eq!(Instruction::<u32>::from_value(&json!({ "method": "frobnicate" }), &context), Err(Error::UnknownMethod("frobnicate".to_owned())));
		assert!(matches!(Instruction::<u32>::from_value(&json!({ "components": [] }), &context), Err(Error::InvalidInstruction(_))));
		assert!(matches!(Instruction::<u32>::from_value(&json!("add"), &context), Err(Error::InvalidInstruction(_))));
	}

	#[test]
	fn update_without_components_is_its_own_spec() {
		let instruction = Instruction::<u32>::from_value(&json!({ "method": "update", "id": "a", "attributes": { "x": 1 } }), &MessageContext::default()).unwrap();
		match instruction {
			Instruction::Update(placement) => {
				assert_eq!(placement.components.len(), 1);
				assert_eq!(placement.components[0].id.as_deref(), Some("a"));
			}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn invalid_components_are_skipped() {
		let instruction = Instruction::<u32>::from_value(&json!({ "method": "add", "components": [{ "type": 5 }, { "type": "p" }] }), &MessageContext::default()).unwrap();
		match instruction {
			Instruction::Add(placement) => assert_eq!(placement.components.len(), 1),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn messages_split() {
		let (entries, context) = split_message(&json!({ "_ui": { "method": "reload" }, "topic": "t" })).unwrap();
		assert_eq!(entries.len(), 1);
		assert_eq!(context.topic.as_deref(), Some("t"));
		assert!(split_message(&json!({ "payload": 1 })).is_none());
	}
}
