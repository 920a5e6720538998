//! The structural instruction handlers: `add`, `replace`, `update`, `remove` and `removeAll`.

use crate::{
	compose::Composer,
	dom::{Dom, Target, SVG_NAMESPACE},
	error::{Error, Result},
	instruction::{ComponentSpec, MessageContext, Namespace, NodeKind, Placement, Position},
};
use tracing::{error, instrument, trace, trace_span, warn};

pub struct TreeBuilder<'a, D: Dom> {
	pub composer: Composer<'a, D>,
}

/// How a spec is looked up in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Locator {
	selector: String,
	/// Only the first match counts, as for ids.
	single: bool,
}

impl Locator {
	/// By `id`, then `selector`, then `name`, then element type.
	fn for_spec<N>(spec: &ComponentSpec<N>) -> Option<Self> {
		if let Some(id) = &spec.id {
			return Some(Self {
				selector: format!("[id=\"{}\"]", escape_css_string(id)),
				single: true,
			});
		}
		if let Some(selector) = &spec.selector {
			return Some(Self {
				selector: selector.clone(),
				single: false,
			});
		}
		if let Some(name) = &spec.name {
			return Some(Self {
				selector: format!("[name=\"{}\"]", escape_css_string(name)),
				single: false,
			});
		}
		match &spec.kind {
			Some(NodeKind::Element(tag)) => Some(Self {
				selector: tag.clone(),
				single: false,
			}),
			Some(NodeKind::Svg) => Some(Self {
				selector: "svg".to_owned(),
				single: false,
			}),
			// A generic wrapper doesn't identify anything.
			Some(NodeKind::Html) | None => None,
		}
	}
}

fn escape_css_string(value: &str) -> String {
	value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl<'a, D: Dom> TreeBuilder<'a, D> {
	/// Creates, composes and inserts each component. Returns how many were added.
	#[instrument(skip(self, dom, placement))]
	pub fn add(&self, dom: &mut D, placement: &Placement<D::Node>) -> usize {
		placement.components.iter().filter(|spec| self.add_component(dom, spec, placement).is_some()).count()
	}

	fn add_component(&self, dom: &mut D, spec: &ComponentSpec<D::Node>, placement: &Placement<D::Node>) -> Option<D::Node> {
		let (node, namespace) = match self.create_root(dom, spec) {
			Ok(created) => created,
			Err(error) => {
				error!(%error, "Skipping component.");
				return None;
			}
		};
		self.composer.compose(dom, &node, spec, placement.context.payload.as_ref());

		let parent = match self.resolve_parent(dom, spec, placement) {
			Ok(parent) => parent,
			Err(error) => {
				error!(%error, "Skipping component.");
				return None;
			}
		};
		if let Err(error) = insert_at(dom, &parent, &node, spec.position) {
			error!(%error, "Failed to insert component.");
			return None;
		}

		if !spec.components.is_empty() {
			self.extend(dom, &node, &spec.components, namespace);
		}
		Some(node)
	}

	/// Creates the node for a top-level component, per its `type`.
	fn create_root(&self, dom: &mut D, spec: &ComponentSpec<D::Node>) -> Result<(D::Node, Namespace)> {
		match &spec.kind {
			None => Err(Error::InvalidInstruction("Component has no type".to_owned())),
			Some(NodeKind::Html) => Ok((dom.create_element("div")?, Namespace::Html)),
			Some(NodeKind::Svg) => Ok((dom.create_element_ns(SVG_NAMESPACE, "svg")?, Namespace::Svg)),
			Some(NodeKind::Element(tag)) => Ok((dom.create_element(tag)?, Namespace::Dom)),
		}
	}

	/// Parent node reference on the component, then on the instruction, then parent selector on the component, then on the instruction, then `<body>`.
	fn resolve_parent(&self, dom: &D, spec: &ComponentSpec<D::Node>, placement: &Placement<D::Node>) -> Result<D::Node> {
		if let Some(parent) = &spec.parent_el {
			return Ok(parent.clone());
		}
		if let Some(Target::Node(parent)) = &placement.parent {
			return Ok(parent.clone());
		}
		let selector = spec.parent.as_deref().or(match &placement.parent {
			Some(Target::Selector(selector)) => Some(selector.as_str()),
			_ => None,
		});
		match selector {
			Some(selector) => dom.query_selector(None, selector)?.ok_or_else(|| Error::NotFound(format!("parent {:?}", selector))),
			None => {
				trace!("No parent specified. Using <body>.");
				Ok(dom.body())
			}
		}
	}

	/// Builds `children` under `parent`, which was created in `inherited` namespace.
	///
	/// Under [`Namespace::Html`], children aren't nodes: their slots replace the parent's content.
	#[instrument(skip(self, dom, children))]
	pub fn extend(&self, dom: &mut D, parent: &D::Node, children: &[ComponentSpec<D::Node>], inherited: Namespace) {
		for child in children {
			if inherited == Namespace::Html {
				self.replace_parent_content(dom, parent, child);
				if !child.components.is_empty() {
					self.extend(dom, parent, &child.components, Namespace::Html);
				}
				continue;
			}

			let namespace = match &child.kind {
				Some(kind @ (NodeKind::Html | NodeKind::Svg)) => kind.namespace(),
				_ => inherited,
			};
			let created = match (&child.kind, namespace) {
				(None, _) => Err(Error::InvalidInstruction("Nested component has no type".to_owned())),
				(Some(NodeKind::Svg), _) => dom.create_element_ns(SVG_NAMESPACE, "svg"),
				(Some(NodeKind::Element(tag)), Namespace::Svg) => dom.create_element_ns(SVG_NAMESPACE, tag),
				(Some(NodeKind::Html), _) => dom.create_element("div"),
				(Some(NodeKind::Element(tag)), _) => dom.create_element(tag),
			};
			let node = match created {
				Ok(node) => node,
				Err(error) => {
					error!(%error, "Skipping nested component.");
					continue;
				}
			};

			self.composer.compose(dom, &node, child, None);
			if let Err(error) = dom.append_child(parent, &node) {
				error!(%error, "Failed to append nested component.");
				continue;
			}
			if !child.components.is_empty() {
				self.extend(dom, &node, &child.components, namespace);
			}
		}
	}

	fn replace_parent_content(&self, dom: &mut D, parent: &D::Node, child: &ComponentSpec<D::Node>) {
		let content = self.composer.content;
		if let Some(slot) = child.slot.as_ref().filter(|slot| !slot.is_null()) {
			if let Err(error) = content.replace_content(dom, parent, &crate::compose::value_text(slot)) {
				error!(%error, "Failed to replace content.");
			}
		}
		if let Some(markdown) = &child.slot_markdown {
			if let Err(error) = content.replace_content(dom, parent, &content.render_markdown(markdown)) {
				error!(%error, "Failed to replace content.");
			}
		}
	}

	/// Swaps each located node for a freshly built one. Components that locate nothing are added instead.
	#[instrument(skip(self, dom, placement))]
	pub fn replace(&self, dom: &mut D, placement: &Placement<D::Node>) -> usize {
		let mut count = 0;
		for spec in &placement.components {
			let existing = match Locator::for_spec(spec).map(|locator| dom.query_selector(None, &locator.selector)) {
				Some(Ok(existing)) => existing,
				Some(Err(error)) => {
					warn!(%error, "Could not look up component to replace. Adding it instead.");
					None
				}
				None => None,
			};
			let Some(existing) = existing else {
				trace!("Nothing to replace. Adding.");
				count += usize::from(self.add_component(dom, spec, placement).is_some());
				continue;
			};

			let span = trace_span!("Replacing", node = ?existing);
			let _enter = span.enter();
			let (node, namespace) = match self.create_root(dom, spec) {
				Ok(created) => created,
				Err(error) => {
					error!(%error, "Skipping component.");
					continue;
				}
			};
			self.composer.compose(dom, &node, spec, placement.context.payload.as_ref());
			if !spec.components.is_empty() {
				self.extend(dom, &node, &spec.components, namespace);
			}
			match dom.replace_with(&existing, &node) {
				Ok(()) => count += 1,
				Err(error) => error!(%error, "Failed to swap in the replacement."),
			}
		}
		count
	}

	/// Composes every node each component locates. Nested components are applied as further updates scoped to each match.
	///
	/// Components that locate nothing are skipped.
	#[instrument(skip(self, dom, placement))]
	pub fn update(&self, dom: &mut D, placement: &Placement<D::Node>) -> usize {
		let scope = match &placement.parent {
			None => None,
			Some(Target::Node(node)) => Some(node.clone()),
			Some(Target::Selector(selector)) => match dom.query_selector(None, selector) {
				Ok(Some(scope)) => Some(scope),
				Ok(None) => {
					warn!(parent = selector.as_str(), "Update parent not found. Skipping.");
					return 0;
				}
				Err(error) => {
					warn!(%error, "Skipping update.");
					return 0;
				}
			},
		};

		let mut count = 0;
		for spec in &placement.components {
			let Some(locator) = Locator::for_spec(spec) else {
				warn!("Component has neither id, selector, name nor type to update by. Skipping.");
				continue;
			};
			let mut matches = match dom.query_selector_all(scope.as_ref(), &locator.selector) {
				Ok(matches) => matches,
				Err(error) => {
					warn!(%error, "Skipping component.");
					continue;
				}
			};
			if locator.single {
				matches.truncate(1);
			}
			if matches.is_empty() {
				warn!(selector = locator.selector.as_str(), "Nothing to update. Skipping.");
				continue;
			}

			for node in &matches {
				self.composer.compose(dom, node, spec, placement.context.payload.as_ref());
				if !spec.components.is_empty() {
					self.update(
						dom,
						&Placement {
							components: spec.components.clone(),
							parent: Some(Target::Node(node.clone())),
							context: MessageContext::default(),
						},
					);
				}
			}
			count += matches.len();
		}
		count
	}

	/// Removes the first (`all == false`) or every match of each selector. Missing matches are not an error.
	#[instrument(skip(self, dom))]
	pub fn remove(&self, dom: &mut D, selectors: &[String], all: bool) -> usize {
		let mut count = 0;
		for selector in selectors {
			let found = if all {
				dom.query_selector_all(None, selector)
			} else {
				dom.query_selector(None, selector).map(|found| found.into_iter().collect())
			};
			match found {
				Ok(found) if found.is_empty() => trace!(selector = selector.as_str(), "Nothing to remove."),
				Ok(found) => {
					for node in &found {
						dom.remove(node);
					}
					count += found.len();
				}
				Err(error) => trace!(selector = selector.as_str(), %error, "Could not remove."),
			}
		}
		count
	}
}

/// # Errors
///
/// Iff the insertion fails.
pub fn insert_at<D: Dom>(dom: &mut D, parent: &D::Node, node: &D::Node, position: Position) -> Result<()> {
	match position {
		Position::First => dom.prepend_child(parent, node),
		Position::Index(index) => {
			let reference = dom.children(parent).into_iter().nth(index);
			dom.insert_before(parent, node, reference.as_ref())
		}
		Position::Last => dom.append_child(parent, node),
	}
}
