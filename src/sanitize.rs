//! Content sanitization applied to all raw HTML before it is inserted.
//!
//! The engine works without a sanitizer (content passes through as-is). [`StrictSanitizer`] removes executable markup:
//! no script, no inline event handlers, no script URLs.

use crate::html::{self, HtmlElement, HtmlNode};
use hashbrown::HashSet;
use tracing::{trace, warn};

/// Turns untrusted HTML into HTML that is safe to insert.
pub trait Sanitizer {
	fn sanitize(&self, html: &str) -> String;
}

impl<F: Fn(&str) -> String> Sanitizer for F {
	fn sanitize(&self, html: &str) -> String {
		self(html)
	}
}

const DENIED_ELEMENTS: &[&str] = &["script", "iframe", "object", "embed", "frame", "frameset", "base", "meta", "link", "noscript", "applet"];
const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction", "xlink:href", "data", "poster", "background"];

/// Drops dangerous elements (with their content), `on*` attributes and `javascript:`/`vbscript:`/non-image `data:` URLs.
#[derive(Debug, Clone)]
pub struct StrictSanitizer {
	denied: HashSet<String>,
}

impl Default for StrictSanitizer {
	fn default() -> Self {
		Self {
			denied: DENIED_ELEMENTS.iter().map(|name| (*name).to_owned()).collect(),
		}
	}
}

impl StrictSanitizer {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Stops removing elements named `name`.
	#[must_use]
	pub fn allow_tag(mut self, name: &str) -> Self {
		self.denied.remove(&name.to_ascii_lowercase());
		self
	}

	/// Additionally removes elements named `name`.
	#[must_use]
	pub fn deny_tag(mut self, name: &str) -> Self {
		self.denied.insert(name.to_ascii_lowercase());
		self
	}

	fn clean(&self, nodes: Vec<HtmlNode>) -> Vec<HtmlNode> {
		nodes
			.into_iter()
			.filter_map(|node| match node {
				HtmlNode::Element(element) => self.clean_element(element).map(HtmlNode::Element),
				other => Some(other),
			})
			.collect()
	}

	fn clean_element(&self, element: HtmlElement) -> Option<HtmlElement> {
		if self.denied.contains(&element.name.to_ascii_lowercase()) {
			trace!(element = element.name.as_str(), "Removed element.");
			return None;
		}
		let HtmlElement { name, namespace, attributes, children } = element;
		let attributes = attributes
			.into_iter()
			.filter(|(attribute, value)| {
				let attribute = attribute.to_ascii_lowercase();
				let keep = !attribute.starts_with("on") && !(URL_ATTRIBUTES.contains(&attribute.as_str()) && is_dangerous_url(value));
				if !keep {
					trace!(attribute = attribute.as_str(), "Removed attribute.");
				}
				keep
			})
			.collect();
		Some(HtmlElement {
			name,
			namespace,
			attributes,
			children: self.clean(children),
		})
	}
}

impl Sanitizer for StrictSanitizer {
	fn sanitize(&self, input: &str) -> String {
		match html::parse_fragment(input, None) {
			Ok(nodes) => html::serialize(&self.clean(nodes)),
			Err(error) => {
				warn!(%error, "Could not parse content for sanitization. Escaping it instead.");
				html::escape_text(input)
			}
		}
	}
}

fn is_dangerous_url(url: &str) -> bool {
	let normalized: String = url.chars().filter(|c| !c.is_whitespace() && !c.is_control()).collect::<String>().to_ascii_lowercase();
	normalized.starts_with("javascript:") || normalized.starts_with("vbscript:") || (normalized.starts_with("data:") && !normalized.starts_with("data:image/"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_executable_markup() {
		let sanitizer = StrictSanitizer::new();
		assert_eq!(
			sanitizer.sanitize("<p onclick=\"x()\" class=\"a\">hi<script>alert(1)</script></p><a href=\" JavaScript:x()\">l</a>"),
			"<p class=\"a\">hi</p><a>l</a>"
		);
		assert_eq!(sanitizer.sanitize("<img src=\"data:image/png;base64,AA==\">"), "<img src=\"data:image/png;base64,AA==\">");
	}

	#[test]
	fn tag_lists_are_configurable() {
		let sanitizer = StrictSanitizer::new().allow_tag("iframe").deny_tag("style");
		assert_eq!(sanitizer.sanitize("<iframe src=\"/x\"></iframe><style>p{}</style>"), "<iframe src=\"/x\"></iframe>");
	}

	#[test]
	fn closures_are_sanitizers() {
		let upper = |html: &str| html.to_uppercase();
		assert_eq!(Sanitizer::sanitize(&upper, "<b>x</b>"), "<B>X</B>");
	}
}
