//! A small, tolerant HTML fragment parser and serializer.
//!
//! This is not a conforming HTML5 tree builder. It understands elements, attributes (quoted, unquoted and boolean),
//! comments, raw-text elements (`<script>`, `<style>`, `<textarea>`, `<title>`), void elements, character references
//! and inline `<svg>`. It recovers from stray end tags by ignoring them, and keeps tags cut off by the end of input as text.

use crate::{
	dom::SVG_NAMESPACE,
	error::{Error, Result},
};
use core::fmt::Write as _;

/// An owned, detached node tree, as produced by [`parse_fragment`] or [`crate::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlNode {
	Element(HtmlElement),
	Text(String),
	Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
	pub name: String,
	/// [`None`] for plain HTML elements.
	pub namespace: Option<String>,
	pub attributes: Vec<(String, String)>,
	pub children: Vec<HtmlNode>,
}

impl HtmlElement {
	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
	}

	#[must_use]
	pub fn is_svg(&self) -> bool {
		self.namespace.as_deref() == Some(SVG_NAMESPACE)
	}
}

const VOID_ELEMENTS: &[&str] = &["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr"];
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[must_use]
pub fn is_void_element(name: &str) -> bool {
	VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

fn is_raw_text_element(name: &str) -> bool {
	RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Start tags that implicitly close an open element of the same name.
fn closes_same(name: &str) -> bool {
	matches!(name, "li" | "tr" | "td" | "th" | "option" | "p" | "dt" | "dd")
}

/// Parses `html` as the content of an element in `context_namespace`.
///
/// # Errors
///
/// Never, currently.
pub fn parse_fragment(html: &str, context_namespace: Option<&str>) -> Result<Vec<HtmlNode>> {
	let mut parser = Parser { src: html, i: 0 };
	let mut stack: Vec<HtmlElement> = vec![HtmlElement {
		name: String::new(),
		namespace: context_namespace.map(ToOwned::to_owned),
		attributes: Vec::new(),
		children: Vec::new(),
	}];

	while parser.i < html.len() {
		let rest = &html[parser.i..];
		if rest.starts_with("<!--") {
			// An unclosed comment runs to the end of the input.
			let (comment, consumed) = rest[4..].find("-->").map_or((&rest[4..], rest.len()), |end| (&rest[4..4 + end], 4 + end + 3));
			parser.i += consumed;
			push_child(&mut stack, HtmlNode::Comment(comment.to_owned()));
		} else if rest.starts_with("<!") || rest.starts_with("<?") {
			// Doctype or processing instruction.
			parser.i += rest.find('>').map_or(rest.len(), |end| end + 1);
		} else if rest.starts_with("</") {
			let start = parser.i;
			let Ok(name) = parser.end_tag() else {
				parser.i = start;
				push_unterminated(&mut stack, &mut parser);
				continue;
			};
			close_element(&mut stack, &name);
		} else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
			let namespace = match stack.last() {
				Some(parent) if parent.is_svg() && !parent.name.eq_ignore_ascii_case("foreignObject") => Some(SVG_NAMESPACE.to_owned()),
				_ => None,
			};
			let start = parser.i;
			let Ok((raw_name, attributes, self_closing)) = parser.start_tag(namespace.is_some()) else {
				parser.i = start;
				push_unterminated(&mut stack, &mut parser);
				continue;
			};
			let namespace = if namespace.is_none() && raw_name.eq_ignore_ascii_case("svg") { Some(SVG_NAMESPACE.to_owned()) } else { namespace };
			let name = if namespace.is_some() { raw_name } else { raw_name.to_ascii_lowercase() };

			if namespace.is_none() && closes_same(&name) {
				if let Some(top) = stack.last() {
					if stack.len() > 1 && top.name == name {
						close_element(&mut stack, &name);
					}
				}
			}

			let mut element = HtmlElement { name, namespace, attributes, children: Vec::new() };
			if element.namespace.is_none() && is_raw_text_element(&element.name) && !self_closing {
				let text = parser.raw_text(&element.name);
				if !text.is_empty() {
					element.children.push(HtmlNode::Text(if element.name == "textarea" || element.name == "title" { decode_entities(&text) } else { text }));
				}
				push_child(&mut stack, HtmlNode::Element(element));
			} else if self_closing || (element.namespace.is_none() && is_void_element(&element.name)) {
				push_child(&mut stack, HtmlNode::Element(element));
			} else {
				stack.push(element);
			}
		} else {
			let first = rest.chars().next().map_or(1, char::len_utf8);
			let end = rest[first..].find('<').map_or(rest.len(), |end| end + first);
			let text = &rest[..end];
			parser.i += end;
			push_text(&mut stack, &decode_entities(text));
		}
	}

	while stack.len() > 1 {
		if let Some(element) = stack.pop() {
			push_child(&mut stack, HtmlNode::Element(element));
		}
	}
	Ok(stack.pop().map(|root| root.children).unwrap_or_default())
}

/// Keeps a tag that never closes as text, instead of dropping it.
fn push_unterminated(stack: &mut [HtmlElement], parser: &mut Parser<'_>) {
	push_text(stack, &decode_entities(&parser.src[parser.i..]));
	parser.i = parser.src.len();
}

fn push_child(stack: &mut [HtmlElement], node: HtmlNode) {
	if let Some(parent) = stack.last_mut() {
		parent.children.push(node);
	}
}

fn push_text(stack: &mut [HtmlElement], text: &str) {
	if text.is_empty() {
		return;
	}
	if let Some(parent) = stack.last_mut() {
		if let Some(HtmlNode::Text(previous)) = parent.children.last_mut() {
			previous.push_str(text);
		} else {
			parent.children.push(HtmlNode::Text(text.to_owned()));
		}
	}
}

fn close_element(stack: &mut Vec<HtmlElement>, name: &str) {
	// Stray end tags are ignored.
	let Some(position) = stack.iter().skip(1).rposition(|element| element.name.eq_ignore_ascii_case(name)) else {
		return;
	};
	let position = position + 1;
	while stack.len() > position {
		if let Some(element) = stack.pop() {
			push_child(stack, HtmlNode::Element(element));
		}
	}
}

struct Parser<'a> {
	src: &'a str,
	i: usize,
}

impl<'a> Parser<'a> {
	fn bytes(&self) -> &'a [u8] {
		self.src.as_bytes()
	}

	fn skip_whitespace(&mut self) {
		while self.i < self.src.len() && self.bytes()[self.i].is_ascii_whitespace() {
			self.i += 1;
		}
	}

	fn name(&mut self) -> &'a str {
		let start = self.i;
		while self.i < self.src.len() {
			let b = self.bytes()[self.i];
			if b.is_ascii_whitespace() || b == b'>' || b == b'/' || b == b'=' {
				break;
			}
			self.i += 1;
		}
		&self.src[start..self.i]
	}

	fn start_tag(&mut self, preserve_case: bool) -> Result<(String, Vec<(String, String)>, bool)> {
		self.i += 1;
		let name = self.name().to_owned();
		let mut attributes: Vec<(String, String)> = Vec::new();
		loop {
			self.skip_whitespace();
			match self.bytes().get(self.i) {
				None => return Err(Error::HtmlParse(format!("unclosed start tag <{}>", name))),
				Some(b'>') => {
					self.i += 1;
					return Ok((name, attributes, false));
				}
				Some(b'/') if self.bytes().get(self.i + 1) == Some(&b'>') => {
					self.i += 2;
					return Ok((name, attributes, true));
				}
				Some(b'/') => self.i += 1,
				Some(_) => {
					let attribute_name = self.name();
					if attribute_name.is_empty() {
						// Lone `=` or similar garbage.
						self.i += 1;
						continue;
					}
					let attribute_name = if preserve_case || name.eq_ignore_ascii_case("svg") { attribute_name.to_owned() } else { attribute_name.to_ascii_lowercase() };
					self.skip_whitespace();
					let value = if self.bytes().get(self.i) == Some(&b'=') {
						self.i += 1;
						self.skip_whitespace();
						self.attribute_value()?
					} else {
						String::new()
					};
					if !attributes.iter().any(|(n, _)| *n == attribute_name) {
						attributes.push((attribute_name, value));
					}
				}
			}
		}
	}

	fn attribute_value(&mut self) -> Result<String> {
		match self.bytes().get(self.i) {
			Some(&quote) if quote == b'"' || quote == b'\'' => {
				let start = self.i + 1;
				let end = self.src[start..]
					.find(quote as char)
					.ok_or_else(|| Error::HtmlParse("unclosed attribute value".to_owned()))?;
				self.i = start + end + 1;
				Ok(decode_entities(&self.src[start..start + end]))
			}
			_ => {
				let start = self.i;
				while self.i < self.src.len() {
					let b = self.bytes()[self.i];
					if b.is_ascii_whitespace() || b == b'>' {
						break;
					}
					self.i += 1;
				}
				Ok(decode_entities(&self.src[start..self.i]))
			}
		}
	}

	fn end_tag(&mut self) -> Result<String> {
		self.i += 2;
		let name = self.name().to_owned();
		let end = self.src[self.i..].find('>').ok_or_else(|| Error::HtmlParse(format!("unclosed end tag </{}>", name)))?;
		self.i += end + 1;
		Ok(name)
	}

	/// Consumes everything up to (and including) the matching end tag.
	fn raw_text(&mut self, name: &str) -> String {
		let rest = &self.src[self.i..];
		let lower = rest.to_ascii_lowercase();
		let needle = format!("</{}", name);
		match lower.find(&needle) {
			Some(end) => {
				let text = rest[..end].to_owned();
				self.i += end;
				let close = self.src[self.i..].find('>').map_or(self.src.len() - self.i, |close| close + 1);
				self.i += close;
				text
			}
			None => {
				self.i = self.src.len();
				rest.to_owned()
			}
		}
	}
}

#[must_use]
pub fn decode_entities(text: &str) -> String {
	if !text.contains('&') {
		return text.to_owned();
	}
	let mut out = String::with_capacity(text.len());
	let mut rest = text;
	while let Some(amp) = rest.find('&') {
		out.push_str(&rest[..amp]);
		rest = &rest[amp..];
		let decoded = rest.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
			let entity = &rest[1..semi];
			let c = match entity {
				"amp" => Some('&'),
				"lt" => Some('<'),
				"gt" => Some('>'),
				"quot" => Some('"'),
				"apos" => Some('\''),
				"nbsp" => Some('\u{a0}'),
				_ if entity.starts_with("#x") || entity.starts_with("#X") => u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32),
				_ if entity.starts_with('#') => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
				_ => None,
			};
			c.map(|c| (c, semi))
		});
		match decoded {
			Some((c, semi)) => {
				out.push(c);
				rest = &rest[semi + 1..];
			}
			None => {
				out.push('&');
				rest = &rest[1..];
			}
		}
	}
	out.push_str(rest);
	out
}

#[must_use]
pub fn escape_text(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'\u{a0}' => out.push_str("&nbsp;"),
			c => out.push(c),
		}
	}
	out
}

#[must_use]
pub fn escape_attribute(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'"' => out.push_str("&quot;"),
			'\u{a0}' => out.push_str("&nbsp;"),
			c => out.push(c),
		}
	}
	out
}

/// Serializes nodes the way `innerHTML` would.
#[must_use]
pub fn serialize(nodes: &[HtmlNode]) -> String {
	let mut out = String::new();
	for node in nodes {
		serialize_node(node, &mut out);
	}
	out
}

fn serialize_node(node: &HtmlNode, out: &mut String) {
	match node {
		HtmlNode::Text(text) => out.push_str(&escape_text(text)),
		HtmlNode::Comment(comment) => {
			let _ = write!(out, "<!--{}-->", comment);
		}
		HtmlNode::Element(element) => {
			let _ = write!(out, "<{}", element.name);
			for (name, value) in &element.attributes {
				let _ = write!(out, " {}=\"{}\"", name, escape_attribute(value));
			}
			out.push('>');
			if element.namespace.is_none() && is_void_element(&element.name) {
				return;
			}
			if element.namespace.is_none() && (element.name == "script" || element.name == "style") {
				for child in &element.children {
					if let HtmlNode::Text(text) = child {
						out.push_str(text);
					}
				}
			} else {
				for child in &element.children {
					serialize_node(child, out);
				}
			}
			let _ = write!(out, "</{}>", element.name);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nested_elements_and_text() {
		let nodes = parse_fragment("<p class=\"a\">Hello <b>world</b>!</p>", None).unwrap();
		assert_eq!(serialize(&nodes), "<p class=\"a\">Hello <b>world</b>!</p>");
	}

	#[test]
	fn svg_keeps_case_and_namespace() {
		let nodes = parse_fragment("<svg viewBox=\"0 0 1 1\"><linearGradient/></svg>", None).unwrap();
		let HtmlNode::Element(svg) = &nodes[0] else { panic!("expected element") };
		assert!(svg.is_svg());
		assert_eq!(svg.attribute("viewBox"), Some("0 0 1 1"));
		let HtmlNode::Element(gradient) = &svg.children[0] else { panic!("expected element") };
		assert_eq!(gradient.name, "linearGradient");
		assert!(gradient.is_svg());
	}

	#[test]
	fn script_content_is_raw() {
		let nodes = parse_fragment("<script>if (a < b) { x = '</b>' }</script>", None).unwrap();
		let HtmlNode::Element(script) = &nodes[0] else { panic!("expected element") };
		assert_eq!(script.children, vec![HtmlNode::Text("if (a < b) { x = '</b>' }".to_owned())]);
	}

	#[test]
	fn entities_and_implicit_closing() {
		let nodes = parse_fragment("<ul><li>a &amp; b<li>c&#33;</ul>", None).unwrap();
		assert_eq!(serialize(&nodes), "<ul><li>a &amp; b</li><li>c!</li></ul>");
	}

	#[test]
	fn unterminated_tags_stay_text() {
		let nodes = parse_fragment("if a<b then", None).unwrap();
		assert_eq!(nodes, vec![HtmlNode::Text("if a<b then".to_owned())]);
		let nodes = parse_fragment("<i>x</i", None).unwrap();
		assert_eq!(serialize(&nodes), "<i>x&lt;/i</i>");
		let nodes = parse_fragment("a<!-- open", None).unwrap();
		assert_eq!(nodes, vec![HtmlNode::Text("a".to_owned()), HtmlNode::Comment(" open".to_owned())]);
	}

	#[test]
	fn stray_end_tags_are_ignored() {
		let nodes = parse_fragment("a</div>b<br>c", None).unwrap();
		assert_eq!(serialize(&nodes), "ab<br>c");
	}
}
