//! CSS selector parsing and matching for [`crate::memory::MemoryDom`].
//!
//! Supported: type, universal, `#id`, `.class`, attribute selectors (`[a]`, `=`, `~=`, `|=`, `^=`, `$=`, `*=`),
//! `:first-child`, `:last-child`, `:nth-child(n)`, `:not(…)`, the four combinators and selector lists.

use crate::error::{Error, Result};

pub(crate) trait ElementTree {
	type Id: Copy;

	fn parent_element(&self, id: Self::Id) -> Option<Self::Id>;
	fn previous_element_sibling(&self, id: Self::Id) -> Option<Self::Id>;
	fn next_element_sibling(&self, id: Self::Id) -> Option<Self::Id>;
	fn local_name(&self, id: Self::Id) -> &str;
	fn attribute_value(&self, id: Self::Id, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectorList(Vec<Complex>);

#[derive(Debug, Clone, PartialEq)]
struct Complex(Vec<(Combinator, Compound)>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
	Descendant,
	Child,
	Adjacent,
	Sibling,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
	tag: Option<String>,
	id: Option<String>,
	classes: Vec<String>,
	attributes: Vec<AttributeCondition>,
	pseudo_classes: Vec<PseudoClass>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttributeCondition {
	name: String,
	operator: Option<(AttributeOperator, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeOperator {
	Equals,
	Includes,
	DashMatch,
	Prefix,
	Suffix,
	Substring,
}

#[derive(Debug, Clone, PartialEq)]
enum PseudoClass {
	FirstChild,
	LastChild,
	NthChild(usize),
	Not(Box<Compound>),
}

impl SelectorList {
	pub(crate) fn parse(selector: &str) -> Result<Self> {
		let mut parser = SelectorParser {
			source: selector,
			chars: selector.chars().collect(),
			i: 0,
		};
		let mut groups = Vec::new();
		loop {
			parser.skip_whitespace();
			groups.push(parser.complex()?);
			parser.skip_whitespace();
			match parser.peek() {
				None => break,
				Some(',') => parser.i += 1,
				Some(_) => return Err(parser.unsupported()),
			}
		}
		Ok(Self(groups))
	}

	pub(crate) fn matches<T: ElementTree>(&self, tree: &T, id: T::Id) -> bool {
		self.0.iter().any(|complex| {
			let last = complex.0.len() - 1;
			matches_compound(tree, &complex.0[last].1, id) && matches_leftwards(tree, &complex.0, last, id)
		})
	}
}

/// `parts[index]` matched at `id`; checks everything left of it, backtracking through ancestors and siblings.
fn matches_leftwards<T: ElementTree>(tree: &T, parts: &[(Combinator, Compound)], index: usize, id: T::Id) -> bool {
	if index == 0 {
		return true;
	}
	let left = &parts[index - 1].1;
	let accept = |candidate: T::Id| matches_compound(tree, left, candidate) && matches_leftwards(tree, parts, index - 1, candidate);
	match parts[index].0 {
		Combinator::Child => tree.parent_element(id).map_or(false, accept),
		Combinator::Adjacent => tree.previous_element_sibling(id).map_or(false, accept),
		Combinator::Descendant => {
			let mut cursor = tree.parent_element(id);
			while let Some(candidate) = cursor {
				if accept(candidate) {
					return true;
				}
				cursor = tree.parent_element(candidate);
			}
			false
		}
		Combinator::Sibling => {
			let mut cursor = tree.previous_element_sibling(id);
			while let Some(candidate) = cursor {
				if accept(candidate) {
					return true;
				}
				cursor = tree.previous_element_sibling(candidate);
			}
			false
		}
	}
}

fn matches_compound<T: ElementTree>(tree: &T, compound: &Compound, id: T::Id) -> bool {
	if let Some(tag) = &compound.tag {
		if !tree.local_name(id).eq_ignore_ascii_case(tag) {
			return false;
		}
	}
	if let Some(expected) = &compound.id {
		if tree.attribute_value(id, "id") != Some(expected.as_str()) {
			return false;
		}
	}
	if !compound.classes.is_empty() {
		let classes = tree.attribute_value(id, "class").unwrap_or_default();
		if !compound.classes.iter().all(|class| classes.split_ascii_whitespace().any(|c| c == class)) {
			return false;
		}
	}
	for condition in &compound.attributes {
		let Some(value) = tree.attribute_value(id, &condition.name) else {
			return false;
		};
		let matched = match &condition.operator {
			None => true,
			Some((AttributeOperator::Equals, expected)) => value == expected,
			Some((AttributeOperator::Includes, expected)) => value.split_ascii_whitespace().any(|v| v == expected),
			Some((AttributeOperator::DashMatch, expected)) => value == expected || value.starts_with(&format!("{}-", expected)),
			Some((AttributeOperator::Prefix, expected)) => !expected.is_empty() && value.starts_with(expected.as_str()),
			Some((AttributeOperator::Suffix, expected)) => !expected.is_empty() && value.ends_with(expected.as_str()),
			Some((AttributeOperator::Substring, expected)) => !expected.is_empty() && value.contains(expected.as_str()),
		};
		if !matched {
			return false;
		}
	}
	compound.pseudo_classes.iter().all(|pseudo_class| match pseudo_class {
		PseudoClass::FirstChild => tree.previous_element_sibling(id).is_none(),
		PseudoClass::LastChild => tree.next_element_sibling(id).is_none(),
		PseudoClass::NthChild(n) => {
			let mut index = 1;
			let mut cursor = tree.previous_element_sibling(id);
			while let Some(previous) = cursor {
				index += 1;
				cursor = tree.previous_element_sibling(previous);
			}
			index == *n
		}
		PseudoClass::Not(inner) => !matches_compound(tree, inner, id),
	})
}

struct SelectorParser<'a> {
	source: &'a str,
	chars: Vec<char>,
	i: usize,
}

impl SelectorParser<'_> {
	fn unsupported(&self) -> Error {
		Error::UnsupportedSelector(self.source.to_owned())
	}

	fn peek(&self) -> Option<char> {
		self.chars.get(self.i).copied()
	}

	fn skip_whitespace(&mut self) -> bool {
		let start = self.i;
		while self.peek().map_or(false, char::is_whitespace) {
			self.i += 1;
		}
		self.i > start
	}

	fn complex(&mut self) -> Result<Complex> {
		let mut parts = vec![(Combinator::Descendant, self.compound()?)];
		loop {
			let had_whitespace = self.skip_whitespace();
			let combinator = match self.peek() {
				None | Some(',') => break,
				Some('>') => Combinator::Child,
				Some('+') => Combinator::Adjacent,
				Some('~') => Combinator::Sibling,
				Some(_) if had_whitespace => {
					parts.push((Combinator::Descendant, self.compound()?));
					continue;
				}
				Some(_) => return Err(self.unsupported()),
			};
			self.i += 1;
			self.skip_whitespace();
			parts.push((combinator, self.compound()?));
		}
		Ok(Complex(parts))
	}

	fn compound(&mut self) -> Result<Compound> {
		let mut compound = Compound::default();
		let mut any = false;
		if self.peek() == Some('*') {
			self.i += 1;
			any = true;
		} else if self.peek().map_or(false, is_ident_char) {
			compound.tag = Some(self.ident()?);
			any = true;
		}
		loop {
			match self.peek() {
				Some('#') => {
					self.i += 1;
					compound.id = Some(self.ident()?);
				}
				Some('.') => {
					self.i += 1;
					compound.classes.push(self.ident()?);
				}
				Some('[') => {
					self.i += 1;
					compound.attributes.push(self.attribute()?);
				}
				Some(':') => {
					self.i += 1;
					compound.pseudo_classes.push(self.pseudo_class()?);
				}
				_ => break,
			}
			any = true;
		}
		if any {
			Ok(compound)
		} else {
			Err(self.unsupported())
		}
	}

	fn ident(&mut self) -> Result<String> {
		let mut ident = String::new();
		while let Some(c) = self.peek() {
			if c == '\\' {
				self.i += 1;
				ident.push(self.peek().ok_or_else(|| self.unsupported())?);
				self.i += 1;
			} else if is_ident_char(c) {
				ident.push(c);
				self.i += 1;
			} else {
				break;
			}
		}
		if ident.is_empty() {
			Err(self.unsupported())
		} else {
			Ok(ident)
		}
	}

	fn string(&mut self) -> Result<String> {
		let quote = self.peek().ok_or_else(|| self.unsupported())?;
		self.i += 1;
		let mut value = String::new();
		loop {
			match self.peek() {
				None => return Err(self.unsupported()),
				Some('\\') => {
					self.i += 1;
					value.push(self.peek().ok_or_else(|| self.unsupported())?);
				}
				Some(c) if c == quote => {
					self.i += 1;
					return Ok(value);
				}
				Some(c) => value.push(c),
			}
			self.i += 1;
		}
	}

	fn attribute(&mut self) -> Result<AttributeCondition> {
		self.skip_whitespace();
		let name = self.ident()?;
		self.skip_whitespace();
		let operator = match self.peek() {
			Some(']') => None,
			Some('=') => Some(AttributeOperator::Equals),
			Some(c) => {
				let operator = match c {
					'~' => AttributeOperator::Includes,
					'|' => AttributeOperator::DashMatch,
					'^' => AttributeOperator::Prefix,
					'$' => AttributeOperator::Suffix,
					'*' => AttributeOperator::Substring,
					_ => return Err(self.unsupported()),
				};
				self.i += 1;
				if self.peek() != Some('=') {
					return Err(self.unsupported());
				}
				Some(operator)
			}
			None => return Err(self.unsupported()),
		};
		let operator = match operator {
			None => None,
			Some(operator) => {
				self.i += 1;
				self.skip_whitespace();
				let value = match self.peek() {
					Some('"' | '\'') => self.string()?,
					_ => self.ident()?,
				};
				self.skip_whitespace();
				Some((operator, value))
			}
		};
		if self.peek() != Some(']') {
			return Err(self.unsupported());
		}
		self.i += 1;
		Ok(AttributeCondition { name, operator })
	}

	fn pseudo_class(&mut self) -> Result<PseudoClass> {
		let name = self.ident()?.to_ascii_lowercase();
		match name.as_str() {
			"first-child" => Ok(PseudoClass::FirstChild),
			"last-child" => Ok(PseudoClass::LastChild),
			"nth-child" | "not" => {
				if self.peek() != Some('(') {
					return Err(self.unsupported());
				}
				self.i += 1;
				self.skip_whitespace();
				let pseudo_class = if name == "not" {
					PseudoClass::Not(Box::new(self.compound()?))
				} else {
					let digits = self.ident()?;
					PseudoClass::NthChild(digits.parse().map_err(|_| self.unsupported())?)
				};
				self.skip_whitespace();
				if self.peek() != Some(')') {
					return Err(self.unsupported());
				}
				self.i += 1;
				Ok(pseudo_class)
			}
			_ => Err(self.unsupported()),
		}
	}
}

fn is_ident_char(c: char) -> bool {
	c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}
