//! Markdown rendering for `slotMarkdown` content.
//!
//! The rendered HTML still goes through the engine's [`Sanitizer`](`crate::sanitize::Sanitizer`), if any.

use pulldown_cmark::{html, Options, Parser};

pub trait MarkdownRenderer {
	fn render(&self, markdown: &str) -> String;
}

impl<F: Fn(&str) -> String> MarkdownRenderer for F {
	fn render(&self, markdown: &str) -> String {
		self(markdown)
	}
}

/// CommonMark with tables, strikethrough, task lists and footnotes, via [`pulldown_cmark`].
#[derive(Debug, Clone, Copy)]
pub struct CommonMark {
	options: Options,
}

impl Default for CommonMark {
	fn default() -> Self {
		let mut options = Options::empty();
		options.insert(Options::ENABLE_TABLES);
		options.insert(Options::ENABLE_STRIKETHROUGH);
		options.insert(Options::ENABLE_TASKLISTS);
		options.insert(Options::ENABLE_FOOTNOTES);
		Self { options }
	}
}

impl CommonMark {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_options(options: Options) -> Self {
		Self { options }
	}
}

impl MarkdownRenderer for CommonMark {
	fn render(&self, markdown: &str) -> String {
		let mut out = String::with_capacity(markdown.len() * 3 / 2);
		html::push_html(&mut out, Parser::new_ext(markdown, self.options));
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_commonmark() {
		assert_eq!(CommonMark::new().render("# Title\n\nSome *text*."), "<h1>Title</h1>\n<p>Some <em>text</em>.</p>\n");
	}

	#[test]
	fn renders_tables() {
		let html = CommonMark::new().render("| a | b |\n|---|---|\n| 1 | 2 |\n");
		assert!(html.starts_with("<table>"));
		assert!(html.contains("<td>2</td>"));
	}
}
