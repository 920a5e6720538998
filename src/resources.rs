//! `method: "load"`: external modules, scripts and stylesheets.
//!
//! Everything is added to `<head>` and stays there.

use crate::{dom::Dom, error::Result, instruction::LoadSpec};
use tracing::{error, instrument, trace};

/// Starts module imports and appends script and style elements. Returns how many resources were requested.
///
/// Failures are logged per resource.
#[instrument(skip(dom))]
pub fn load<D: Dom>(dom: &mut D, spec: &LoadSpec) -> usize {
	let mut count = 0;

	for specifier in &spec.components {
		trace!(specifier = specifier.as_str(), "Importing module.");
		dom.import_module(specifier);
		count += 1;
	}

	for src in &spec.src_scripts {
		match load_script_src(dom, src) {
			Ok(()) => count += 1,
			Err(error) => error!(src = src.as_str(), %error, "Failed to load script."),
		}
	}
	if !spec.txt_scripts.is_empty() {
		match append_to_head(dom, "script", &[], &spec.txt_scripts.join("\n")) {
			Ok(()) => count += 1,
			Err(error) => error!(%error, "Failed to add inline script."),
		}
	}

	for href in &spec.src_styles {
		match append_to_head(dom, "link", &[("rel", "stylesheet"), ("href", href)], "") {
			Ok(()) => count += 1,
			Err(error) => error!(href = href.as_str(), %error, "Failed to load stylesheet."),
		}
	}
	if !spec.txt_styles.is_empty() {
		match append_to_head(dom, "style", &[], &spec.txt_styles.join("\n")) {
			Ok(()) => count += 1,
			Err(error) => error!(%error, "Failed to add inline style."),
		}
	}

	count
}

/// Appends a non-blocking `<script src>` to `<head>`.
///
/// # Errors
///
/// Iff the element can't be created or inserted.
pub fn load_script_src<D: Dom>(dom: &mut D, src: &str) -> Result<()> {
	append_to_head(dom, "script", &[("src", src), ("async", "")], "")
}

fn append_to_head<D: Dom>(dom: &mut D, tag: &str, attributes: &[(&str, &str)], text: &str) -> Result<()> {
	let element = dom.create_element(tag)?;
	for (name, value) in attributes {
		dom.set_attribute(&element, name, value)?;
	}
	if !text.is_empty() {
		dom.set_text_content(&element, text)?;
	}
	let head = dom.head();
	dom.append_child(&head, &element)
}
