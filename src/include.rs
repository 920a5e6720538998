//! Remote content: fetched fragments, remote UI documents, and `<template>` application.

use crate::{
	compose::value_text,
	dom::{Dom, FetchResponse},
	engine::{BatchReport, Engine},
	error::{Error, Result},
	html::{escape_attribute, escape_text},
	instruction::{ComponentSpec, Instruction, NodeKind, Placement},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, instrument, trace, warn};

/// Wraps fetched content as HTML, according to its media type. Binary content is referenced by URL instead.
#[must_use]
pub fn wrap_response(response: &FetchResponse) -> String {
	let media_type = response.media_type();
	let url = escape_attribute(&response.url);
	match media_type.as_str() {
		"text/html" => format!("<div>{}</div>", response.body),
		json if json == "application/json" || json.ends_with("+json") => {
			let pretty = serde_json::from_str::<Value>(&response.body)
				.ok()
				.and_then(|value| serde_json::to_string_pretty(&value).ok())
				.unwrap_or_else(|| response.body.clone());
			format!("<pre class=\"syntax-highlight\">{}</pre>", escape_text(&pretty))
		}
		"multipart/form-data" => format!("<pre>{}</pre>", escape_text(&response.body)),
		image if image.starts_with("image/") => format!("<img src=\"{}\">", url),
		video if video.starts_with("video/") => format!("<video controls=\"\" src=\"{}\"></video>", url),
		"application/pdf" => format!("<iframe class=\"pdf\" src=\"{}\"></iframe>", url),
		text if text.starts_with("text/") || text.is_empty() || text == "application/xml" || text == "application/javascript" => {
			format!("<pre>{}</pre>", escape_text(&response.body))
		}
		other => format!("<object data=\"{}\" type=\"{}\"></object>", url, escape_attribute(other)),
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMode {
	/// Append the template content to the target.
	Insert,
	/// Replace the target's content.
	Replace,
	/// Replace the target's content, moving what was there into the template's first `<slot>`.
	Wrap,
}

impl Default for TemplateMode {
	fn default() -> Self {
		Self::Insert
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateOptions {
	/// Move the content out of the template instead of cloning it, so it can only be applied once.
	pub once_only: bool,
	pub mode: TemplateMode,
	/// Set on the first element of the content.
	pub attributes: Map<String, Value>,
}

impl<D: Dom> Engine<D> {
	/// Fetches `url` and shows it through a `replace` of `spec`, which defaults to `<div class="included">` in `<body>`.
	///
	/// `on_done` receives a status message, or the reason nothing was shown.
	#[instrument(skip(self, dom, spec, on_done))]
	pub fn include(&self, dom: &mut D, url: &str, spec: ComponentSpec<D::Node>, on_done: impl FnOnce(&mut D, Result<String>) + 'static) {
		let engine = self.clone();
		dom.fetch(
			url,
			Box::new(move |dom: &mut D, response: Result<FetchResponse>| {
				let outcome = response.and_then(|response| {
					if response.is_ok() {
						Ok(response)
					} else {
						Err(Error::Fetch {
							url: response.url.clone(),
							message: format!("status {}", response.status),
						})
					}
				});
				match outcome {
					Ok(response) => {
						let mut spec = spec;
						spec.kind.get_or_insert(NodeKind::Element("div".to_owned()));
						if spec.parent.is_none() && spec.parent_el.is_none() {
							spec.parent = Some("body".to_owned());
						}
						spec.attributes.entry("class").or_insert_with(|| Value::String("included".to_owned()));
						spec.slot = Some(Value::String(wrap_response(&response)));
						spec.slot_markdown = None;

						// Without an identity, a replace would swap out whatever element of the same type comes first.
						let identified = spec.id.is_some() || spec.selector.is_some() || spec.name.is_some();
						let placement = Placement::new(vec![spec]);
						engine.dispatch(dom, if identified { Instruction::Replace(placement) } else { Instruction::Add(placement) });
						trace!(url = response.url.as_str(), "Included.");
						on_done(dom, Ok("Include successful".to_owned()));
					}
					Err(error) => {
						error!(%error, "Include failed.");
						on_done(dom, Err(error));
					}
				}
			}),
		);
	}

	/// Fetches a JSON document of instructions and applies it, either as a whole message (with `_ui`) or as bare instructions.
	#[instrument(skip(self, dom, on_done))]
	pub fn load_ui(&self, dom: &mut D, url: &str, on_done: impl FnOnce(&mut D, Result<BatchReport>) + 'static) {
		let engine = self.clone();
		dom.fetch(
			url,
			Box::new(move |dom: &mut D, response: Result<FetchResponse>| {
				let parsed = response.and_then(|response| {
					if !response.is_ok() {
						return Err(Error::Fetch {
							url: response.url.clone(),
							message: format!("status {}", response.status),
						});
					}
					Ok(serde_json::from_str::<Value>(&response.body)?)
				});
				match parsed {
					Ok(document) => {
						let report = if document.get("_ui").is_some() { engine.ui(dom, &document) } else { engine.apply(dom, &document) };
						on_done(dom, Ok(report));
					}
					Err(error) => {
						error!(%error, "Loading UI failed.");
						on_done(dom, Err(error));
					}
				}
			}),
		);
	}

	/// Applies the content of `<template id=source_id>` to the element with id `target_id`. Returns the first applied element, if any.
	///
	/// # Errors
	///
	/// Iff either element is missing, the source is not a template, or insertion fails.
	#[instrument(skip(self, dom, options))]
	pub fn apply_template(&self, dom: &mut D, source_id: &str, target_id: &str, options: &TemplateOptions) -> Result<Option<D::Node>> {
		let source = dom.element_by_id(source_id).ok_or_else(|| Error::NotFound(format!("template #{}", source_id)))?;
		let target = dom.element_by_id(target_id).ok_or_else(|| Error::NotFound(format!("target #{}", target_id)))?;
		let content = dom.template_content(&source, options.once_only)?;
		let first_element = content.iter().find(|node| dom.tag_name(node).is_some()).cloned();

		if let Some(element) = &first_element {
			for (name, value) in &options.attributes {
				dom.set_attribute(element, name, &value_text(value))?;
			}
		}

		let previous = match options.mode {
			TemplateMode::Insert => Vec::new(),
			TemplateMode::Replace | TemplateMode::Wrap => {
				let previous = dom.child_nodes(&target);
				dom.clear_children(&target);
				previous
			}
		};
		for node in &content {
			dom.append_child(&target, node)?;
		}

		if options.mode == TemplateMode::Wrap {
			let mut slot = None;
			for node in &content {
				if dom.tag_name(node).as_deref() == Some("slot") {
					slot = Some(node.clone());
				} else if dom.tag_name(node).is_some() {
					slot = dom.query_selector(Some(node), "slot")?;
				}
				if slot.is_some() {
					break;
				}
			}
			let slot = slot.unwrap_or_else(|| {
				warn!("Template has no <slot>. Appending the wrapped content instead.");
				target.clone()
			});
			for node in &previous {
				dom.append_child(&slot, node)?;
			}
		}

		Ok(first_element)
	}
}
