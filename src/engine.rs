//! The instruction dispatcher and its configuration.

use crate::{
	compose::{Composer, Content},
	dialog::{self, DialogKind, DialogSettings, DialogSpec, OverlayHandle, OverlayOptions},
	dom::{Dom, DomEvent},
	error::Result,
	handlers::HandlerRegistry,
	instruction::{split_message, Instruction, MessageContext},
	markdown::MarkdownRenderer,
	resources,
	sanitize::Sanitizer,
	table::{self, ColumnMetadata, ListenerOptions, RowOptions, TableEvent, TableOptions, DEFAULT_PAD},
	tree::TreeBuilder,
};
use core::{cell::RefCell, fmt};
use serde_json::Value;
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span};

/// How a batch went. Instructions are skipped iff they can't be interpreted; failures while applying them are only logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
	pub applied: usize,
	pub skipped: usize,
}

impl BatchReport {
	fn merge(self, other: Self) -> Self {
		Self {
			applied: self.applied + other.applied,
			skipped: self.skipped + other.skipped,
		}
	}
}

/// Configuration, resolved once by [`EngineBuilder::build`].
#[derive(Debug, Default)]
pub struct EngineBuilder {
	content: Content,
	dialog: DialogSettings,
	table_pad: Option<usize>,
}

impl EngineBuilder {
	#[must_use]
	pub fn sanitizer(mut self, sanitizer: impl Sanitizer + 'static) -> Self {
		self.content.sanitizer = Some(Box::new(sanitizer));
		self
	}

	#[must_use]
	pub fn markdown(mut self, renderer: impl MarkdownRenderer + 'static) -> Self {
		self.content.markdown = Some(Box::new(renderer));
		self
	}

	#[must_use]
	pub fn dialog_settings(mut self, settings: DialogSettings) -> Self {
		self.dialog = settings;
		self
	}

	/// Digits of positional cell names reported by table listeners.
	#[must_use]
	pub fn table_pad(mut self, pad: usize) -> Self {
		self.table_pad = Some(pad);
		self
	}

	#[must_use]
	pub fn build<D: Dom>(self) -> Engine<D> {
		Engine {
			inner: Rc::new(Inner {
				content: self.content,
				handlers: HandlerRegistry::default(),
				dialog: self.dialog,
				table_pad: self.table_pad.unwrap_or(DEFAULT_PAD),
			}),
		}
	}
}

struct Inner<D: Dom> {
	content: Content,
	handlers: HandlerRegistry<D>,
	dialog: DialogSettings,
	table_pad: usize,
}

/// Applies UI instructions to a [`Dom`].
///
/// Cloning is cheap and shares configuration and registered handlers, so clones can be moved into callbacks.
pub struct Engine<D: Dom> {
	inner: Rc<Inner<D>>,
}

impl<D: Dom> Clone for Engine<D> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}

impl<D: Dom> fmt::Debug for Engine<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Engine")
			.field("content", &self.inner.content)
			.field("handlers", &self.inner.handlers)
			.field("dialog", &self.inner.dialog)
			.field("table_pad", &self.inner.table_pad)
			.finish()
	}
}

impl<D: Dom> Default for Engine<D> {
	fn default() -> Self {
		Self::new()
	}
}

impl<D: Dom> Engine<D> {
	/// No sanitizer, no Markdown renderer, default settings.
	#[must_use]
	pub fn new() -> Self {
		Self::builder().build()
	}

	#[must_use]
	pub fn builder() -> EngineBuilder {
		EngineBuilder::default()
	}

	/// Makes `handler` available to `events` entries as `name`. Only affects components composed afterwards.
	pub fn register_handler(&self, name: &str, handler: impl Fn(&mut D, &DomEvent<D::Node>) + 'static) {
		self.inner.handlers.register(name, handler);
	}

	#[must_use]
	pub fn handlers(&self) -> &HandlerRegistry<D> {
		&self.inner.handlers
	}

	#[must_use]
	pub fn content(&self) -> &Content {
		&self.inner.content
	}

	#[must_use]
	pub fn dialog_settings(&self) -> &DialogSettings {
		&self.inner.dialog
	}

	pub(crate) fn tree(&self) -> TreeBuilder<'_, D> {
		TreeBuilder {
			composer: self.composer(),
		}
	}

	#[must_use]
	pub fn composer(&self) -> Composer<'_, D> {
		Composer {
			content: &self.inner.content,
			handlers: &self.inner.handlers,
		}
	}

	/// Applies the `_ui` instructions of a message, in order, with its `payload` and `topic`.
	#[instrument(skip(self, dom, message))]
	pub fn ui(&self, dom: &mut D, message: &Value) -> BatchReport {
		match split_message(message) {
			Some((entries, context)) => self.apply_entries(dom, &entries, &context),
			None => {
				error!("Message has no `_ui` property.");
				BatchReport::default()
			}
		}
	}

	/// Applies one bare instruction or an array of them.
	#[instrument(skip(self, dom, instructions))]
	pub fn apply(&self, dom: &mut D, instructions: &Value) -> BatchReport {
		match instructions {
			Value::Array(entries) => self.apply_entries(dom, entries, &MessageContext::default()),
			single => self.apply_entries(dom, core::slice::from_ref(single), &MessageContext::default()),
		}
	}

	fn apply_entries(&self, dom: &mut D, entries: &[Value], context: &MessageContext) -> BatchReport {
		if cfg!(feature = "dangerous-logging") {
			trace!(payload = ?context.payload, topic = ?context.topic, "Applying batch.");
		}
		entries.iter().enumerate().fold(BatchReport::default(), |report, (index, entry)| {
			report.merge(match Instruction::from_value(entry, context) {
				Ok(instruction) => {
					self.dispatch(dom, instruction);
					BatchReport { applied: 1, skipped: 0 }
				}
				Err(error) => {
					error!(index, %error, "Skipping instruction.");
					BatchReport { applied: 0, skipped: 1 }
				}
			})
		})
	}

	/// Applies one instruction. Failures are logged and never interrupt the caller.
	pub fn dispatch(&self, dom: &mut D, instruction: Instruction<D::Node>) {
		let span = trace_span!("dispatch", method = instruction.method().as_str());
		let _enter = span.enter();

		match instruction {
			Instruction::Add(placement) => {
				let added = self.tree().add(dom, &placement);
				trace!(added, "Added.");
			}
			Instruction::Replace(placement) => {
				let replaced = self.tree().replace(dom, &placement);
				trace!(replaced, "Replaced.");
			}
			Instruction::Update(placement) => {
				let updated = self.tree().update(dom, &placement);
				trace!(updated, "Updated.");
			}
			Instruction::Remove(selectors) => {
				self.tree().remove(dom, &selectors, false);
			}
			Instruction::RemoveAll(selectors) => {
				self.tree().remove(dom, &selectors, true);
			}
			Instruction::Load(spec) => {
				resources::load(dom, &spec);
			}
			Instruction::Reload => dom.reload(),
			Instruction::Notify(spec, context) => {
				self.show_dialog(dom, DialogKind::Notify, &spec, &context);
			}
			Instruction::Alert(spec, context) => {
				self.show_dialog(dom, DialogKind::Alert, &spec, &context);
			}
		}
	}

	/// Replaces a node's content with sanitized `html`, running its scripts.
	///
	/// # Errors
	///
	/// Iff the content can't be inserted.
	pub fn replace_content(&self, dom: &mut D, node: &D::Node, html: &str) -> Result<()> {
		self.inner.content.replace_content(dom, node, html)
	}

	pub fn show_dialog(&self, dom: &mut D, kind: DialogKind, spec: &DialogSpec, context: &MessageContext) -> Option<D::Node> {
		dialog::show_dialog(dom, kind, spec, context, &self.inner.dialog, &self.inner.content)
	}

	/// # Errors
	///
	/// Iff the entry can't be built or inserted.
	pub fn show_overlay(&self, dom: &mut D, options: &OverlayOptions) -> Result<OverlayHandle<D::Node>> {
		dialog::show_overlay(dom, options, &self.inner.dialog, &self.inner.content)
	}

	/// # Errors
	///
	/// See [`table::build_html_table`].
	pub fn build_html_table(&self, dom: &mut D, data: &Value, options: &TableOptions) -> Result<D::Node> {
		table::build_html_table(dom, data, options, &self.inner.content)
	}

	/// # Errors
	///
	/// See [`table::create_table`].
	pub fn create_table(&self, dom: &mut D, data: &Value, options: &TableOptions) -> Result<D::Node> {
		table::create_table(dom, data, options, &self.inner.content)
	}

	/// # Errors
	///
	/// See [`table::tbl_add_row`].
	pub fn tbl_add_row(&self, dom: &mut D, table: &D::Node, row: &Value, options: &RowOptions) -> Result<D::Node> {
		table::tbl_add_row(dom, table, row, options, &self.inner.content)
	}

	/// # Errors
	///
	/// See [`table::tbl_remove_row`].
	pub fn tbl_remove_row(&self, dom: &mut D, table: &D::Node, index: usize, body: usize) -> Result<()> {
		table::tbl_remove_row(dom, table, index, body)
	}

	/// Like [`table::tbl_add_listener`], with this engine's padding unless `options` sets one.
	///
	/// # Errors
	///
	/// See [`table::tbl_add_listener`].
	pub fn tbl_add_listener(&self, dom: &mut D, selector: &str, options: &ListenerOptions, out: Rc<RefCell<TableEvent>>) -> Result<()> {
		let options = ListenerOptions {
			pad: Some(options.pad.unwrap_or(self.inner.table_pad)),
			..options.clone()
		};
		table::tbl_add_listener(dom, selector, &options, out)
	}

	#[must_use]
	pub fn tbl_get_cell_name(&self, dom: &D, cell: &D::Node) -> String {
		table::tbl_get_cell_name(dom, cell, self.inner.table_pad)
	}

	/// The column metadata a table was built or extended with, if cached.
	#[must_use]
	pub fn table_columns(&self, dom: &D, table: &D::Node) -> Option<Vec<ColumnMetadata>> {
		dom.property(table, "cols").and_then(|cols| serde_json::from_value(cols).ok())
	}
}
