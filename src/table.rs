//! HTML tables from row data, and decoding of clicks inside them.
//!
//! Column metadata is derived once per table and cached on it (as the `cols` property),
//! with `data-col-*` attributes on the header cells as a fallback.

use crate::{
	compose::{value_text, Content},
	dom::{Dom, DomEvent},
	error::{Error, Result},
	instruction::json_kind,
};
use core::cell::RefCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::{error, instrument, trace, warn};

const COLUMNS_PROPERTY: &str = "cols";
const LARGE_TABLE: usize = 1000;
pub const DEFAULT_PAD: usize = 3;

/// Describes one column. Fields left out when supplied by callers are filled in from the others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnMetadata {
	/// 1-based.
	pub index: usize,
	pub has_name: bool,
	pub name: Option<String>,
	pub key: String,
	pub title: String,
}

impl ColumnMetadata {
	#[must_use]
	pub fn named(index: usize, name: &str) -> Self {
		Self {
			index,
			has_name: true,
			name: Some(name.to_owned()),
			key: name.to_owned(),
			title: name.to_owned(),
		}
	}

	#[must_use]
	pub fn positional(index: usize) -> Self {
		Self {
			index,
			has_name: false,
			name: None,
			key: index.to_string(),
			title: index.to_string(),
		}
	}

	fn normalized(mut self, position: usize) -> Self {
		if self.index == 0 {
			self.index = position + 1;
		}
		if self.name.as_deref().map_or(false, str::is_empty) {
			self.name = None;
		}
		self.has_name = self.name.is_some();
		if self.key.is_empty() {
			self.key = self.name.clone().unwrap_or_else(|| self.index.to_string());
		}
		if self.title.is_empty() {
			self.title = self.key.clone();
		}
		self
	}
}

/// Columns from the shape of a row: named for objects, positional otherwise.
#[must_use]
pub fn infer_columns(row: &Value) -> Vec<ColumnMetadata> {
	match row {
		Value::Object(row) => row.keys().enumerate().map(|(i, key)| ColumnMetadata::named(i + 1, key)).collect(),
		Value::Array(row) => (1..=row.len()).map(ColumnMetadata::positional).collect(),
		_ => vec![ColumnMetadata::positional(1)],
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableOptions {
	pub cols: Option<Vec<ColumnMetadata>>,
	/// Parent selector for [`create_table`]. Defaults to `<body>`.
	pub parent: Option<String>,
	pub id: Option<String>,
	#[serde(rename = "allowHTML", alias = "allowHtml")]
	pub allow_html: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowPlacement {
	After,
	Before,
	Replace,
}

impl Default for RowPlacement {
	fn default() -> Self {
		Self::After
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowOptions {
	/// Which `<tbody>`, 0-based.
	pub body: usize,
	#[serde(rename = "allowHTML", alias = "allowHtml")]
	pub allow_html: bool,
	/// The 0-based row index [`RowOptions::placement`] refers to. Appends if [`None`].
	pub pos: Option<usize>,
	pub placement: RowPlacement,
	/// Set as `data-row-name`.
	pub row_name: Option<String>,
}

/// Builds a detached table from an array of rows or an object of named rows.
///
/// Input that is neither becomes an explanatory `<p>` instead.
///
/// # Errors
///
/// Iff elements can't be created.
#[instrument(skip(dom, data, options, content))]
pub fn build_html_table<D: Dom>(dom: &mut D, data: &Value, options: &TableOptions, content: &Content) -> Result<D::Node> {
	let rows: Vec<(Option<&String>, &Value)> = match data {
		Value::Array(rows) => rows.iter().map(|row| (None, row)).collect(),
		Value::Object(rows) => rows.iter().map(|(name, row)| (Some(name), row)).collect(),
		other => {
			error!(found = json_kind(other), "Table data must be an array or an object.");
			let p = dom.create_element("p")?;
			dom.set_text_content(&p, "Input data is not an array or an object, cannot create a table.")?;
			return Ok(p);
		}
	};
	if rows.len() > LARGE_TABLE {
		warn!(rows = rows.len(), "Building a very large table. This may be slow.");
	}

	let columns: Vec<ColumnMetadata> = match &options.cols {
		Some(cols) => cols.iter().cloned().enumerate().map(|(i, col)| col.normalized(i)).collect(),
		None => rows.first().map(|(_, row)| infer_columns(row)).unwrap_or_default(),
	};

	let table = dom.create_element("table")?;
	let thead = dom.create_element("thead")?;
	let header = dom.create_element("tr")?;
	for column in &columns {
		let th = dom.create_element("th")?;
		dom.set_attribute(&th, "data-col-index", &column.index.to_string())?;
		dom.set_attribute(&th, "data-col-key", &column.key)?;
		if let Some(name) = &column.name {
			dom.set_attribute(&th, "data-col-name", name)?;
		}
		dom.set_text_content(&th, &column.title)?;
		dom.append_child(&header, &th)?;
	}
	dom.append_child(&thead, &header)?;
	dom.append_child(&table, &thead)?;
	let tbody = dom.create_element("tbody")?;
	dom.append_child(&table, &tbody)?;
	cache_columns(dom, &table, &columns)?;

	for (row_name, row) in rows {
		let row_options = RowOptions {
			allow_html: options.allow_html,
			row_name: row_name.cloned(),
			..RowOptions::default()
		};
		if let Err(error) = tbl_add_row(dom, &table, row, &row_options, content) {
			error!(%error, "Skipping row.");
		}
	}
	Ok(table)
}

/// [`build_html_table`], then attached to [`TableOptions::parent`].
///
/// # Errors
///
/// Iff the parent can't be found or the table can't be built or attached.
pub fn create_table<D: Dom>(dom: &mut D, data: &Value, options: &TableOptions, content: &Content) -> Result<D::Node> {
	let parent = match &options.parent {
		Some(selector) => dom.query_selector(None, selector)?.ok_or_else(|| Error::NotFound(format!("table parent {:?}", selector)))?,
		None => dom.body(),
	};
	let table = build_html_table(dom, data, options, content)?;
	if let Some(id) = &options.id {
		dom.set_attribute(&table, "id", id)?;
	}
	dom.append_child(&parent, &table)?;
	Ok(table)
}

fn cache_columns<D: Dom>(dom: &mut D, table: &D::Node, columns: &[ColumnMetadata]) -> Result<()> {
	dom.set_property(table, COLUMNS_PROPERTY, &serde_json::to_value(columns)?)
}

/// The cached columns, else those declared by header cells, else inferred from `row` (and then cached).
fn table_columns<D: Dom>(dom: &mut D, table: &D::Node, row: &Value) -> Result<Vec<ColumnMetadata>> {
	if let Some(cached) = dom.property(table, COLUMNS_PROPERTY) {
		match serde_json::from_value::<Vec<ColumnMetadata>>(cached) {
			Ok(columns) => return Ok(columns),
			Err(error) => warn!(%error, "Ignoring invalid cached column metadata."),
		}
	}

	let headers = dom.query_selector_all(Some(table), "thead th")?;
	let columns = if headers.is_empty() {
		infer_columns(row)
	} else {
		headers
			.iter()
			.enumerate()
			.map(|(i, th)| {
				ColumnMetadata {
					index: dom.attribute(th, "data-col-index").and_then(|index| index.parse().ok()).unwrap_or(i + 1),
					has_name: false,
					name: dom.attribute(th, "data-col-name"),
					key: dom.attribute(th, "data-col-key").unwrap_or_default(),
					title: dom.text_content(th),
				}
				.normalized(i)
			})
			.collect()
	};
	trace!(columns = columns.len(), "Derived column metadata.");
	cache_columns(dom, table, &columns)?;
	Ok(columns)
}

/// Adds a row to a table's `<tbody>`. Entries are matched to columns by name first, then by position.
///
/// # Errors
///
/// Iff `row` is neither an array nor an object, or the `<tbody>` doesn't exist.
#[instrument(skip(dom, row, options, content))]
pub fn tbl_add_row<D: Dom>(dom: &mut D, table: &D::Node, row: &Value, options: &RowOptions, content: &Content) -> Result<D::Node> {
	let entries: Vec<(Option<&String>, &Value)> = match row {
		Value::Object(row) => row.iter().map(|(key, value)| (Some(key), value)).collect(),
		Value::Array(row) => row.iter().map(|value| (None, value)).collect(),
		other => return Err(Error::InvalidTableData(format!("A row must be an array or an object, found {}", json_kind(other)))),
	};
	let tbody = dom
		.query_selector_all(Some(table), "tbody")?
		.into_iter()
		.nth(options.body)
		.ok_or_else(|| Error::InvalidTableData(format!("No tbody #{}", options.body)))?;
	let columns = table_columns(dom, table, row)?;

	let tr = dom.create_element("tr")?;
	if let Some(name) = &options.row_name {
		dom.set_attribute(&tr, "data-row-name", name)?;
	}
	let mut cells = Vec::with_capacity(columns.len());
	for column in &columns {
		let td = dom.create_element("td")?;
		dom.set_attribute(&td, "data-col-index", &column.index.to_string())?;
		if let Some(name) = &column.name {
			dom.set_attribute(&td, "data-col-name", name)?;
		}
		dom.append_child(&tr, &td)?;
		cells.push(td);
	}

	for (position, (key, value)) in entries.into_iter().enumerate() {
		let by_name = key.and_then(|key| columns.iter().position(|column| column.name.as_ref() == Some(key) || column.key == *key));
		let by_position = || columns.iter().position(|column| column.index == position + 1);
		let Some(column) = by_name.or_else(by_position) else {
			trace!(position, "No column for entry.");
			continue;
		};
		let text = value_text(value);
		if options.allow_html {
			content.replace_content(dom, &cells[column], &text)?;
		} else {
			dom.set_text_content(&cells[column], &text)?;
		}
	}

	let rows = dom.children(&tbody);
	match options.pos {
		None => dom.append_child(&tbody, &tr)?,
		Some(pos) if pos < rows.len() => match options.placement {
			RowPlacement::After => dom.insert_before(&tbody, &tr, rows.get(pos + 1))?,
			RowPlacement::Before => dom.insert_before(&tbody, &tr, Some(&rows[pos]))?,
			RowPlacement::Replace => dom.replace_with(&rows[pos], &tr)?,
		},
		Some(pos) => {
			warn!(pos, rows = rows.len(), "Row position out of range. Appending.");
			dom.append_child(&tbody, &tr)?;
		}
	}
	Ok(tr)
}

/// Removes the row at the 0-based `index` of the `body`th `<tbody>`.
///
/// # Errors
///
/// Iff there is no such row.
pub fn tbl_remove_row<D: Dom>(dom: &mut D, table: &D::Node, index: usize, body: usize) -> Result<()> {
	let tbody = dom
		.query_selector_all(Some(table), "tbody")?
		.into_iter()
		.nth(body)
		.ok_or_else(|| Error::InvalidTableData(format!("No tbody #{}", body)))?;
	let row = dom.children(&tbody).into_iter().nth(index).ok_or_else(|| Error::NotFound(format!("row {} of tbody #{}", index, body)))?;
	dom.remove(&row);
	Ok(())
}

/// The key a cell's value is reported under: its column name, else `C` and its 1-based column number, zero-padded to `pad` digits.
#[must_use]
pub fn tbl_get_cell_name<D: Dom>(dom: &D, cell: &D::Node, pad: usize) -> String {
	if let Some(name) = dom.attribute(cell, "data-col-name").filter(|name| !name.is_empty()) {
		return name;
	}
	let number = dom.attribute(cell, "data-col-index").and_then(|index| index.parse::<usize>().ok()).unwrap_or_else(|| element_index(dom, cell) + 1);
	format!("C{:0width$}", number, width = pad)
}

fn element_index<D: Dom>(dom: &D, node: &D::Node) -> usize {
	dom.parent(node).and_then(|parent| dom.children(&parent).iter().position(|child| child == node)).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventScope {
	Row,
	Cell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
	Text,
	Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListenerOptions {
	pub event_scope: EventScope,
	pub return_type: ReturnType,
	/// Digits of positional cell names. Defaults to the engine's setting.
	pub pad: Option<usize>,
	pub event_type: String,
}

impl Default for ListenerOptions {
	fn default() -> Self {
		Self {
			event_scope: EventScope::Row,
			return_type: ReturnType::Text,
			pad: None,
			event_type: "click".to_owned(),
		}
	}
}

/// A decoded table interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEvent {
	pub click_type: String,
	/// 0-based within its `<tbody>`.
	pub row_index: Option<usize>,
	/// 0-based within its row.
	pub cell_index: Option<usize>,
	pub row_name: Option<String>,
	pub data: Map<String, Value>,
}

/// Listens on the table's first `<tbody>` and writes each decoded interaction into `out`.
///
/// # Errors
///
/// Iff the table can't be found or the listener can't be added.
#[instrument(skip(dom, options, out))]
pub fn tbl_add_listener<D: Dom>(dom: &mut D, selector: &str, options: &ListenerOptions, out: Rc<RefCell<TableEvent>>) -> Result<()> {
	let table = dom.query_selector(None, selector)?.ok_or_else(|| Error::NotFound(format!("table {:?}", selector)))?;
	let target = dom.query_selector(Some(&table), "tbody")?.unwrap_or(table);
	let event_type = options.event_type.clone();
	let options = options.clone();
	dom.add_event_listener(
		&target,
		&event_type,
		Rc::new(move |dom: &mut D, event: &DomEvent<D::Node>| {
			if let Some(decoded) = decode_event(dom, event, &options) {
				trace!(row_index = ?decoded.row_index, cell_index = ?decoded.cell_index, "Decoded table event.");
				*out.borrow_mut() = decoded;
			}
		}),
	)
}

fn decode_event<D: Dom>(dom: &D, event: &DomEvent<D::Node>, options: &ListenerOptions) -> Option<TableEvent> {
	let row = dom.closest(&event.target, "tr").ok().flatten()?;
	let cell = dom.closest(&event.target, "td, th").ok().flatten();
	let pad = options.pad.unwrap_or(DEFAULT_PAD);

	let cells = match (options.event_scope, &cell) {
		(EventScope::Cell, Some(cell)) => vec![cell.clone()],
		(EventScope::Cell, None) => Vec::new(),
		(EventScope::Row, _) => dom.children(&row),
	};
	let data = cells
		.iter()
		.map(|cell| {
			let value = match options.return_type {
				ReturnType::Text => dom.text_content(cell),
				ReturnType::Html => dom.inner_html(cell).unwrap_or_default(),
			};
			(tbl_get_cell_name(dom, cell, pad), Value::String(value))
		})
		.collect();

	Some(TableEvent {
		click_type: event.kind.clone(),
		row_index: Some(element_index(dom, &row)),
		cell_index: cell.as_ref().map(|cell| element_index(dom, cell)),
		row_name: dom.attribute(&row, "data-row-name"),
		data,
	})
}
