mod common;

use common::init_logging;
use instruction_dom::{
	dom::Dom,
	memory::{MemoryDom, NodeId},
	table::{ColumnMetadata, EventScope, ListenerOptions, ReturnType, RowOptions, RowPlacement, TableEvent, TableOptions},
	Engine, Error,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::{cell::RefCell, rc::Rc};

fn setup() -> (MemoryDom, Engine<MemoryDom>) {
	init_logging();
	(MemoryDom::new(), Engine::new())
}

fn with_id(id: &str) -> TableOptions {
	TableOptions {
		id: Some(id.to_owned()),
		..TableOptions::default()
	}
}

fn row_texts(dom: &MemoryDom, table: NodeId) -> Vec<String> {
	let tbody = dom.query_selector(Some(&table), "tbody").unwrap().unwrap();
	dom.children(&tbody).iter().map(|row| dom.text_content(row)).collect()
}

#[test]
fn columns_are_inferred_from_the_first_row() {
	let (mut dom, engine) = setup();
	let table = engine.create_table(&mut dom, &json!([{ "a": 1, "b": 2 }, { "a": 3, "b": 4 }]), &with_id("t")).unwrap();

	assert_eq!(
		dom.outer_html(table).unwrap(),
		concat!(
			r#"<table id="t"><thead><tr>"#,
			r#"<th data-col-index="1" data-col-key="a" data-col-name="a">a</th><th data-col-index="2" data-col-key="b" data-col-name="b">b</th>"#,
			r#"</tr></thead><tbody>"#,
			r#"<tr><td data-col-index="1" data-col-name="a">1</td><td data-col-index="2" data-col-name="b">2</td></tr>"#,
			r#"<tr><td data-col-index="1" data-col-name="a">3</td><td data-col-index="2" data-col-name="b">4</td></tr>"#,
			r#"</tbody></table>"#,
		)
	);
	assert_eq!(engine.table_columns(&dom, &table), Some(vec![ColumnMetadata::named(1, "a"), ColumnMetadata::named(2, "b")]));
	assert_eq!(dom.parent(&table), Some(dom.body()));
}

#[test]
fn array_rows_get_positional_columns() {
	let (mut dom, engine) = setup();
	let table = engine.build_html_table(&mut dom, &json!([[1, 2], [3]]), &TableOptions::default()).unwrap();
	assert_eq!(dom.parent(&table), None);
	assert_eq!(engine.table_columns(&dom, &table), Some(vec![ColumnMetadata::positional(1), ColumnMetadata::positional(2)]));
	assert_eq!(row_texts(&dom, table), vec!["12", "3"]);
	let th = dom.query_selector(Some(&table), "th").unwrap().unwrap();
	assert_eq!(dom.attributes(&th), vec![("data-col-index".to_owned(), "1".to_owned()), ("data-col-key".to_owned(), "1".to_owned())]);
}

#[test]
fn object_rows_are_named() {
	let (mut dom, engine) = setup();
	let table = engine.build_html_table(&mut dom, &json!({ "r1": { "a": 1 }, "r2": { "a": 2 } }), &TableOptions::default()).unwrap();
	let names: Vec<Option<String>> = dom.query_selector_all(Some(&table), "tbody tr").unwrap().iter().map(|row| dom.attribute(row, "data-row-name")).collect();
	assert_eq!(names, vec![Some("r1".to_owned()), Some("r2".to_owned())]);
}

#[test]
fn other_data_is_explained_instead() {
	let (mut dom, engine) = setup();
	let p = engine.build_html_table(&mut dom, &json!("rows"), &TableOptions::default()).unwrap();
	assert_eq!(dom.outer_html(p).unwrap(), "<p>Input data is not an array or an object, cannot create a table.</p>");
}

#[test]
fn declared_columns_match_by_name_then_position() {
	let (mut dom, engine) = setup();
	let options = TableOptions {
		cols: Some(vec![
			ColumnMetadata {
				name: Some("a".to_owned()),
				..ColumnMetadata::default()
			},
			ColumnMetadata {
				title: "Second".to_owned(),
				..ColumnMetadata::default()
			},
		]),
		..TableOptions::default()
	};
	let table = engine.build_html_table(&mut dom, &json!([]), &options).unwrap();
	assert_eq!(
		engine.table_columns(&dom, &table),
		Some(vec![
			ColumnMetadata::named(1, "a"),
			ColumnMetadata {
				title: "Second".to_owned(),
				..ColumnMetadata::positional(2)
			},
		])
	);

	let row = engine.tbl_add_row(&mut dom, &table, &json!(["one", "two"]), &RowOptions::default()).unwrap();
	assert_eq!(dom.outer_html(row).unwrap(), r#"<tr><td data-col-index="1" data-col-name="a">one</td><td data-col-index="2">two</td></tr>"#);
	let row = engine.tbl_add_row(&mut dom, &table, &json!({ "2": "B", "a": "A" }), &RowOptions::default()).unwrap();
	assert_eq!(dom.text_content(&row), "AB");
}

#[test]
fn array_rows_fill_named_columns_by_position() {
	let (mut dom, engine) = setup();
	let table = engine.build_html_table(&mut dom, &json!([{ "a": 1, "b": 2 }, [3, 4]]), &TableOptions::default()).unwrap();
	assert_eq!(row_texts(&dom, table), vec!["12", "34"]);
}

#[test]
fn header_cells_describe_columns_of_foreign_tables() {
	let (mut dom, engine) = setup();
	let body = dom.body();
	dom.set_inner_html(&body, r#"<table id="f"><thead><tr><th data-col-name="n">Name</th></tr></thead><tbody></tbody></table>"#).unwrap();
	let table = dom.element_by_id("f").unwrap();

	let row = engine.tbl_add_row(&mut dom, &table, &json!({ "n": "v" }), &RowOptions::default()).unwrap();
	assert_eq!(dom.outer_html(row).unwrap(), r#"<tr><td data-col-index="1" data-col-name="n">v</td></tr>"#);
	assert_eq!(
		engine.table_columns(&dom, &table),
		Some(vec![ColumnMetadata {
			title: "Name".to_owned(),
			..ColumnMetadata::named(1, "n")
		}])
	);
}

#[test]
fn row_placement() {
	let (mut dom, engine) = setup();
	let table = engine.create_table(&mut dom, &json!([["r0"], ["r1"]]), &TableOptions::default()).unwrap();
	let at = |pos: usize, placement: RowPlacement| RowOptions {
		pos: Some(pos),
		placement,
		..RowOptions::default()
	};

	engine.tbl_add_row(&mut dom, &table, &json!(["before"]), &at(0, RowPlacement::Before)).unwrap();
	engine.tbl_add_row(&mut dom, &table, &json!(["after"]), &at(0, RowPlacement::After)).unwrap();
	assert_eq!(row_texts(&dom, table), vec!["before", "after", "r0", "r1"]);

	engine.tbl_add_row(&mut dom, &table, &json!(["replaced"]), &at(3, RowPlacement::Replace)).unwrap();
	engine.tbl_add_row(&mut dom, &table, &json!(["end"]), &at(10, RowPlacement::Before)).unwrap();
	assert_eq!(row_texts(&dom, table), vec!["before", "after", "r0", "replaced", "end"]);

	engine.tbl_remove_row(&mut dom, &table, 0, 0).unwrap();
	assert_eq!(row_texts(&dom, table), vec!["after", "r0", "replaced", "end"]);
	assert!(matches!(engine.tbl_remove_row(&mut dom, &table, 4, 0), Err(Error::NotFound(_))));
	assert!(matches!(engine.tbl_remove_row(&mut dom, &table, 0, 1), Err(Error::InvalidTableData(_))));
	assert!(matches!(engine.tbl_add_row(&mut dom, &table, &json!(5), &RowOptions::default()), Err(Error::InvalidTableData(_))));
}

#[test]
fn cell_markup_only_when_allowed() {
	let (mut dom, engine) = setup();
	let table = engine.create_table(&mut dom, &json!([["seed"]]), &TableOptions::default()).unwrap();
	let escaped = engine.tbl_add_row(&mut dom, &table, &json!(["<b>x</b>"]), &RowOptions::default()).unwrap();
	let markup = engine
		.tbl_add_row(
			&mut dom,
			&table,
			&json!(["<b>x</b>"]),
			&RowOptions {
				allow_html: true,
				..RowOptions::default()
			},
		)
		.unwrap();
	assert_eq!(dom.inner_html(&dom.children(&escaped)[0]).unwrap(), "&lt;b&gt;x&lt;/b&gt;");
	assert_eq!(dom.inner_html(&dom.children(&markup)[0]).unwrap(), "<b>x</b>");
}

#[test]
fn row_clicks_are_decoded() {
	let (mut dom, engine) = setup();
	let table = engine.create_table(&mut dom, &json!([{ "name": "ann", "age": 3 }, { "name": "bob", "age": 4 }]), &with_id("t")).unwrap();
	let out = Rc::new(RefCell::new(TableEvent::default()));
	engine.tbl_add_listener(&mut dom, "#t", &ListenerOptions::default(), out.clone()).unwrap();

	let cell = dom.query_selector_all(Some(&table), "tbody td").unwrap()[3];
	dom.click(cell).unwrap();

	let mut data = Map::new();
	data.insert("name".to_owned(), Value::from("bob"));
	data.insert("age".to_owned(), Value::from("4"));
	assert_eq!(
		*out.borrow(),
		TableEvent {
			click_type: "click".to_owned(),
			row_index: Some(1),
			cell_index: Some(1),
			row_name: None,
			data,
		}
	);
}

#[test]
fn cell_clicks_use_padded_positional_names() {
	init_logging();
	let mut dom = MemoryDom::new();
	let engine = Engine::<MemoryDom>::builder().table_pad(2).build();
	let table = engine.create_table(&mut dom, &json!({ "first": ["x", "<i>y</i>"] }), &with_id("t")).unwrap();
	let out = Rc::new(RefCell::new(TableEvent::default()));
	let options = ListenerOptions {
		event_scope: EventScope::Cell,
		return_type: ReturnType::Html,
		..ListenerOptions::default()
	};
	engine.tbl_add_listener(&mut dom, "#t", &options, out.clone()).unwrap();

	let cell = dom.query_selector_all(Some(&table), "tbody td").unwrap()[1];
	assert_eq!(engine.tbl_get_cell_name(&dom, &cell), "C02");
	dom.click(cell).unwrap();

	let event = out.borrow();
	assert_eq!(event.row_index, Some(0));
	assert_eq!(event.cell_index, Some(1));
	assert_eq!(event.row_name.as_deref(), Some("first"));
	assert_eq!(event.data.get("C02"), Some(&Value::from("&lt;i&gt;y&lt;/i&gt;")));
	assert_eq!(event.data.len(), 1);
}

#[test]
fn missing_tables_cannot_be_listened_to() {
	let (mut dom, engine) = setup();
	let out = Rc::new(RefCell::new(TableEvent::default()));
	assert!(matches!(engine.tbl_add_listener(&mut dom, "#nope", &ListenerOptions::default(), out), Err(Error::NotFound(_))));
}
