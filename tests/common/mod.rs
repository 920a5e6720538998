#![allow(dead_code)]

use instruction_dom::{dom::Dom, memory::MemoryDom};
use tracing::Level;

pub fn init_logging() {
	//TODO: Fail on Warning or Error where a test expects none.
	let _ = tracing_subscriber::fmt().with_max_level(Level::TRACE).with_test_writer().try_init();
}

pub fn body_html(dom: &MemoryDom) -> String {
	dom.inner_html(&dom.body()).unwrap()
}

pub fn head_html(dom: &MemoryDom) -> String {
	dom.inner_html(&dom.head()).unwrap()
}
