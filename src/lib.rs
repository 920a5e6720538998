#![doc(html_root_url = "https://docs.rs/instruction-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Applies declarative UI instructions to a document tree.
//!
//! The engine is written against the [`Dom`](`dom::Dom`) capability rather than a global document:
//! [`MemoryDom`](`memory::MemoryDom`) runs it headlessly, `web::WebDom` (on `wasm32` only) in a browser.
//!
//! [`Engine::ui`] takes whole messages (`{"_ui": […], "payload": …, "topic": "…"}`),
//! [`Engine::apply`] bare instructions, and [`Engine::dispatch`] already parsed [`Instruction`]s.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod compose;
pub mod dialog;
pub mod dom;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod html;
pub mod include;
pub mod instruction;
pub mod load;
pub mod markdown;
pub mod memory;
pub mod resources;
pub mod sanitize;
mod selector;
pub mod table;
pub mod tree;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use engine::{BatchReport, Engine, EngineBuilder};
pub use error::{Error, Result};
pub use instruction::{ComponentSpec, Instruction, NodeKind, Position};
