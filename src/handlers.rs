//! Named event handlers that `events` entries of component specs refer to.

use crate::dom::{Dom, Listener};
use core::{cell::RefCell, fmt};
use hashbrown::HashMap;
use std::rc::Rc;

pub struct HandlerRegistry<D: Dom> {
	handlers: RefCell<HashMap<String, Listener<D>>>,
}

impl<D: Dom> Default for HandlerRegistry<D> {
	fn default() -> Self {
		Self {
			handlers: RefCell::new(HashMap::new()),
		}
	}
}

impl<D: Dom> fmt::Debug for HandlerRegistry<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let handlers = self.handlers.borrow();
		let mut names: Vec<&String> = handlers.keys().collect();
		names.sort();
		f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
	}
}

impl<D: Dom> HandlerRegistry<D> {
	/// Registers (or replaces) the handler called `name`.
	pub fn register(&self, name: &str, handler: impl Fn(&mut D, &crate::dom::DomEvent<D::Node>) + 'static) {
		self.handlers.borrow_mut().insert(name.to_owned(), Rc::new(handler));
	}

	pub fn unregister(&self, name: &str) -> bool {
		self.handlers.borrow_mut().remove(name).is_some()
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<Listener<D>> {
		self.handlers.borrow().get(name).cloned()
	}

	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.handlers.borrow().contains_key(name)
	}
}
