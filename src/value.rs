use std::any::Any;
use std::rc::Rc;

use crate::{Collection, Trackable};

/// Shared handle to any object reached while walking a path.
pub type Node = Rc<dyn Trackable>;

/// Recover the concrete type behind a [`Node`].
pub fn downcast<V: Trackable>(node: &Node) -> Option<Rc<V>> {
	let any: Rc<dyn Any> = node.clone();
	any.downcast::<V>().ok()
}

macro_rules! scalar {
	($($ty:ty),* $(,)?) => {
		$(impl Trackable for $ty {})*
	};
}

// Leaf values carry no capabilities of their own.
scalar!(
	(),
	bool,
	char,
	i8,
	i16,
	i32,
	i64,
	i128,
	isize,
	u8,
	u16,
	u32,
	u64,
	u128,
	usize,
	f32,
	f64,
	String,
	&'static str,
);

impl<E: Trackable> Trackable for Vec<Rc<E>> {
	fn elements(&self) -> Option<Vec<Option<Node>>> {
		Some(self.iter().map(|item| Some(item.clone() as Node)).collect())
	}
}

impl<E: Trackable> Collection for Vec<Rc<E>> {
	type Item = E;
}
