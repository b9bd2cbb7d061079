use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use crate::error::{NotSupported, PathError};
use crate::path::{Getter, Method, PathExpr, TypeInfo};
use crate::{Node, Trackable};

/// Label used for fan-out segments in [`PathChain::labels`].
pub const COLLECTION_ITEM: &str = "CollectionItem";

/// Writes the dependent member of a root object.
pub type RecomputeAction<T> = Rc<dyn Fn(&T)>;

pub(crate) enum SegmentKind {
	/// Anchors a chain to the tracked object. Never subscribes to anything.
	Root,
	Member(Getter),
	FanOut,
}

/// One step of a compiled path.
///
/// `next` points away from the root, towards the member whose change the
/// chain ultimately reports. The segment without `next` is the leaf and is
/// the only one carrying the recompute action.
pub struct PathSegment<T> {
	name: Cow<'static, str>,
	kind: SegmentKind,
	next: Option<Rc<PathSegment<T>>>,
	action: Option<RecomputeAction<T>>,
}

impl<T> PathSegment<T> {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn label(&self) -> &str {
		match self.kind {
			SegmentKind::Root => "root",
			SegmentKind::FanOut => COLLECTION_ITEM,
			SegmentKind::Member(_) => &self.name,
		}
	}

	pub fn is_root(&self) -> bool {
		matches!(self.kind, SegmentKind::Root)
	}

	pub fn is_fan_out(&self) -> bool {
		matches!(self.kind, SegmentKind::FanOut)
	}

	pub fn next(&self) -> Option<&Rc<PathSegment<T>>> {
		self.next.as_ref()
	}

	pub fn action(&self) -> Option<&RecomputeAction<T>> {
		self.action.as_ref()
	}

	/// Read this segment's member from `parent`. Only member segments have a
	/// getter; the others always yield `None`.
	pub fn get(&self, parent: &dyn Trackable) -> Option<Node> {
		match &self.kind {
			SegmentKind::Member(get) => get(parent),
			SegmentKind::Root | SegmentKind::FanOut => None,
		}
	}

	pub(crate) fn kind(&self) -> &SegmentKind {
		&self.kind
	}
}

impl<T> fmt::Debug for PathSegment<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PathSegment")
			.field("label", &self.label())
			.field("leaf", &self.next.is_none())
			.finish()
	}
}

/// An immutable, compiled dependency path, headed by the root sentinel.
pub struct PathChain<T> {
	head: Rc<PathSegment<T>>,
}

impl<T> Clone for PathChain<T> {
	fn clone(&self) -> Self {
		PathChain {
			head: self.head.clone(),
		}
	}
}

impl<T> PathChain<T> {
	pub fn head(&self) -> &Rc<PathSegment<T>> {
		&self.head
	}

	pub fn segments(&self) -> Segments<'_, T> {
		Segments {
			current: Some(&self.head),
		}
	}

	pub fn leaf(&self) -> &PathSegment<T> {
		let mut segment = &self.head;
		while let Some(next) = &segment.next {
			segment = next;
		}
		segment
	}

	/// `["root", ...]`, one label per step, fan-outs as `"CollectionItem"`.
	pub fn labels(&self) -> Vec<String> {
		self.segments().map(|s| s.label().to_owned()).collect()
	}

	/// Run the chain's action against the tracked root.
	pub fn recompute(&self, root: &T) {
		if let Some(action) = self.leaf().action() {
			action(root)
		}
	}
}

impl<T> fmt::Debug for PathChain<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.segments().map(|s| s.label())).finish()
	}
}

pub struct Segments<'a, T> {
	current: Option<&'a Rc<PathSegment<T>>>,
}

impl<'a, T> Iterator for Segments<'a, T> {
	type Item = &'a PathSegment<T>;

	fn next(&mut self) -> Option<Self::Item> {
		let segment = self.current?;
		self.current = segment.next.as_ref();
		Some(segment)
	}
}

/// Turn a path expression into a chain ending in `action`.
///
/// The walk starts at the outermost step, so the first segment produced is
/// the leaf, and every later one becomes the predecessor of the previous.
pub fn compile<T: 'static>(expr: &PathExpr, action: RecomputeAction<T>) -> Result<PathChain<T>, PathError> {
	let root = TypeInfo::of::<T>();

	let mut current = match expr {
		PathExpr::Convert { operand, .. } => &**operand,
		other => other,
	};

	let mut chain: Option<Rc<PathSegment<T>>> = None;

	loop {
		let (name, kind, target) = match current {
			PathExpr::Root(ty) => {
				if *ty != root {
					return Err(PathError::Malformed(format!(
						"path is rooted at `{}` but registered for `{}`",
						ty.name(),
						root.name()
					)));
				}
				break;
			}
			PathExpr::Member { target, accessor } => {
				if accessor.parent() != target.ty() {
					return Err(PathError::Malformed(format!(
						"member `{}` belongs to `{}` but is read from `{}`",
						accessor.name(),
						accessor.parent().name(),
						target.ty().name()
					)));
				}
				let name = Cow::Owned(accessor.name().to_owned());
				(name, SegmentKind::Member(accessor.getter().clone()), &**target)
			}
			PathExpr::Call {
				target,
				method: Method::EachElement { .. },
			} => (Cow::Borrowed(COLLECTION_ITEM), SegmentKind::FanOut, &**target),
			PathExpr::Call {
				method: Method::Named { name, .. },
				..
			} => return Err(NotSupported::Call(name.to_string()).into()),
			PathExpr::Convert { to, .. } => return Err(NotSupported::Conversion { to: to.name() }.into()),
			PathExpr::Opaque { description, .. } => {
				return Err(NotSupported::Unrecognized(description.to_string()).into())
			}
		};

		let action = chain.is_none().then(|| action.clone());

		chain = Some(Rc::new(PathSegment {
			name,
			kind,
			next: chain.take(),
			action,
		}));

		current = target;
	}

	let Some(first) = chain else {
		return Err(NotSupported::RootOnly.into());
	};

	let head = Rc::new(PathSegment {
		name: Cow::Borrowed(""),
		kind: SegmentKind::Root,
		next: Some(first),
		action: None,
	});

	let chain = PathChain { head };
	tracing::debug!(path = %expr, labels = ?chain, "compiled dependency path");
	Ok(chain)
}
