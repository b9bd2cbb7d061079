use std::cell::RefCell;
use std::rc::Rc;

use enclose::enclose;
use smallvec::{smallvec, SmallVec};

use crate::compile::{PathSegment, SegmentKind};
use crate::{CollectionChange, Node, SubscriptionId, TrackError};

/// Invoked after a node rebuilt itself; recomputes against the tracked root.
pub(crate) type ChangeCallback = Rc<dyn Fn() -> Result<(), TrackError>>;

type Children<T> = SmallVec<[Option<SubscriptionNode<T>>; 1]>;

/// Live observer of one segment on one reached object.
///
/// Children are kept slot by slot: a member segment has at most one slot, a
/// fan-out segment one slot per collection element, empty where the element
/// (or the member value) is absent.
pub(crate) struct SubscriptionNode<T: 'static> {
	body: Rc<NodeBody<T>>,
}

struct NodeBody<T: 'static> {
	object: Node,
	segment: Rc<PathSegment<T>>,
	on_changed: ChangeCallback,
	inner: RefCell<NodeInner<T>>,
}

struct NodeInner<T: 'static> {
	state: NodeState,
	subscription: Option<Subscription>,
	children: Children<T>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeState {
	Unattached,
	Attached,
	Disposed,
}

#[derive(Clone, Copy, Debug)]
enum Subscription {
	Member(SubscriptionId),
	Collection(SubscriptionId),
}

impl<T: 'static> SubscriptionNode<T> {
	pub(crate) fn attach(object: Node, segment: Rc<PathSegment<T>>, on_changed: ChangeCallback) -> Self {
		let body = Rc::new(NodeBody {
			object,
			segment,
			on_changed,
			inner: RefCell::new(NodeInner {
				state: NodeState::Unattached,
				subscription: None,
				children: SmallVec::new(),
			}),
		});

		let subscription = body.subscribe();
		let children = body.resolve_children();

		{
			let mut inner = body.inner.borrow_mut();
			inner.subscription = subscription;
			inner.children = children;
			inner.state = NodeState::Attached;
		}

		tracing::trace!(
			segment = body.segment.label(),
			subscribed = subscription.is_some(),
			"attached subscription node"
		);

		SubscriptionNode { body }
	}

	pub(crate) fn dispose(&self) {
		self.body.dispose()
	}

	/// Attached nodes in this subtree, the root sentinel excluded.
	pub(crate) fn live_nodes(&self) -> usize {
		let inner = self.body.inner.borrow();
		if inner.state != NodeState::Attached {
			return 0;
		}

		let own = usize::from(!self.body.segment.is_root());
		own + inner
			.children
			.iter()
			.flatten()
			.map(SubscriptionNode::live_nodes)
			.sum::<usize>()
	}
}

impl<T: 'static> NodeBody<T> {
	fn subscribe(self: &Rc<Self>) -> Option<Subscription> {
		let this = Rc::downgrade(self);
		match self.segment.kind() {
			SegmentKind::Root => None,
			SegmentKind::Member(_) => {
				let source = self.object.member_changes()?;
				let id = source.subscribe_member(Rc::new(enclose!((this) move |name: &str| {
					match this.upgrade() {
						Some(body) => body.member_changed(name),
						None => Ok(()),
					}
				})));
				Some(Subscription::Member(id))
			}
			SegmentKind::FanOut => {
				let source = self.object.collection_changes()?;
				let id = source.subscribe_collection(Rc::new(enclose!((this) move |change: &CollectionChange| {
					match this.upgrade() {
						Some(body) => body.collection_changed(change),
						None => Ok(()),
					}
				})));
				Some(Subscription::Collection(id))
			}
		}
	}

	fn unsubscribe(&self, subscription: Subscription) {
		match subscription {
			Subscription::Member(id) => {
				if let Some(source) = self.object.member_changes() {
					source.unsubscribe_member(id);
				}
			}
			Subscription::Collection(id) => {
				if let Some(source) = self.object.collection_changes() {
					source.unsubscribe_collection(id);
				}
			}
		}
		tracing::trace!(segment = self.segment.label(), "unsubscribed");
	}

	fn is_attached(&self) -> bool {
		self.inner.borrow().state == NodeState::Attached
	}

	fn child(&self, object: Node) -> Option<SubscriptionNode<T>> {
		let next = self.segment.next()?;
		Some(SubscriptionNode::attach(object, next.clone(), self.on_changed.clone()))
	}

	fn resolve_children(&self) -> Children<T> {
		if self.segment.next().is_none() {
			return SmallVec::new();
		}

		match self.segment.kind() {
			SegmentKind::Root => smallvec![self.child(self.object.clone())],
			SegmentKind::Member(get) => smallvec![get(&*self.object).and_then(|value| self.child(value))],
			SegmentKind::FanOut => self
				.object
				.elements()
				.unwrap_or_default()
				.into_iter()
				.map(|item| item.and_then(|item| self.child(item)))
				.collect(),
		}
	}

	/// Throw away every child and build them again from the current state.
	fn rebuild(&self) {
		let stale = std::mem::take(&mut self.inner.borrow_mut().children);
		dispose_all(stale);

		let fresh = self.resolve_children();
		let mut inner = self.inner.borrow_mut();
		if inner.state == NodeState::Attached {
			inner.children = fresh;
		} else {
			drop(inner);
			dispose_all(fresh);
		}
	}

	fn member_changed(&self, name: &str) -> Result<(), TrackError> {
		if name != self.segment.name() || !self.is_attached() {
			return Ok(());
		}

		tracing::trace!(member = name, "observed member changed");
		self.rebuild();
		(self.on_changed)()
	}

	fn collection_changed(&self, change: &CollectionChange) -> Result<(), TrackError> {
		if !self.is_attached() {
			return Ok(());
		}

		tracing::trace!(?change, "observed collection changed");
		self.apply(change)?;
		(self.on_changed)()
	}

	fn apply(&self, change: &CollectionChange) -> Result<(), TrackError> {
		let kind = change.kind();
		let tracks_items = self.segment.next().is_some();
		let len = self.inner.borrow().children.len();

		// Without children there is nothing to keep in step, but the index
		// is still required.
		let bound = |index: Option<usize>, limit: usize| match index {
			Some(i) if !tracks_items || i < limit => Ok(i),
			_ => Err(TrackError::InvalidIndex { change: kind, index }),
		};

		match change {
			CollectionChange::Insert { index, item } => {
				let index = bound(*index, len + 1)?;
				if tracks_items {
					let child = item.clone().and_then(|item| self.child(item));
					self.inner.borrow_mut().children.insert(index, child);
				}
			}
			CollectionChange::Remove { index } => {
				let index = bound(*index, len)?;
				if tracks_items {
					let removed = self.inner.borrow_mut().children.remove(index);
					dispose_all([removed]);
				}
			}
			CollectionChange::Replace { index, item } => {
				let index = bound(*index, len)?;
				if tracks_items {
					let stale = self.inner.borrow_mut().children[index].take();
					dispose_all([stale]);
					let fresh = item.clone().and_then(|item| self.child(item));
					self.inner.borrow_mut().children[index] = fresh;
				}
			}
			CollectionChange::Move { from, to } => {
				let from = bound(*from, len)?;
				let to = bound(*to, len)?;
				if tracks_items {
					let mut inner = self.inner.borrow_mut();
					let child = inner.children.remove(from);
					inner.children.insert(to, child);
				}
			}
			CollectionChange::Reset => {
				if tracks_items {
					self.rebuild();
				}
			}
		}

		Ok(())
	}

	fn dispose(&self) {
		let (subscription, children) = {
			let mut inner = self.inner.borrow_mut();
			if inner.state == NodeState::Disposed {
				return;
			}
			inner.state = NodeState::Disposed;
			(inner.subscription.take(), std::mem::take(&mut inner.children))
		};

		if let Some(subscription) = subscription {
			self.unsubscribe(subscription);
		}

		dispose_all(children);
	}
}

impl<T: 'static> Drop for NodeBody<T> {
	fn drop(&mut self) {
		self.dispose();
	}
}

fn dispose_all<T: 'static>(children: impl IntoIterator<Item = Option<SubscriptionNode<T>>>) {
	for child in children.into_iter().flatten() {
		child.dispose();
	}
}
