//! Ready-made change capabilities for objects that want to be tracked.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
	Collection, CollectionChange, CollectionHandler, MemberHandler, Node, ObservableCollection, ObservableMember,
	SubscriptionId, Trackable, TrackError,
};

struct Handlers<H> {
	last: u64,
	entries: SmallVec<[(SubscriptionId, H); 2]>,
}

impl<H> Default for Handlers<H> {
	fn default() -> Self {
		Handlers {
			last: 0,
			entries: SmallVec::new(),
		}
	}
}

impl<H: Clone> Handlers<H> {
	fn add(&mut self, handler: H) -> SubscriptionId {
		self.last += 1;
		let id = SubscriptionId(self.last);
		self.entries.push((id, handler));
		id
	}

	fn remove(&mut self, id: SubscriptionId) {
		self.entries.retain(|(entry, _)| *entry != id);
	}

	// Dispatch works on a copy so handlers may subscribe and unsubscribe.
	fn snapshot(&self) -> SmallVec<[H; 2]> {
		self.entries.iter().map(|(_, handler)| handler.clone()).collect()
	}
}

/// Announces member changes of the object that owns it.
#[derive(Default)]
pub struct MemberNotifier {
	handlers: RefCell<Handlers<MemberHandler>>,
}

impl MemberNotifier {
	pub fn new() -> Self {
		Self::default()
	}

	/// Tell every subscriber that `member` changed. Stops at the first
	/// subscriber that fails to process the change.
	pub fn notify(&self, member: &str) -> Result<(), TrackError> {
		let handlers = self.handlers.borrow().snapshot();
		for handler in handlers {
			handler(member)?;
		}
		Ok(())
	}

	pub fn subscriber_count(&self) -> usize {
		self.handlers.borrow().entries.len()
	}
}

impl ObservableMember for MemberNotifier {
	fn subscribe_member(&self, handler: MemberHandler) -> SubscriptionId {
		self.handlers.borrow_mut().add(handler)
	}

	fn unsubscribe_member(&self, id: SubscriptionId) {
		self.handlers.borrow_mut().remove(id)
	}
}

impl fmt::Debug for MemberNotifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemberNotifier")
			.field("subscribers", &self.subscriber_count())
			.finish()
	}
}

/// A vector that reports every mutation, and its `Count` member.
///
/// While a change is being delivered, the vector may only be changed again
/// if it has a single collection subscriber. With more than one, the later
/// subscribers would see the two changes in the wrong order, so the nested
/// change is refused with [`TrackError::ReentrantChange`] and the contents
/// are left as they were.
pub struct ObservableVec<E> {
	items: RefCell<Vec<Rc<E>>>,
	members: MemberNotifier,
	changes: RefCell<Handlers<CollectionHandler>>,
	dispatching: Cell<usize>,
}

struct Dispatch<'a>(&'a Cell<usize>);

impl<'a> Dispatch<'a> {
	fn enter(depth: &'a Cell<usize>) -> Self {
		depth.set(depth.get() + 1);
		Dispatch(depth)
	}
}

impl Drop for Dispatch<'_> {
	fn drop(&mut self) {
		self.0.set(self.0.get() - 1);
	}
}

impl<E: Trackable> Default for ObservableVec<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: Trackable> ObservableVec<E> {
	pub const COUNT: &'static str = "Count";

	pub fn new() -> Self {
		Self::from_items(Vec::new())
	}

	pub fn from_items(items: impl IntoIterator<Item = Rc<E>>) -> Self {
		ObservableVec {
			items: RefCell::new(items.into_iter().collect()),
			members: MemberNotifier::new(),
			changes: RefCell::default(),
			dispatching: Cell::new(0),
		}
	}

	pub fn len(&self) -> usize {
		self.items.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.borrow().is_empty()
	}

	pub fn get(&self, index: usize) -> Option<Rc<E>> {
		self.items.borrow().get(index).cloned()
	}

	pub fn items(&self) -> Vec<Rc<E>> {
		self.items.borrow().clone()
	}

	pub fn members(&self) -> &MemberNotifier {
		&self.members
	}

	pub fn push(&self, item: Rc<E>) -> Result<(), TrackError> {
		let index = self.len();
		self.insert(index, item)
	}

	/// # Panics
	///
	/// Panics if `index > len`.
	pub fn insert(&self, index: usize, item: Rc<E>) -> Result<(), TrackError> {
		self.check_reentrancy()?;
		self.items.borrow_mut().insert(index, item.clone());
		self.members.notify(Self::COUNT)?;
		self.dispatch(CollectionChange::Insert {
			index: Some(index),
			item: Some(item as Node),
		})
	}

	/// # Panics
	///
	/// Panics if `index` is out of bounds.
	pub fn remove(&self, index: usize) -> Result<Rc<E>, TrackError> {
		self.check_reentrancy()?;
		let removed = self.items.borrow_mut().remove(index);
		self.members.notify(Self::COUNT)?;
		self.dispatch(CollectionChange::Remove { index: Some(index) })?;
		Ok(removed)
	}

	/// # Panics
	///
	/// Panics if `index` is out of bounds.
	pub fn replace(&self, index: usize, item: Rc<E>) -> Result<Rc<E>, TrackError> {
		self.check_reentrancy()?;
		let old = std::mem::replace(&mut self.items.borrow_mut()[index], item.clone());
		self.dispatch(CollectionChange::Replace {
			index: Some(index),
			item: Some(item as Node),
		})?;
		Ok(old)
	}

	/// # Panics
	///
	/// Panics if either index is out of bounds.
	pub fn move_item(&self, from: usize, to: usize) -> Result<(), TrackError> {
		self.check_reentrancy()?;
		{
			let mut items = self.items.borrow_mut();
			let item = items.remove(from);
			items.insert(to, item);
		}
		self.dispatch(CollectionChange::Move {
			from: Some(from),
			to: Some(to),
		})
	}

	/// Replace the whole contents.
	pub fn reset(&self, items: impl IntoIterator<Item = Rc<E>>) -> Result<(), TrackError> {
		self.check_reentrancy()?;
		let items: Vec<Rc<E>> = items.into_iter().collect();
		*self.items.borrow_mut() = items;
		self.members.notify(Self::COUNT)?;
		self.dispatch(CollectionChange::Reset)
	}

	pub fn clear(&self) -> Result<(), TrackError> {
		self.reset(Vec::new())
	}

	/// Deliver `change` to subscribers without touching the contents.
	pub fn notify_raw(&self, change: CollectionChange) -> Result<(), TrackError> {
		self.check_reentrancy()?;
		self.dispatch(change)
	}

	fn dispatch(&self, change: CollectionChange) -> Result<(), TrackError> {
		let _dispatch = Dispatch::enter(&self.dispatching);
		let handlers = self.changes.borrow().snapshot();
		for handler in handlers {
			handler(&change)?;
		}
		Ok(())
	}

	fn check_reentrancy(&self) -> Result<(), TrackError> {
		let subscribers = self.subscriber_count();
		if self.dispatching.get() > 0 && subscribers > 1 {
			tracing::warn!(subscribers, "refused to change a collection while it is notifying");
			return Err(TrackError::ReentrantChange { subscribers });
		}
		Ok(())
	}

	pub fn subscriber_count(&self) -> usize {
		self.changes.borrow().entries.len()
	}
}

impl<E: Trackable> Trackable for ObservableVec<E> {
	fn member_changes(&self) -> Option<&dyn ObservableMember> {
		Some(&self.members)
	}

	fn collection_changes(&self) -> Option<&dyn ObservableCollection> {
		Some(self)
	}

	fn elements(&self) -> Option<Vec<Option<Node>>> {
		Some(self.items.borrow().iter().map(|item| Some(item.clone() as Node)).collect())
	}
}

impl<E: Trackable> Collection for ObservableVec<E> {
	type Item = E;
}

impl<E> ObservableCollection for ObservableVec<E> {
	fn subscribe_collection(&self, handler: CollectionHandler) -> SubscriptionId {
		self.changes.borrow_mut().add(handler)
	}

	fn unsubscribe_collection(&self, id: SubscriptionId) {
		self.changes.borrow_mut().remove(id)
	}
}

impl<E> fmt::Debug for ObservableVec<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ObservableVec")
			.field("len", &self.items.borrow().len())
			.field("subscribers", &self.changes.borrow().entries.len())
			.finish()
	}
}
