//! Keeps dependent members of an object graph up to date.
//!
//! A [`DependencyMap`] holds compiled access paths, each bound to a
//! recomputation of one dependent member. [`DependencyMap::start_tracking`]
//! walks those paths over a live object, subscribes to every change
//! capability it meets on the way and re-runs the recomputation whenever a
//! reached member or collection changes.

pub mod macros;

mod cascade;
mod compile;
mod config;
mod dependencies;
mod error;
mod node;
mod notify;
mod path;
mod session;
mod value;

use std::any::Any;
use std::fmt;

pub use cascade::depth as cascade_depth;
pub use compile::{compile, PathChain, PathSegment, RecomputeAction, Segments, COLLECTION_ITEM};
pub use config::{TrackingConfig, DEFAULT_MAX_CASCADE_DEPTH};
pub use dependencies::DependencyMap;
pub use error::{DependencyError, NotSupported, PathError, TrackError};
pub use notify::{MemberNotifier, ObservableVec};
pub use path::{Accessor, Getter, Method, Path, PathDescriptor, PathExpr, TypeInfo, Untyped};
pub use session::TrackingSession;
pub use value::{downcast, Node};

/// An object that can be reached by a dependency path.
///
/// Every capability is optional. An object without any of them is still
/// traversed, it just never reports changes.
pub trait Trackable: Any {
	/// Source of "member changed" notifications for this object.
	fn member_changes(&self) -> Option<&dyn ObservableMember> {
		None
	}

	/// Source of "contents changed" notifications for this collection.
	fn collection_changes(&self) -> Option<&dyn ObservableCollection> {
		None
	}

	/// Current elements, in order, when this object is a collection.
	/// Absent elements are reported as `None` and keep their position.
	fn elements(&self) -> Option<Vec<Option<Node>>> {
		None
	}
}

/// A collection whose elements can be fanned out over in a path.
pub trait Collection: Trackable {
	type Item: Trackable;
}

pub type MemberHandler = std::rc::Rc<dyn Fn(&str) -> Result<(), TrackError>>;
pub type CollectionHandler = std::rc::Rc<dyn Fn(&CollectionChange) -> Result<(), TrackError>>;

pub trait ObservableMember {
	/// Register `handler`; it receives the name of every member that changes.
	fn subscribe_member(&self, handler: MemberHandler) -> SubscriptionId;

	fn unsubscribe_member(&self, id: SubscriptionId);
}

pub trait ObservableCollection {
	/// Register `handler`; it receives every mutation after it happened.
	fn subscribe_collection(&self, handler: CollectionHandler) -> SubscriptionId;

	fn unsubscribe_collection(&self, id: SubscriptionId);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// A mutation of a collection's contents.
///
/// Indexes are optional because not every source can report them, but only
/// `Reset` may be processed without one.
#[derive(Clone)]
pub enum CollectionChange {
	Insert { index: Option<usize>, item: Option<Node> },
	Remove { index: Option<usize> },
	Replace { index: Option<usize>, item: Option<Node> },
	Move { from: Option<usize>, to: Option<usize> },
	Reset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
	Insert,
	Remove,
	Replace,
	Move,
	Reset,
}

impl CollectionChange {
	pub fn kind(&self) -> ChangeKind {
		match self {
			CollectionChange::Insert { .. } => ChangeKind::Insert,
			CollectionChange::Remove { .. } => ChangeKind::Remove,
			CollectionChange::Replace { .. } => ChangeKind::Replace,
			CollectionChange::Move { .. } => ChangeKind::Move,
			CollectionChange::Reset => ChangeKind::Reset,
		}
	}
}

impl fmt::Debug for CollectionChange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CollectionChange::Insert { index, item } => f
				.debug_struct("Insert")
				.field("index", index)
				.field("item", &item.is_some())
				.finish(),
			CollectionChange::Remove { index } => f.debug_struct("Remove").field("index", index).finish(),
			CollectionChange::Replace { index, item } => f
				.debug_struct("Replace")
				.field("index", index)
				.field("item", &item.is_some())
				.finish(),
			CollectionChange::Move { from, to } => {
				f.debug_struct("Move").field("from", from).field("to", to).finish()
			}
			CollectionChange::Reset => f.write_str("Reset"),
		}
	}
}

impl fmt::Display for ChangeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ChangeKind::Insert => "Insert",
			ChangeKind::Remove => "Remove",
			ChangeKind::Replace => "Replace",
			ChangeKind::Move => "Move",
			ChangeKind::Reset => "Reset",
		};
		f.write_str(name)
	}
}
