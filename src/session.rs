use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::cascade;
use crate::compile::PathChain;
use crate::config::TrackingConfig;
use crate::node::{ChangeCallback, SubscriptionNode};
use crate::{Node, TrackError, Trackable};

/// Keeps the dependent members of one root object up to date.
///
/// Tracking stops when the session is disposed or dropped. Disposing twice
/// is a no-op.
pub struct TrackingSession<T: Trackable> {
	root: Rc<T>,
	trees: RefCell<SmallVec<[SubscriptionNode<T>; 4]>>,
	disposed: Cell<bool>,
	start_error: Option<TrackError>,
}

impl<T: Trackable> TrackingSession<T> {
	pub(crate) fn start(chains: &[PathChain<T>], config: TrackingConfig, root: Rc<T>) -> Self {
		let object: Node = root.clone();

		let trees = chains
			.iter()
			.map(|chain| {
				let on_changed = recompute(chain.clone(), Rc::downgrade(&root), config.max_cascade_depth);
				SubscriptionNode::attach(object.clone(), chain.head().clone(), on_changed)
			})
			.collect::<SmallVec<[_; 4]>>();

		tracing::debug!(chains = trees.len(), "started tracking");

		let mut session = TrackingSession {
			root,
			trees: RefCell::new(trees),
			disposed: Cell::new(false),
			start_error: None,
		};

		if config.recompute_on_start {
			session.start_error = session.recompute_all(chains, config.max_cascade_depth);
		}

		session
	}

	/// Run each distinct action once; paths registered together share one.
	/// Every action runs even when an earlier one failed; the first failure
	/// is returned.
	fn recompute_all(&self, chains: &[PathChain<T>], limit: usize) -> Option<TrackError> {
		let mut seen: SmallVec<[*const (); 4]> = SmallVec::new();
		let mut failure = None;
		for chain in chains {
			let Some(action) = chain.leaf().action() else {
				continue;
			};
			let addr = Rc::as_ptr(action) as *const ();
			if seen.contains(&addr) {
				continue;
			}
			seen.push(addr);

			let result = cascade::nested(limit, || action(&*self.root));
			if failure.is_none() {
				failure = result.err();
			}
		}
		failure
	}

	pub fn root(&self) -> &Rc<T> {
		&self.root
	}

	/// Why the recomputation run at start could not complete, e.g. a cycle
	/// between dependents that went deeper than `max_cascade_depth`.
	/// Always `None` when `recompute_on_start` is off.
	pub fn start_error(&self) -> Option<&TrackError> {
		self.start_error.as_ref()
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.get()
	}

	/// Number of attached nodes over all chains.
	pub fn live_nodes(&self) -> usize {
		self.trees.borrow().iter().map(SubscriptionNode::live_nodes).sum()
	}

	pub fn dispose(&self) {
		if self.disposed.replace(true) {
			return;
		}

		let trees = std::mem::take(&mut *self.trees.borrow_mut());
		for tree in &trees {
			tree.dispose();
		}

		tracing::debug!(chains = trees.len(), "stopped tracking");
	}
}

impl<T: Trackable> Drop for TrackingSession<T> {
	fn drop(&mut self) {
		self.dispose();
	}
}

fn recompute<T: Trackable>(chain: PathChain<T>, root: Weak<T>, limit: usize) -> ChangeCallback {
	Rc::new(move || match root.upgrade() {
		Some(root) => cascade::nested(limit, || chain.recompute(&root)),
		None => Ok(()),
	})
}
