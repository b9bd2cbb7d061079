use std::cell::{Cell, RefCell};
use std::rc::Rc;

use deptrack::{
	paths, ChangeKind, CollectionChange, DependencyMap, ObservableCollection, TrackError, TrackingConfig,
};

use crate::fixtures::{Invoice, Line, Lines};

fn tracked(lines: &[(i32, i32)]) -> (Rc<Invoice>, deptrack::TrackingSession<Invoice>) {
	let invoice = Invoice::with_lines(lines);
	let session = Invoice::price_map().start_tracking(invoice.clone());
	(invoice, session)
}

fn subscribers(lines: &Lines) -> Vec<usize> {
	lines.items().iter().map(|line| line.notifier().subscriber_count()).collect()
}

#[test]
fn inserted_items_are_observed() {
	let (invoice, session) = tracked(&[(1, 1)]);
	let lines = invoice.lines().unwrap();
	assert_eq!(invoice.total(), 1);
	assert_eq!(session.live_nodes(), 3);

	lines.push(Line::new(2, 3)).unwrap();
	assert_eq!(invoice.total(), 7);
	assert_eq!(session.live_nodes(), 4);

	lines.insert(0, Line::new(5, 1)).unwrap();
	assert_eq!(invoice.total(), 12);
	assert_eq!(subscribers(&lines), [1, 1, 1]);

	lines.get(2).unwrap().set_price(4).unwrap();
	assert_eq!(invoice.total(), 18);
}

#[test]
fn removed_items_are_released() {
	let (invoice, session) = tracked(&[(1, 1), (2, 1), (3, 1)]);
	let lines = invoice.lines().unwrap();

	let removed = lines.remove(1).unwrap();
	assert_eq!(invoice.total(), 4);
	assert_eq!(removed.notifier().subscriber_count(), 0);
	assert_eq!(session.live_nodes(), 4);

	let writes = invoice.writes();
	removed.set_price(50).unwrap();
	assert_eq!(invoice.writes(), writes);

	lines.get(1).unwrap().set_price(10).unwrap();
	assert_eq!(invoice.total(), 11);
}

#[test]
fn replaced_items_swap_observers() {
	let (invoice, session) = tracked(&[(1, 1), (2, 1)]);
	let lines = invoice.lines().unwrap();

	let old = lines.replace(0, Line::new(7, 1)).unwrap();
	assert_eq!(invoice.total(), 9);
	assert_eq!(old.notifier().subscriber_count(), 0);
	assert_eq!(subscribers(&lines), [1, 1]);
	assert_eq!(session.live_nodes(), 4);
}

#[test]
fn moved_items_keep_their_observers() {
	let (invoice, session) = tracked(&[(1, 1), (2, 1), (3, 1)]);
	let lines = invoice.lines().unwrap();
	let first = lines.get(0).unwrap();

	let writes = invoice.writes();
	lines.move_item(0, 2).unwrap();
	assert_eq!(invoice.writes(), writes + 1);
	assert_eq!(subscribers(&lines), [1, 1, 1]);
	assert_eq!(session.live_nodes(), 5);

	// The moved observer now sits in the last slot.
	lines.replace(2, Line::new(4, 1)).unwrap();
	assert_eq!(first.notifier().subscriber_count(), 0);
	assert_eq!(subscribers(&lines), [1, 1, 1]);
	assert_eq!(invoice.total(), 9);
}

#[test]
fn reset_rebuilds_every_item() {
	let (invoice, session) = tracked(&[(1, 1), (2, 1)]);
	let lines = invoice.lines().unwrap();
	let old = lines.items();

	lines.reset([Line::new(3, 3)]).unwrap();
	assert_eq!(invoice.total(), 9);
	assert!(old.iter().all(|line| line.notifier().subscriber_count() == 0));
	assert_eq!(subscribers(&lines), [1]);
	assert_eq!(session.live_nodes(), 3);

	lines.clear().unwrap();
	assert_eq!(invoice.total(), 0);
	assert_eq!(session.live_nodes(), 2);

	lines.notify_raw(CollectionChange::Reset).unwrap();
	assert_eq!(session.live_nodes(), 2);
}

#[test]
fn changes_without_an_index_are_rejected() {
	let (invoice, session) = tracked(&[(1, 1), (2, 1)]);
	let lines = invoice.lines().unwrap();
	let writes = invoice.writes();

	let err = lines
		.notify_raw(CollectionChange::Insert {
			index: None,
			item: Some(Line::new(3, 1)),
		})
		.unwrap_err();
	assert_eq!(
		err,
		TrackError::InvalidIndex {
			change: ChangeKind::Insert,
			index: None
		}
	);

	let err = lines.notify_raw(CollectionChange::Remove { index: None }).unwrap_err();
	assert_eq!(
		err,
		TrackError::InvalidIndex {
			change: ChangeKind::Remove,
			index: None
		}
	);

	let err = lines
		.notify_raw(CollectionChange::Replace { index: None, item: None })
		.unwrap_err();
	assert!(matches!(
		err,
		TrackError::InvalidIndex {
			change: ChangeKind::Replace,
			..
		}
	));

	let err = lines
		.notify_raw(CollectionChange::Move {
			from: Some(0),
			to: None,
		})
		.unwrap_err();
	assert!(matches!(err, TrackError::InvalidIndex { change: ChangeKind::Move, .. }));

	assert_eq!(invoice.writes(), writes);
	assert_eq!(session.live_nodes(), 4);

	lines.notify_raw(CollectionChange::Reset).unwrap();
	assert_eq!(invoice.writes(), writes + 1);
	assert_eq!(subscribers(&lines), [1, 1]);
}

#[test]
fn indexes_past_the_end_are_rejected() {
	let (invoice, _session) = tracked(&[(1, 1), (2, 1)]);
	let lines = invoice.lines().unwrap();

	let err = lines.notify_raw(CollectionChange::Remove { index: Some(2) }).unwrap_err();
	assert_eq!(
		err,
		TrackError::InvalidIndex {
			change: ChangeKind::Remove,
			index: Some(2)
		}
	);

	let err = lines
		.notify_raw(CollectionChange::Insert {
			index: Some(3),
			item: None,
		})
		.unwrap_err();
	assert!(matches!(err, TrackError::InvalidIndex { index: Some(3), .. }));
}

#[test]
fn absent_items_keep_their_slot() {
	let (invoice, session) = tracked(&[(1, 1), (2, 1)]);
	let lines = invoice.lines().unwrap();

	lines
		.notify_raw(CollectionChange::Insert {
			index: Some(0),
			item: None,
		})
		.unwrap();
	assert_eq!(session.live_nodes(), 4);

	lines.notify_raw(CollectionChange::Remove { index: Some(0) }).unwrap();
	assert_eq!(session.live_nodes(), 4);
	assert_eq!(subscribers(&lines), [1, 1]);

	lines.get(0).unwrap().set_price(5).unwrap();
	assert_eq!(invoice.total(), 7);
}

#[test]
fn element_marker_as_leaf_only_needs_an_index() {
	let mut map = DependencyMap::<Invoice>::new();
	map.add_map(
		Invoice::write_total,
		Invoice::compute_total,
		paths![Invoice::lines_path().each()],
	)
	.unwrap();

	let invoice = Invoice::with_lines(&[(1, 1)]);
	let session = map.start_tracking(invoice.clone());
	let lines = invoice.lines().unwrap();
	assert_eq!(session.live_nodes(), 2);

	lines.push(Line::new(2, 2)).unwrap();
	assert_eq!(invoice.total(), 5);
	assert_eq!(session.live_nodes(), 2);
	assert_eq!(subscribers(&lines), [0, 0]);

	let writes = invoice.writes();
	lines.notify_raw(CollectionChange::Remove { index: Some(99) }).unwrap();
	assert_eq!(invoice.writes(), writes + 1);

	let err = lines.notify_raw(CollectionChange::Remove { index: None }).unwrap_err();
	assert!(matches!(err, TrackError::InvalidIndex { .. }));
}

#[test]
fn count_is_an_observable_member() {
	let mut map = DependencyMap::<Invoice>::new();
	map.add_map(
		Invoice::write_total,
		|invoice| invoice.lines().map_or(0, |lines| lines.len() as i32),
		paths![Invoice::lines_path().member(Lines::COUNT, |l: &Lines| Some(Rc::new(l.len())))],
	)
	.unwrap();

	let invoice = Invoice::with_lines(&[(1, 1)]);
	let _session = map.start_tracking(invoice.clone());
	let lines = invoice.lines().unwrap();
	assert_eq!(invoice.total(), 1);

	lines.push(Line::new(1, 1)).unwrap();
	assert_eq!(invoice.total(), 2);

	let writes = invoice.writes();
	lines.replace(0, Line::new(3, 3)).unwrap();
	lines.move_item(0, 1).unwrap();
	assert_eq!(invoice.writes(), writes);

	lines.remove(0).unwrap();
	assert_eq!(invoice.total(), 1);
	assert_eq!(lines.members().subscriber_count(), 1);
	assert_eq!(lines.subscriber_count(), 0);
}

#[test]
fn several_chains_observe_one_collection() {
	let invoice = Invoice::with_lines(&[(2, 3)]);
	let session = Invoice::full_map(TrackingConfig::default()).start_tracking(invoice.clone());
	let lines = invoice.lines().unwrap();

	assert_eq!(invoice.total(), 6);
	assert_eq!(lines.subscriber_count(), 2);
	assert_eq!(subscribers(&lines), [2]);
	assert_eq!(session.live_nodes(), 6);

	lines.push(Line::new(1, 1)).unwrap();
	assert_eq!(invoice.total(), 7);
	assert_eq!(subscribers(&lines), [2, 2]);

	lines.get(1).unwrap().set_quantity(4).unwrap();
	assert_eq!(invoice.total(), 10);
}

/// Prices and quantities tracked separately; the price recompute inserts a
/// line at the front once `armed` is set.
fn inserting_map(
	armed: Rc<Cell<bool>>,
	outcome: Rc<RefCell<Option<Result<(), TrackError>>>>,
) -> DependencyMap<Invoice> {
	let mut map = DependencyMap::<Invoice>::new();
	map.add_map(
		move |invoice: &Invoice, total: i32| {
			invoice.write_total(total);
			if armed.replace(false) {
				if let Some(lines) = invoice.lines() {
					*outcome.borrow_mut() = Some(lines.insert(0, Line::new(100, 1)));
				}
			}
		},
		Invoice::compute_total,
		paths![Invoice::price_path()],
	)
	.unwrap()
	.add_map(Invoice::write_total, Invoice::compute_total, paths![Invoice::quantity_path()])
	.unwrap();
	map
}

#[test]
fn nested_change_is_refused_while_several_chains_listen() {
	let armed = Rc::new(Cell::new(false));
	let outcome = Rc::new(RefCell::new(None));
	let map = inserting_map(armed.clone(), outcome.clone());

	let invoice = Invoice::with_lines(&[(2, 3)]);
	let session = map.start_tracking(invoice.clone());
	let lines = invoice.lines().unwrap();
	let first = lines.get(0).unwrap();
	assert_eq!(lines.subscriber_count(), 2);

	armed.set(true);
	lines.push(Line::new(1, 1)).unwrap();

	assert_eq!(
		outcome.borrow_mut().take(),
		Some(Err(TrackError::ReentrantChange { subscribers: 2 }))
	);
	assert_eq!(lines.len(), 2);
	assert_eq!(subscribers(&lines), [2, 2]);
	assert_eq!(invoice.total(), 7);

	// Both chains still agree on which observer belongs to which line.
	lines.remove(0).unwrap();
	assert_eq!(first.notifier().subscriber_count(), 0);
	assert_eq!(subscribers(&lines), [2]);
	assert_eq!(session.live_nodes(), 6);

	lines.get(0).unwrap().set_quantity(10).unwrap();
	assert_eq!(invoice.total(), 10);

	// Outside of a delivery the same change goes through.
	lines.insert(0, Line::new(3, 1)).unwrap();
	assert_eq!(invoice.total(), 13);
	assert_eq!(subscribers(&lines), [2, 2]);
}

#[test]
fn nested_change_is_delivered_to_a_single_listener() {
	let mut map = DependencyMap::<Invoice>::new();
	let armed = Rc::new(Cell::new(false));
	map.add_map(
		{
			let armed = armed.clone();
			move |invoice: &Invoice, total: i32| {
				invoice.write_total(total);
				if armed.replace(false) {
					if let Some(lines) = invoice.lines() {
						lines.insert(0, Line::new(100, 1)).unwrap();
					}
				}
			}
		},
		Invoice::compute_total,
		paths![Invoice::price_path()],
	)
	.unwrap();

	let invoice = Invoice::with_lines(&[(2, 3)]);
	let session = map.start_tracking(invoice.clone());
	let lines = invoice.lines().unwrap();

	armed.set(true);
	lines.push(Line::new(1, 1)).unwrap();

	assert_eq!(lines.len(), 3);
	assert_eq!(invoice.total(), 107);
	assert_eq!(subscribers(&lines), [1, 1, 1]);
	assert_eq!(session.live_nodes(), 5);

	let last = lines.remove(2).unwrap();
	assert_eq!(last.notifier().subscriber_count(), 0);
	lines.get(1).unwrap().set_price(4).unwrap();
	assert_eq!(invoice.total(), 112);
}

#[test]
fn raw_changes_are_refused_during_delivery_too() {
	let invoice = Invoice::with_lines(&[(1, 1)]);
	let _session = Invoice::full_map(TrackingConfig::default()).start_tracking(invoice.clone());
	let lines = invoice.lines().unwrap();
	let seen = Rc::new(RefCell::new(None));

	// A third listener that answers every change with one of its own.
	lines.subscribe_collection(Rc::new({
		let lines = Rc::downgrade(&lines);
		let seen = seen.clone();
		move |_: &CollectionChange| -> Result<(), TrackError> {
			if let Some(lines) = lines.upgrade() {
				if seen.borrow().is_none() {
					*seen.borrow_mut() = Some(lines.notify_raw(CollectionChange::Reset));
				}
			}
			Ok(())
		}
	}));

	lines.notify_raw(CollectionChange::Reset).unwrap();
	assert_eq!(
		seen.borrow_mut().take(),
		Some(Err(TrackError::ReentrantChange { subscribers: 3 }))
	);
	assert_eq!(subscribers(&lines), [2]);
}
