use std::cell::Cell;

use crate::TrackError;

thread_local! {
	static DEPTH: Cell<usize> = const { Cell::new(0) };
	static TRIPPED: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Number of recomputations currently running on this thread.
pub fn depth() -> usize {
	DEPTH.with(Cell::get)
}

struct Level;

impl Level {
	fn enter() -> Self {
		DEPTH.with(|depth| depth.set(depth.get() + 1));
		Level
	}
}

impl Drop for Level {
	fn drop(&mut self) {
		DEPTH.with(|depth| depth.set(depth.get() - 1));
	}
}

/// Run one recomputation, nested in whatever recomputation is running.
///
/// Setters usually swallow the result of the notification they raise, so a
/// cascade that hits `limit` is also remembered and reported again by the
/// outermost level.
pub(crate) fn nested(limit: usize, func: impl FnOnce()) -> Result<(), TrackError> {
	let current = depth();
	if current >= limit {
		tracing::warn!(limit, "recomputation cascade is too deep, aborting notification");
		if current > 0 {
			TRIPPED.with(|tripped| tripped.set(Some(limit)));
		}
		return Err(TrackError::CascadeDepthExceeded { limit });
	}

	{
		let _level = Level::enter();
		func();
	}

	if depth() == 0 {
		if let Some(limit) = TRIPPED.with(Cell::take) {
			return Err(TrackError::CascadeDepthExceeded { limit });
		}
	}

	Ok(())
}
