pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 64;

/// Tuning for the sessions started from a [`DependencyMap`].
///
/// [`DependencyMap`]: crate::DependencyMap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
	/// How many recomputations may be nested inside each other before the
	/// triggering notification is aborted.
	pub max_cascade_depth: usize,
	/// Run every registered recomputation once when a session starts. A
	/// failure of that run is reported by `TrackingSession::start_error`.
	pub recompute_on_start: bool,
}

impl Default for TrackingConfig {
	fn default() -> Self {
		TrackingConfig {
			max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
			recompute_on_start: true,
		}
	}
}

impl TrackingConfig {
	pub fn max_cascade_depth(mut self, depth: usize) -> Self {
		self.max_cascade_depth = depth;
		self
	}

	pub fn recompute_on_start(mut self, enabled: bool) -> Self {
		self.recompute_on_start = enabled;
		self
	}
}
