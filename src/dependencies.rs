use std::fmt;
use std::rc::Rc;

use crate::compile::{compile, PathChain, RecomputeAction};
use crate::config::TrackingConfig;
use crate::error::{DependencyError, NotSupported, PathError};
use crate::path::{Method, Path, PathDescriptor, PathExpr};
use crate::session::TrackingSession;
use crate::Trackable;

/// Registry of dependency paths for objects of type `T`.
///
/// Paths are compiled when they are added, so a registry that was built
/// without errors never fails later when tracking starts. One registry can
/// back any number of sessions at the same time.
pub struct DependencyMap<T> {
	chains: Vec<PathChain<T>>,
	config: TrackingConfig,
}

impl<T: Trackable> Default for DependencyMap<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Trackable> DependencyMap<T> {
	pub fn new() -> Self {
		Self::with_config(TrackingConfig::default())
	}

	pub fn with_config(config: TrackingConfig) -> Self {
		DependencyMap {
			chains: Vec::new(),
			config,
		}
	}

	pub fn config(&self) -> &TrackingConfig {
		&self.config
	}

	/// Recompute a dependent member with `setter(root, calculator(root))`
	/// whenever anything along one of `paths` changes.
	pub fn add_map<U, S, C, I>(&mut self, setter: S, calculator: C, paths: I) -> Result<&mut Self, DependencyError>
	where
		U: 'static,
		S: Fn(&T, U) + 'static,
		C: Fn(&T) -> U + 'static,
		I: IntoIterator<Item = PathDescriptor<T>>,
	{
		let action: RecomputeAction<T> = Rc::new(move |root: &T| setter(root, calculator(root)));
		self.add_action(action, paths)
	}

	/// Like [`DependencyMap::add_map`], with the setter taken from `dependent`,
	/// which must name one settable member of the root.
	pub fn add_map_to<U, C, I>(&mut self, dependent: Path<T, U>, calculator: C, paths: I) -> Result<&mut Self, DependencyError>
	where
		U: 'static,
		C: Fn(&T) -> U + 'static,
		I: IntoIterator<Item = PathDescriptor<T>>,
	{
		let setter = dependent_setter::<T, U>(dependent.expr())?;
		self.add_map(move |root: &T, value: U| setter(root, value), calculator, paths)
	}

	fn add_action<I>(&mut self, action: RecomputeAction<T>, paths: I) -> Result<&mut Self, DependencyError>
	where
		I: IntoIterator<Item = PathDescriptor<T>>,
	{
		let paths: Vec<PathDescriptor<T>> = paths.into_iter().collect();
		if paths.is_empty() {
			return Err(DependencyError::MissingArgument("paths"));
		}

		// Nothing is appended unless every path compiles.
		let compiled = paths
			.iter()
			.map(|path| compile(path.expr(), action.clone()))
			.collect::<Result<Vec<_>, PathError>>()?;

		tracing::debug!(paths = compiled.len(), total = self.chains.len() + compiled.len(), "registered dependency");
		self.chains.extend(compiled);
		Ok(self)
	}

	pub fn chains(&self) -> &[PathChain<T>] {
		&self.chains
	}

	pub fn len(&self) -> usize {
		self.chains.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chains.is_empty()
	}

	/// Attach to `root`. Failures of the initial recomputation do not stop
	/// tracking; they are kept in [`TrackingSession::start_error`].
	pub fn start_tracking(&self, root: Rc<T>) -> TrackingSession<T> {
		TrackingSession::start(&self.chains, self.config, root)
	}
}

impl<T> fmt::Debug for DependencyMap<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DependencyMap")
			.field("chains", &self.chains)
			.field("config", &self.config)
			.finish()
	}
}

fn dependent_setter<T: 'static, U: 'static>(expr: &PathExpr) -> Result<Rc<dyn Fn(&T, U)>, DependencyError> {
	let accessor = match expr {
		PathExpr::Member { target, accessor } if matches!(**target, PathExpr::Root(_)) => accessor,
		PathExpr::Root(_) => return Err(NotSupported::RootOnly.into()),
		PathExpr::Call {
			method: Method::Named { name, .. },
			..
		} => return Err(NotSupported::Call(name.to_string()).into()),
		other => {
			return Err(NotSupported::Unrecognized(format!("{other} is not a single member of the root")).into())
		}
	};

	if !accessor.has_setter() {
		return Err(DependencyError::MissingArgument("dependent setter"));
	}

	accessor.setter::<T, U>().ok_or_else(|| {
		PathError::Malformed(format!(
			"setter of `{}` does not write a `{}` into a `{}`",
			accessor.name(),
			std::any::type_name::<U>(),
			std::any::type_name::<T>()
		))
		.into()
	})
}
