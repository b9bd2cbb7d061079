use thiserror::Error;

use crate::ChangeKind;

/// A path construct the compiler refuses to turn into a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotSupported {
	#[error("path resolves to the root object itself")]
	RootOnly,
	#[error("call of method `{0}` is not supported")]
	Call(String),
	#[error("conversion to `{to}` is only allowed once, as the outermost step of the path")]
	Conversion { to: &'static str },
	#[error("`{0}` is not a member access, element marker or conversion")]
	Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
	#[error("path is not supported: {0}")]
	NotSupported(#[from] NotSupported),
	/// The expression was not produced by the path builder.
	#[error("malformed path expression: {0}")]
	Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
	#[error("required argument `{0}` is missing")]
	MissingArgument(&'static str),
	#[error(transparent)]
	Path(#[from] PathError),
}

impl From<NotSupported> for DependencyError {
	fn from(err: NotSupported) -> Self {
		DependencyError::Path(PathError::NotSupported(err))
	}
}

impl DependencyError {
	pub fn not_supported(&self) -> Option<&NotSupported> {
		match self {
			DependencyError::Path(PathError::NotSupported(err)) => Some(err),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
	#[error("processing {change} with unset or out of range index {index:?} is not supported")]
	InvalidIndex {
		change: ChangeKind,
		index: Option<usize>,
	},
	#[error("recomputation cascade went deeper than {limit} levels")]
	CascadeDepthExceeded { limit: usize },
	#[error("collection changed while notifying {subscribers} subscribers of an earlier change")]
	ReentrantChange { subscribers: usize },
}
