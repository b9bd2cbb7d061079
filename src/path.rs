//! Abstract syntax of dependency paths and the typed builder producing it.
//!
//! A path reads like the expression it stands for: `root.order.lines.each().price`
//! is a `Member("price")` whose target is a `Call(each)` whose target is a
//! `Member("lines")`, and so on down to `Root`.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::{Collection, Node, Trackable};

#[derive(Clone, Copy)]
pub struct TypeInfo {
	id: TypeId,
	name: &'static str,
}

impl TypeInfo {
	pub fn of<T: ?Sized + 'static>() -> Self {
		TypeInfo {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}
}

impl PartialEq for TypeInfo {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

/// Reads one member from a parent of a known concrete type.
pub type Getter = Rc<dyn Fn(&dyn Trackable) -> Option<Node>>;

type Setter<P, V> = Rc<dyn Fn(&P, V)>;

/// Direct accessor for one member of one parent type.
///
/// Accessors are plain closures, so a module can expose private members to a
/// path simply by building the accessor next to the field.
#[derive(Clone)]
pub struct Accessor {
	name: Cow<'static, str>,
	parent: TypeInfo,
	value: TypeInfo,
	get: Getter,
	set: Option<Rc<dyn Any>>,
}

impl Accessor {
	pub fn new<P, V, F>(name: impl Into<Cow<'static, str>>, get: F) -> Self
	where
		P: 'static,
		V: Trackable,
		F: Fn(&P) -> Option<Rc<V>> + 'static,
	{
		let get: Getter = Rc::new(move |parent: &dyn Trackable| {
			let parent: &dyn Any = parent;
			get(parent.downcast_ref::<P>()?).map(|value| value as Node)
		});

		Accessor {
			name: name.into(),
			parent: TypeInfo::of::<P>(),
			value: TypeInfo::of::<V>(),
			get,
			set: None,
		}
	}

	pub fn with_setter<P, V>(mut self, set: impl Fn(&P, V) + 'static) -> Self
	where
		P: 'static,
		V: 'static,
	{
		let set: Setter<P, V> = Rc::new(set);
		self.set = Some(Rc::new(set));
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn parent(&self) -> TypeInfo {
		self.parent
	}

	pub fn value(&self) -> TypeInfo {
		self.value
	}

	pub fn getter(&self) -> &Getter {
		&self.get
	}

	pub fn has_setter(&self) -> bool {
		self.set.is_some()
	}

	/// The setter, if one was given and it writes a `V` into a `P`.
	pub(crate) fn setter<P: 'static, V: 'static>(&self) -> Option<Setter<P, V>> {
		self.set.as_ref()?.downcast_ref::<Setter<P, V>>().cloned()
	}
}

impl fmt::Debug for Accessor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Accessor")
			.field("name", &self.name)
			.field("parent", &self.parent)
			.field("value", &self.value)
			.field("settable", &self.set.is_some())
			.finish()
	}
}

#[derive(Clone, Debug)]
pub enum Method {
	/// "Each element of the collection": the only call a path may contain.
	EachElement { item: TypeInfo },
	Named {
		name: Cow<'static, str>,
		returns: TypeInfo,
	},
}

#[derive(Clone, Debug)]
pub enum PathExpr {
	Root(TypeInfo),
	Member {
		target: Box<PathExpr>,
		accessor: Accessor,
	},
	Call {
		target: Box<PathExpr>,
		method: Method,
	},
	Convert {
		operand: Box<PathExpr>,
		to: TypeInfo,
	},
	/// Anything else a caller managed to express, e.g. a literal or an operator.
	Opaque {
		description: Cow<'static, str>,
		ty: TypeInfo,
	},
}

impl PathExpr {
	/// Static type of the value this expression produces.
	pub fn ty(&self) -> TypeInfo {
		match self {
			PathExpr::Root(ty) => *ty,
			PathExpr::Member { accessor, .. } => accessor.value,
			PathExpr::Call {
				method: Method::EachElement { item },
				..
			} => *item,
			PathExpr::Call {
				method: Method::Named { returns, .. },
				..
			} => *returns,
			PathExpr::Convert { to, .. } => *to,
			PathExpr::Opaque { ty, .. } => *ty,
		}
	}
}

impl fmt::Display for PathExpr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PathExpr::Root(_) => f.write_str("root"),
			PathExpr::Member { target, accessor } => write!(f, "{target}.{}", accessor.name),
			PathExpr::Call {
				target,
				method: Method::EachElement { .. },
			} => write!(f, "{target}.each()"),
			PathExpr::Call {
				target,
				method: Method::Named { name, .. },
			} => write!(f, "{target}.{name}()"),
			PathExpr::Convert { operand, to } => write!(f, "({operand} as {})", to.name),
			PathExpr::Opaque { description, .. } => f.write_str(description),
		}
	}
}

/// Marker for the value type of a path that was widened to "any value".
pub enum Untyped {}

/// Typed builder for a path starting at a `T` and currently producing a `V`.
pub struct Path<T, V = Untyped> {
	expr: PathExpr,
	marker: PhantomData<fn(&T) -> Rc<V>>,
}

impl<T: Trackable> Path<T> {
	pub fn root() -> Path<T, T> {
		Path::wrap(PathExpr::Root(TypeInfo::of::<T>()))
	}
}

impl<T, V: 'static> Path<T, V> {
	fn wrap(expr: PathExpr) -> Self {
		Path {
			expr,
			marker: PhantomData,
		}
	}

	/// Step into the member `name` of the current value.
	pub fn member<W, F>(self, name: impl Into<Cow<'static, str>>, get: F) -> Path<T, W>
	where
		W: Trackable,
		F: Fn(&V) -> Option<Rc<W>> + 'static,
	{
		self.access(Accessor::new(name, get))
	}

	/// Like [`Path::member`], for a member that can also be written. Only a
	/// settable member can be the target of [`DependencyMap::add_map_to`].
	///
	/// [`DependencyMap::add_map_to`]: crate::DependencyMap::add_map_to
	pub fn settable<W, F, S>(self, name: impl Into<Cow<'static, str>>, get: F, set: S) -> Path<T, W>
	where
		W: Trackable,
		F: Fn(&V) -> Option<Rc<W>> + 'static,
		S: Fn(&V, W) + 'static,
	{
		self.access(Accessor::new(name, get).with_setter(set))
	}

	pub fn access<W: 'static>(self, accessor: Accessor) -> Path<T, W> {
		Path::wrap(PathExpr::Member {
			target: Box::new(self.expr),
			accessor,
		})
	}

	/// Fan out over every element of the current collection.
	pub fn each(self) -> Path<T, V::Item>
	where
		V: Collection,
	{
		Path::wrap(PathExpr::Call {
			target: Box::new(self.expr),
			method: Method::EachElement {
				item: TypeInfo::of::<V::Item>(),
			},
		})
	}

	/// A call of any other method. Expressible, but never compiled.
	pub fn call<W: 'static>(self, name: impl Into<Cow<'static, str>>) -> Path<T, W> {
		Path::wrap(PathExpr::Call {
			target: Box::new(self.expr),
			method: Method::Named {
				name: name.into(),
				returns: TypeInfo::of::<W>(),
			},
		})
	}

	/// View the current value as a `W`.
	pub fn cast<W: 'static>(self) -> Path<T, W> {
		Path::wrap(PathExpr::Convert {
			operand: Box::new(self.expr),
			to: TypeInfo::of::<W>(),
		})
	}

	/// Forget the value type, the way a path ending in "any value" does.
	pub fn widen(self) -> Path<T, Untyped> {
		self.cast()
	}

	pub fn expr(&self) -> &PathExpr {
		&self.expr
	}
}

impl<T, V> fmt::Debug for Path<T, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Path({})", self.expr)
	}
}

/// A path rooted at `T` whose value type no longer matters.
pub struct PathDescriptor<T> {
	expr: PathExpr,
	marker: PhantomData<fn(&T)>,
}

impl<T: 'static> PathDescriptor<T> {
	/// Wrap a hand-built expression.
	pub fn from_expr(expr: PathExpr) -> Self {
		PathDescriptor {
			expr,
			marker: PhantomData,
		}
	}
}

impl<T> PathDescriptor<T> {
	pub fn expr(&self) -> &PathExpr {
		&self.expr
	}
}

impl<T, V> From<Path<T, V>> for PathDescriptor<T> {
	fn from(path: Path<T, V>) -> Self {
		PathDescriptor {
			expr: path.expr,
			marker: PhantomData,
		}
	}
}

impl<T> fmt::Debug for PathDescriptor<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PathDescriptor({})", self.expr)
	}
}
