//! Injected interfaces for the read path (spec.md §6): `ClassResolver` and
//! `MarshallerContext`, plus the `TypeRegistry` convenience implementation
//! of both that a caller can use instead of hand-rolling one.
//!
//! `cilium::structured::resolver` plays the analogous role for that crate
//! (resolving a metadata token back to a concrete CLR type); here the
//! lookup key is a wire type name instead of a token, and the result is a
//! type-erased factory rather than a `TypeRef`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::input::InputStream;
use crate::object::{Marshal, Reflected};

/// Object-safe factory for one concrete `Reflected` type, registered by
/// name so `Box<dyn Marshal>` fields and `write_replace` targets can be
/// reconstructed without the caller knowing the concrete type.
pub trait MarshalFactory: Send + Sync {
	fn type_name(&self) -> &'static str;

	/// `wire_checksum` is whatever `InputStream::read_dyn_object` already
	/// read off the wire for this object's type metadata. Unlike the static
	/// `read_object::<T>()` path, this one never validates it against `T`'s
	/// own descriptor: `OutputStream::write_dyn_object` always writes `0`
	/// here (spec.md's silence on cross-checking a `writeReplace` target's
	/// schema — it is re-resolved by name, not assumed wire-compatible with
	/// whatever the writer's `T` was), so comparing against a real nonzero
	/// descriptor checksum would reject every dynamic read.
	fn read_boxed(&self, input: &mut InputStream, wire_checksum: u16) -> Result<Box<dyn Marshal>>;
}

struct FactoryImpl<T>(std::marker::PhantomData<T>);

impl<T: Reflected> MarshalFactory for FactoryImpl<T> {
	fn type_name(&self) -> &'static str {
		T::type_name()
	}

	fn read_boxed(&self, input: &mut InputStream, _wire_checksum: u16) -> Result<Box<dyn Marshal>> {
		let descriptor = input.cache().get_or_build::<T>(input.loader(), input.id_mapper());
		let value = T::allocate_and_read(input, &descriptor)?;
		Ok(value.read_resolve())
	}
}

/// Per-unmarshal-call class resolver (spec.md §6 `ClassResolver`):
/// `resolve(name) -> class`, supplied fresh by the caller of `unmarshal`.
pub trait ClassResolver: Send + Sync {
	fn resolve(&self, name: &str) -> Option<Arc<dyn MarshalFactory>>;
}

/// Cluster-wide registry (spec.md §6 `MarshallerContext`): resolves an
/// unknown wire type id to a class name out-of-band, e.g. by asking a peer
/// that has the class loaded. Distinct from `ClassResolver`, which resolves
/// an already-known *name* to a constructible factory for one call.
pub trait MarshallerContext: Send + Sync {
	fn resolve_type_name(&self, type_id: u32) -> Option<String>;
}

/// A plain in-process name → factory map, usable as both a `ClassResolver`
/// and (with `type_id`s assigned via [`TypeRegistry::register_with_id`]) a
/// `MarshallerContext`. Most callers that are not bridging to an external
/// class-loading system can use this directly instead of implementing the
/// traits by hand.
#[derive(Default)]
pub struct TypeRegistry {
	by_name: HashMap<&'static str, Arc<dyn MarshalFactory>>,
	by_id: HashMap<u32, &'static str>,
}

impl TypeRegistry {
	pub fn new() -> Self {
		TypeRegistry::default()
	}

	pub fn register<T: Reflected>(&mut self) {
		let factory: Arc<dyn MarshalFactory> = Arc::new(FactoryImpl::<T>(std::marker::PhantomData));
		self.by_name.insert(T::type_name(), factory);
	}

	pub fn register_with_id<T: Reflected>(&mut self, type_id: u32) {
		self.register::<T>();
		self.by_id.insert(type_id, T::type_name());
	}

	pub fn len(&self) -> usize {
		self.by_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_name.is_empty()
	}
}

impl ClassResolver for TypeRegistry {
	fn resolve(&self, name: &str) -> Option<Arc<dyn MarshalFactory>> {
		self.by_name.get(name).cloned()
	}
}

impl MarshallerContext for TypeRegistry {
	fn resolve_type_name(&self, type_id: u32) -> Option<String> {
		self.by_id.get(&type_id).map(|s| s.to_string())
	}
}
