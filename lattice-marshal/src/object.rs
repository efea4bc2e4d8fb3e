//! The `Marshal`/`Reflected` traits user types implement (by hand or via
//! `#[derive(Marshal)]`) to take part in the write/read path (component
//! C/E/F).
//!
//! This is the crate's answer to spec.md's premise that arbitrary
//! reflectively-inspected classes exist at runtime: Rust has no such
//! reflection, so a type opts in at compile time instead. The derive
//! macro in `lattice-marshal-derive` generates the field table, the
//! checksum inputs and `write_fields`/`allocate_and_read` in exactly the
//! base-first, lexicographic-per-level order spec.md §3/§4.C requires; a
//! hand-written `impl Marshal` is the Rust analogue of a class declaring a
//! custom `writeObject`/`readObject` pair (and is therefore never
//! indexable, per spec.md §3 "Field-indexing eligibility").

use std::any::Any;

use crate::error::Result;
use crate::input::InputStream;
use crate::output::OutputStream;
use crate::reflect::Descriptor;

/// Object-safe half of the write path: anything that can serialize its own
/// body once its tag and type metadata have already been written by the
/// caller. Implemented by every `#[derive(Marshal)]` type and usable
/// through `Box<dyn Marshal>`/`Arc<dyn Marshal>` for genuinely
/// heterogeneous graphs.
pub trait Marshal: Any {
	fn type_name(&self) -> &'static str;

	/// Writes this object's field body (spec.md §4.E "SERIALIZABLE"
	/// payload). `descriptor` is this object's own descriptor, passed in so
	/// the generated body can open/close the field-indexing footer without
	/// re-resolving it.
	fn write_fields(&self, out: &mut OutputStream, descriptor: &Descriptor) -> Result<()>;

	/// spec.md §4.C step 6 / §4.E step 4: if present, called before the
	/// descriptor is (re)resolved and before the object is registered in
	/// the handle table. Returning `Some` substitutes the wire
	/// representation entirely.
	fn write_replace(&self) -> Option<Box<dyn Marshal>> {
		None
	}

	/// Object-safe mirror of [`Reflected::build_descriptor`]: every
	/// implementer delegates straight to it. Needed only by
	/// `OutputStream::write_dyn_object`, which writes a `Box<dyn Marshal>`
	/// whose concrete type is no longer statically known — it has no generic
	/// `T: Reflected` to call `T::build_descriptor` through, so it asks the
	/// trait object for one instead.
	fn dyn_descriptor(&self, id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor;

	fn as_any(&self) -> &dyn Any;
}

/// The `Sized`, statically-known half: a concrete type that can be looked
/// up in the [`crate::descriptor_cache::DescriptorCache`] and reconstructed
/// on the read side without running its constructor (spec.md §4.F step 5).
pub trait Reflected: Marshal + Sized + 'static {
	fn type_name() -> &'static str;

	/// Produces this type's descriptor. Called at most once per
	/// `(DescriptorCache, LoaderId)` pair; the cache does the memoizing.
	fn build_descriptor(id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor;

	/// Allocates an instance without invoking a constructor and populates
	/// its fields from `input`, symmetric to `write_fields` (spec.md §4.F
	/// steps 5–8). Implemented via `MaybeUninit` plus per-field unsafe
	/// pointer writes by the derive macro (spec.md §9 constructor-bypass
	/// design note, approach (a)).
	fn allocate_and_read(input: &mut InputStream, descriptor: &Descriptor) -> Result<Self>;

	/// spec.md §4.F step 9: if present, invoked after the object is fully
	/// populated; its result (possibly a different value) is what the
	/// caller and the handle table both see from then on.
	fn read_resolve(self) -> Box<dyn Marshal>
	where
		Self: Sized,
	{
		Box::new(self)
	}

	/// Only meaningful for `Capability::Enum` descriptors: this value's
	/// ordinal in the enum's constant table. The derive macro overrides
	/// this for `enum` inputs; struct types never call it.
	fn enum_ordinal(&self) -> i32 {
		0
	}
}

/// The "externalizable" capability (spec.md §3, §4.C step 3): the type
/// supplies its own wire body and is reconstructed via its captured no-arg
/// constructor rather than field-by-field allocation.
pub trait Externalizable: Default + 'static {
	fn type_name() -> &'static str;
	fn write_external(&self, out: &mut OutputStream) -> Result<()>;
	fn read_external(&mut self, input: &mut InputStream) -> Result<()>;

	/// This type's own declared fields, in the order `write_external` writes
	/// them. An externalizable class's wire body is opaque to the
	/// marshaller, but it still carries a schema checksum like every other
	/// capability (spec.md §4.E "EXTERNALIZABLE: emit type-id metadata, then
	/// the checksum"): `wire::Ext<T>` hashes this list the same way
	/// `Descriptor::build` hashes a `Reflected` type's field table, so two
	/// externalizable classes sharing a name but disagreeing on fields still
	/// raise `SchemaMismatch` instead of silently misreading each other's
	/// bytes.
	fn field_schema() -> Vec<(&'static str, crate::tag::FieldKind)>;
}

/// The "marshal-aware" capability (spec.md §3, §4.C step 4): like
/// `Externalizable`, but the write side is also expected to publish a
/// field-name/kind schema once per type id via the indexing handler's
/// metadata handler (spec.md §4.E "MARSHAL_AWARE").
pub trait MarshalAware: Default + 'static {
	fn type_name() -> &'static str;
	fn write_fields(&self, out: &mut OutputStream) -> Result<()>;
	fn read_fields(&mut self, input: &mut InputStream) -> Result<()>;
	fn field_schema() -> Vec<(&'static str, crate::tag::FieldKind)>;
}
