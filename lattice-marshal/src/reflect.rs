//! Class descriptor (component C) — immutable reflective summary of one
//! concrete Rust type that implements [`crate::object::Reflected`].
//!
//! The teacher's analogue is `cilium::schema::type::Type`: an immutable,
//! lazily-populated summary of one CLR type (kind, fields, methods). Rust
//! has no runtime reflection, so the field list here is produced at
//! compile time by `#[derive(Marshal)]` rather than by walking a live
//! class loader; everything else — the checksum, the flags, the
//! indexability computation — is exactly the data spec.md §3/§4.C
//! describes.

use crate::tag::{field_id, resolve_type_id, schema_checksum, FieldKind, IdMapper, Tag};
use bitflags::bitflags;

bitflags! {
	/// Mirrors the `bitflags!`-derived attribute sets the teacher uses for
	/// CLR metadata (e.g. `cilium::raw::heaps::table::TypeAttributes`).
	#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
	pub struct DescriptorFlags: u16 {
		const IS_ENUM          = 0b0000_0001;
		const IS_SERIALIZABLE  = 0b0000_0010;
		const IS_EXCLUDED      = 0b0000_0100;
		const HAS_WRITE_REPLACE = 0b0000_1000;
		const HAS_READ_RESOLVE  = 0b0001_0000;
		const HAS_CUSTOM_HOOKS  = 0b0010_0000;
	}
}

/// Which of the four object capabilities spec.md §4.C walks through a
/// concrete type falls into. Primitive, primitive-array and built-in
/// container values never reach a [`Descriptor`] at all — they are handled
/// directly as [`crate::value::Value`] fast paths (spec.md §4.E).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Capability {
	Serializable,
	Externalizable,
	MarshalAware,
	Enum,
}

impl Capability {
	pub fn tag(self) -> Tag {
		match self {
			Capability::Serializable => Tag::Serializable,
			Capability::Externalizable => Tag::Externalizable,
			Capability::MarshalAware => Tag::MarshalAware,
			Capability::Enum => Tag::Enum,
		}
	}
}

/// One field in the sorted, base-first field table (spec.md §3 "Field
/// table").
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
	pub name: &'static str,
	pub kind: FieldKind,
	/// `true` when this field came from an explicit
	/// `#[marshal(persistent_fields = [...])]` override naming a field that
	/// does not physically exist on the type (spec.md §3): written as zero,
	/// ignored on read.
	pub phantom: bool,
	/// Precomputed `field_id(name, type_id)`, emitted before the value when
	/// field indexing is enabled for this type.
	pub field_id: u32,
}

/// Immutable metadata for one concrete type, built once and memoized by the
/// [`crate::descriptor_cache::DescriptorCache`] (component D).
#[derive(Debug, Clone)]
pub struct Descriptor {
	pub type_name: &'static str,
	pub capability: Capability,
	pub type_id: u32,
	pub checksum: u16,
	pub flags: DescriptorFlags,
	pub fields: Vec<FieldDescriptor>,
	pub enum_variants: Vec<&'static str>,
	pub indexable: bool,
}

impl Descriptor {
	/// Builds a descriptor for a type excluded by the caller's exclusion
	/// list (spec.md §4.C step 1): every other field is inert, only
	/// `IS_EXCLUDED` matters to the write path.
	pub fn excluded(type_name: &'static str) -> Descriptor {
		Descriptor {
			type_name,
			capability: Capability::Serializable,
			type_id: 0,
			checksum: 0,
			flags: DescriptorFlags::IS_EXCLUDED,
			fields: Vec::new(),
			enum_variants: Vec::new(),
			indexable: false,
		}
	}

	pub fn is_excluded(&self) -> bool {
		self.flags.contains(DescriptorFlags::IS_EXCLUDED)
	}

	/// Builder used by generated `Reflected::build_descriptor` impls.
	///
	/// `own_fields` must already be in base-first, lexicographic-per-level
	/// order (spec.md §3 field-order invariant); the derive macro produces
	/// that order at compile time by sorting each level's fields by name
	/// and concatenating levels base-first (spec.md §4.C step 8).
	/// `id_mapper` is resolved once here and baked into the returned
	/// descriptor's `type_id`/`field_id`s, rather than re-queried on every
	/// write: both `has_field` (which gets no `ClassResolver`, let alone an
	/// `IdMapper`) and the normal write path must salt field ids with the
	/// exact same number, which is only guaranteed if it is fixed at
	/// descriptor-build time, not re-derived per call.
	#[allow(clippy::too_many_arguments)]
	pub fn build(
		type_name: &'static str,
		id_mapper: Option<&dyn IdMapper>,
		capability: Capability,
		own_field_names_and_kinds: &[(&'static str, FieldKind)],
		full_fields: Vec<(&'static str, FieldKind, bool)>,
		enum_variants: Vec<&'static str>,
		has_write_replace: bool,
		has_read_resolve: bool,
		has_custom_hooks: bool,
		no_duplicate_names_in_hierarchy: bool,
		ancestors_indexable: bool,
	) -> Descriptor {
		let type_id = resolve_type_id(type_name, id_mapper);
		let checksum = schema_checksum(own_field_names_and_kinds);

		let mut flags = DescriptorFlags::empty();
		if matches!(capability, Capability::Enum) {
			flags |= DescriptorFlags::IS_ENUM;
		}
		if matches!(capability, Capability::Serializable) {
			flags |= DescriptorFlags::IS_SERIALIZABLE;
		}
		if has_write_replace {
			flags |= DescriptorFlags::HAS_WRITE_REPLACE;
		}
		if has_read_resolve {
			flags |= DescriptorFlags::HAS_READ_RESOLVE;
		}
		if has_custom_hooks {
			flags |= DescriptorFlags::HAS_CUSTOM_HOOKS;
		}

		let fields = full_fields
			.into_iter()
			.map(|(name, kind, phantom)| FieldDescriptor {
				name,
				kind,
				phantom,
				field_id: field_id(name, type_id),
			})
			.collect();

		// spec.md §3 "Field-indexing eligibility".
		let indexable = !has_custom_hooks && no_duplicate_names_in_hierarchy && ancestors_indexable;

		Descriptor {
			type_name,
			capability,
			type_id,
			checksum,
			flags,
			fields,
			enum_variants,
			indexable,
		}
	}

	pub fn tag(&self) -> Tag {
		self.capability.tag()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn excluded_descriptor_is_marked() {
		let d = Descriptor::excluded("com.example.Internal");
		assert!(d.is_excluded());
	}

	#[test]
	fn indexable_requires_no_custom_hooks() {
		let d = Descriptor::build(
			"T",
			None,
			Capability::Serializable,
			&[("x", FieldKind::Int)],
			vec![("x", FieldKind::Int, false)],
			vec![],
			false,
			false,
			true, // has_custom_hooks
			true,
			true,
		);
		assert!(!d.indexable);
	}

	#[test]
	fn indexable_when_fully_eligible() {
		let d = Descriptor::build(
			"T",
			None,
			Capability::Serializable,
			&[("x", FieldKind::Int)],
			vec![("x", FieldKind::Int, false)],
			vec![],
			false,
			false,
			false,
			true,
			true,
		);
		assert!(d.indexable);
	}
}
