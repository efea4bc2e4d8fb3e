//! Output stream (component E): writes one tagged value using a type's
//! descriptor for metadata only, dispatching to fast paths or the generic
//! object writer per spec.md §4.E.

use crate::buffer::ByteWriter;
use crate::descriptor_cache::{DescriptorCache, LoaderId};
use crate::error::{Error, Result};
use crate::handle_table::WriteHandles;
use crate::indexing::IndexingHandler;
use crate::object::{Marshal, Reflected};
use crate::reflect::{Capability, Descriptor, FieldDescriptor};
use crate::tag::{IdMapper, Tag};

/// Tracks the in-progress field-index footer for the object currently being
/// written, if indexing is active for it (spec.md §4.E "after all fields,
/// if field indexing is enabled, append a footer").
pub struct FooterState {
	active: bool,
	object_start: u32,
	entries: Vec<(u32, u32)>,
}

pub struct OutputStream<'cfg> {
	buf: ByteWriter,
	handles: WriteHandles,
	cache: &'cfg DescriptorCache,
	loader: LoaderId,
	id_mapper: Option<&'cfg dyn IdMapper>,
	indexing: Option<&'cfg dyn IndexingHandler>,
	require_serializable: bool,
	exclusions: &'cfg std::collections::HashSet<&'static str>,
}

impl<'cfg> OutputStream<'cfg> {
	pub fn new(
		buf: ByteWriter,
		cache: &'cfg DescriptorCache,
		loader: LoaderId,
		id_mapper: Option<&'cfg dyn IdMapper>,
		indexing: Option<&'cfg dyn IndexingHandler>,
		require_serializable: bool,
		exclusions: &'cfg std::collections::HashSet<&'static str>,
	) -> Self {
		OutputStream {
			buf,
			handles: WriteHandles::new(),
			cache,
			loader,
			id_mapper,
			indexing,
			require_serializable,
			exclusions,
		}
	}

	pub fn into_buffer(self) -> ByteWriter {
		self.buf
	}

	#[inline]
	pub fn position(&self) -> u32 {
		self.buf.position()
	}

	/// Exposed so `wire::Ext`/`wire::Aware` can resolve their own type id the
	/// same `IdMapper`-aware way `write_type_meta` does for every other
	/// capability, instead of hashing the type name directly.
	pub fn id_mapper(&self) -> Option<&'cfg dyn IdMapper> {
		self.id_mapper
	}

	// -- raw primitive forwards --------------------------------------------------

	pub fn write_tag(&mut self, tag: Tag) {
		self.buf.write_u8(tag as u8);
	}
	pub fn write_bool(&mut self, v: bool) {
		self.buf.write_bool(v);
	}
	pub fn write_i8(&mut self, v: i8) {
		self.buf.write_i8(v);
	}
	pub fn write_i16(&mut self, v: i16) {
		self.buf.write_i16(v);
	}
	pub fn write_i32(&mut self, v: i32) {
		self.buf.write_i32(v);
	}
	pub fn write_i64(&mut self, v: i64) {
		self.buf.write_i64(v);
	}
	pub fn write_f32(&mut self, v: f32) {
		self.buf.write_f32(v);
	}
	pub fn write_f64(&mut self, v: f64) {
		self.buf.write_f64(v);
	}
	pub fn write_char(&mut self, v: char) {
		self.buf.write_char(v);
	}
	pub fn write_u32(&mut self, v: u32) {
		self.buf.write_u32(v);
	}
	pub fn write_u16(&mut self, v: u16) {
		self.buf.write_u16(v);
	}
	pub fn write_u64(&mut self, v: u64) {
		self.buf.write_u64(v);
	}
	pub fn write_str_raw(&mut self, v: &str) {
		self.buf.write_str(v);
	}
	pub fn write_bytes_raw(&mut self, v: &[u8]) {
		self.buf.write_bytes(v);
	}

	pub fn write_null(&mut self) {
		self.write_tag(Tag::Null);
	}

	// -- handle table --------------------------------------------------

	/// spec.md §4.E step 2. Returns `Some(pos)` and writes the `HANDLE`
	/// value if `identity` was already written in this invocation.
	pub fn try_write_handle(&mut self, identity: usize) -> bool {
		if let Some(pos) = self.handles.position_of(identity) {
			self.write_tag(Tag::Handle);
			self.buf.write_u32(pos);
			true
		} else {
			false
		}
	}

	/// spec.md §4.E step 5: register *before* writing fields.
	pub fn register_handle(&mut self, identity: usize) {
		self.handles.register(identity, self.position());
	}

	// -- type metadata --------------------------------------------------

	fn write_type_meta(&mut self, descriptor: &Descriptor) {
		self.buf.write_u32(descriptor.type_id);
		if descriptor.type_id == 0 {
			self.buf.write_str(descriptor.type_name);
		}
	}

	/// `OBJECT_ARRAY`'s declared component class metadata (spec.md §4.E:
	/// "emit component-type metadata, then length, then each element
	/// recursively"), written once per array rather than per element.
	pub fn write_component_meta<T: Reflected>(&mut self) {
		let descriptor = self.cache.get_or_build::<T>(self.loader, self.id_mapper);
		self.write_type_meta(&descriptor);
	}

	// -- object writer (spec.md §4.E steps 3-6, SERIALIZABLE/ENUM bodies) --

	/// Writes one `Reflected` object: tag, type metadata, (checksum and
	/// field body | ordinal), exactly per spec.md §4.E.
	pub fn write_object<T: Reflected>(&mut self, obj: &T) -> Result<()> {
		// spec.md §4.C step 1: a caller-excluded type never even reaches the
		// descriptor cache — checked against `T::type_name()` alone, which
		// needs no cache lookup.
		if self.exclusions.contains(T::type_name()) {
			self.write_null();
			return Ok(());
		}

		let descriptor = self.cache.get_or_build::<T>(self.loader, self.id_mapper);

		if descriptor.is_excluded() {
			self.write_null();
			return Ok(());
		}

		if let Some(replacement) = obj.write_replace() {
			return self.write_dyn_object(replacement.as_ref());
		}

		if self.require_serializable && !descriptor.flags.contains(crate::reflect::DescriptorFlags::IS_SERIALIZABLE) && !matches!(descriptor.capability, Capability::Enum) {
			return Err(Error::NotSerializable { type_name: descriptor.type_name.to_string() });
		}

		self.write_tag(descriptor.tag());
		self.write_type_meta(&descriptor);

		match descriptor.capability {
			Capability::Enum => {
				self.buf.write_i32(obj.enum_ordinal());
				Ok(())
			}
			_ => {
				self.buf.write_u16(descriptor.checksum);
				obj.write_fields(self, &descriptor)
			}
		}
	}

	/// Dynamic counterpart of [`Self::write_object`] used after
	/// `write_replace` substitutes a boxed value whose concrete type is no
	/// longer statically known, and for genuinely heterogeneous
	/// `Box<dyn Marshal>` fields. `obj.dyn_descriptor` stands in for the
	/// generic `T::build_descriptor` the static path uses, since no generic
	/// `T` is available here. This intentionally forgoes writing the real
	/// checksum, matching spec.md's silence on cross-checking a
	/// `writeReplace` target's schema (it is re-resolved by name on read,
	/// not assumed wire-compatible).
	pub fn write_dyn_object(&mut self, obj: &dyn Marshal) -> Result<()> {
		self.write_tag(Tag::Serializable);
		self.buf.write_u32(0);
		self.buf.write_str(obj.type_name());
		self.buf.write_u16(0);
		let descriptor = obj.dyn_descriptor(self.id_mapper);
		obj.write_fields(self, &descriptor)
	}

	// -- field-indexing footer (component H write side) --------------------

	pub fn begin_fields(&mut self, descriptor: &Descriptor) -> FooterState {
		let active = descriptor.indexable && self.indexing.map_or(false, |h| h.enable_indexing_for(descriptor.type_name));
		FooterState {
			active,
			object_start: self.position(),
			entries: Vec::new(),
		}
	}

	fn note_field(&mut self, footer: &mut FooterState, field: &FieldDescriptor) {
		if footer.active {
			let rel_offset = self.position() - footer.object_start;
			footer.entries.push((field.field_id, rel_offset));
			self.buf.write_u32(field.field_id);
		}
	}

	pub fn field_bool(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: bool) {
		self.note_field(footer, field);
		self.write_tag(Tag::Bool);
		self.write_bool(v);
	}
	pub fn field_byte(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: i8) {
		self.note_field(footer, field);
		self.write_tag(Tag::Byte);
		self.write_i8(v);
	}
	pub fn field_short(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: i16) {
		self.note_field(footer, field);
		self.write_tag(Tag::Short);
		self.write_i16(v);
	}
	pub fn field_int(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: i32) {
		self.note_field(footer, field);
		self.write_tag(Tag::Int);
		self.write_i32(v);
	}
	pub fn field_long(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: i64) {
		self.note_field(footer, field);
		self.write_tag(Tag::Long);
		self.write_i64(v);
	}
	pub fn field_float(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: f32) {
		self.note_field(footer, field);
		self.write_tag(Tag::Float);
		self.write_f32(v);
	}
	pub fn field_double(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: f64) {
		self.note_field(footer, field);
		self.write_tag(Tag::Double);
		self.write_f64(v);
	}
	pub fn field_char(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: char) {
		self.note_field(footer, field);
		self.write_tag(Tag::Char);
		self.write_char(v);
	}

	/// A `FieldKind::Other` field: a fully recursive `value`, including its
	/// own tag, null-ness and handle-table participation.
	pub fn field_other<T: crate::wire::Wire>(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: &T) -> Result<()> {
		self.note_field(footer, field);
		v.write(self)
	}

	/// A `FieldKind::Other` field holding a directly-nested `Reflected`
	/// value (as opposed to one wrapped in `Option`/`Arc`, which go through
	/// their own `Wire` impls instead). Goes straight to `write_object`
	/// rather than through `Wire`, since a blanket `Wire` impl for every
	/// `Reflected` type is not coherence-safe (see `wire.rs`).
	pub fn field_object<T: Reflected>(&mut self, footer: &mut FooterState, field: &FieldDescriptor, v: &T) -> Result<()> {
		self.note_field(footer, field);
		self.write_object(v)
	}

	/// A `persistent_fields` entry naming a field with no backing storage
	/// (spec.md §3: "may name fields that do not physically exist — null
	/// offset; zero-valued on write"). `Tag::Null` is the zero value for any
	/// `Wire`/`Object`-kind field; primitive-kind phantoms go through the
	/// ordinary `field_*` writers with a literal zero instead.
	pub fn field_phantom(&mut self, footer: &mut FooterState, field: &FieldDescriptor) {
		self.note_field(footer, field);
		self.write_null();
	}

	/// Appends `(field_id, relative_offset)` pairs followed by the trailing
	/// `footer_start` word (spec.md §6 wire grammar: `footer := (u32_fieldid
	/// u32_rel_offset)* u32_footer_start`), so `indexing.rs` can locate the
	/// footer from raw bytes alone — given the object's total span length,
	/// `entry_count = (len - 4 - footer_start) / 8` — without resolving the
	/// object's class first (`has_field` takes no `ClassResolver`, unlike
	/// `read_field`).
	pub fn end_fields(&mut self, footer: FooterState) {
		if !footer.active {
			return;
		}
		let footer_start = self.position() - footer.object_start;
		for (id, offset) in &footer.entries {
			self.buf.write_u32(*id);
			self.buf.write_u32(*offset);
		}
		self.buf.write_u32(footer_start);
	}

	/// Publishes a type's field schema through the active `IndexingHandler`'s
	/// metadata handler, if any (spec.md §6: `Externalizable`/`MarshalAware`
	/// values have no reflectable field table of their own, so their schema
	/// is reported explicitly at write time instead of derived from a
	/// `Descriptor`). Gated on `DescriptorCache::mark_schema_published` so a
	/// hot type written many times in one process only publishes once, the
	/// same one-time-per-type-id behavior `get_or_build` gives the
	/// `Serializable` path's descriptor.
	pub fn publish_marshal_aware_schema(&self, type_id: u32, type_name: &str, fields: &[(&'static str, crate::tag::FieldKind)]) {
		if !self.cache.mark_schema_published(type_id) {
			return;
		}
		if let Some(publisher) = self.indexing.and_then(|h| h.metadata_handler()) {
			publisher.publish(type_id, type_name, fields);
		}
	}
}
