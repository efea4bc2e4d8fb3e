//! Input stream (component F): reads one tagged value, symmetric to
//! `output.rs`, per spec.md §4.F.

use std::any::Any;

use crate::buffer::ByteReader;
use crate::descriptor_cache::{DescriptorCache, LoaderId};
use crate::error::{Error, Result};
use crate::handle_table::ReadHandles;
use crate::indexing::IndexingHandler;
use crate::object::{Marshal, Reflected};
use crate::reflect::{Capability, Descriptor, FieldDescriptor};
use crate::registry::ClassResolver;
use crate::tag::{IdMapper, Tag};

pub struct InputStream<'data, 'cfg> {
	buf: ByteReader<'data>,
	handles: ReadHandles,
	cache: &'cfg DescriptorCache,
	loader: LoaderId,
	resolver: &'cfg dyn ClassResolver,
	indexing: Option<&'cfg dyn IndexingHandler>,
	id_mapper: Option<&'cfg dyn IdMapper>,
}

impl<'data, 'cfg> InputStream<'data, 'cfg> {
	pub fn new(
		buf: ByteReader<'data>,
		cache: &'cfg DescriptorCache,
		loader: LoaderId,
		resolver: &'cfg dyn ClassResolver,
		indexing: Option<&'cfg dyn IndexingHandler>,
		id_mapper: Option<&'cfg dyn IdMapper>,
	) -> Self {
		InputStream {
			buf,
			handles: ReadHandles::new(),
			cache,
			loader,
			resolver,
			indexing,
			id_mapper,
		}
	}

	#[inline]
	pub fn position(&self) -> u32 {
		self.buf.position()
	}

	pub fn full_slice(&self) -> &'data [u8] {
		self.buf.full_slice()
	}

	// -- raw primitive forwards --------------------------------------------------

	pub fn read_tag(&mut self) -> Result<Tag> {
		let byte = self.buf.read_u8()?;
		Tag::from_u8(byte).ok_or_else(|| Error::protocol_violation(format!("unknown tag byte {byte:#04x}")))
	}

	/// Non-consuming lookahead, used by `Option<T>`'s `Wire::read`.
	pub fn peek_tag(&self) -> Result<Tag> {
		let byte = self.buf.peek_u8()?;
		Tag::from_u8(byte).ok_or_else(|| Error::protocol_violation(format!("unknown tag byte {byte:#04x}")))
	}
	pub fn read_bool(&mut self) -> Result<bool> {
		self.buf.read_bool()
	}
	pub fn read_i8(&mut self) -> Result<i8> {
		self.buf.read_i8()
	}
	pub fn read_i16(&mut self) -> Result<i16> {
		self.buf.read_i16()
	}
	pub fn read_i32(&mut self) -> Result<i32> {
		self.buf.read_i32()
	}
	pub fn read_i64(&mut self) -> Result<i64> {
		self.buf.read_i64()
	}
	pub fn read_f32(&mut self) -> Result<f32> {
		self.buf.read_f32()
	}
	pub fn read_f64(&mut self) -> Result<f64> {
		self.buf.read_f64()
	}
	pub fn read_char(&mut self) -> Result<char> {
		self.buf.read_char()
	}
	pub fn read_u32(&mut self) -> Result<u32> {
		self.buf.read_u32()
	}
	pub fn read_u16(&mut self) -> Result<u16> {
		self.buf.read_u16()
	}
	pub fn read_u64(&mut self) -> Result<u64> {
		self.buf.read_u64()
	}
	pub fn read_str_raw(&mut self) -> Result<String> {
		self.buf.read_str()
	}
	pub fn read_bytes_raw(&mut self, len: usize) -> Result<&'data [u8]> {
		self.buf.read_bytes(len)
	}
	pub fn seek(&mut self, pos: u32) {
		self.buf.seek(pos)
	}

	// -- handle table --------------------------------------------------

	/// Registers `value` at `position` *before* its fields are read (spec.md
	/// §4.F step 6), so a cyclic child reference resolves against a live
	/// (if not yet fully populated) placeholder.
	pub fn register_handle(&mut self, position: u32, value: Box<dyn Any>) {
		self.handles.register(position, value);
	}

	pub fn handle_value<T: 'static + Clone>(&self, position: u32) -> Result<T> {
		self.handles
			.get(position)
			.and_then(|v| v.downcast_ref::<T>())
			.cloned()
			.ok_or_else(|| Error::protocol_violation(format!("handle to unwritten position {position}")))
	}

	// -- type metadata --------------------------------------------------

	fn read_type_meta(&mut self) -> Result<(u32, Option<String>)> {
		let id = self.read_u32()?;
		if id == 0 {
			let name = self.read_str_raw()?;
			Ok((id, Some(name)))
		} else {
			Ok((id, None))
		}
	}

	/// Symmetric counterpart to `OutputStream::write_component_meta`.
	pub fn read_component_meta(&mut self) -> Result<(u32, Option<String>)> {
		self.read_type_meta()
	}

	// -- object reader (spec.md §4.F steps 5-9) --

	/// Reads one `Reflected` object whose tag has already been consumed by
	/// the caller (container/field dispatch reads the tag first to decide
	/// which reader to invoke).
	pub fn read_object<T: Reflected>(&mut self) -> Result<T> {
		let (wire_id, wire_name) = self.read_type_meta()?;
		let descriptor = self.cache.get_or_build::<T>(self.loader, self.id_mapper);

		if let Some(name) = &wire_name {
			if name != descriptor.type_name {
				return Err(Error::ClassNotFound { name: name.clone() });
			}
		} else if wire_id != descriptor.type_id {
			return Err(Error::ClassNotFound {
				name: format!("type id {wire_id:#010x}"),
			});
		}

		match descriptor.capability {
			// The ordinal is the entire body for an enum value (mirroring
			// `OutputStream::write_object`'s Enum branch, which writes it
			// directly instead of calling `write_fields`); the derive-generated
			// `allocate_and_read` reads it itself to pick a variant.
			Capability::Enum => T::allocate_and_read(self, &descriptor),
			_ => {
				let wire_checksum = self.read_u16()?;
				if wire_checksum != descriptor.checksum {
					return Err(Error::SchemaMismatch {
						type_name: descriptor.type_name.to_string(),
						wire: wire_checksum,
						local: descriptor.checksum,
					});
				}
				T::allocate_and_read(self, &descriptor)
			}
		}
	}

	/// Dynamic counterpart used for fields typed as `Box<dyn Marshal>` or
	/// for resolving a `write_replace` target by name through the active
	/// [`ClassResolver`].
	pub fn read_dyn_object(&mut self) -> Result<Box<dyn Marshal>> {
		let (wire_id, wire_name) = self.read_type_meta()?;
		let wire_checksum = self.read_u16()?;
		let name = match wire_name {
			Some(name) => name,
			None => return Err(Error::ClassNotFound { name: format!("type id {wire_id:#010x}") }),
		};
		let factory = self.resolver.resolve(&name).ok_or_else(|| Error::ClassNotFound { name: name.clone() })?;
		factory.read_boxed(self, wire_checksum)
	}

	pub fn resolver(&self) -> &'cfg dyn ClassResolver {
		self.resolver
	}

	pub fn cache(&self) -> &'cfg DescriptorCache {
		self.cache
	}

	pub fn loader(&self) -> LoaderId {
		self.loader
	}

	pub fn id_mapper(&self) -> Option<&'cfg dyn IdMapper> {
		self.id_mapper
	}

	// -- field-indexing footer --
	//
	// Whether the footer (and the inline field-id markers preceding each
	// field) are present depends only on `descriptor.indexable` and the
	// active `IndexingHandler`, which both sides of a call must agree on
	// (spec.md §4.H assumes a cluster-wide indexing configuration, the same
	// way the handler's `enable_indexing_for` decision is assumed stable
	// across nodes holding the same type). Computing it from the same
	// inputs the writer used keeps the two sides in lockstep without
	// needing an extra per-object wire flag.

	/// Call once before reading a type's fields; thread the result through
	/// every `field_*` call and into `end_fields`.
	pub fn begin_fields(&self, descriptor: &Descriptor) -> bool {
		descriptor.indexable && self.indexing.map_or(false, |h| h.enable_indexing_for(descriptor.type_name))
	}

	/// Skips the trailing field-index footer, if active. The footer's byte
	/// length is `fields.len() * 8 + 4` regardless of its contents, so the
	/// typed read path need not parse it — only the raw-bytes introspection
	/// entry points in `indexing.rs` do.
	pub fn end_fields(&mut self, indexing_active: bool, descriptor: &Descriptor) {
		if indexing_active {
			self.buf.seek(self.position() + descriptor.fields.len() as u32 * 8 + 4);
		}
	}

	pub fn field_bool(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<bool> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Bool)?;
		self.read_bool()
	}
	pub fn field_byte(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<i8> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Byte)?;
		self.read_i8()
	}
	pub fn field_short(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<i16> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Short)?;
		self.read_i16()
	}
	pub fn field_int(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<i32> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Int)?;
		self.read_i32()
	}
	pub fn field_long(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<i64> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Long)?;
		self.read_i64()
	}
	pub fn field_float(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<f32> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Float)?;
		self.read_f32()
	}
	pub fn field_double(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<f64> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Double)?;
		self.read_f64()
	}
	pub fn field_char(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<char> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Char)?;
		self.read_char()
	}

	pub fn field_other<T: crate::wire::Wire>(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<T> {
		self.skip_field_id(indexing_active)?;
		T::read(self)
	}

	/// Symmetric counterpart to `OutputStream::field_object`: reads a
	/// directly-nested `Reflected` value's own tag, then its body.
	pub fn field_object<T: Reflected>(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<T> {
		self.skip_field_id(indexing_active)?;
		let _tag = self.read_tag()?;
		self.read_object::<T>()
	}

	/// Symmetric counterpart to `OutputStream::field_phantom`: a
	/// `persistent_fields` entry with no backing struct field is "ignored on
	/// read" (spec.md §3) — consume the `Tag::Null` the writer substituted
	/// for it and discard it, rather than populating anything.
	pub fn field_phantom(&mut self, indexing_active: bool, _field: &FieldDescriptor) -> Result<()> {
		self.skip_field_id(indexing_active)?;
		self.expect_tag(Tag::Null)?;
		Ok(())
	}

	fn skip_field_id(&mut self, indexing_active: bool) -> Result<()> {
		if indexing_active {
			self.read_u32()?;
		}
		Ok(())
	}

	fn expect_tag(&mut self, expected: Tag) -> Result<()> {
		let tag = self.read_tag()?;
		if tag != expected {
			return Err(Error::protocol_violation(format!("expected tag {expected:?}, found {tag:?}")));
		}
		Ok(())
	}
}
