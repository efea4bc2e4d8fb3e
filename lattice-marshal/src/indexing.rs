//! Field-indexing handler (component H): `has_field`/`read_field` support
//! over raw wire bytes via the trailing footer, without running the full
//! read path.
//!
//! Grounded on the same "parse a length-prefixed trailer without touching
//! the rest of the record" shape `cilium::heaps::table::TableStream` uses
//! to walk metadata table rows by offset rather than by full deserialization.

use uuid::Uuid;

use crate::buffer::ByteReader;
use crate::error::{Error, Result};
use crate::tag::{fnv1a_32, FieldKind, Tag};

/// Caller-supplied policy for which types get a field-index footer, and
/// where to publish a type's field schema once (spec.md §6 `IndexingHandler`).
pub trait IndexingHandler: Send + Sync {
	fn enable_indexing_for(&self, type_name: &str) -> bool;

	fn metadata_handler(&self) -> Option<&dyn FieldSchemaPublisher> {
		None
	}
}

/// Receives a type's field-name/kind schema the first time an
/// `Externalizable`/`MarshalAware` value of that type is written (those
/// capabilities have no reflectable field table of their own to publish
/// from automatically).
pub trait FieldSchemaPublisher: Send + Sync {
	fn publish(&self, type_id: u32, type_name: &str, fields: &[(&'static str, FieldKind)]);
}

/// Dynamically-typed field value returned by [`read_field`]. Array and
/// container variants are decoded eagerly since their byte width is
/// self-evident; a value whose tag is one of the four object capabilities
/// is returned undecoded as [`Value::Object`] — its bytes are a
/// self-contained `value` that a caller can hand to `Marshaller::unmarshal`
/// if and when it actually needs the nested object, rather than paying for
/// a full recursive decode just to answer one `read_field` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Byte(i8),
	Short(i16),
	Int(i32),
	Long(i64),
	Float(f32),
	Double(f64),
	Char(char),
	BoolArray(Vec<bool>),
	ByteArray(Vec<i8>),
	ShortArray(Vec<i16>),
	IntArray(Vec<i32>),
	LongArray(Vec<i64>),
	FloatArray(Vec<f32>),
	DoubleArray(Vec<f64>),
	CharArray(Vec<char>),
	Str(String),
	Uuid(Uuid),
	DateMillis(i64),
	Class { type_id: u32, type_name: Option<String> },
	Properties(Vec<(String, String)>),
	List(Vec<Value>),
	Map(Vec<(Value, Value)>),
	Set(Vec<Value>),
	/// Undecoded nested object: `bytes` is exactly the span read_field would
	/// need to pass to `unmarshal` to obtain the real value.
	Object { type_id: u32, type_name: Option<String>, bytes: Vec<u8> },
}

fn read_array<T>(r: &mut ByteReader, one: impl Fn(&mut ByteReader) -> Result<T>) -> Result<Vec<T>> {
	let len = r.read_u32()? as usize;
	(0..len).map(|_| one(r)).collect()
}

/// Decodes one `value` starting at the reader's current position. Bails
/// with `ProtocolViolation` if it encounters `HANDLE` (unresolvable without
/// a live handle table) or a nested object-capability tag reached *inside*
/// a container (its body length cannot be known without a descriptor, so a
/// generic container cannot skip past it to its siblings).
fn decode_value(r: &mut ByteReader) -> Result<Value> {
	let tag = Tag::from_u8(r.read_u8()?).ok_or_else(|| Error::protocol_violation("unknown tag in indexed field"))?;
	match tag {
		Tag::Null => Ok(Value::Null),
		Tag::Handle => Err(Error::protocol_violation("read_field cannot follow a handle reference")),
		Tag::Bool => Ok(Value::Bool(r.read_bool()?)),
		Tag::Byte => Ok(Value::Byte(r.read_i8()?)),
		Tag::Short => Ok(Value::Short(r.read_i16()?)),
		Tag::Int => Ok(Value::Int(r.read_i32()?)),
		Tag::Long => Ok(Value::Long(r.read_i64()?)),
		Tag::Float => Ok(Value::Float(r.read_f32()?)),
		Tag::Double => Ok(Value::Double(r.read_f64()?)),
		Tag::Char => Ok(Value::Char(r.read_char()?)),
		Tag::BoolArray => Ok(Value::BoolArray(read_array(r, |r| r.read_bool())?)),
		Tag::ByteArray => Ok(Value::ByteArray(read_array(r, |r| r.read_i8())?)),
		Tag::ShortArray => Ok(Value::ShortArray(read_array(r, |r| r.read_i16())?)),
		Tag::IntArray => Ok(Value::IntArray(read_array(r, |r| r.read_i32())?)),
		Tag::LongArray => Ok(Value::LongArray(read_array(r, |r| r.read_i64())?)),
		Tag::FloatArray => Ok(Value::FloatArray(read_array(r, |r| r.read_f32())?)),
		Tag::DoubleArray => Ok(Value::DoubleArray(read_array(r, |r| r.read_f64())?)),
		Tag::CharArray => Ok(Value::CharArray(read_array(r, |r| r.read_char())?)),
		Tag::String => Ok(Value::Str(r.read_str()?)),
		Tag::Uuid => {
			let hi = r.read_u64()?;
			let lo = r.read_u64()?;
			Ok(Value::Uuid(Uuid::from_u64_pair(hi, lo)))
		}
		Tag::Date => Ok(Value::DateMillis(r.read_u64()? as i64)),
		Tag::Class => {
			let id = r.read_u32()?;
			let name = if id == 0 { Some(r.read_str()?) } else { None };
			Ok(Value::Class { type_id: id, type_name: name })
		}
		Tag::Properties => {
			let len = r.read_u32()? as usize;
			let _defaults = decode_value(r)?; // always Value::Null, see wire.rs
			let mut entries = Vec::with_capacity(len);
			for _ in 0..len {
				entries.push((r.read_str()?, r.read_str()?));
			}
			Ok(Value::Properties(entries))
		}
		Tag::ArrayList | Tag::LinkedList => {
			let len = r.read_u32()? as usize;
			let mut items = Vec::with_capacity(len);
			for _ in 0..len {
				items.push(decode_value(r)?);
			}
			Ok(Value::List(items))
		}
		Tag::ObjectArray => {
			let _component_id = r.read_u32()?;
			if _component_id == 0 {
				let _component_name = r.read_str()?;
			}
			let len = r.read_u32()? as usize;
			let mut items = Vec::with_capacity(len);
			for _ in 0..len {
				items.push(decode_value(r)?);
			}
			Ok(Value::List(items))
		}
		Tag::HashMap => {
			let len = r.read_u32()? as usize;
			let _load_factor = r.read_f32()?;
			let mut entries = Vec::with_capacity(len);
			for _ in 0..len {
				entries.push((decode_value(r)?, decode_value(r)?));
			}
			Ok(Value::Map(entries))
		}
		Tag::LinkedHashMap => {
			let len = r.read_u32()? as usize;
			let _load_factor = r.read_f32()?;
			let _access_order = r.read_bool()?;
			let mut entries = Vec::with_capacity(len);
			for _ in 0..len {
				entries.push((decode_value(r)?, decode_value(r)?));
			}
			Ok(Value::Map(entries))
		}
		Tag::HashSet => {
			let len = r.read_u32()? as usize;
			let _load_factor = r.read_f32()?;
			let mut items = Vec::with_capacity(len);
			for _ in 0..len {
				items.push(decode_value(r)?);
			}
			Ok(Value::Set(items))
		}
		Tag::LinkedHashSet => {
			let len = r.read_u32()? as usize;
			let _load_factor = r.read_f32()?;
			let _access_order = r.read_bool()?;
			let mut items = Vec::with_capacity(len);
			for _ in 0..len {
				items.push(decode_value(r)?);
			}
			Ok(Value::Set(items))
		}
		Tag::Enum | Tag::Externalizable | Tag::MarshalAware | Tag::Serializable => Err(Error::protocol_violation(
			"a nested indexable object inside a container cannot be skipped without its class; read the containing field as a whole instead",
		)),
	}
}

/// One located field: its byte span within the object's bytes, bounded
/// either by the next footer entry (sorted by offset) or by the footer
/// itself.
struct Located {
	start: usize,
	end: usize,
}

fn parse_footer(object: &[u8]) -> Result<Vec<(u32, u32)>> {
	if object.len() < 4 {
		return Err(Error::protocol_violation("span too short to carry a footer"));
	}
	let total = object.len() as u32;
	let footer_start = u32::from_le_bytes(object[object.len() - 4..].try_into().unwrap());
	if footer_start > total - 4 {
		return Err(Error::protocol_violation("span has no field-index footer"));
	}
	let entries_bytes = total - 4 - footer_start;
	if entries_bytes % 8 != 0 {
		return Err(Error::protocol_violation("malformed field-index footer"));
	}
	let count = (entries_bytes / 8) as usize;
	let mut entries = Vec::with_capacity(count);
	let mut r = ByteReader::at(object, footer_start as usize);
	for _ in 0..count {
		entries.push((r.read_u32()?, r.read_u32()?));
	}
	Ok(entries)
}

fn locate(object: &[u8], field_name: &str) -> Result<Located> {
	// The object's own type id salts every field id (spec.md §4.C `field_id`);
	// recover it from the span's own type metadata, never from a resolver.
	let mut header = ByteReader::new(object);
	let _tag = header.read_u8()?;
	let raw_id = header.read_u32()?;
	let type_id = if raw_id == 0 { fnv1a_32(header.read_str()?.as_bytes()) } else { raw_id };

	let wanted = crate::tag::field_id(field_name, type_id);
	let mut entries = parse_footer(object)?;
	entries.sort_by_key(|(_, offset)| *offset);

	let footer_start = u32::from_le_bytes(object[object.len() - 4..].try_into().unwrap());
	let pos = entries
		.iter()
		.position(|(id, _)| *id == wanted)
		.ok_or_else(|| Error::FieldNotFound { field: field_name.to_string() })?;
	let start = entries[pos].1 as usize;
	let end = entries.get(pos + 1).map(|(_, off)| *off as usize).unwrap_or(footer_start as usize);
	Ok(Located { start, end })
}

/// spec.md §6 `has_field(name, bytes, off, len) -> bool`.
pub fn has_field(name: &str, bytes: &[u8], off: usize, len: usize) -> Result<bool> {
	let object = &bytes[off..off + len];
	match locate(object, name) {
		Ok(_) => Ok(true),
		Err(Error::FieldNotFound { .. }) => Ok(false),
		Err(Error::ProtocolViolation(_)) => Ok(false),
		Err(other) => Err(other),
	}
}

/// spec.md §6 `read_field(name, bytes, off, len, resolver, ctx) -> value`.
///
/// `resolver`/`ctx` are in the public signature (`Marshaller::read_field`)
/// for interface symmetry with `unmarshal`, but this function itself never
/// touches a resolver: resolving a capability-tagged field's class would
/// mean running the full allocate-and-read path for it, which defeats the
/// point of `read_field` (answer one field without paying for a full object
/// decode). So `Enum`/`Externalizable`/`MarshalAware`/`Serializable` fields
/// always come back as an undecoded [`Value::Object`] — its `bytes` are a
/// self-contained `value` a caller can hand to `Marshaller::unmarshal`
/// itself, with its own resolver, if and when it actually needs the nested
/// object.
pub fn read_field(name: &str, bytes: &[u8], off: usize, len: usize) -> Result<Value> {
	let object = &bytes[off..off + len];
	let located = locate(object, name)?;
	let field_bytes = &object[located.start..located.end];

	if let Some(&tag_byte) = field_bytes.first() {
		if matches!(Tag::from_u8(tag_byte), Some(Tag::Enum | Tag::Externalizable | Tag::MarshalAware | Tag::Serializable)) {
			let mut r = ByteReader::new(field_bytes);
			let _tag = r.read_u8()?;
			let raw_id = r.read_u32()?;
			let name = if raw_id == 0 { Some(r.read_str()?) } else { None };
			return Ok(Value::Object {
				type_id: raw_id,
				type_name: name,
				bytes: field_bytes.to_vec(),
			});
		}
	}

	let mut r = ByteReader::new(field_bytes);
	decode_value(&mut r)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::descriptor_cache::{DescriptorCache, LoaderId};
	use crate::input::InputStream;
	use crate::object::{Marshal, Reflected};
	use crate::output::OutputStream;
	use crate::reflect::{Capability, Descriptor};

	struct Rect {
		width: i32,
		height: i32,
	}

	impl Marshal for Rect {
		fn type_name(&self) -> &'static str {
			"test.Rect"
		}
		fn write_fields(&self, out: &mut OutputStream, descriptor: &Descriptor) -> Result<()> {
			let mut footer = out.begin_fields(descriptor);
			out.field_int(&mut footer, &descriptor.fields[0], self.height);
			out.field_int(&mut footer, &descriptor.fields[1], self.width);
			out.end_fields(footer);
			Ok(())
		}
		fn dyn_descriptor(&self, id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor {
			<Self as Reflected>::build_descriptor(id_mapper)
		}
		fn as_any(&self) -> &dyn std::any::Any {
			self
		}
	}

	impl Reflected for Rect {
		fn type_name() -> &'static str {
			"test.Rect"
		}
		fn build_descriptor(id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor {
			Descriptor::build(
				"test.Rect",
				id_mapper,
				Capability::Serializable,
				&[("height", FieldKind::Int), ("width", FieldKind::Int)],
				vec![("height", FieldKind::Int, false), ("width", FieldKind::Int, false)],
				vec![],
				false,
				false,
				false,
				true,
				true,
			)
		}
		fn allocate_and_read(input: &mut InputStream, descriptor: &Descriptor) -> Result<Self> {
			let active = input.begin_fields(descriptor);
			let height = input.field_int(active, &descriptor.fields[0])?;
			let width = input.field_int(active, &descriptor.fields[1])?;
			input.end_fields(active, descriptor);
			Ok(Rect { width, height })
		}
	}

	struct AlwaysIndex;
	impl IndexingHandler for AlwaysIndex {
		fn enable_indexing_for(&self, _type_name: &str) -> bool {
			true
		}
	}

	fn write_rect(rect: &Rect) -> Vec<u8> {
		let cache = DescriptorCache::new();
		let indexing = AlwaysIndex;
		let exclusions = Default::default();
		let mut out = OutputStream::new(crate::buffer::ByteWriter::new(), &cache, LoaderId::STATIC, None, Some(&indexing), true, &exclusions);
		out.write_object(rect).unwrap();
		out.into_buffer().into_vec()
	}

	#[test]
	fn has_field_finds_indexed_fields() {
		let bytes = write_rect(&Rect { width: 3, height: 4 });
		assert!(has_field("width", &bytes, 0, bytes.len()).unwrap());
		assert!(has_field("height", &bytes, 0, bytes.len()).unwrap());
		assert!(!has_field("depth", &bytes, 0, bytes.len()).unwrap());
	}

	#[test]
	fn read_field_returns_matching_value() {
		let bytes = write_rect(&Rect { width: 3, height: 4 });
		assert_eq!(read_field("width", &bytes, 0, bytes.len()).unwrap(), Value::Int(3));
		assert_eq!(read_field("height", &bytes, 0, bytes.len()).unwrap(), Value::Int(4));
	}

	#[test]
	fn read_field_missing_name_errors() {
		let bytes = write_rect(&Rect { width: 1, height: 1 });
		assert!(matches!(read_field("depth", &bytes, 0, bytes.len()), Err(Error::FieldNotFound { .. })));
	}

	#[test]
	fn unindexed_object_has_field_returns_false() {
		let cache = DescriptorCache::new();
		let exclusions = Default::default();
		let mut out = OutputStream::new(crate::buffer::ByteWriter::new(), &cache, LoaderId::STATIC, None, None, true, &exclusions);
		out.write_object(&Rect { width: 1, height: 2 }).unwrap();
		let bytes = out.into_buffer().into_vec();
		assert!(!has_field("width", &bytes, 0, bytes.len()).unwrap());
	}

	#[test]
	fn excluded_type_is_written_as_null() {
		let cache = DescriptorCache::new();
		let mut exclusions = std::collections::HashSet::new();
		exclusions.insert("test.Rect");
		let mut out = OutputStream::new(crate::buffer::ByteWriter::new(), &cache, LoaderId::STATIC, None, None, true, &exclusions);
		out.write_object(&Rect { width: 1, height: 2 }).unwrap();
		let bytes = out.into_buffer().into_vec();
		assert_eq!(bytes, vec![Tag::Null as u8]);
	}
}
