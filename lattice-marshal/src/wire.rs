//! The `Wire` trait: per-type read/write of one `value` on the wire
//! (spec.md §6 grammar: `value := NULL | HANDLE u32 | typed`).
//!
//! Every concrete wire-visible type — primitive, array, string, container,
//! or reflected object — implements this once. Rust's coherence rules rule
//! out one blanket `impl<T> Wire for Vec<T>` covering both "primitive array"
//! and "generic heterogeneous list" wire kinds at once (they need different
//! tags), so the three generic list/array-of-object kinds spec.md §6 lists
//! (`ArrayList`, `LinkedList`, `ObjectArray`) are newtypes here rather than
//! bare `Vec<T>`/`VecDeque<T>`, exactly the way `cilium::ffi::containers`
//! wraps borrowed CLR collections in newtypes to give them their own trait
//! impls instead of fighting the blanket impls over `&[T]`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::input::InputStream;
use crate::object::{Externalizable, MarshalAware, Reflected};
use crate::output::OutputStream;
use crate::tag::Tag;

/// A concrete type with a single wire form for one full `value`. There is
/// deliberately no blanket `impl<T: Reflected> Wire for T`: a fully generic
/// `T` would overlap, under Rust's orphan rules, with every other generic
/// impl below (`Option<T>`, `HashMap<K, V>`, ...), since nothing in this
/// crate can rule out a downstream crate implementing `Reflected` for, say,
/// `Option<X>`. A directly-nested `Reflected` field goes through
/// `OutputStream::field_object`/`InputStream::field_object` instead, which
/// call `write_object`/`read_object` without needing a `Wire` impl at all.
pub trait Wire: Sized {
	fn write(&self, out: &mut OutputStream) -> Result<()>;
	fn read(input: &mut InputStream) -> Result<Self>;
}

fn expect(input: &mut InputStream, tag: Tag) -> Result<()> {
	let found = input.read_tag()?;
	if found != tag {
		return Err(Error::protocol_violation(format!("expected tag {tag:?}, found {found:?}")));
	}
	Ok(())
}

macro_rules! primitive_wire {
	($ty:ty, $tag:expr, $write:ident, $read:ident) => {
		impl Wire for $ty {
			fn write(&self, out: &mut OutputStream) -> Result<()> {
				out.write_tag($tag);
				out.$write(*self);
				Ok(())
			}
			fn read(input: &mut InputStream) -> Result<Self> {
				expect(input, $tag)?;
				input.$read()
			}
		}
	};
}

primitive_wire!(bool, Tag::Bool, write_bool, read_bool);
primitive_wire!(i8, Tag::Byte, write_i8, read_i8);
primitive_wire!(i16, Tag::Short, write_i16, read_i16);
primitive_wire!(i32, Tag::Int, write_i32, read_i32);
primitive_wire!(i64, Tag::Long, write_i64, read_i64);
primitive_wire!(f32, Tag::Float, write_f32, read_f32);
primitive_wire!(f64, Tag::Double, write_f64, read_f64);
primitive_wire!(char, Tag::Char, write_char, read_char);

macro_rules! primitive_array_wire {
	($ty:ty, $tag:expr, $write:ident, $read:ident) => {
		impl Wire for Vec<$ty> {
			fn write(&self, out: &mut OutputStream) -> Result<()> {
				out.write_tag($tag);
				out.write_u32(self.len() as u32);
				for v in self {
					out.$write(*v);
				}
				Ok(())
			}
			fn read(input: &mut InputStream) -> Result<Self> {
				expect(input, $tag)?;
				let len = input.read_u32()? as usize;
				let mut items = Vec::with_capacity(len);
				for _ in 0..len {
					items.push(input.$read()?);
				}
				Ok(items)
			}
		}
	};
}

primitive_array_wire!(bool, Tag::BoolArray, write_bool, read_bool);
primitive_array_wire!(i8, Tag::ByteArray, write_i8, read_i8);
primitive_array_wire!(i16, Tag::ShortArray, write_i16, read_i16);
primitive_array_wire!(i32, Tag::IntArray, write_i32, read_i32);
primitive_array_wire!(i64, Tag::LongArray, write_i64, read_i64);
primitive_array_wire!(f32, Tag::FloatArray, write_f32, read_f32);
primitive_array_wire!(f64, Tag::DoubleArray, write_f64, read_f64);
primitive_array_wire!(char, Tag::CharArray, write_char, read_char);

impl Wire for String {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::String);
		out.write_str_raw(self);
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::String)?;
		input.read_str_raw()
	}
}

impl Wire for Uuid {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::Uuid);
		let (hi, lo) = self.as_u64_pair();
		out.write_u64(hi);
		out.write_u64(lo);
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::Uuid)?;
		let hi = input.read_u64()?;
		let lo = input.read_u64()?;
		Ok(Uuid::from_u64_pair(hi, lo))
	}
}

/// Milliseconds since the Unix epoch (spec.md §6 "Date: `u64` millis since
/// epoch"), kept as its own type rather than reusing `i64` directly so a
/// struct field's wire kind is unambiguous from its Rust type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Timestamp(pub i64);

impl Wire for Timestamp {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::Date);
		out.write_u64(self.0 as u64);
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::Date)?;
		Ok(Timestamp(input.read_u64()? as i64))
	}
}

/// A class reference value (spec.md §6 `Tag::Class`): the wire's own
/// `type_meta` shape, standing for "a `Class` object naming a type" rather
/// than an instance of one.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ClassRef {
	pub type_id: u32,
	pub type_name: Option<String>,
}

impl Wire for ClassRef {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::Class);
		out.write_u32(self.type_id);
		if self.type_id == 0 {
			out.write_str_raw(self.type_name.as_deref().unwrap_or(""));
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::Class)?;
		let id = input.read_u32()?;
		let name = if id == 0 { Some(input.read_str_raw()?) } else { None };
		Ok(ClassRef { type_id: id, type_name: name })
	}
}

impl<T: Wire> Wire for Option<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		match self {
			None => {
				out.write_null();
				Ok(())
			}
			Some(v) => v.write(out),
		}
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		if input.peek_tag()? == Tag::Null {
			let _ = input.read_tag()?;
			Ok(None)
		} else {
			Ok(Some(T::read(input)?))
		}
	}
}

/// Properties: a string-keyed, string-valued map with deterministic
/// (lexicographic) iteration order for free. Per spec.md §4.C/§4.E,
/// container descriptors capture their internal `defaults` field (here: a
/// nested `Properties` to fall back to on lookup miss); this crate never
/// chains one `Properties` onto another, so `defaults` is always written as
/// `NULL`, a resolved Open Question recorded in DESIGN.md.
impl Wire for BTreeMap<String, String> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::Properties);
		out.write_u32(self.len() as u32);
		out.write_null();
		for (k, v) in self {
			out.write_str_raw(k);
			out.write_str_raw(v);
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::Properties)?;
		let len = input.read_u32()? as usize;
		expect(input, Tag::Null)?;
		let mut map = BTreeMap::new();
		for _ in 0..len {
			let k = input.read_str_raw()?;
			let v = input.read_str_raw()?;
			map.insert(k, v);
		}
		Ok(map)
	}
}

/// A generic, possibly-heterogeneous list (spec.md §6 `ArrayList`): each
/// element is a full recursive `value`, not a fixed-kind payload.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ArrayList<T>(pub Vec<T>);

impl<T: Wire> Wire for ArrayList<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::ArrayList);
		out.write_u32(self.0.len() as u32);
		for item in &self.0 {
			item.write(out)?;
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::ArrayList)?;
		let len = input.read_u32()? as usize;
		let mut items = Vec::with_capacity(len);
		for _ in 0..len {
			items.push(T::read(input)?);
		}
		Ok(ArrayList(items))
	}
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LinkedList<T>(pub VecDeque<T>);

impl<T: Wire> Wire for LinkedList<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::LinkedList);
		out.write_u32(self.0.len() as u32);
		for item in &self.0 {
			item.write(out)?;
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::LinkedList)?;
		let len = input.read_u32()? as usize;
		let mut items = VecDeque::with_capacity(len);
		for _ in 0..len {
			items.push_back(T::read(input)?);
		}
		Ok(LinkedList(items))
	}
}

/// An object array (spec.md §6 `ObjectArray`): unlike `ArrayList`, its
/// declared component class is itself part of the wire form (spec.md §4.E:
/// "emit component-type metadata, then length, then each element
/// recursively"), so its component must be a genuine reflected type rather
/// than any `Wire` value.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ObjectArray<T>(pub Vec<T>);

impl<T: Reflected> Wire for ObjectArray<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::ObjectArray);
		out.write_component_meta::<T>();
		out.write_u32(self.0.len() as u32);
		for item in &self.0 {
			out.write_object(item)?;
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::ObjectArray)?;
		let _component = input.read_component_meta()?;
		let len = input.read_u32()? as usize;
		let mut items = Vec::with_capacity(len);
		for _ in 0..len {
			let _tag = input.read_tag()?;
			items.push(input.read_object::<T>()?);
		}
		Ok(ObjectArray(items))
	}
}

/// The constant load factor sentinel container descriptors emit per
/// spec.md §4.C/§9: Rust's `HashMap`/`HashSet` expose no such internal
/// field, so this crate always reports the JDK default rather than reading
/// nonexistent state (resolved Open Question, recorded in DESIGN.md).
const LOAD_FACTOR_SENTINEL: f32 = 0.75;

/// `std::collections::HashMap`'s iteration order is randomized per process,
/// which would break spec.md §8's determinism property outright; entries
/// are sorted by key before writing to make the wire form a pure function
/// of the map's contents, matching the order `LinkedHashMap`'s `IndexMap`
/// impl gets for free from insertion order.
impl<K: Wire + Ord, V: Wire> Wire for HashMap<K, V> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::HashMap);
		let mut entries: Vec<(&K, &V)> = self.iter().collect();
		entries.sort_by(|a, b| a.0.cmp(b.0));
		out.write_u32(entries.len() as u32);
		out.write_f32(LOAD_FACTOR_SENTINEL);
		for (k, v) in entries {
			k.write(out)?;
			v.write(out)?;
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::HashMap)?;
		let len = input.read_u32()? as usize;
		let _load_factor = input.read_f32()?;
		let mut map = HashMap::with_capacity(len);
		for _ in 0..len {
			let k = K::read(input)?;
			let v = V::read(input)?;
			map.insert(k, v);
		}
		Ok(map)
	}
}

impl<T: Wire + Ord + std::hash::Hash> Wire for HashSet<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::HashSet);
		let mut items: Vec<&T> = self.iter().collect();
		items.sort();
		out.write_u32(items.len() as u32);
		out.write_f32(LOAD_FACTOR_SENTINEL);
		for item in items {
			item.write(out)?;
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::HashSet)?;
		let len = input.read_u32()? as usize;
		let _load_factor = input.read_f32()?;
		let mut set = HashSet::with_capacity(len);
		for _ in 0..len {
			set.insert(T::read(input)?);
		}
		Ok(set)
	}
}

impl<K: Wire + std::hash::Hash + Eq, V: Wire> Wire for IndexMap<K, V> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::LinkedHashMap);
		out.write_u32(self.len() as u32);
		out.write_f32(LOAD_FACTOR_SENTINEL);
		out.write_bool(false); // access_order: insertion order only, never access order
		for (k, v) in self {
			k.write(out)?;
			v.write(out)?;
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::LinkedHashMap)?;
		let len = input.read_u32()? as usize;
		let _load_factor = input.read_f32()?;
		let _access_order = input.read_bool()?;
		let mut map = IndexMap::with_capacity(len);
		for _ in 0..len {
			let k = K::read(input)?;
			let v = V::read(input)?;
			map.insert(k, v);
		}
		Ok(map)
	}
}

impl<T: Wire + std::hash::Hash + Eq> Wire for IndexSet<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::LinkedHashSet);
		out.write_u32(self.len() as u32);
		out.write_f32(LOAD_FACTOR_SENTINEL);
		out.write_bool(false);
		for item in self {
			item.write(out)?;
		}
		Ok(())
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::LinkedHashSet)?;
		let len = input.read_u32()? as usize;
		let _load_factor = input.read_f32()?;
		let _access_order = input.read_bool()?;
		let mut set = IndexSet::with_capacity(len);
		for _ in 0..len {
			set.insert(T::read(input)?);
		}
		Ok(set)
	}
}

/// Shared-but-acyclic reference preservation (spec.md §8
/// "Identity-preservation"): the first occurrence of a given `Arc`'s
/// pointee writes the full object and registers its position; later
/// occurrences of the *same* `Arc` (by pointer identity) write `HANDLE`
/// instead.
impl<T: Reflected> Wire for Arc<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		let identity = Arc::as_ptr(self) as usize;
		if out.try_write_handle(identity) {
			return Ok(());
		}
		out.register_handle(identity);
		out.write_object(self.as_ref())
	}

	fn read(input: &mut InputStream) -> Result<Self> {
		let start = input.position();
		let tag = input.read_tag()?;
		if tag == Tag::Handle {
			let pos = input.read_u32()?;
			return input.handle_value::<Arc<T>>(pos);
		}
		if tag == Tag::Null {
			return Err(Error::protocol_violation("null where a shared reference was expected; use Option<Arc<T>>"));
		}
		let value = Arc::new(input.read_object::<T>()?);
		input.register_handle(start, Box::new(value.clone()));
		Ok(value)
	}
}

/// Cyclic shared-reference support (spec.md §8 "Cycle-tolerance"): unlike
/// `Arc<T>` above, a self- or mutually-referential graph through
/// `Arc<RefCell<T>>` round-trips without infinite recursion, because the
/// read side registers a `T::default()` placeholder in the handle table
/// *before* populating its fields — a back-reference encountered while
/// reading those fields resolves against that same, still-filling-in `Arc`
/// instead of recursing into another read of the same bytes.
impl<T: Reflected + Default> Wire for Arc<RefCell<T>> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		let identity = Arc::as_ptr(self) as usize;
		if out.try_write_handle(identity) {
			return Ok(());
		}
		out.register_handle(identity);
		out.write_object(&*self.borrow())
	}

	fn read(input: &mut InputStream) -> Result<Self> {
		let start = input.position();
		let tag = input.read_tag()?;
		if tag == Tag::Handle {
			let pos = input.read_u32()?;
			return input.handle_value::<Arc<RefCell<T>>>(pos);
		}
		if tag == Tag::Null {
			return Err(Error::protocol_violation("null where a shared reference was expected; use Option<Arc<RefCell<T>>>"));
		}

		let placeholder = Arc::new(RefCell::new(T::default()));
		input.register_handle(start, Box::new(placeholder.clone()));

		let (wire_id, wire_name) = input.read_component_meta()?;
		let descriptor = input.cache().get_or_build::<T>(input.loader(), input.id_mapper());
		if let Some(name) = &wire_name {
			if name != descriptor.type_name {
				return Err(Error::ClassNotFound { name: name.clone() });
			}
		} else if wire_id != descriptor.type_id {
			return Err(Error::ClassNotFound {
				name: format!("type id {wire_id:#010x}"),
			});
		}
		let wire_checksum = input.read_u16()?;
		if wire_checksum != descriptor.checksum {
			return Err(Error::SchemaMismatch {
				type_name: descriptor.type_name.to_string(),
				wire: wire_checksum,
				local: descriptor.checksum,
			});
		}

		let value = T::allocate_and_read(input, &descriptor)?;
		*placeholder.borrow_mut() = value;
		Ok(placeholder)
	}
}

/// The externalizable capability (spec.md §3/§4.E "EXTERNALIZABLE"): a type
/// that writes and reads its own body, reconstructed via its `Default` impl
/// rather than field-by-field allocation. Wrapped in a newtype so it does
/// not compete with the blanket `Reflected` impl above.
pub struct Ext<T>(pub T);

impl<T: Externalizable> Wire for Ext<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::Externalizable);
		let type_id = crate::tag::resolve_type_id(T::type_name(), out.id_mapper());
		out.write_u32(type_id);
		out.write_u16(crate::tag::schema_checksum(&T::field_schema()));
		self.0.write_external(out)
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::Externalizable)?;
		let wire_id = input.read_u32()?;
		let local_id = crate::tag::resolve_type_id(T::type_name(), input.id_mapper());
		if wire_id != local_id {
			return Err(Error::ClassNotFound { name: T::type_name().to_string() });
		}
		let wire_checksum = input.read_u16()?;
		let local_checksum = crate::tag::schema_checksum(&T::field_schema());
		if wire_checksum != local_checksum {
			return Err(Error::SchemaMismatch {
				type_name: T::type_name().to_string(),
				wire: wire_checksum,
				local: local_checksum,
			});
		}
		let mut value = T::default();
		value.read_external(input)?;
		Ok(Ext(value))
	}
}

/// The marshal-aware capability (spec.md §3/§4.E "MARSHAL_AWARE"): like
/// [`Ext`], but the write side additionally publishes its field schema
/// through the active `IndexingHandler`'s metadata handler, once per type.
pub struct Aware<T>(pub T);

impl<T: MarshalAware> Wire for Aware<T> {
	fn write(&self, out: &mut OutputStream) -> Result<()> {
		out.write_tag(Tag::MarshalAware);
		let type_id = crate::tag::resolve_type_id(T::type_name(), out.id_mapper());
		out.write_u32(type_id);
		out.write_u16(crate::tag::schema_checksum(&T::field_schema()));
		out.publish_marshal_aware_schema(type_id, T::type_name(), &T::field_schema());
		self.0.write_fields(out)
	}
	fn read(input: &mut InputStream) -> Result<Self> {
		expect(input, Tag::MarshalAware)?;
		let wire_id = input.read_u32()?;
		let local_id = crate::tag::resolve_type_id(T::type_name(), input.id_mapper());
		if wire_id != local_id {
			return Err(Error::ClassNotFound { name: T::type_name().to_string() });
		}
		let wire_checksum = input.read_u16()?;
		let local_checksum = crate::tag::schema_checksum(&T::field_schema());
		if wire_checksum != local_checksum {
			return Err(Error::SchemaMismatch {
				type_name: T::type_name().to_string(),
				wire: wire_checksum,
				local: local_checksum,
			});
		}
		let mut value = T::default();
		value.read_fields(input)?;
		Ok(Aware(value))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::{ByteReader, ByteWriter};
	use crate::descriptor_cache::{DescriptorCache, LoaderId};
	use crate::object::Marshal;
	use crate::reflect::{Capability, Descriptor};
	use crate::registry::TypeRegistry;
	use crate::tag::FieldKind;

	#[derive(Default)]
	struct Node {
		value: i32,
		next: Option<Arc<RefCell<Node>>>,
	}

	impl Marshal for Node {
		fn type_name(&self) -> &'static str {
			"test.Node"
		}
		fn write_fields(&self, out: &mut OutputStream, descriptor: &Descriptor) -> Result<()> {
			let mut footer = out.begin_fields(descriptor);
			out.field_int(&mut footer, &descriptor.fields[0], self.value);
			out.field_other(&mut footer, &descriptor.fields[1], &self.next)?;
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

	impl Reflected for Node {
		fn type_name() -> &'static str {
			"test.Node"
		}
		fn build_descriptor(id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor {
			Descriptor::build(
				"test.Node",
				id_mapper,
				Capability::Serializable,
				&[("value", FieldKind::Int), ("next", FieldKind::Other)],
				vec![("value", FieldKind::Int, false), ("next", FieldKind::Other, false)],
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
			let value = input.field_int(active, &descriptor.fields[0])?;
			let next = input.field_other(active, &descriptor.fields[1])?;
			input.end_fields(active, descriptor);
			Ok(Node { value, next })
		}
	}

	/// spec.md §8 "Cycle-tolerance" / concrete scenario 4: `node n = {next:
	/// n}` round-trips, and the reconstructed `next` points back at the same
	/// reconstructed node rather than recursing forever.
	#[test]
	fn self_referential_node_round_trips_without_recursing_forever() {
		let root = Arc::new(RefCell::new(Node { value: 7, next: None }));
		root.borrow_mut().next = Some(root.clone());

		let cache = DescriptorCache::new();
		let exclusions = Default::default();
		let mut out = OutputStream::new(ByteWriter::new(), &cache, LoaderId::STATIC, None, None, true, &exclusions);
		out.write_object(&*root.borrow()).unwrap();
		let bytes = out.into_buffer().into_vec();

		let registry = TypeRegistry::new();
		let mut input = InputStream::new(ByteReader::new(&bytes), &cache, LoaderId::STATIC, &registry, None, None);
		let _tag = input.read_tag().unwrap();
		let back: Node = input.read_object().unwrap();

		assert_eq!(back.value, 7);
		let child = back.next.expect("self-reference round-trips as Some");
		let grandchild = child.borrow().next.clone().expect("the reconstructed node still points at itself");
		assert!(Arc::ptr_eq(&child, &grandchild));
	}
}
