//! Wire type tags and the type-id resolver (component A).
//!
//! Tag discriminants are part of the wire format and MUST NOT be renumbered;
//! see `cilium::heaps::table::TableKind` for the teacher's equivalent
//! "stable discriminant, never renumbered" enum.

use std::hash::Hasher;

/// The closed set of wire type tags. One byte on the wire.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Tag {
	Null = 0x00,
	Handle = 0x01,

	Bool = 0x02,
	Byte = 0x03,
	Short = 0x04,
	Int = 0x05,
	Long = 0x06,
	Float = 0x07,
	Double = 0x08,
	Char = 0x09,

	BoolArray = 0x0A,
	ByteArray = 0x0B,
	ShortArray = 0x0C,
	IntArray = 0x0D,
	LongArray = 0x0E,
	FloatArray = 0x0F,
	DoubleArray = 0x10,
	CharArray = 0x11,

	String = 0x12,
	Uuid = 0x13,
	Date = 0x14,
	Class = 0x15,

	Properties = 0x16,
	ArrayList = 0x17,
	LinkedList = 0x18,
	HashMap = 0x19,
	HashSet = 0x1A,
	LinkedHashMap = 0x1B,
	LinkedHashSet = 0x1C,
	ObjectArray = 0x1D,

	Enum = 0x1E,
	Externalizable = 0x1F,
	MarshalAware = 0x20,
	Serializable = 0x21,
}

impl Tag {
	/// Inverse of the `as u8` cast. Used by the input stream's flat jump
	/// table dispatch (spec.md §9: "a flat jump table, not virtual dispatch").
	pub fn from_u8(byte: u8) -> Option<Tag> {
		use Tag::*;
		Some(match byte {
			0x00 => Null,
			0x01 => Handle,
			0x02 => Bool,
			0x03 => Byte,
			0x04 => Short,
			0x05 => Int,
			0x06 => Long,
			0x07 => Float,
			0x08 => Double,
			0x09 => Char,
			0x0A => BoolArray,
			0x0B => ByteArray,
			0x0C => ShortArray,
			0x0D => IntArray,
			0x0E => LongArray,
			0x0F => FloatArray,
			0x10 => DoubleArray,
			0x11 => CharArray,
			0x12 => String,
			0x13 => Uuid,
			0x14 => Date,
			0x15 => Class,
			0x16 => Properties,
			0x17 => ArrayList,
			0x18 => LinkedList,
			0x19 => HashMap,
			0x1A => HashSet,
			0x1B => LinkedHashMap,
			0x1C => LinkedHashSet,
			0x1D => ObjectArray,
			0x1E => Enum,
			0x1F => Externalizable,
			0x20 => MarshalAware,
			0x21 => Serializable,
			_ => return None,
		})
	}
}

/// Per-field primitive kind, distinct from [`Tag`]: this drives inlined
/// fast-path reads/writes at a recorded field accessor instead of another
/// tag dispatch (spec.md §3 "Field-kind tag").
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FieldKind {
	Bool,
	Byte,
	Short,
	Int,
	Long,
	Float,
	Double,
	Char,
	Other,
}

/// Caller-supplied name→id mapping (spec.md §6 `IdMapper`). Returning `0`
/// means "fall back to the hashed name", matching the wire's `type_id == 0`
/// ⇒ "emit the literal name" convention.
pub trait IdMapper: Send + Sync {
	fn type_id(&self, name: &str) -> u32;
}

/// The resolver is pure, matching spec.md §4.A: given a name and an
/// optional mapper, return `mapper.type_id(name)` if nonzero, else a
/// deterministic hash of the name.
pub fn resolve_type_id(name: &str, mapper: Option<&dyn IdMapper>) -> u32 {
	if let Some(mapper) = mapper {
		let id = mapper.type_id(name);
		if id != 0 {
			return id;
		}
	}
	fnv1a_32(name.as_bytes())
}

/// FNV-1a over the name's UTF-8 bytes, 32-bit. Used as the fallback type-id
/// hash and reused (truncated) as the schema-checksum and field-id hashes,
/// per spec.md §9's explicit resolution of those Open Questions.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
	const OFFSET_BASIS: u32 = 0x811C_9DC5;
	const PRIME: u32 = 0x0100_0193;
	let mut hash = OFFSET_BASIS;
	for &b in bytes {
		hash ^= b as u32;
		hash = hash.wrapping_mul(PRIME);
	}
	// Never collide with the "emit inline name" sentinel.
	if hash == 0 {
		1
	} else {
		hash
	}
}

/// 16-bit schema checksum over a type's own field names and kinds, per
/// spec.md §3 "Schema checksum".
pub fn schema_checksum(fields: &[(&str, FieldKind)]) -> u16 {
	let mut hasher = Fnv1aHasher::new();
	for (name, kind) in fields {
		hasher.write(name.as_bytes());
		hasher.write(&[kind_discriminant(*kind)]);
	}
	(hasher.finish() & 0xFFFF) as u16
}

/// Field-id: FNV-1a over the name, salted by XOR with the owning type's
/// id (spec.md §9 Open Question, resolved: XOR rather than concatenation
/// so a forged name/id pair cannot reproduce an arbitrary id).
pub fn field_id(name: &str, type_id: u32) -> u32 {
	fnv1a_32(name.as_bytes()) ^ type_id
}

fn kind_discriminant(kind: FieldKind) -> u8 {
	match kind {
		FieldKind::Bool => 0,
		FieldKind::Byte => 1,
		FieldKind::Short => 2,
		FieldKind::Int => 3,
		FieldKind::Long => 4,
		FieldKind::Float => 5,
		FieldKind::Double => 6,
		FieldKind::Char => 7,
		FieldKind::Other => 8,
	}
}

struct Fnv1aHasher(u32);

impl Fnv1aHasher {
	fn new() -> Self {
		Fnv1aHasher(0x811C_9DC5)
	}
}

impl Hasher for Fnv1aHasher {
	fn finish(&self) -> u64 {
		self.0 as u64
	}

	fn write(&mut self, bytes: &[u8]) {
		for &b in bytes {
			self.0 ^= b as u32;
			self.0 = self.0.wrapping_mul(0x0100_0193);
		}
	}
}
