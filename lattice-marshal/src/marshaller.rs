//! Top-level entry point (spec.md §6): the `Marshaller` struct wiring the
//! descriptor cache, stream registry and options together behind the
//! public `marshal`/`unmarshal`/`has_field`/`read_field`/`on_undeploy`
//! surface.
//!
//! Shaped after `cilium::assembly::Assembly`: a single struct constructed
//! once (`Assembly::load`), shared behind a reference across every
//! subsequent lookup, never recreated per call.

use crate::buffer::ByteReader;
use crate::config::{check_preamble, MarshallerOptions};
use crate::descriptor_cache::{DescriptorCache, LoaderId};
use crate::error::{Error, Result};
use crate::indexing::{self, Value};
use crate::input::InputStream;
use crate::object::{Marshal, Reflected};
use crate::output::OutputStream;
use crate::pool::StreamRegistry;
use crate::registry::ClassResolver;

/// A configured marshaller: owns the descriptor cache and stream registry,
/// and is `Send + Sync` so one instance can be shared across every worker
/// thread in a cluster node (spec.md §6 "one marshaller per node process").
pub struct Marshaller {
	options: MarshallerOptions,
	cache: DescriptorCache,
	streams: StreamRegistry,
}

impl Marshaller {
	/// spec.md §7.1: fails only if the host platform cannot support
	/// constructor-bypass allocation; see [`crate::config::MarshallerOptionsBuilder::build`].
	pub fn new(options: MarshallerOptions) -> Result<Marshaller> {
		let streams = StreamRegistry::new(options.pool_size);
		Ok(Marshaller { options, cache: DescriptorCache::new(), streams })
	}

	/// Serializes `obj` to a freshly allocated byte vector, under
	/// [`LoaderId::STATIC`] (spec.md §6 `marshal(obj) -> bytes`).
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, obj)))]
	pub fn marshal<T: Reflected>(&self, obj: &T) -> Result<Vec<u8>> {
		self.marshal_under(obj, LoaderId::STATIC)
	}

	/// spec.md §6 `marshal(obj, sink)`: appends the wire bytes to a caller-
	/// supplied `Vec<u8>` instead of returning a fresh one, avoiding an extra
	/// copy when the caller already owns an output buffer (e.g. a network
	/// send queue).
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, obj, sink)))]
	pub fn marshal_into<T: Reflected>(&self, obj: &T, sink: &mut Vec<u8>) -> Result<()> {
		let bytes = self.marshal(obj)?;
		sink.extend_from_slice(&bytes);
		Ok(())
	}

	fn marshal_under<T: Reflected>(&self, obj: &T, loader: LoaderId) -> Result<Vec<u8>> {
		let mut pooled = self.streams.acquire();
		pooled.buffer_mut().write_u8(self.options.protocol_version as u8);
		let mut out = OutputStream::new(
			pooled.take(),
			&self.cache,
			loader,
			self.options.id_mapper.as_deref(),
			self.options.indexing_handler.as_deref(),
			self.options.require_serializable,
			&self.options.exclusions,
		);
		out.write_object(obj)?;
		Ok(out.into_buffer().into_vec())
	}

	/// spec.md §6 `unmarshal(bytes, resolver) -> obj`: the whole slice is
	/// one blob.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, bytes, resolver)))]
	pub fn unmarshal<T: Reflected>(&self, bytes: &[u8], resolver: &dyn ClassResolver) -> Result<T> {
		self.unmarshal_span(bytes, 0, bytes.len(), resolver)
	}

	/// spec.md §6 `unmarshal(bytes, off, len, resolver) -> obj`: `bytes[off
	/// .. off+len]` is one blob, letting a caller decode a sub-span of a
	/// larger buffer (e.g. one message out of a batched frame) without first
	/// copying it out.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, bytes, resolver)))]
	pub fn unmarshal_span<T: Reflected>(&self, bytes: &[u8], off: usize, len: usize, resolver: &dyn ClassResolver) -> Result<T> {
		let span = bytes.get(off..off + len).ok_or_else(|| Error::protocol_violation("span out of bounds"))?;
		let mut reader = ByteReader::new(span);
		let preamble = reader.read_u8()?;
		check_preamble(preamble)?;
		let mut input = InputStream::new(reader, &self.cache, LoaderId::STATIC, resolver, self.options.indexing_handler.as_deref(), self.options.id_mapper.as_deref());
		let _tag = input.read_tag()?;
		input.read_object::<T>()
	}

	/// Dynamic counterpart of [`Self::unmarshal`], for a `Box<dyn Marshal>`
	/// field or a genuinely heterogeneous top-level blob whose concrete type
	/// is chosen by wire name rather than known at the call site.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, bytes, resolver)))]
	pub fn unmarshal_dyn(&self, bytes: &[u8], resolver: &dyn ClassResolver) -> Result<Box<dyn Marshal>> {
		let mut reader = ByteReader::new(bytes);
		let preamble = reader.read_u8()?;
		check_preamble(preamble)?;
		let mut input = InputStream::new(reader, &self.cache, LoaderId::STATIC, resolver, self.options.indexing_handler.as_deref(), self.options.id_mapper.as_deref());
		let _tag = input.read_tag()?;
		input.read_dyn_object()
	}

	/// spec.md §6 `has_field(name, bytes, off, len) -> bool`. Operates on
	/// raw bytes only; does not need a `ClassResolver` since it never
	/// reconstructs an object.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, bytes)))]
	pub fn has_field(&self, name: &str, bytes: &[u8], off: usize, len: usize) -> Result<bool> {
		let (body_off, body_len) = skip_preamble(bytes, off, len)?;
		indexing::has_field(name, bytes, body_off, body_len)
	}

	/// spec.md §6 `read_field(name, bytes, off, len, resolver, ctx) -> value`.
	/// `resolver` and `ctx` are part of the spec's signature and kept here so
	/// callers can pass the same arguments they use for `unmarshal`, but
	/// neither is forwarded to [`indexing::read_field`] — see its doc comment
	/// for why a capability-tagged field is always returned as an undecoded
	/// [`Value::Object`] rather than resolved inline.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, bytes, _resolver, _ctx)))]
	pub fn read_field(&self, name: &str, bytes: &[u8], off: usize, len: usize, _resolver: &dyn ClassResolver, _ctx: Option<&dyn crate::registry::MarshallerContext>) -> Result<Value> {
		let (body_off, body_len) = skip_preamble(bytes, off, len)?;
		indexing::read_field(name, bytes, body_off, body_len)
	}

	/// spec.md §5 "Undeploy": evicts every descriptor installed under
	/// `loader` from this marshaller's cache.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	pub fn on_undeploy(&self, loader: LoaderId) {
		self.cache.on_undeploy(loader);
	}
}

fn skip_preamble(bytes: &[u8], off: usize, len: usize) -> Result<(usize, usize)> {
	let span = bytes.get(off..off + len).ok_or_else(|| Error::protocol_violation("span out of bounds"))?;
	let preamble = *span.first().ok_or_else(|| Error::protocol_violation("span too short to carry a preamble"))?;
	check_preamble(preamble)?;
	Ok((off + 1, len - 1))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reflect::{Capability, Descriptor};
	use crate::registry::TypeRegistry;
	use crate::tag::FieldKind;

	struct Point {
		x: i32,
		y: i32,
	}

	impl Marshal for Point {
		fn type_name(&self) -> &'static str {
			"test.Point"
		}
		fn write_fields(&self, out: &mut OutputStream, descriptor: &Descriptor) -> Result<()> {
			let mut footer = out.begin_fields(descriptor);
			out.field_int(&mut footer, &descriptor.fields[0], self.x);
			out.field_int(&mut footer, &descriptor.fields[1], self.y);
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

	impl Reflected for Point {
		fn type_name() -> &'static str {
			"test.Point"
		}
		fn build_descriptor(id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor {
			Descriptor::build(
				"test.Point",
				id_mapper,
				Capability::Serializable,
				&[("x", FieldKind::Int), ("y", FieldKind::Int)],
				vec![("x", FieldKind::Int, false), ("y", FieldKind::Int, false)],
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
			let x = input.field_int(active, &descriptor.fields[0])?;
			let y = input.field_int(active, &descriptor.fields[1])?;
			input.end_fields(active, descriptor);
			Ok(Point { x, y })
		}
	}

	#[test]
	fn round_trips_a_simple_struct() {
		let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
		let registry = TypeRegistry::new();
		let bytes = marshaller.marshal(&Point { x: 3, y: 4 }).unwrap();
		let back: Point = marshaller.unmarshal(&bytes, &registry).unwrap();
		assert_eq!((back.x, back.y), (3, 4));
	}

	#[test]
	fn rejects_unknown_protocol_version_byte() {
		let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
		let registry = TypeRegistry::new();
		let mut bytes = marshaller.marshal(&Point { x: 1, y: 1 }).unwrap();
		bytes[0] = 0xFF;
		assert!(marshaller.unmarshal::<Point>(&bytes, &registry).is_err());
	}

	#[test]
	fn undeploy_is_reachable_through_the_marshaller() {
		let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
		marshaller.on_undeploy(LoaderId::STATIC);
	}

	struct Internal {
		secret: i32,
	}

	impl Marshal for Internal {
		fn type_name(&self) -> &'static str {
			"test.Internal"
		}
		fn write_fields(&self, out: &mut OutputStream, descriptor: &Descriptor) -> Result<()> {
			let mut footer = out.begin_fields(descriptor);
			out.field_int(&mut footer, &descriptor.fields[0], self.secret);
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

	impl Reflected for Internal {
		fn type_name() -> &'static str {
			"test.Internal"
		}
		fn build_descriptor(id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor {
			Descriptor::build(
				"test.Internal",
				id_mapper,
				Capability::Serializable,
				&[("secret", FieldKind::Int)],
				vec![("secret", FieldKind::Int, false)],
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
			let secret = input.field_int(active, &descriptor.fields[0])?;
			input.end_fields(active, descriptor);
			Ok(Internal { secret })
		}
	}

	struct Container {
		maybe_internal: Option<std::sync::Arc<Internal>>,
	}

	impl Marshal for Container {
		fn type_name(&self) -> &'static str {
			"test.Container"
		}
		fn write_fields(&self, out: &mut OutputStream, descriptor: &Descriptor) -> Result<()> {
			let mut footer = out.begin_fields(descriptor);
			out.field_other(&mut footer, &descriptor.fields[0], &self.maybe_internal)?;
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

	impl Reflected for Container {
		fn type_name() -> &'static str {
			"test.Container"
		}
		fn build_descriptor(id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor {
			Descriptor::build(
				"test.Container",
				id_mapper,
				Capability::Serializable,
				&[("maybe_internal", FieldKind::Other)],
				vec![("maybe_internal", FieldKind::Other, false)],
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
			let maybe_internal = input.field_other(active, &descriptor.fields[0])?;
			input.end_fields(active, descriptor);
			Ok(Container { maybe_internal })
		}
	}

	#[test]
	fn excluded_nested_field_round_trips_as_none() {
		// spec.md §8 "Exclusion stability", realized at the field level: a
		// directly-`unmarshal::<T>`-able root can't itself become "null" for
		// a non-`Option` `T`, but an `Option<Arc<Excluded>>` field can — the
		// excluded object writes as `NULL` (spec.md §4.C step 1), which
		// `Option<Arc<T>>::read` (unlike `Arc<T>::read`) accepts cleanly.
		let options = MarshallerOptions::builder().exclude("test.Internal").build().unwrap();
		let marshaller = Marshaller::new(options).unwrap();
		let registry = TypeRegistry::new();
		let bytes = marshaller
			.marshal(&Container {
				maybe_internal: Some(std::sync::Arc::new(Internal { secret: 42 })),
			})
			.unwrap();
		let back: Container = marshaller.unmarshal(&bytes, &registry).unwrap();
		assert!(back.maybe_internal.is_none());
	}
}
