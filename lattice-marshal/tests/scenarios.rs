//! The two hook-driven concrete scenarios: an `Externalizable` type
//! reconstructed via its captured no-arg constructor exactly once per
//! unmarshal, and a `write_replace`/`read_resolve` pair that substitutes the
//! wire representation on write and hands back a third, different type on
//! read.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

use lattice_marshal::{
	Capability, Descriptor, Error, Ext, FieldKind, IdMapper, InputStream, Marshal, Marshaller, MarshallerOptions, OutputStream, Reflected, Result, TypeRegistry,
};

// -- scenario 5: Externalizable construct-once --------------------------------------------------

static COUNTER_CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

struct Counter {
	count: i32,
}

impl Default for Counter {
	fn default() -> Self {
		COUNTER_CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
		Counter { count: 0 }
	}
}

impl lattice_marshal::Externalizable for Counter {
	fn type_name() -> &'static str {
		"scenarios.Counter"
	}
	fn write_external(&self, out: &mut OutputStream) -> Result<()> {
		out.write_i32(self.count);
		Ok(())
	}
	fn read_external(&mut self, input: &mut InputStream) -> Result<()> {
		self.count = input.read_i32()?;
		Ok(())
	}
	fn field_schema() -> Vec<(&'static str, FieldKind)> {
		vec![("count", FieldKind::Int)]
	}
}

#[derive(Marshal)]
struct Holder {
	counter: Ext<Counter>,
}

#[test]
fn externalizable_constructor_runs_exactly_once_per_unmarshal() {
	COUNTER_CONSTRUCTIONS.store(0, Ordering::SeqCst);

	let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
	let registry = TypeRegistry::new();
	let bytes = marshaller.marshal(&Holder { counter: Ext(Counter { count: 42 }) }).unwrap();

	let before = COUNTER_CONSTRUCTIONS.load(Ordering::SeqCst);
	let back: Holder = marshaller.unmarshal(&bytes, &registry).unwrap();
	let after = COUNTER_CONSTRUCTIONS.load(Ordering::SeqCst);

	assert_eq!(back.counter.0.count, 42);
	assert_eq!(after - before, 1, "Counter::default should run exactly once per unmarshal");
}

// -- scenario 6: write_replace substitutes, read_resolve decides the result ----

struct Original {
	value: i32,
}

impl Marshal for Original {
	fn type_name(&self) -> &'static str {
		"scenarios.Original"
	}
	fn write_fields(&self, _out: &mut OutputStream, _descriptor: &Descriptor) -> Result<()> {
		unreachable!("write_replace always substitutes before write_fields would run")
	}
	fn write_replace(&self) -> Option<Box<dyn Marshal>> {
		Some(Box::new(Proxy { value: self.value }))
	}
	fn dyn_descriptor(&self, id_mapper: Option<&dyn IdMapper>) -> Descriptor {
		<Self as Reflected>::build_descriptor(id_mapper)
	}
	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl Reflected for Original {
	fn type_name() -> &'static str {
		"scenarios.Original"
	}
	fn build_descriptor(id_mapper: Option<&dyn IdMapper>) -> Descriptor {
		Descriptor::build(
			"scenarios.Original",
			id_mapper,
			Capability::Serializable,
			&[("value", FieldKind::Int)],
			vec![("value", FieldKind::Int, false)],
			vec![],
			true,
			false,
			false,
			true,
			true,
		)
	}
	fn allocate_and_read(_input: &mut InputStream, _descriptor: &Descriptor) -> Result<Self> {
		unreachable!("Original is never written as itself, so it is never read back as itself either")
	}
}

struct Proxy {
	value: i32,
}

impl Marshal for Proxy {
	fn type_name(&self) -> &'static str {
		"scenarios.Proxy"
	}
	fn write_fields(&self, out: &mut OutputStream, descriptor: &Descriptor) -> Result<()> {
		let mut footer = out.begin_fields(descriptor);
		out.field_int(&mut footer, &descriptor.fields[0], self.value);
		out.end_fields(footer);
		Ok(())
	}
	fn dyn_descriptor(&self, id_mapper: Option<&dyn IdMapper>) -> Descriptor {
		<Self as Reflected>::build_descriptor(id_mapper)
	}
	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl Reflected for Proxy {
	fn type_name() -> &'static str {
		"scenarios.Proxy"
	}
	fn build_descriptor(id_mapper: Option<&dyn IdMapper>) -> Descriptor {
		Descriptor::build(
			"scenarios.Proxy",
			id_mapper,
			Capability::Serializable,
			&[("value", FieldKind::Int)],
			vec![("value", FieldKind::Int, false)],
			vec![],
			false,
			true,
			false,
			true,
			true,
		)
	}
	fn allocate_and_read(input: &mut InputStream, descriptor: &Descriptor) -> Result<Self> {
		let active = input.begin_fields(descriptor);
		let value = input.field_int(active, &descriptor.fields[0])?;
		input.end_fields(active, descriptor);
		Ok(Proxy { value })
	}
	fn read_resolve(self) -> Box<dyn Marshal> {
		Box::new(Resolved { doubled: self.value * 2 })
	}
}

struct Resolved {
	doubled: i32,
}

impl Marshal for Resolved {
	fn type_name(&self) -> &'static str {
		"scenarios.Resolved"
	}
	fn write_fields(&self, out: &mut OutputStream, descriptor: &Descriptor) -> Result<()> {
		let mut footer = out.begin_fields(descriptor);
		out.field_int(&mut footer, &descriptor.fields[0], self.doubled);
		out.end_fields(footer);
		Ok(())
	}
	fn dyn_descriptor(&self, _id_mapper: Option<&dyn IdMapper>) -> Descriptor {
		Descriptor::build(
			"scenarios.Resolved",
			None,
			Capability::Serializable,
			&[("doubled", FieldKind::Int)],
			vec![("doubled", FieldKind::Int, false)],
			vec![],
			false,
			false,
			false,
			true,
			true,
		)
	}
	fn as_any(&self) -> &dyn Any {
		self
	}
}

#[test]
fn write_replace_and_read_resolve_round_trip_through_dynamic_dispatch() {
	let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
	let mut registry = TypeRegistry::new();
	registry.register::<Proxy>();

	let bytes = marshaller.marshal(&Original { value: 21 }).unwrap();
	let resolved = marshaller.unmarshal_dyn(&bytes, &registry).unwrap();
	let resolved = resolved.as_any().downcast_ref::<Resolved>().expect("read_resolve should have produced a Resolved");
	assert_eq!(resolved.doubled, 42);
}

#[test]
fn unregistered_write_replace_target_fails_class_resolution() {
	let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
	let registry = TypeRegistry::new(); // Proxy never registered.

	let bytes = marshaller.marshal(&Original { value: 1 }).unwrap();
	let err = marshaller.unmarshal_dyn(&bytes, &registry).unwrap_err();
	assert!(matches!(err, Error::ClassNotFound { .. }), "expected ClassNotFound, got {err:?}");
}
