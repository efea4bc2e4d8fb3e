//! spec.md §8 "Identity-preservation": two fields sharing one `Arc` pointee
//! write the object once and resolve the second occurrence through a
//! `HANDLE`, so the reconstructed graph shares identity again on read.

use std::sync::Arc;

use lattice_marshal::{Marshal, Marshaller, MarshallerOptions, TypeRegistry};

#[derive(Marshal)]
struct Leaf {
	value: i32,
}

#[derive(Marshal)]
struct Pair {
	first: Arc<Leaf>,
	second: Arc<Leaf>,
}

#[derive(Marshal)]
struct Trio {
	a: Arc<Leaf>,
	b: Arc<Leaf>,
	c: Arc<Leaf>,
}

#[test]
fn two_fields_sharing_one_arc_round_trip_as_one_identity() {
	let shared = Arc::new(Leaf { value: 99 });
	let pair = Pair { first: shared.clone(), second: shared.clone() };

	let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
	let registry = TypeRegistry::new();
	let bytes = marshaller.marshal(&pair).unwrap();
	let back: Pair = marshaller.unmarshal(&bytes, &registry).unwrap();

	assert_eq!(back.first.value, 99);
	assert!(Arc::ptr_eq(&back.first, &back.second));
}

#[test]
fn distinct_arcs_with_equal_contents_do_not_merge_identity() {
	let pair = Pair {
		first: Arc::new(Leaf { value: 7 }),
		second: Arc::new(Leaf { value: 7 }),
	};

	let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
	let registry = TypeRegistry::new();
	let bytes = marshaller.marshal(&pair).unwrap();
	let back: Pair = marshaller.unmarshal(&bytes, &registry).unwrap();

	assert!(!Arc::ptr_eq(&back.first, &back.second));
}

#[test]
fn three_fields_sharing_one_arc_all_resolve_to_the_same_identity() {
	let shared = Arc::new(Leaf { value: 5 });
	let trio = Trio { a: shared.clone(), b: shared.clone(), c: shared.clone() };

	let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
	let registry = TypeRegistry::new();
	let bytes = marshaller.marshal(&trio).unwrap();
	let back: Trio = marshaller.unmarshal(&bytes, &registry).unwrap();

	assert!(Arc::ptr_eq(&back.a, &back.b));
	assert!(Arc::ptr_eq(&back.b, &back.c));
}
