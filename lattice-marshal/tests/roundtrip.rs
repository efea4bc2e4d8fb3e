//! Round-trip and identity-preservation properties (spec.md §8), exercised
//! through the public `Marshaller` API against `#[derive(Marshal)]` types
//! rather than the hand-written fixtures the unit tests use.

use lattice_marshal::{Marshal, Marshaller, MarshallerOptions, TypeRegistry};
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq, Marshal)]
struct Inner {
	note: String,
	tag: i16,
}

#[derive(Debug, Clone, PartialEq, Marshal)]
struct Sample {
	active: bool,
	id: i64,
	inner: Inner,
	label: String,
	ratio: f64,
	scores: Vec<i32>,
}

/// Avoids NaN (which is never equal to itself) and infinities, so
/// `prop_assert_eq!` on the round-tripped value is meaningful.
fn finite_f64() -> impl Strategy<Value = f64> {
	-1.0e12f64..1.0e12f64
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(256))]

	/// spec.md §8 "Round-trip fidelity": `unmarshal(marshal(x)) == x` for
	/// arbitrary field-order-independent struct values, including a nested
	/// `Reflected` field and a variable-length primitive array.
	#[test]
	fn round_trips_arbitrary_samples(
		active in any::<bool>(),
		id in any::<i64>(),
		note in ".{0,12}",
		tag in any::<i16>(),
		label in ".{0,12}",
		ratio in finite_f64(),
		scores in proptest::collection::vec(any::<i32>(), 0..8),
	) {
		let sample = Sample {
			active,
			id,
			inner: Inner { note, tag },
			label,
			ratio,
			scores,
		};

		let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
		let registry = TypeRegistry::new();
		let bytes = marshaller.marshal(&sample).unwrap();
		let back: Sample = marshaller.unmarshal(&bytes, &registry).unwrap();
		prop_assert_eq!(sample, back);
	}

	/// spec.md §8 "Determinism": marshaling the same value twice produces
	/// byte-identical output.
	#[test]
	fn marshaling_the_same_value_twice_is_byte_identical(
		id in any::<i64>(),
		label in ".{0,12}",
		scores in proptest::collection::vec(any::<i32>(), 0..8),
	) {
		let sample = Sample {
			active: true,
			id,
			inner: Inner { note: "x".into(), tag: 1 },
			label,
			ratio: 0.5,
			scores,
		};

		let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
		let first = marshaller.marshal(&sample).unwrap();
		let second = marshaller.marshal(&sample).unwrap();
		prop_assert_eq!(first, second);
	}
}
