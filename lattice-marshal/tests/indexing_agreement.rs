//! spec.md §8's field-indexing property: `has_field`/`read_field`, which
//! walk the trailing footer without reconstructing the object, must agree
//! with what a full `unmarshal` of the same bytes would have produced.

use std::sync::Arc;

use lattice_marshal::{IndexingHandler, Marshal, Marshaller, MarshallerOptions, TypeRegistry, Value};

#[derive(Marshal)]
struct Account {
	balance: i64,
	owner: String,
}

struct IndexEverything;

impl IndexingHandler for IndexEverything {
	fn enable_indexing_for(&self, _type_name: &str) -> bool {
		true
	}
}

fn indexed_marshaller() -> Marshaller {
	let options = MarshallerOptions::builder().indexing_handler(Arc::new(IndexEverything)).build().unwrap();
	Marshaller::new(options).unwrap()
}

#[test]
fn has_field_finds_every_declared_field_and_nothing_else() {
	let marshaller = indexed_marshaller();
	let bytes = marshaller.marshal(&Account { balance: 120, owner: "ada".into() }).unwrap();

	assert!(marshaller.has_field("balance", &bytes, 0, bytes.len()).unwrap());
	assert!(marshaller.has_field("owner", &bytes, 0, bytes.len()).unwrap());
	assert!(!marshaller.has_field("routing_number", &bytes, 0, bytes.len()).unwrap());
}

#[test]
fn read_field_matches_the_value_a_full_unmarshal_would_produce() {
	let marshaller = indexed_marshaller();
	let registry = TypeRegistry::new();
	let bytes = marshaller.marshal(&Account { balance: 120, owner: "ada".into() }).unwrap();

	let reconstructed: Account = marshaller.unmarshal(&bytes, &registry).unwrap();

	let balance = marshaller.read_field("balance", &bytes, 0, bytes.len(), &registry, None).unwrap();
	let owner = marshaller.read_field("owner", &bytes, 0, bytes.len(), &registry, None).unwrap();

	assert_eq!(balance, Value::Long(reconstructed.balance));
	assert_eq!(owner, Value::Str(reconstructed.owner));
}

#[test]
fn an_unindexed_marshaller_leaves_no_footer_to_query() {
	let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
	let bytes = marshaller.marshal(&Account { balance: 1, owner: "x".into() }).unwrap();
	assert!(!marshaller.has_field("balance", &bytes, 0, bytes.len()).unwrap());
}
