//! spec.md §8 "Exclusion stability" and the field-order-independence /
//! transient-field properties implied by the schema checksum (spec.md §3):
//! the checksum is a function of a type's own field names and kinds only,
//! so it must be unaffected by source declaration order and by fields the
//! derive macro excludes from the wire entirely (`#[marshal(skip)]`).

use lattice_marshal::{Marshal, Marshaller, MarshallerOptions, Reflected, TypeRegistry};

#[derive(Marshal)]
struct PersonV1 {
	age: i32,
	name: String,
}

#[derive(Marshal)]
struct PersonV2 {
	name: String,
	age: i32,
}

#[test]
fn field_declaration_order_does_not_affect_the_schema_checksum() {
	let a = PersonV1::build_descriptor(None);
	let b = PersonV2::build_descriptor(None);
	assert_eq!(a.checksum, b.checksum);
}

#[derive(Marshal)]
struct Account {
	balance: i64,
	owner: String,
}

#[derive(Marshal)]
struct AccountWithTransientNote {
	balance: i64,
	owner: String,
	#[marshal(skip)]
	note: String,
}

#[test]
fn a_skipped_field_does_not_perturb_the_schema_checksum() {
	let a = Account::build_descriptor(None);
	let b = AccountWithTransientNote::build_descriptor(None);
	assert_eq!(a.checksum, b.checksum);
	assert_eq!(a.fields.len(), b.fields.len());
}

/// `routing_number` names no field on this struct at all — a phantom entry
/// (spec.md §3: "may name fields that do not physically exist").
#[derive(Marshal)]
#[marshal(persistent_fields(balance, owner, routing_number: i32))]
struct AccountWithPhantomRoutingNumber {
	balance: i64,
	owner: String,
}

#[test]
fn a_phantom_persistent_field_adds_a_zero_valued_entry_instead_of_panicking() {
	let descriptor = AccountWithPhantomRoutingNumber::build_descriptor(None);
	assert_eq!(descriptor.fields.len(), 3);
	assert!(descriptor.fields.iter().any(|f| f.name == "routing_number" && f.phantom));
	assert!(descriptor.fields.iter().filter(|f| f.name != "routing_number").all(|f| !f.phantom));
}

#[test]
fn a_phantom_persistent_field_round_trips_as_a_zero_value_that_is_ignored_on_read() {
	let marshaller = Marshaller::new(MarshallerOptions::default()).unwrap();
	let registry = TypeRegistry::new();
	let original = AccountWithPhantomRoutingNumber { balance: 500, owner: "ada".into() };

	let bytes = marshaller.marshal(&original).unwrap();
	let back: AccountWithPhantomRoutingNumber = marshaller.unmarshal(&bytes, &registry).unwrap();

	assert_eq!(back.balance, original.balance);
	assert_eq!(back.owner, original.owner);
}
