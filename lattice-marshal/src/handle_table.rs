//! Per-invocation handle table (spec.md §3 "Handle table").
//!
//! A small identity-keyed map from an already-seen object's address to the
//! wire position at which it was first written (write side) or to the
//! reconstructed value itself (read side). Lifetime is exactly one
//! top-level `marshal`/`unmarshal` call, mirroring
//! `cilium::structured::Context`'s per-load bookkeeping (a fresh,
//! short-lived map threaded through one recursive walk).

use std::any::Any;
use std::collections::HashMap;

/// Write-side: object identity (pointer address) → wire position.
#[derive(Default)]
pub struct WriteHandles {
	seen: HashMap<usize, u32>,
}

impl WriteHandles {
	pub fn new() -> Self {
		WriteHandles::default()
	}

	/// Returns the previously recorded position for this identity, if any.
	pub fn position_of(&self, identity: usize) -> Option<u32> {
		self.seen.get(&identity).copied()
	}

	/// Registers `identity` as having been written at `position`. Per
	/// spec.md §4.E step 5, this must happen *before* the object's fields
	/// are written, so that a child which refers back to its parent sees
	/// the parent's handle already installed.
	pub fn register(&mut self, identity: usize, position: u32) {
		self.seen.insert(identity, position);
	}
}

/// Read-side: wire position → the already-reconstructed value living at
/// that position, type-erased so it can back an `Arc<T>` of any `T`.
#[derive(Default)]
pub struct ReadHandles {
	by_position: HashMap<u32, Box<dyn Any>>,
}

impl ReadHandles {
	pub fn new() -> Self {
		ReadHandles::default()
	}

	/// Enters a placeholder or finished value at `position` *before* its
	/// fields are populated (spec.md §4.F step 6), so cyclic references
	/// resolve.
	pub fn register(&mut self, position: u32, value: Box<dyn Any>) {
		self.by_position.insert(position, value);
	}

	pub fn get(&self, position: u32) -> Option<&(dyn Any)> {
		self.by_position.get(&position).map(|b| b.as_ref())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_handles_round_trip() {
		let mut h = WriteHandles::new();
		assert_eq!(h.position_of(0x1000), None);
		h.register(0x1000, 7);
		assert_eq!(h.position_of(0x1000), Some(7));
	}

	#[test]
	fn read_handles_downcast() {
		let mut h = ReadHandles::new();
		h.register(3, Box::new(42i32));
		let v = h.get(3).unwrap().downcast_ref::<i32>();
		assert_eq!(v, Some(&42));
	}
}
