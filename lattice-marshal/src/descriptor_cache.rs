//! Concurrent descriptor cache (component D).
//!
//! `cilium` itself resolves CLR types against a single-threaded
//! `RefCell`-backed `TypePool` (`cilium::structured::types::TypePool`)
//! because assembly loading in that crate happens on one thread at a time.
//! This marshaller is explicitly required to support concurrent marshal
//! calls from many threads sharing one cache, so the lock-free-read,
//! compare-and-swap-style cache described in spec.md §4.D is built on
//! `dashmap::DashMap` instead — the same crate `dotscope`
//! (`examples/pmikstacki-bsharp/src/vendor/dotscope`), a sibling crate in
//! the same reflective-CLR-metadata space, uses for its own type caches.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use crate::object::Reflected;
use crate::reflect::Descriptor;

/// Opaque tag identifying which "class loader" registered a type, so that
/// [`DescriptorCache::on_undeploy`] can evict every descriptor that loader
/// is responsible for (spec.md §4.D, §5 "Undeploy"). Rust has no class
/// loaders; a `LoaderId` is simply a caller-chosen partition key, e.g. one
/// per dynamically loaded plugin.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LoaderId(pub u64);

impl LoaderId {
	pub const STATIC: LoaderId = LoaderId(0);
}

#[derive(Debug)]
struct Entry {
	descriptor: Arc<Descriptor>,
	loader: LoaderId,
}

#[derive(Default)]
pub struct DescriptorCache {
	by_type: DashMap<TypeId, Entry>,
	/// Which `Externalizable`/`MarshalAware` type ids have already published
	/// their field schema through the active `IndexingHandler` (spec.md §4.E
	/// "MARSHAL_AWARE": "if not already done for this type id, collect a
	/// metadata schema ... and publish it"). Piggybacks on this cache rather
	/// than a field of its own since both exist to memoize something once
	/// per type for the lifetime of the `Marshaller` that owns them.
	published_schemas: DashSet<u32>,
}

impl DescriptorCache {
	pub fn new() -> Self {
		DescriptorCache { by_type: DashMap::new(), published_schemas: DashSet::new() }
	}

	/// Returns `true` the first time it is called for a given `type_id`,
	/// `false` on every call after — the same "first writer wins, everyone
	/// else is a no-op" shape as `get_or_build`, but for a flag instead of a
	/// value.
	pub fn mark_schema_published(&self, type_id: u32) -> bool {
		self.published_schemas.insert(type_id)
	}

	/// Looks up (or builds-and-installs) the descriptor for `T`, under
	/// `loader`, using `id_mapper` only on a miss (its result is baked into
	/// the descriptor and never re-queried afterwards). Lock-free for the
	/// hit path; on miss, the caller's freshly built candidate is installed
	/// via `DashMap::entry(..).or_insert_with`, whose shard lock makes the
	/// "losing thread discards its candidate" rule in spec.md §4.D hold for
	/// free: only one candidate is ever kept per key, and callers that raced
	/// just get the installed one back.
	pub fn get_or_build<T: Reflected>(&self, loader: LoaderId, id_mapper: Option<&dyn crate::tag::IdMapper>) -> Arc<Descriptor> {
		let key = TypeId::of::<T>();
		if let Some(entry) = self.by_type.get(&key) {
			return entry.descriptor.clone();
		}
		let candidate = Arc::new(T::build_descriptor(id_mapper));
		let entry = self
			.by_type
			.entry(key)
			.or_insert_with(|| Entry { descriptor: candidate, loader });
		entry.descriptor.clone()
	}

	pub fn len(&self) -> usize {
		self.by_type.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_type.is_empty()
	}

	/// Administrative, off the hot path (spec.md §5 "Undeploy"): removes
	/// every descriptor installed under `loader`. In-flight marshal calls
	/// that already hold an `Arc<Descriptor>` keep working — the `Arc`
	/// outlives its removal from the map.
	pub fn on_undeploy(&self, loader: LoaderId) {
		self.by_type.retain(|_, entry| entry.loader != loader);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::input::InputStream;
	use crate::object::Marshal;
	use crate::output::OutputStream;
	use crate::reflect::Capability;

	struct Widget;

	impl Marshal for Widget {
		fn type_name(&self) -> &'static str {
			"test.Widget"
		}
		fn write_fields(&self, _out: &mut OutputStream, _descriptor: &Descriptor) -> crate::Result<()> {
			Ok(())
		}
		fn dyn_descriptor(&self, id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor {
			<Self as Reflected>::build_descriptor(id_mapper)
		}
		fn as_any(&self) -> &dyn std::any::Any {
			self
		}
	}

	impl Reflected for Widget {
		fn type_name() -> &'static str {
			"test.Widget"
		}
		fn build_descriptor(id_mapper: Option<&dyn crate::tag::IdMapper>) -> Descriptor {
			Descriptor::build("test.Widget", id_mapper, Capability::Serializable, &[], vec![], vec![], false, false, false, true, true)
		}
		fn allocate_and_read(_input: &mut InputStream, _descriptor: &Descriptor) -> crate::Result<Self> {
			Ok(Widget)
		}
	}

	#[test]
	fn descriptor_identity_stable_across_lookups() {
		let cache = DescriptorCache::new();
		let a = cache.get_or_build::<Widget>(LoaderId::STATIC, None);
		let b = cache.get_or_build::<Widget>(LoaderId::STATIC, None);
		assert!(Arc::ptr_eq(&a, &b));
	}

	#[test]
	fn undeploy_evicts_matching_loader() {
		let cache = DescriptorCache::new();
		let loader = LoaderId(5);
		cache.get_or_build::<Widget>(loader, None);
		assert_eq!(cache.len(), 1);
		cache.on_undeploy(loader);
		assert_eq!(cache.len(), 0);
	}

	#[test]
	fn undeploy_leaves_other_loaders_alone() {
		let cache = DescriptorCache::new();
		cache.get_or_build::<Widget>(LoaderId(1), None);
		cache.on_undeploy(LoaderId(2));
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn schema_publication_is_marked_once_per_type_id() {
		let cache = DescriptorCache::new();
		assert!(cache.mark_schema_published(7));
		assert!(!cache.mark_schema_published(7));
		assert!(cache.mark_schema_published(8));
	}
}
