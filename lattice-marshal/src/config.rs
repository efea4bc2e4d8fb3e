//! Marshaller configuration (spec.md §6 `MarshallerOptions`).
//!
//! `cilium`'s closest analogue is `Assembly::load`'s small set of loader
//! flags (`cilium::assembly`); this follows the same "one options struct,
//! builder-style setters, a `build`/`new` that can fail" shape.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::indexing::IndexingHandler;
use crate::tag::IdMapper;

/// Reserved for the leading wire preamble byte (spec.md §6, §9 Open
/// Question: "is the format versioned?" — resolved yes, one byte, only
/// `V1` defined). A future `V2` would live beside it here.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum ProtocolVersion {
	V1 = 1,
}

impl ProtocolVersion {
	pub fn from_u8(byte: u8) -> Option<ProtocolVersion> {
		match byte {
			1 => Some(ProtocolVersion::V1),
			_ => None,
		}
	}
}

/// Immutable configuration for one [`crate::marshaller::Marshaller`]
/// (spec.md §6). Built once via [`MarshallerOptions::builder`] and shared
/// across every thread using that marshaller.
pub struct MarshallerOptions {
	pub(crate) require_serializable: bool,
	pub(crate) protocol_version: ProtocolVersion,
	pub(crate) pool_size: u32,
	pub(crate) id_mapper: Option<Arc<dyn IdMapper>>,
	pub(crate) indexing_handler: Option<Arc<dyn IndexingHandler>>,
	/// Caller-supplied exclusion list (spec.md §4.C step 1): a `Reflected`
	/// type named here is written as `NULL` instead of its real body,
	/// without ever building or caching its descriptor.
	pub(crate) exclusions: HashSet<&'static str>,
}

impl MarshallerOptions {
	pub fn builder() -> MarshallerOptionsBuilder {
		MarshallerOptionsBuilder::default()
	}
}

impl Default for MarshallerOptions {
	fn default() -> Self {
		MarshallerOptionsBuilder::default().build().expect("default options always build")
	}
}

/// spec.md §6's builder surface. `require_serializable` defaults to `true`
/// (a type must opt in to being written at all); `pool_size` defaults to
/// `0` (thread-local buffers, never blocking).
#[derive(Default)]
pub struct MarshallerOptionsBuilder {
	require_serializable: Option<bool>,
	pool_size: Option<u32>,
	id_mapper: Option<Arc<dyn IdMapper>>,
	indexing_handler: Option<Arc<dyn IndexingHandler>>,
	exclusions: HashSet<&'static str>,
}

impl MarshallerOptionsBuilder {
	pub fn require_serializable(mut self, value: bool) -> Self {
		self.require_serializable = Some(value);
		self
	}

	pub fn pool_size(mut self, value: u32) -> Self {
		self.pool_size = Some(value);
		self
	}

	pub fn id_mapper(mut self, mapper: Arc<dyn IdMapper>) -> Self {
		self.id_mapper = Some(mapper);
		self
	}

	pub fn indexing_handler(mut self, handler: Arc<dyn IndexingHandler>) -> Self {
		self.indexing_handler = Some(handler);
		self
	}

	/// Adds `type_name` to the exclusion list (spec.md §4.C step 1): every
	/// value of that `Reflected` type is written as `NULL` by this
	/// marshaller instance, e.g. for framework-internal types a cluster
	/// should never actually serialize.
	pub fn exclude(mut self, type_name: &'static str) -> Self {
		self.exclusions.insert(type_name);
		self
	}

	/// Fails only if the host platform cannot back the chosen pool mode
	/// (spec.md §6 `Error::UnsupportedPlatform`) — currently always
	/// succeeds, since both pool modes are available on every target this
	/// crate builds for; the fallible signature is kept so a future
	/// platform-gated mode (e.g. an `io_uring`-backed registry) can fail
	/// here without breaking callers.
	pub fn build(self) -> Result<MarshallerOptions> {
		Ok(MarshallerOptions {
			require_serializable: self.require_serializable.unwrap_or(true),
			protocol_version: ProtocolVersion::V1,
			pool_size: self.pool_size.unwrap_or(0),
			id_mapper: self.id_mapper,
			indexing_handler: self.indexing_handler,
			exclusions: self.exclusions,
		})
	}
}

pub(crate) fn check_preamble(byte: u8) -> Result<ProtocolVersion> {
	ProtocolVersion::from_u8(byte).ok_or_else(|| Error::protocol_violation(format!("unsupported protocol version byte {byte:#04x}")))
}
