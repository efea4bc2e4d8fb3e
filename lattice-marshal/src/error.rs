//! Structured error taxonomy (spec.md §7).
//!
//! The teacher (`cilium::schema::errors::ReadError`) hand-rolls a small
//! `enum` with manual `From` impls; `dotscope`
//! (`examples/pmikstacki-bsharp/src/vendor/dotscope`), a crate in the same
//! reflective-binary-metadata domain, reaches for `thiserror` for the same
//! job once the error surface grows past a couple of variants, which is the
//! case here (seven distinct kinds, several carrying context).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// Raised at marshaller construction only (spec.md §7.1).
	#[error("host platform lacks the primitives required for constructor-bypass allocation")]
	UnsupportedPlatform,

	/// spec.md §7.2.
	#[error("type `{type_name}` does not declare the serializable capability and `require_serializable` is set")]
	NotSerializable { type_name: String },

	/// spec.md §7.3. Same surface kind as `SchemaMismatch`.
	#[error("class `{name}` could not be resolved on this node (peer class-loading required?)")]
	ClassNotFound { name: String },

	/// spec.md §7.4. Same surface kind as `ClassNotFound`.
	#[error("class version differs across nodes: `{type_name}` wire checksum {wire:#06x} != local {local:#06x}")]
	SchemaMismatch { type_name: String, wire: u16, local: u16 },

	/// spec.md §7.5.
	#[error("field `{field}` is not present in the footer of this blob")]
	FieldNotFound { field: String },

	/// spec.md §7.6, propagated verbatim.
	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// spec.md §7.7: malformed tag, truncated payload, handle to an
	/// unwritten position. Fatal, no recovery.
	#[error("protocol violation: {0}")]
	ProtocolViolation(String),
}

impl Error {
	pub fn protocol_violation(msg: impl Into<String>) -> Error {
		Error::ProtocolViolation(msg.into())
	}
}
