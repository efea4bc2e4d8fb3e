//! A binary object marshaller for a distributed in-memory data grid:
//! length-free, self-describing, handle-table-preserving serialization for
//! reflectively-described objects, with pluggable class resolution across
//! cluster nodes (spec.md §1–§9).
//!
//! The wire format, the capability taxonomy (`Serializable`/`Enum`/
//! `Externalizable`/`MarshalAware`), the field-indexing footer and the
//! concurrent descriptor cache are all described in `spec.md`; this crate
//! is one concrete, idiomatic-Rust implementation of that contract.
//!
//! ```no_run
//! use lattice_marshal::{Marshaller, MarshallerOptions, TypeRegistry};
//!
//! let marshaller = Marshaller::new(MarshallerOptions::default())?;
//! let registry = TypeRegistry::new();
//! // let bytes = marshaller.marshal(&my_value)?;
//! // let back: MyType = marshaller.unmarshal(&bytes, &registry)?;
//! # Ok::<(), lattice_marshal::Error>(())
//! ```

// Lets `#[derive(Marshal)]`'s generated code refer to `lattice_marshal::...`
// paths uniformly, whether the derive is used from a downstream crate or
// (as in this crate's own tests) on a type defined right here.
extern crate self as lattice_marshal;

mod buffer;
mod config;
mod descriptor_cache;
mod error;
mod handle_table;
mod indexing;
mod input;
mod marshaller;
mod object;
mod output;
mod pool;
mod reflect;
mod registry;
mod tag;
mod wire;

pub use config::{MarshallerOptions, MarshallerOptionsBuilder, ProtocolVersion};
pub use descriptor_cache::{DescriptorCache, LoaderId};
pub use error::{Error, Result};
pub use indexing::{FieldSchemaPublisher, IndexingHandler, Value};
pub use input::InputStream;
pub use marshaller::Marshaller;
pub use object::{Externalizable, Marshal, MarshalAware, Reflected};
pub use output::OutputStream;
pub use reflect::{Capability, Descriptor, DescriptorFlags, FieldDescriptor};
pub use registry::{ClassResolver, MarshalFactory, MarshallerContext, TypeRegistry};
pub use tag::{FieldKind, IdMapper, Tag};
pub use wire::{ArrayList, Aware, ClassRef, Ext, LinkedList, ObjectArray, Timestamp, Wire};

/// Derives [`Marshal`] and [`Reflected`] for a struct or enum, generating
/// the field table, schema checksum inputs and `write_fields`/
/// `allocate_and_read` bodies spec.md §3/§4.C require. See
/// `lattice-marshal-derive` for the attributes it recognizes
/// (`#[marshal(skip)]`, `#[marshal(persistent_fields = [...])]`,
/// `#[marshal(extends = Base)]`).
pub use lattice_marshal_derive::Marshal;
