//! Stream registry (component G): reusable `ByteWriter`/`ByteReader`
//! scratch buffers, either one per thread or drawn from a bounded shared
//! pool, per spec.md §4.G / §5.
//!
//! `cilium` itself never pools its byte cursors — assemblies are read once
//! and dropped — so there is no direct teacher analogue for the bounded
//! mode; it is grounded instead on `dotscope`'s `crossbeam-channel`
//! dependency (`examples/pmikstacki-bsharp/src/vendor/dotscope`), the
//! sibling crate in this pack that actually reaches for a bounded,
//! blocking-handoff channel for shared resource pools.

use std::cell::RefCell;

use crossbeam_channel::{Receiver, Sender};

use crate::buffer::ByteWriter;

/// Buffers larger than this are reallocated smaller on release rather than
/// kept at their high-water mark (spec.md §4.G default).
const SOFT_CAP_BYTES: usize = 512 * 1024;

thread_local! {
	static THREAD_LOCAL_WRITER: RefCell<Option<ByteWriter>> = const { RefCell::new(None) };
}

/// One checked-out write buffer. Returned to its owning pool (or back to
/// the thread-local slot) when dropped, so a panicking or early-returning
/// caller never leaks or poisons the registry — spec.md §7 "a stream
/// handle is always released on the failing path", enforced here instead
/// of at every call site.
pub struct PooledWriter {
	buf: Option<ByteWriter>,
	origin: Origin,
}

enum Origin {
	ThreadLocal,
	Pool(Sender<ByteWriter>),
}

impl PooledWriter {
	pub fn buffer_mut(&mut self) -> &mut ByteWriter {
		self.buf.as_mut().expect("buffer taken before drop")
	}

	/// Hands the buffer to the caller by value, leaving an empty one behind
	/// to release on drop; used once marshalling has produced its final
	/// byte vector and the scratch buffer itself is no longer needed.
	pub fn take(mut self) -> ByteWriter {
		self.buf.take().expect("buffer taken before drop")
	}
}

impl Drop for PooledWriter {
	fn drop(&mut self) {
		let Some(mut buf) = self.buf.take() else { return };
		buf.reset(SOFT_CAP_BYTES);
		match &self.origin {
			Origin::ThreadLocal => {
				THREAD_LOCAL_WRITER.with(|slot| *slot.borrow_mut() = Some(buf));
			}
			Origin::Pool(sender) => {
				// The pool was sized to exactly `pool_size` live buffers;
				// a send here can never block on a full channel.
				let _ = sender.send(buf);
			}
		}
	}
}

/// The stream registry itself: either per-thread (`pool_size == 0`) or a
/// bounded, blocking-handoff pool (`pool_size > 0`), per spec.md §4.G.
pub enum StreamRegistry {
	ThreadLocal,
	Bounded { acquire: Receiver<ByteWriter>, release: Sender<ByteWriter> },
}

impl StreamRegistry {
	/// `pool_size == 0` selects the never-blocking thread-local mode;
	/// otherwise a bounded channel is pre-filled with `pool_size` empty
	/// buffers so `acquire` blocks only when every buffer is checked out.
	pub fn new(pool_size: u32) -> StreamRegistry {
		if pool_size == 0 {
			return StreamRegistry::ThreadLocal;
		}
		let (release, acquire) = crossbeam_channel::bounded(pool_size as usize);
		for _ in 0..pool_size {
			release.send(ByteWriter::new()).expect("freshly bounded channel has capacity");
		}
		StreamRegistry::Bounded { acquire, release }
	}

	/// Checks out a write buffer, blocking indefinitely in bounded mode
	/// until one is released (spec.md §5: "`acquire` in pooled mode may
	/// block indefinitely by design").
	pub fn acquire(&self) -> PooledWriter {
		match self {
			StreamRegistry::ThreadLocal => {
				let buf = THREAD_LOCAL_WRITER.with(|slot| slot.borrow_mut().take()).unwrap_or_default();
				PooledWriter { buf: Some(buf), origin: Origin::ThreadLocal }
			}
			StreamRegistry::Bounded { acquire, release } => {
				let buf = acquire.recv().expect("release sender kept alive by this StreamRegistry");
				PooledWriter { buf: Some(buf), origin: Origin::Pool(release.clone()) }
			}
		}
	}
}
