//! Multi-versioned pointer fields for lock-free data structures.
//!
//! A [`VersionedPtr`] is one atomic word that supports two access modes at
//! once: ordinary linearized reads and writes, and consistent snapshot reads
//! pinned to a logical timestamp. Each write pushes the old head onto a
//! backward version chain stamped with write timestamps; snapshot readers
//! walk the chain to the entry their timestamp admits, while writers and
//! linearized readers never block. Obsolete chain metadata is spliced out
//! and recycled once the global reclamation horizon passes it.
//!
//! All coordination is CAS on the field word, which carries an ABA tag and
//! three mark bits next to the payload address. There is no ambient global
//! state: operations run under a [`Guard`] obtained from a [`Global`].
//!
//! ```
//! use mvptr::{Global, VersionMeta, Versioned, VersionedPtr};
//!
//! struct Node {
//!     meta: VersionMeta,
//!     key: u64,
//! }
//!
//! impl Versioned for Node {
//!     fn meta(&self) -> &VersionMeta {
//!         &self.meta
//!     }
//! }
//!
//! let global = Global::new();
//! let field = VersionedPtr::null();
//! let a = Box::into_raw(Box::new(Node { meta: VersionMeta::new(), key: 1 }));
//!
//! let guard = global.guard();
//! assert!(field.store(a, &guard));
//! assert_eq!(unsafe { field.read_linearized(&guard).deref() }.key, 1);
//!
//! // A snapshot taken now keeps seeing `a` past later stores.
//! let snap = global.snapshot();
//! let b = Box::into_raw(Box::new(Node { meta: VersionMeta::new(), key: 2 }));
//! assert!(field.store(b, &guard));
//! assert_eq!(unsafe { field.load(&snap).deref() }.key, 1);
//! assert_eq!(unsafe { field.load(&guard).deref() }.key, 2);
//! # unsafe { drop(Box::from_raw(a)); drop(Box::from_raw(b)); }
//! ```

mod clock;
mod guard;
mod log;
mod node;
mod pool;
mod ptr;
mod tag;

pub use clock::{Clock, GlobalClock};
pub use guard::{Global, Guard, Shared};
pub use log::OpLog;
pub use node::{Link, Stamp, VersionMeta, Versioned, TBD};
pub use pool::LinkPool;
pub use ptr::VersionedPtr;
pub use tag::{AtomicWord, Marks, TaggedWord, TAG_BITS};
