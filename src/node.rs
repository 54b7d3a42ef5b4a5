use core::ptr;
use std::sync::atomic::{AtomicI64, Ordering};

use portable_atomic::AtomicU128;

use crate::tag::{Marks, TaggedWord};

/// A logical write timestamp.
pub type Stamp = i64;

/// Timestamp of an entry whose write has not been finalized yet.
///
/// TBD also orders below every real stamp, which lets a value installed at
/// construction time (never published by a `store`) act as "older than every
/// snapshot" without a special case in the chain walk.
pub const TBD: Stamp = -1;

/// Chain metadata carried by every value that can appear in a version chain:
/// a finalize-once timestamp and a link to the next-older entry.
///
/// The older link holds the full tagged word of the previous head, marks and
/// tag included, exactly as it was captured by the replacing `store`.
pub struct VersionMeta {
    stamp: AtomicI64,
    older: AtomicU128,
}

impl VersionMeta {
    pub fn new() -> Self {
        Self {
            stamp: AtomicI64::new(TBD),
            older: AtomicU128::new(0),
        }
    }

    #[inline]
    pub fn stamp(&self) -> Stamp {
        self.stamp.load(Ordering::SeqCst)
    }

    /// Finalization is one-way: TBD -> `at`, never reversed. Racing callers
    /// all observe the single adopted value.
    #[inline]
    pub(crate) fn try_finalize(&self, at: Stamp) -> Stamp {
        match self
            .stamp
            .compare_exchange(TBD, at, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => at,
            Err(adopted) => adopted,
        }
    }

    #[inline]
    pub(crate) fn mark_pending(&self) {
        self.stamp.store(TBD, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn older<V>(&self) -> TaggedWord<V> {
        TaggedWord::from_raw(self.older.load(Ordering::SeqCst))
    }

    #[inline]
    pub(crate) fn set_older<V>(&self, word: TaggedWord<V>) {
        self.older.store(word.into_raw(), Ordering::SeqCst);
    }
}

impl Default for VersionMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// A value that can serve as its own version-chain entry.
pub trait Versioned {
    fn meta(&self) -> &VersionMeta;
}

/// Indirection node: hosts chain metadata for a value that cannot carry it
/// itself — null, or a value whose own metadata is already in use as an
/// earlier chain entry.
pub struct Link<V> {
    pub(crate) meta: VersionMeta,
    pub(crate) value: *mut V,
}

unsafe impl<V> Send for Link<V> {}
unsafe impl<V> Sync for Link<V> {}

impl<V> Link<V> {
    pub(crate) fn new() -> Self {
        Self {
            meta: VersionMeta::new(),
            value: ptr::null_mut(),
        }
    }
}

/// Structural decomposition of a word's payload. This is the only place a
/// payload address is reinterpreted as an indirection node.
pub(crate) enum Decoded<V> {
    Direct(*mut V),
    Indirect(*mut Link<V>),
    IndirectNull(*mut Link<V>),
}

#[inline]
pub(crate) fn decode<V>(word: TaggedWord<V>) -> Decoded<V> {
    let marks = word.marks();
    if marks.contains(Marks::WRAPPED_NULL) {
        Decoded::IndirectNull(word.ptr().cast())
    } else if marks.contains(Marks::INDIRECT) {
        Decoded::Indirect(word.ptr().cast())
    } else {
        Decoded::Direct(word.ptr())
    }
}

/// Chain metadata of the entry a word points at, if any.
///
/// # Safety
///
/// The word must reference a live chain entry, or carry a null payload.
#[inline]
pub(crate) unsafe fn entry_meta<'a, V: Versioned + 'a>(word: TaggedWord<V>) -> Option<&'a VersionMeta> {
    if word.ptr().is_null() {
        return None;
    }
    Some(match decode(word) {
        Decoded::Direct(v) => (*v).meta(),
        Decoded::Indirect(link) | Decoded::IndirectNull(link) => &(*link).meta,
    })
}

/// Resolves a word to the value it stands for.
///
/// # Safety
///
/// If the word is marked indirect, its indirection node must be live.
#[inline]
pub(crate) unsafe fn resolve<V>(word: TaggedWord<V>) -> *mut V {
    match decode(word) {
        Decoded::Direct(v) => v,
        Decoded::IndirectNull(_) => ptr::null_mut(),
        Decoded::Indirect(link) => (*link).value,
    }
}
