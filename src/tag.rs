use core::fmt;
use core::marker::PhantomData;
use std::sync::atomic::Ordering;

use bitflags::bitflags;
use portable_atomic::AtomicU128;

bitflags! {
    /// Mark bits stored in a field word next to the payload address.
    pub struct Marks: u64 {
        /// The indirection node stands for null. Implies `INDIRECT`.
        const WRAPPED_NULL = 1;
        /// The payload is an indirection node, not a direct value.
        const INDIRECT = 2;
        /// The head's timestamp has not been finalized yet.
        const PENDING = 4;
    }
}

const MARK_BITS: u32 = 3;
const MARK_MASK: u64 = (1 << MARK_BITS) - 1;

/// Width of the ABA tag component.
pub const TAG_BITS: u32 = 64 - MARK_BITS;

/// One decomposed field word: payload address, ABA tag and mark bits.
///
/// The low 64 bits carry the address verbatim, so payloads need no spare
/// alignment bits; marks and the wrapping 61-bit tag live in the high half.
pub struct TaggedWord<V> {
    raw: u128,
    _marker: PhantomData<*mut V>,
}

impl<V> TaggedWord<V> {
    #[inline]
    pub fn pack(ptr: *mut V, tag: u64, marks: Marks) -> Self {
        let meta = (tag << MARK_BITS) | marks.bits();
        Self {
            raw: ((meta as u128) << 64) | (ptr as usize as u128),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn from_raw(raw: u128) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn into_raw(self) -> u128 {
        self.raw
    }

    #[inline]
    pub fn ptr(self) -> *mut V {
        (self.raw & u64::MAX as u128) as usize as *mut V
    }

    #[inline]
    pub fn tag(self) -> u64 {
        ((self.raw >> 64) as u64) >> MARK_BITS
    }

    #[inline]
    pub fn marks(self) -> Marks {
        Marks::from_bits_truncate((self.raw >> 64) as u64 & MARK_MASK)
    }
}

impl<V> Clone for TaggedWord<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for TaggedWord<V> {}

impl<V> PartialEq for TaggedWord<V> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<V> Eq for TaggedWord<V> {}

impl<V> fmt::Debug for TaggedWord<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{:p}, {}, {:?}>",
            self.ptr(),
            self.tag(),
            self.marks()
        )
    }
}

/// The atomic word backing one versioned pointer field.
pub struct AtomicWord<V> {
    word: AtomicU128,
    _marker: PhantomData<*mut V>,
}

unsafe impl<V> Send for AtomicWord<V> {}
unsafe impl<V> Sync for AtomicWord<V> {}

impl<V> AtomicWord<V> {
    #[inline]
    pub fn new(ptr: *mut V) -> Self {
        Self {
            word: AtomicU128::new(TaggedWord::pack(ptr, 0, Marks::empty()).into_raw()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn null() -> Self {
        Self::new(core::ptr::null_mut())
    }

    #[inline]
    pub fn load(&self) -> TaggedWord<V> {
        TaggedWord::from_raw(self.word.load(Ordering::SeqCst))
    }

    /// Publish CAS. On success installs `new_ptr`/`new_marks` with the tag
    /// advanced by one and returns the installed word; on failure returns the
    /// actual word. Every successful publish advances the ABA tag, so a
    /// comparator can tell a reused address from an unchanged value.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: TaggedWord<V>,
        new_ptr: *mut V,
        new_marks: Marks,
    ) -> Result<TaggedWord<V>, TaggedWord<V>> {
        let next = TaggedWord::pack(new_ptr, current.tag().wrapping_add(1), new_marks);
        match self.word.compare_exchange(
            current.into_raw(),
            next.into_raw(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(next),
            Err(actual) => Err(TaggedWord::from_raw(actual)),
        }
    }

    /// Tag-preserving CAS for representation-only rewrites (splicing an
    /// indirection out, clearing a mark). Succeeds only if the word is still
    /// exactly `current`; the installed word keeps `current`'s tag, so a
    /// concurrent publisher comparing tags treats the rewrite as benign.
    #[inline]
    pub fn compare_exchange_same_tag(
        &self,
        current: TaggedWord<V>,
        new_ptr: *mut V,
        new_marks: Marks,
    ) -> bool {
        let next = TaggedWord::pack(new_ptr, current.tag(), new_marks);
        self.word
            .compare_exchange(
                current.into_raw(),
                next.into_raw(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Clears `clear` from the mark bits without advancing the tag.
    #[inline]
    pub fn clear_marks(&self, current: TaggedWord<V>, clear: Marks) -> bool {
        self.compare_exchange_same_tag(current, current.ptr(), current.marks() - clear)
    }
}
