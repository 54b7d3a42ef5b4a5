use core::ptr;

use crate::clock::Clock;
use crate::guard::{Guard, Shared};
use crate::node::{decode, entry_meta, resolve, Decoded, Stamp, Versioned, TBD};
use crate::tag::{AtomicWord, Marks, TaggedWord};

/// A lock-free, multi-versioned pointer field.
///
/// The field is one atomic word: payload address, ABA tag and three mark
/// bits. Behind the current head hangs a backward chain of older versions,
/// each stamped with its write timestamp, so snapshot readers pinned to a
/// timestamp observe the field as of that instant while linearized readers
/// and writers proceed unblocked.
///
/// The field does not own its chain: values belong to the embedding
/// structure, indirection links to the pool.
pub struct VersionedPtr<V> {
    word: AtomicWord<V>,
}

unsafe impl<V: Send + Sync> Send for VersionedPtr<V> {}
unsafe impl<V: Send + Sync> Sync for VersionedPtr<V> {}

impl<V: Versioned> VersionedPtr<V> {
    pub fn new(init: *mut V) -> Self {
        Self {
            word: AtomicWord::new(init),
        }
    }

    pub fn null() -> Self {
        Self {
            word: AtomicWord::null(),
        }
    }

    /// Re-initializes the field. Exclusive access only.
    pub fn init(&mut self, v: *mut V) {
        self.word = AtomicWord::new(v);
    }

    /// ABA tag of the current head word.
    pub fn tag(&self) -> u64 {
        self.word.load().tag()
    }

    /// Mark bits of the current head word.
    pub fn marks(&self) -> Marks {
        self.word.load().marks()
    }

    /// Assigns a real write timestamp to a pending head. Safe to race: one
    /// caller's stamp is adopted, the rest observe it. The mark test skips
    /// reading the stamp once the pending mark is known to be gone.
    fn finalize<C: Clock>(word: TaggedWord<V>, guard: &Guard<V, C>) {
        if word.marks().contains(Marks::PENDING) {
            if let Some(meta) = unsafe { entry_meta(word) } {
                if meta.stamp() == TBD {
                    let stamp = guard.next_write_stamp();
                    meta.try_finalize(stamp);
                }
            }
        }
    }

    /// Current head, committed through the operation's log and finalized.
    fn committed_head<C: Clock>(&self, guard: &Guard<V, C>) -> TaggedWord<V> {
        let word = TaggedWord::from_raw(guard.commit_value(self.word.load().into_raw()));
        Self::finalize(word, guard);
        word
    }

    /// Reads with the semantics the guard was created with: pinned to the
    /// guard's snapshot timestamp if it has one, linearized otherwise.
    pub fn load<'g, C: Clock>(&self, guard: &'g Guard<'_, V, C>) -> Shared<'g, V> {
        match guard.snapshot_stamp() {
            Some(at) => self.read_snapshot(at, guard),
            None => self.read_linearized(guard),
        }
    }

    /// Returns the most recently fully published value. A pending head is
    /// finalized first, so no half-published value is ever returned.
    pub fn read_linearized<'g, C: Clock>(&self, guard: &'g Guard<'_, V, C>) -> Shared<'g, V> {
        let word = self.committed_head(guard);
        Shared::new(unsafe { resolve(word) })
    }

    /// Returns the value the field held at timestamp `at`. Stable: repeated
    /// calls with the same `at` return the same value regardless of
    /// concurrent writers, whose entries all carry stamps greater than `at`.
    pub fn read_snapshot<'g, C: Clock>(
        &self,
        at: Stamp,
        guard: &'g Guard<'_, V, C>,
    ) -> Shared<'g, V> {
        let mut word = self.word.load();
        Self::finalize(word, guard);
        // Entries below the head were finalized when the store that replaced
        // them captured the field, so their stamps can be trusted as-is.
        // TBD on an initial entry reads as -1, older than every snapshot.
        while let Some(meta) = unsafe { entry_meta(word) } {
            if meta.stamp() <= at {
                break;
            }
            word = meta.older();
        }
        Shared::new(unsafe { resolve(word) })
    }

    /// Linearized read that also tries to splice an obsolete indirection out
    /// of the head, keeping chains short. The splice is advisory; losing its
    /// CAS is fine.
    pub fn read_and_reclaim<'g, C: Clock>(&self, guard: &'g Guard<'_, V, C>) -> Shared<'g, V> {
        let word = self.word.load();
        Self::finalize(word, guard);
        Shared::new(self.splice(word, guard))
    }

    /// Resolves the current head without finalizing or walking. Only for
    /// callers that do not care about the head's timestamp.
    pub fn read_raw<'g, C: Clock>(&self, _guard: &'g Guard<'_, V, C>) -> Shared<'g, V> {
        Shared::new(unsafe { resolve(self.word.load()) })
    }

    /// Finalizes the current head's timestamp without reading the value.
    pub fn validate<C: Clock>(&self, guard: &Guard<V, C>) {
        Self::finalize(self.word.load(), guard);
    }

    /// Once the horizon has passed an indirection's stamp, no reader will
    /// ever need the indirection again: replace the head with the unwrapped
    /// payload, tag preserved so no concurrent publish is overwritten, and
    /// retire the link.
    fn splice<C: Clock>(&self, word: TaggedWord<V>, guard: &Guard<V, C>) -> *mut V {
        if let Decoded::Indirect(link) | Decoded::IndirectNull(link) = decode(word) {
            let stamp = unsafe { &(*link).meta }.stamp();
            if stamp <= guard.horizon() {
                let unwrapped = if word.marks().contains(Marks::WRAPPED_NULL) {
                    ptr::null_mut()
                } else {
                    unsafe { (*link).value }
                };
                if self
                    .word
                    .compare_exchange_same_tag(word, unwrapped, Marks::empty())
                {
                    guard.retire_link(link);
                }
                return unwrapped;
            }
        }
        unsafe { resolve(word) }
    }

    /// Publishes `new` as the field's head, keeping the old head as an
    /// older, eventually reclaimable version.
    ///
    /// Returns false if a genuinely concurrent store won the publish race;
    /// the retry policy belongs to the caller. A concurrent splice or mark
    /// rewrite is absorbed internally.
    pub fn store<C: Clock>(&self, new: *mut V, guard: &Guard<V, C>) -> bool {
        let old = self.committed_head(guard);

        // A value that cannot host fresh chain metadata gets an indirection
        // link: null has nowhere to put it, and a value whose stamp is
        // already finalized is serving as an earlier chain entry. The stamp
        // test goes through the log so a replay decides identically.
        let (payload, marks, wrap) = if new.is_null() {
            let link = guard.new_link();
            unsafe { (*link).value = ptr::null_mut() };
            (
                link.cast::<V>(),
                Marks::INDIRECT | Marks::WRAPPED_NULL,
                Some(link),
            )
        } else {
            let seen = guard.commit_stamp(unsafe { (*new).meta() }.stamp());
            if seen != TBD {
                let link = guard.new_link();
                unsafe { (*link).value = new };
                (link.cast::<V>(), Marks::INDIRECT, Some(link))
            } else {
                (new, Marks::empty(), None)
            }
        };

        // Build the entry before it is visible.
        let meta = match wrap {
            Some(link) => unsafe { &(*link).meta },
            None => unsafe { (*new).meta() },
        };
        meta.mark_pending();
        meta.set_older(old);

        let pending = marks | Marks::PENDING;
        let published = match self.word.compare_exchange(old, payload, pending) {
            Ok(word) => Some(word),
            Err(actual) if actual.tag() == old.tag() => {
                // Same tag, different representation: a splice unwrapped the
                // old head, or its pending mark was cleared. Same logical
                // value either way; retry once against the refreshed word.
                let refreshed = TaggedWord::from_raw(guard.commit_value(actual.into_raw()));
                self.word.compare_exchange(refreshed, payload, pending).ok()
            }
            Err(_) => None,
        };

        let word = match published {
            Some(word) => word,
            None => {
                // A genuine concurrent store won; nothing was published.
                if let Some(link) = wrap {
                    guard.recycle_link(link);
                }
                return false;
            }
        };

        Self::finalize(word, guard);
        self.word.clear_marks(word, Marks::PENDING);

        // Two entries forced to share a write stamp collapse into one:
        // copy the old head's older link forward.
        if let Some(old_meta) = unsafe { entry_meta(old) } {
            if meta.stamp() == old_meta.stamp() {
                meta.set_older(old_meta.older::<V>());
            }
        }
        true
    }
}
