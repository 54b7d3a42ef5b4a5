use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;
use core::ptr;
use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::CachePadded;

use crate::clock::{Clock, GlobalClock};
use crate::log::OpLog;
use crate::node::{Link, Stamp};
use crate::pool::LinkPool;

/// Shared state for a family of versioned pointer fields: the timestamp
/// authority, the reclamation horizon and the indirection-link pool.
///
/// Every operation runs under a [`Guard`] obtained from here; there is no
/// ambient global state.
pub struct Global<V, C = GlobalClock> {
    clock: C,
    horizon: CachePadded<AtomicI64>,
    pool: LinkPool<V>,
}

impl<V> Global<V, GlobalClock> {
    pub fn new() -> Self {
        Self::with_clock(GlobalClock::new())
    }
}

impl<V> Default for Global<V, GlobalClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C: Clock> Global<V, C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            horizon: CachePadded::new(AtomicI64::new(Stamp::MIN)),
            pool: LinkPool::new(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Global timestamp below which no live or future snapshot will ever
    /// read. Starts below every stamp.
    #[inline]
    pub fn horizon(&self) -> Stamp {
        self.horizon.load(Ordering::SeqCst)
    }

    /// Monotonically raises the horizon. The caller asserts that no live or
    /// future snapshot will request a timestamp at or below `to`.
    pub fn advance_horizon(&self, to: Stamp) {
        self.horizon.fetch_max(to, Ordering::SeqCst);
    }

    /// Starts a logical operation with linearized read semantics.
    pub fn guard(&self) -> Guard<'_, V, C> {
        Guard {
            global: self,
            log: RefCell::new(OpLog::new()),
            snapshot: None,
        }
    }

    /// Starts a logical operation pinned to the current timestamp: every
    /// `load` through the returned guard observes the fields as of now.
    pub fn snapshot(&self) -> Guard<'_, V, C> {
        Guard {
            global: self,
            log: RefCell::new(OpLog::new()),
            snapshot: Some(self.clock.read_stamp()),
        }
    }
}

/// Per-operation context: the operation's value log and its optional
/// snapshot timestamp. Not shared between threads; helpers replaying an
/// operation each hold their own guard over the same recorded log prefix.
pub struct Guard<'g, V, C = GlobalClock> {
    global: &'g Global<V, C>,
    log: RefCell<OpLog>,
    snapshot: Option<Stamp>,
}

impl<'g, V, C: Clock> Guard<'g, V, C> {
    pub fn global(&self) -> &'g Global<V, C> {
        self.global
    }

    #[inline]
    pub fn horizon(&self) -> Stamp {
        self.global.horizon()
    }

    /// The timestamp this operation is pinned to, if it is a snapshot.
    #[inline]
    pub fn snapshot_stamp(&self) -> Option<Stamp> {
        self.snapshot
    }

    #[inline]
    pub fn next_write_stamp(&self) -> Stamp {
        self.global.clock.next_write_stamp()
    }

    /// Rewinds the operation's log for re-execution.
    pub fn restart(&self) {
        self.log.borrow_mut().restart();
    }

    pub(crate) fn commit_value(&self, observed: u128) -> u128 {
        self.log.borrow_mut().commit_value(observed).0
    }

    pub(crate) fn commit_stamp(&self, observed: Stamp) -> Stamp {
        self.log.borrow_mut().commit_stamp(observed).0
    }

    pub(crate) fn new_link(&self) -> *mut Link<V> {
        self.global.pool.new_obj(self.global.horizon())
    }

    pub(crate) fn retire_link(&self, link: *mut Link<V>) {
        self.global.pool.retire(link, self.global.clock.read_stamp());
    }

    pub(crate) fn recycle_link(&self, link: *mut Link<V>) {
        self.global.pool.recycle(link);
    }
}

/// A resolved value handle, valid for the lifetime of the guard it was read
/// under.
pub struct Shared<'g, V> {
    ptr: *mut V,
    _marker: PhantomData<&'g ()>,
}

impl<'g, V> Shared<'g, V> {
    pub(crate) fn new(ptr: *mut V) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    pub fn null() -> Self {
        Self::new(ptr::null_mut())
    }

    #[inline]
    pub fn as_raw(&self) -> *mut V {
        self.ptr
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// # Safety
    ///
    /// The value must still be live; the embedding structure's reclamation
    /// discipline guarantees this for values read under a guard.
    #[inline]
    pub unsafe fn as_ref(&self) -> Option<&'g V> {
        self.ptr.as_ref()
    }

    /// # Safety
    ///
    /// The handle must be non-null and the value live.
    #[inline]
    pub unsafe fn deref(&self) -> &'g V {
        &*self.ptr
    }
}

impl<'g, V> Clone for Shared<'g, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'g, V> Copy for Shared<'g, V> {}

impl<'g, V> PartialEq for Shared<'g, V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<'g, V> Eq for Shared<'g, V> {}

impl<'g, V> fmt::Debug for Shared<'g, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:p})", self.ptr)
    }
}
