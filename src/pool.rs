use crossbeam_queue::SegQueue;

use crate::node::{Link, Stamp};

/// Allocator and recycler for indirection links.
///
/// A spliced-out link may still be reached through older-chain words by
/// snapshot walks that were live when it was retired, so retirement seals the
/// link with the clock value at retire time and reuse waits until the
/// reclamation horizon has passed the seal. ABA on the field word itself is
/// excluded by the tag, not by this deferral.
pub struct LinkPool<V> {
    free: SegQueue<*mut Link<V>>,
    retired: SegQueue<(*mut Link<V>, Stamp)>,
    all: SegQueue<*mut Link<V>>,
}

unsafe impl<V> Send for LinkPool<V> {}
unsafe impl<V> Sync for LinkPool<V> {}

impl<V> LinkPool<V> {
    pub fn new() -> Self {
        Self {
            free: SegQueue::new(),
            retired: SegQueue::new(),
            all: SegQueue::new(),
        }
    }

    /// Returns a fresh, exclusively owned link. Prefers a recycled one whose
    /// seal the horizon has passed.
    pub fn new_obj(&self, horizon: Stamp) -> *mut Link<V> {
        if let Some(link) = self.free.pop() {
            return link;
        }
        if let Some((link, seal)) = self.retired.pop() {
            if seal < horizon {
                return link;
            }
            // Not reclaimable yet; retirement order is roughly stamp order,
            // so nothing behind it is either.
            self.retired.push((link, seal));
        }
        let link = Box::into_raw(Box::new(Link::new()));
        self.all.push(link);
        link
    }

    /// Defers reuse of a spliced-out link until the horizon passes `seal`.
    pub fn retire(&self, link: *mut Link<V>, seal: Stamp) {
        self.retired.push((link, seal));
    }

    /// Takes back a link that was never published.
    pub fn recycle(&self, link: *mut Link<V>) {
        self.free.push(link);
    }
}

impl<V> Default for LinkPool<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for LinkPool<V> {
    fn drop(&mut self) {
        // `all` registers each allocation exactly once, however many times it
        // cycled through `free` and `retired`.
        while let Some(link) = self.all.pop() {
            drop(unsafe { Box::from_raw(link) });
        }
    }
}
