use crate::node::Stamp;

/// Per-operation value log.
///
/// The first execution of a logical operation records every field word it
/// commits, in order. When the operation is re-executed (a helper replaying
/// it, or the owner retrying after `restart`), `commit_value` returns the
/// recorded words position by position, regardless of what the replay just
/// observed — all executions of one operation agree on every committed value.
pub struct OpLog {
    committed: Vec<u128>,
    at: usize,
}

impl OpLog {
    pub fn new() -> Self {
        Self {
            committed: Vec::new(),
            at: 0,
        }
    }

    /// Commits the next value. Returns the authoritative word and whether it
    /// had already been recorded by an earlier execution.
    pub fn commit_value(&mut self, observed: u128) -> (u128, bool) {
        if self.at < self.committed.len() {
            let recorded = self.committed[self.at];
            self.at += 1;
            (recorded, true)
        } else {
            self.committed.push(observed);
            self.at += 1;
            (observed, false)
        }
    }

    /// `commit_value` for timestamps.
    pub fn commit_stamp(&mut self, observed: Stamp) -> (Stamp, bool) {
        let (recorded, hit) = self.commit_value(observed as u128);
        (recorded as Stamp, hit)
    }

    /// Rewinds to the first position; the next execution replays the
    /// recorded values.
    pub fn restart(&mut self) {
        self.at = 0;
    }

    /// Forgets everything; the log is ready for a new logical operation.
    pub fn clear(&mut self) {
        self.committed.clear();
        self.at = 0;
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

impl Default for OpLog {
    fn default() -> Self {
        Self::new()
    }
}
