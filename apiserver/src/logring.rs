//! Fixed-capacity ring of the most recent error messages.
//!
//! User-facing handlers append the human-readable reason for every failed
//! request; the oldest entry is evicted once the ring is full.  Entries are
//! returned oldest-first, so reading the last N yields them in the order they
//! happened.

use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug)]
pub struct LogRing {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn append<S: Into<String>>(&self, message: S) {
        // A poisoned lock still guards a valid ring; keep accepting entries.
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(message.into());
    }

    /// Returns up to `min(n, len)` of the newest entries, oldest-first.
    pub fn read_last_n(&self, n: usize) -> Vec<String> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_returns_newest_entries_oldest_first() {
        let ring = LogRing::new(8);
        ring.append("one");
        ring.append("two");
        ring.append("three");

        assert_eq!(ring.read_last_n(2), ["two", "three"]);
        assert_eq!(ring.read_last_n(10), ["one", "two", "three"]);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let ring = LogRing::new(3);
        for i in 0..5 {
            ring.append(format!("msg{}", i));
        }

        assert_eq!(ring.read_last_n(10), ["msg2", "msg3", "msg4"]);
    }

    #[test]
    fn read_zero_is_empty() {
        let ring = LogRing::new(3);
        ring.append("msg");
        assert!(ring.read_last_n(0).is_empty());
    }
}
