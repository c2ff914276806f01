//! Per-document exclusive sections
//!
//! Writers to the same `_id` serialize; writers to different ids only
//! share the brief table lock. Readers never take these locks.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
pub(crate) struct DocumentLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `id` is free, then hold it until the guard drops
    pub fn lock(&self, id: &str) -> DocumentGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        while held.contains(id) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|e| e.into_inner());
        }
        held.insert(id.to_string());
        DocumentGuard {
            locks: self,
            id: id.to_string(),
        }
    }

    /// Number of documents currently held
    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Exclusive section for one document
#[derive(Debug)]
pub(crate) struct DocumentGuard<'a> {
    locks: &'a DocumentLocks,
    id: String,
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = DocumentLocks::new();
        {
            let _a = locks.lock("a");
            let _b = locks.lock("b");
            assert_eq!(locks.held_count(), 2);
        }
        assert_eq!(locks.held_count(), 0);
    }

    #[test]
    fn test_same_id_is_exclusive() {
        let locks = Arc::new(DocumentLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _guard = locks.lock("doc");
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(locks.held_count(), 0);
    }
}
