//! String-keyed mutual exclusion.
//!
//! # Responsibilities
//! - Serialize writers of the same resource (upload targets, extraction
//!   targets, first-time certificate loads) by an arbitrary string key
//! - Let unrelated keys proceed fully concurrently
//!
//! # Design Decisions
//! - One mutex/condvar pair over a set of held keys; release broadcasts,
//!   since any waiter may be waiting on a different key
//! - Blocking by design: call sites run on blocking threads
//! - Not reentrant: acquiring a key the caller already holds deadlocks

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

/// A mutual-exclusion primitive indexed by string key.
///
/// `acquire` blocks until the key is free and returns a guard that releases
/// the key when dropped. Distinct keys never block each other. The table is
/// empty whenever no guard is alive.
#[derive(Debug, Default)]
pub struct KeyedLock {
    held: Mutex<HashSet<String>>,
    freed: Condvar,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: the protected set stays consistent even if a
    // holder panicked, and this primitive has no failure mode to surface.
    fn table(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until `key` is free, then hold it until the guard drops.
    ///
    /// Must not be called with a key the caller already holds.
    pub fn acquire(&self, key: &str) -> KeyedGuard<'_> {
        let mut held = self.table();
        while held.contains(key) {
            held = self
                .freed
                .wait(held)
                .unwrap_or_else(|e| e.into_inner());
        }
        held.insert(key.to_string());
        KeyedGuard {
            lock: self,
            key: key.to_string(),
        }
    }

    /// Whether some caller currently holds `key`.
    pub fn is_held(&self, key: &str) -> bool {
        self.table().contains(key)
    }

    fn release(&self, key: &str) {
        self.table().remove(key);
        // Broadcast: waiters may be queued on any key.
        self.freed.notify_all();
    }
}

/// Holds one key of a [`KeyedLock`]; releases it on drop.
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    lock: &'a KeyedLock,
    key: String,
}

impl KeyedGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(&self.key);
    }
}
