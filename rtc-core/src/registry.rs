// SPEC_FULL.md §3 TxRegistry invariants and §4.2: a coarse-locked map plus
// a snapshot-then-iterate accessor for the Reaper. Entries are cheap, so a
// single `Mutex<HashMap<..>>` is sufficient (§4.2: "coarse locking is
// sufficient; entries are cheap").

use std::collections::HashMap;
use std::sync::Mutex;

use rtc_net::{OriginId, SessionNonce};

use crate::session::SessionEntry;

type LookupKey = (OriginId, SessionNonce);

#[derive(Default)]
pub struct TxRegistry {
    inner: Mutex<HashMap<LookupKey, SessionEntry>>,
}

impl TxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: LookupKey) -> Option<SessionEntry> {
        self.inner.lock().unwrap().get(&key).copied()
    }

    /// Invariant 3 (§3): only called from `begin`, inside the swap
    /// protocol's `enter`.
    pub fn insert(&self, key: LookupKey, entry: SessionEntry) {
        self.inner.lock().unwrap().insert(key, entry);
    }

    /// Invariant 3 (§3): only called from `finish`, inside `leave`'s
    /// commit/rollback branches.
    pub fn remove(&self, key: LookupKey) -> Option<SessionEntry> {
        self.inner.lock().unwrap().remove(&key)
    }

    pub fn set_last_activity(&self, key: LookupKey, millis: rtc_base::Millis) {
        if let Some(entry) = self.inner.lock().unwrap().get_mut(&key) {
            entry.last_activity = millis;
        }
    }

    pub fn contains(&self, key: LookupKey) -> bool {
        self.inner.lock().unwrap().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compare-and-remove: removes `key` only if its current entry is still
    /// exactly `expected`. Used by the Reaper so a session that was resumed
    /// (or reaped already) between the snapshot and the reclamation attempt
    /// is left alone instead of being torn out from under its new owner.
    pub fn remove_if_unchanged(&self, key: LookupKey, expected: SessionEntry) -> bool {
        let mut guard = self.inner.lock().unwrap();
        match guard.get(&key) {
            Some(entry) if *entry == expected => {
                guard.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Invariant 4 (§3): copy out under the lock, then hand back an owned
    /// snapshot so the caller (the Reaper) can inspect entries and call
    /// back into RTC without holding the registry's monitor across
    /// `LocalTxManager`/`LockService` calls (§5).
    pub fn snapshot(&self) -> Vec<(LookupKey, SessionEntry)> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect()
    }
}
