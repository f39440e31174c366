// SPEC_FULL.md §3: SessionKey / SessionEntry data model, and §4.7's
// per-entry state machine.

use rtc_base::Millis;
use rtc_net::{EventSeq, OriginId, ResourceName, SessionNonce, TxId};

/// Value-equal identity of one remote transaction. Two keys with equal
/// fields denote the same session; `watermarks` is part of identity only
/// in the sense that the caller echoes back whatever it last saw, it does
/// not participate in session lookup (see `lookup_key`).
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct SessionKey {
    pub origin_id: OriginId,
    pub session_nonce: SessionNonce,
    pub event_seq: EventSeq,
    pub watermarks: Vec<(ResourceName, TxId)>,
}

impl SessionKey {
    /// The stateless-query constant: no watermarks, used by callers that
    /// don't carry a remote transaction identity (`allocate_ids`,
    /// `get_master_id_for_committed_tx`).
    pub fn empty() -> Self {
        SessionKey {
            origin_id: OriginId(0),
            session_nonce: SessionNonce(0),
            event_seq: EventSeq(0),
            watermarks: Vec::new(),
        }
    }

    pub fn new(origin_id: OriginId, session_nonce: SessionNonce, event_seq: EventSeq) -> Self {
        SessionKey {
            origin_id,
            session_nonce,
            event_seq,
            watermarks: Vec::new(),
        }
    }

    /// The part of the key that identifies the registry slot. Two requests
    /// that differ only in `event_seq` or in the watermarks they carry
    /// still name the same `TxRegistry` entry: the registry is keyed by
    /// (origin, nonce), the session's lifetime identity, while `event_seq`
    /// and `watermarks` vary request to request.
    pub fn lookup_key(&self) -> (OriginId, SessionNonce) {
        (self.origin_id, self.session_nonce)
    }

    pub fn watermark_for(&self, resource: &str) -> Option<TxId> {
        self.watermarks
            .iter()
            .find(|(name, _)| name == resource)
            .map(|(_, txid)| *txid)
    }
}

/// A local transaction handle, opaque to RTC. `LocalTxManager` issues and
/// consumes these; RTC only compares them for equality (§4.1 step 3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TxHandle(pub u64);

/// SPEC_FULL.md §3 `SessionEntry` and §4.7 state machine. `Executing` and
/// `Idle` are represented by `last_activity`; there is no explicit
/// `Terminated` variant because a terminated entry is simply absent from
/// the registry (invariant 3 in §3: inserted only in `begin`, removed only
/// in `finish`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionEntry {
    pub handle: TxHandle,
    pub last_activity: Millis,
}

impl SessionEntry {
    pub fn new_executing(handle: TxHandle) -> Self {
        SessionEntry {
            handle,
            last_activity: Millis::SUSPENDED_ZERO,
        }
    }

    pub fn is_executing(&self) -> bool {
        self.last_activity.is_suspended()
    }

    pub fn idle_for(&self, now: Millis) -> Option<i64> {
        if self.is_executing() {
            None
        } else {
            Some(now.saturating_sub(self.last_activity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_key_ignores_event_seq_and_watermarks() {
        let mut a = SessionKey::new(OriginId(1), SessionNonce(2), EventSeq(3));
        let mut b = SessionKey::new(OriginId(1), SessionNonce(2), EventSeq(99));
        a.watermarks.push(("neostore".to_string(), TxId(5)));
        b.watermarks.push(("other".to_string(), TxId(6)));
        assert_eq!(a.lookup_key(), b.lookup_key());
    }

    #[test]
    fn entry_state_transitions() {
        let e = SessionEntry::new_executing(TxHandle(1));
        assert!(e.is_executing());
        assert_eq!(e.idle_for(Millis(100)), None);

        let idle = SessionEntry {
            handle: TxHandle(1),
            last_activity: Millis(40),
        };
        assert!(!idle.is_executing());
        assert_eq!(idle.idle_for(Millis(100)), Some(60));
    }

    #[test]
    fn watermark_lookup() {
        let mut k = SessionKey::empty();
        k.watermarks.push(("neostore".to_string(), TxId(10)));
        assert_eq!(k.watermark_for("neostore"), Some(TxId(10)));
        assert_eq!(k.watermark_for("other"), None);
    }
}
