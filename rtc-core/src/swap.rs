// SPEC_FULL.md §4.1: the swap protocol, expressed as an RAII guard (§9,
// Design Note, Option (b)) instead of a manual enter/leave pair. `enter`
// returns a `SwapGuard`; its `Drop` performs `leave(.., Rollback)` unless
// the caller already consumed it via `keep()` or `finish()`, so a thread
// is un-bound on every exit path including an early `?` return or panic
// unwind.
//
// Open question resolved here (see DESIGN.md): §4.1 step 3 as written
// ("if prior == target, return null") would also fire the very first time
// a brand new session is entered on an otherwise-idle thread, since both
// `prior` and `target` are absent. We only take the nested-reentry
// shortcut when both are present and equal; "both absent" takes the
// normal begin/resume path.

use rtc_base::{Clock, Millis};
use rtc_net::{OriginId, SessionNonce};

use crate::collaborators::LocalTxManager;
use crate::error::{Result, RtcError};
use crate::registry::TxRegistry;
use crate::session::{SessionEntry, SessionKey, TxHandle};

type LookupKey = (OriginId, SessionNonce);

/// How a `SwapGuard` should leave the session when it's done.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Outcome {
    Keep,
    Commit,
    Rollback,
}

/// Binds the calling thread to a session's local transaction for the
/// duration of one request. Must be created and dropped on the same
/// thread.
pub struct SwapGuard<'a> {
    local_tx: &'a dyn LocalTxManager,
    registry: &'a TxRegistry,
    clock: &'a dyn Clock,
    key: LookupKey,
    /// `None` when this guard is a no-op nested re-entry (§4.1 step 3):
    /// `finish`/`Drop` must do nothing in that case.
    binding: Option<Binding>,
}

struct Binding {
    prior: Option<TxHandle>,
    target: TxHandle,
    /// Set once `keep`/`commit`/`rollback` has run, so `Drop` doesn't
    /// double-leave.
    left: bool,
}

impl<'a> SwapGuard<'a> {
    /// SPEC_FULL.md §4.1 `enter`.
    pub fn enter(
        local_tx: &'a dyn LocalTxManager,
        registry: &'a TxRegistry,
        clock: &'a dyn Clock,
        session: &SessionKey,
        allow_begin: bool,
    ) -> Result<Self> {
        let key = session.lookup_key();
        let prior = local_tx.current();
        let existing = registry.get(key);
        let target_handle = existing.map(|e| e.handle);

        if let (Some(p), Some(t)) = (prior, target_handle) {
            if p == t {
                tracing::debug!(origin = key.0 .0, nonce = key.1 .0, "swap: nested re-entry, no-op");
                return Ok(SwapGuard {
                    local_tx,
                    registry,
                    clock,
                    key,
                    binding: None,
                });
            }
        }

        if let Some(p) = prior {
            local_tx
                .suspend()
                .map_err(|e| RtcError::Internal(e))?;
            tracing::debug!(origin = key.0 .0, nonce = key.1 .0, ?p, "swap: suspended prior");
        }

        let target = match target_handle {
            Some(h) => {
                local_tx.resume(h).map_err(RtcError::Internal)?;
                h
            }
            None => {
                if !allow_begin {
                    // Undo: put the prior transaction back before failing.
                    if let Some(p) = prior {
                        let _ = local_tx.resume(p);
                    }
                    return Err(RtcError::NoSuchSession);
                }
                let h = local_tx.begin().map_err(RtcError::Internal)?;
                registry.insert(key, SessionEntry::new_executing(h));
                h
            }
        };

        registry.set_last_activity(key, Millis::SUSPENDED_ZERO);
        tracing::debug!(origin = key.0 .0, nonce = key.1 .0, ?target, "swap: entered, Executing");

        Ok(SwapGuard {
            local_tx,
            registry,
            clock,
            key,
            binding: Some(Binding {
                prior,
                target,
                left: false,
            }),
        })
    }

    /// Leave with the session kept alive (`Idle` state): used by every
    /// operation that doesn't finish the transaction.
    pub fn keep(mut self) -> Result<()> {
        self.leave(Outcome::Keep)
    }

    /// Leave by committing (`finishTransaction(success=true)`).
    pub fn commit(mut self) -> Result<()> {
        self.leave(Outcome::Commit)
    }

    /// Leave by rolling back (`finishTransaction(success=false)`, or the
    /// Reaper's reclamation).
    pub fn rollback(mut self) -> Result<()> {
        self.leave(Outcome::Rollback)
    }

    /// The transaction handle this guard is bound to, for callers that
    /// need to pass it to `LockService`/`DataSourceSet`.
    pub fn handle(&self) -> Option<TxHandle> {
        self.binding.as_ref().map(|b| b.target)
    }

    fn leave(&mut self, outcome: Outcome) -> Result<()> {
        let Some(binding) = self.binding.as_mut() else {
            return Ok(());
        };
        if binding.left {
            return Ok(());
        }
        binding.left = true;

        match outcome {
            Outcome::Keep => {
                self.local_tx
                    .suspend()
                    .map_err(RtcError::Internal)?;
                self.registry.set_last_activity(self.key, self.clock.now());
                tracing::debug!(origin = self.key.0 .0, nonce = self.key.1 .0, "swap: left, Idle");
            }
            Outcome::Commit => {
                self.local_tx
                    .commit(binding.target)
                    .map_err(RtcError::Internal)?;
                self.registry.remove(self.key);
                tracing::debug!(origin = self.key.0 .0, nonce = self.key.1 .0, "swap: left, committed");
            }
            Outcome::Rollback => {
                self.local_tx
                    .rollback(binding.target)
                    .map_err(RtcError::Internal)?;
                self.registry.remove(self.key);
                tracing::debug!(origin = self.key.0 .0, nonce = self.key.1 .0, "swap: left, rolled back");
            }
        }

        if let Some(p) = binding.prior {
            self.local_tx.resume(p).map_err(RtcError::Internal)?;
        }

        Ok(())
    }
}

impl<'a> Drop for SwapGuard<'a> {
    fn drop(&mut self) {
        if let Some(binding) = &self.binding {
            if !binding.left {
                // An exit path that didn't explicitly call keep/commit/
                // rollback (an early `?` return, or a panic unwind):
                // default to rollback so the thread is never left bound
                // and the session never silently survives a failed
                // request.
                let _ = self.leave(Outcome::Rollback);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLocalTxManager;
    use rtc_base::FakeClock;
    use rtc_net::EventSeq;

    fn session() -> SessionKey {
        SessionKey::new(OriginId(1), SessionNonce(1), EventSeq(1))
    }

    #[test]
    fn enter_without_existing_session_fails_when_begin_not_allowed() {
        let local_tx = FakeLocalTxManager::new();
        let registry = TxRegistry::new();
        let clock = FakeClock::new(0);
        let err = SwapGuard::enter(&local_tx, &registry, &clock, &session(), false).unwrap_err();
        assert!(matches!(err, RtcError::NoSuchSession));
        assert!(local_tx.current().is_none());
    }

    #[test]
    fn enter_with_begin_creates_executing_entry() {
        let local_tx = FakeLocalTxManager::new();
        let registry = TxRegistry::new();
        let clock = FakeClock::new(0);
        let s = session();

        let guard = SwapGuard::enter(&local_tx, &registry, &clock, &s, true).unwrap();
        assert!(guard.handle().is_some());
        assert_eq!(local_tx.current(), guard.handle());

        let entry = registry.get(s.lookup_key()).unwrap();
        assert!(entry.is_executing());

        guard.keep().unwrap();
        let entry = registry.get(s.lookup_key()).unwrap();
        assert!(!entry.is_executing());
        assert!(local_tx.current().is_none());
    }

    #[test]
    fn commit_removes_from_registry_and_commits_underlying_tx() {
        let local_tx = FakeLocalTxManager::new();
        let registry = TxRegistry::new();
        let clock = FakeClock::new(0);
        let s = session();

        let guard = SwapGuard::enter(&local_tx, &registry, &clock, &s, true).unwrap();
        let h = guard.handle().unwrap();
        guard.commit().unwrap();

        assert!(registry.get(s.lookup_key()).is_none());
        assert!(local_tx.was_committed(h));
    }

    #[test]
    fn drop_without_explicit_leave_rolls_back() {
        let local_tx = FakeLocalTxManager::new();
        let registry = TxRegistry::new();
        let clock = FakeClock::new(0);
        let s = session();

        let h = {
            let guard = SwapGuard::enter(&local_tx, &registry, &clock, &s, true).unwrap();
            guard.handle().unwrap()
            // guard drops here without keep/commit/rollback
        };

        assert!(registry.get(s.lookup_key()).is_none());
        assert!(local_tx.was_rolled_back(h));
        assert!(local_tx.current().is_none());
    }

    #[test]
    fn nested_reentry_is_a_noop() {
        let local_tx = FakeLocalTxManager::new();
        let registry = TxRegistry::new();
        let clock = FakeClock::new(0);
        let s = session();

        let outer = SwapGuard::enter(&local_tx, &registry, &clock, &s, true).unwrap();
        let current_before_inner = local_tx.current();

        let inner = SwapGuard::enter(&local_tx, &registry, &clock, &s, false).unwrap();
        assert!(inner.handle().is_none());
        assert_eq!(local_tx.current(), current_before_inner);
        drop(inner);
        assert_eq!(local_tx.current(), current_before_inner);

        outer.keep().unwrap();
    }

    #[test]
    fn resumes_prior_transaction_after_leave() {
        let local_tx = FakeLocalTxManager::new();
        let registry = TxRegistry::new();
        let clock = FakeClock::new(0);

        let other = SessionKey::new(OriginId(9), SessionNonce(9), EventSeq(1));
        let other_guard = SwapGuard::enter(&local_tx, &registry, &clock, &other, true).unwrap();
        let other_handle = other_guard.handle().unwrap();
        // Leave `other` as Idle but pretend we're a nested call where the
        // thread still has a transaction bound (simulate by re-binding).
        local_tx.force_resume_for_test(other_handle);

        let s = session();
        let guard = SwapGuard::enter(&local_tx, &registry, &clock, &s, true).unwrap();
        guard.keep().unwrap();

        // After leaving `s`, the thread should be back on `other_handle`.
        assert_eq!(local_tx.current(), Some(other_handle));
    }
}
