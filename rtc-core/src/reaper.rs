// SPEC_FULL.md §4.2: a dedicated background thread that sweeps TxRegistry
// for sessions idle past `read_lock_timeout_seconds` and force-rolls them
// back. Parked on a condvar rather than a plain `thread::sleep` so
// `shutdown` can wake it early (§5: "Started at RTC construction, stopped
// at shutdown").

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rtc_base::Clock;

use crate::collaborators::{LocalTxManager, MetricsSink};
use crate::registry::TxRegistry;

struct ShutdownSignal {
    lock: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownSignal {
    fn new() -> Self {
        ShutdownSignal {
            lock: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Waits up to `tick` unless woken early by `fire`. Returns `true` if
    /// shutdown was requested.
    fn wait(&self, tick: Duration) -> bool {
        let guard = self.lock.lock().unwrap();
        let (guard, _timeout) = self.condvar.wait_timeout(guard, tick).unwrap();
        *guard
    }

    fn fire(&self) {
        *self.lock.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

/// The background sweeper described in §4.2. Owns no state of its own
/// beyond the shutdown signal and the join handle; all session state
/// lives in the shared `TxRegistry`.
pub struct Reaper {
    signal: Arc<ShutdownSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Starts the sweeper thread. `timeout_seconds` is `read_lock_timeout_seconds`
    /// from `RtcConfig`; `tick_seconds` is `reaper_tick_seconds`.
    pub fn spawn(
        local_tx: Arc<dyn LocalTxManager>,
        registry: Arc<TxRegistry>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
        tick_seconds: u64,
        timeout_seconds: u64,
    ) -> Reaper {
        let signal = Arc::new(ShutdownSignal::new());
        let tick = Duration::from_secs(tick_seconds.max(1));

        let thread_signal = Arc::clone(&signal);
        let handle = std::thread::Builder::new()
            .name("rtc-reaper".to_string())
            .spawn(move || {
                tracing::info!(tick_seconds, timeout_seconds, "reaper: started");
                loop {
                    if thread_signal.wait(tick) {
                        break;
                    }
                    sweep_once(&*local_tx, &registry, &*clock, &*metrics, timeout_seconds);
                }
                tracing::info!("reaper: stopped");
            })
            .expect("failed to spawn rtc-reaper thread");

        Reaper {
            signal,
            handle: Some(handle),
        }
    }

    /// Signals the sweeper to stop and joins its thread. §4.6 `shutdown`.
    pub fn shutdown(mut self) {
        self.signal.fire();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.signal.fire();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// One tick of §4.2: snapshot, inspect, reclaim. Every per-entry failure is
/// swallowed so a single stuck session cannot stop the sweep.
///
/// `LocalTxManager::resume`'s error type is opaque to RTC (it's an
/// external collaborator, §2), so unlike the original design note we
/// cannot downcast to distinguish "session is genuinely still active"
/// from a truly unexpected failure. We treat a failed `resume` as the
/// expected case (the session woke up and is executing again between the
/// snapshot and this reclaim attempt) and log it at `debug!`; only a
/// failure from `rollback` *after* a successful `resume`, meaning we
/// really did take ownership of an idle transaction and it still didn't
/// roll back, is logged at `error!`.
pub(crate) fn sweep_once(
    local_tx: &dyn LocalTxManager,
    registry: &TxRegistry,
    clock: &dyn Clock,
    metrics: &dyn MetricsSink,
    timeout_seconds: u64,
) {
    let span = tracing::info_span!("reaper.sweep");
    let _enter = span.enter();

    let snapshot = registry.snapshot();
    let inspected = snapshot.len();
    let mut reclaimed = 0usize;
    let threshold_millis = (timeout_seconds as i64).saturating_mul(1000);

    for (key, entry) in snapshot {
        // Invariant 3 (§8): never reap an Executing entry.
        let Some(idle_millis) = entry.idle_for(clock.now()) else {
            continue;
        };
        if idle_millis < threshold_millis {
            continue;
        }

        tracing::warn!(
            origin = key.0 .0,
            nonce = key.1 .0,
            idle_millis,
            "reaper: reclaiming idle session"
        );

        match local_tx.resume(entry.handle) {
            Err(_) => {
                tracing::debug!(
                    origin = key.0 .0,
                    nonce = key.1 .0,
                    "reaper: resume failed, session likely active again; skipping"
                );
                continue;
            }
            Ok(()) => {
                if let Err(e) = local_tx.rollback(entry.handle) {
                    tracing::error!(
                        origin = key.0 .0,
                        nonce = key.1 .0,
                        error = %e,
                        "reaper: rollback failed on a session we just resumed"
                    );
                    continue;
                }
            }
        }

        if registry.remove_if_unchanged(key, entry) {
            reclaimed += 1;
            metrics.record_session_reaped();
        } else {
            tracing::debug!(
                origin = key.0 .0,
                nonce = key.1 .0,
                "reaper: entry changed since snapshot, not removing"
            );
        }
    }

    tracing::info!(inspected, reclaimed, "reaper: sweep complete");
}
