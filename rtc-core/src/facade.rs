// SPEC_FULL.md §6, §9 "Global singletons": the RTC entry point. `RtcContext`
// threads every external collaborator through explicitly; `Rtc` holds no
// process-wide state beyond what it owns (the registry and the Reaper
// thread it started).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use rtc_base::Clock;
use rtc_net::TxId;

use crate::collaborators::{
    DataSourceSet, IdAllocation, IdAllocator, LockMode, LockResult, LockService, LockTracker,
    LockableResource, MetricsSink,
};
use crate::error::{Result, RtcError};
use crate::reaper::Reaper;
use crate::registry::TxRegistry;
use crate::response::{accept_all, Response, ResponsePacker};
use crate::session::SessionKey;
use crate::swap::SwapGuard;

/// §2: every external collaborator RTC depends on, explicit rather than a
/// global singleton.
#[derive(Clone)]
pub struct RtcContext {
    pub local_tx: Arc<dyn crate::collaborators::LocalTxManager>,
    pub lock_service: Arc<dyn LockService>,
    pub lock_tracker: Arc<dyn LockTracker>,
    pub data_sources: Arc<dyn DataSourceSet>,
    pub id_allocator: Arc<dyn IdAllocator>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<dyn MetricsSink>,
}

/// §6 configuration table, minus `cluster_name` (which this crate never
/// reads: it lives purely to be logged/reported by the admin surface).
/// Kept separate from `rtc-admin`'s `RtcConfig` so `rtc-core` does not
/// depend on the admin crate; the `rtc` binary crate converts one into the
/// other.
#[derive(Clone, Copy, Debug)]
pub struct RtcTuning {
    pub read_lock_timeout_seconds: u64,
    pub reaper_tick_seconds: u64,
    pub id_batch_size: u64,
}

impl Default for RtcTuning {
    fn default() -> Self {
        RtcTuning {
            read_lock_timeout_seconds: 20,
            reaper_tick_seconds: 5,
            id_batch_size: 1000,
        }
    }
}

/// §2 "RTC Facade". Implements the full §6 operation surface.
pub struct Rtc {
    ctx: RtcContext,
    registry: Arc<TxRegistry>,
    reaper: Mutex<Option<Reaper>>,
    relationship_types: Mutex<HashMap<String, u32>>,
    next_relationship_type_id: AtomicU32,
    id_batch_size: u64,
}

impl Rtc {
    /// Starts the Reaper (§4.2, §5: "Started at RTC construction").
    pub fn new(ctx: RtcContext, tuning: RtcTuning) -> Rtc {
        let registry = Arc::new(TxRegistry::new());
        let reaper = Reaper::spawn(
            Arc::clone(&ctx.local_tx),
            Arc::clone(&registry),
            Arc::clone(&ctx.clock),
            Arc::clone(&ctx.metrics),
            tuning.reaper_tick_seconds,
            tuning.read_lock_timeout_seconds,
        );
        tracing::info!(
            read_lock_timeout_seconds = tuning.read_lock_timeout_seconds,
            reaper_tick_seconds = tuning.reaper_tick_seconds,
            "rtc: constructed"
        );
        Rtc {
            ctx,
            registry,
            reaper: Mutex::new(Some(reaper)),
            relationship_types: Mutex::new(HashMap::new()),
            next_relationship_type_id: AtomicU32::new(0),
            id_batch_size: tuning.id_batch_size,
        }
    }

    fn enter(&self, session: &SessionKey, allow_begin: bool) -> Result<SwapGuard<'_>> {
        SwapGuard::enter(
            &*self.ctx.local_tx,
            &*self.registry,
            &*self.ctx.clock,
            session,
            allow_begin,
        )
    }

    fn packer(&self) -> ResponsePacker<'_> {
        ResponsePacker::new(&*self.ctx.data_sources)
    }

    /// §4.6 `initializeTx`.
    pub fn initialize_tx(&self, session: &SessionKey) -> Result<Response<()>> {
        let span = tracing::info_span!("rtc.initialize_tx", origin = session.origin_id.0, nonce = session.session_nonce.0);
        let _enter = span.enter();
        let is_new_session = !self.registry.contains(session.lookup_key());
        let guard = self.enter(session, true)?;
        if is_new_session {
            self.ctx.metrics.record_session_created();
        }
        let response = self.packer().pack((), session, accept_all);
        guard.keep()?;
        Ok(response)
    }

    fn acquire_locks(
        &self,
        op_name: &str,
        session: &SessionKey,
        resources: Vec<LockableResource>,
        mode: LockMode,
    ) -> Result<Response<LockResult>> {
        let span = tracing::info_span!("rtc.acquire_locks", op = op_name, origin = session.origin_id.0, nonce = session.session_nonce.0);
        let _enter = span.enter();

        let guard = self.enter(session, false)?;
        let handle = self
            .ctx
            .local_tx
            .current()
            .ok_or_else(|| RtcError::Internal(rtc_base::err("no transaction bound after enter")))?;

        let mut result = LockResult::OkLocked;
        for resource in resources {
            let acquired = match mode {
                LockMode::Read => self.ctx.lock_service.get_read_lock(handle, &resource),
                LockMode::Write => self.ctx.lock_service.get_write_lock(handle, &resource),
            };
            if acquired != LockResult::OkLocked {
                tracing::debug!(?resource, ?acquired, "lock acquisition stopped short");
                if matches!(acquired, LockResult::DeadLocked { .. }) {
                    self.ctx.metrics.record_deadlock_returned();
                }
                result = acquired;
                break;
            }
            self.ctx
                .lock_tracker
                .add_lock_to_transaction(handle, resource, mode)
                .map_err(RtcError::Internal)?;
        }

        let response = self.packer().pack(result, session, accept_all);
        guard.keep()?;
        Ok(response)
    }

    /// §6 `acquireNodeReadLock`/`acquireNodeWriteLock`.
    pub fn acquire_node_read_lock(&self, session: &SessionKey, ids: &[u64]) -> Result<Response<LockResult>> {
        self.acquire_locks("acquire_node_read_lock", session, ids.iter().copied().map(LockableResource::Node).collect(), LockMode::Read)
    }

    pub fn acquire_node_write_lock(&self, session: &SessionKey, ids: &[u64]) -> Result<Response<LockResult>> {
        self.acquire_locks("acquire_node_write_lock", session, ids.iter().copied().map(LockableResource::Node).collect(), LockMode::Write)
    }

    /// §6 `acquireRelationshipReadLock`/`acquireRelationshipWriteLock`.
    pub fn acquire_relationship_read_lock(&self, session: &SessionKey, ids: &[u64]) -> Result<Response<LockResult>> {
        self.acquire_locks("acquire_relationship_read_lock", session, ids.iter().copied().map(LockableResource::Relationship).collect(), LockMode::Read)
    }

    pub fn acquire_relationship_write_lock(&self, session: &SessionKey, ids: &[u64]) -> Result<Response<LockResult>> {
        self.acquire_locks("acquire_relationship_write_lock", session, ids.iter().copied().map(LockableResource::Relationship).collect(), LockMode::Write)
    }

    /// §6 `acquireGraphReadLock`/`acquireGraphWriteLock`.
    pub fn acquire_graph_read_lock(&self, session: &SessionKey) -> Result<Response<LockResult>> {
        self.acquire_locks("acquire_graph_read_lock", session, vec![LockableResource::GraphProps], LockMode::Read)
    }

    pub fn acquire_graph_write_lock(&self, session: &SessionKey) -> Result<Response<LockResult>> {
        self.acquire_locks("acquire_graph_write_lock", session, vec![LockableResource::GraphProps], LockMode::Write)
    }

    /// §6 `acquireIndexReadLock`/`acquireIndexWriteLock`.
    pub fn acquire_index_read_lock(&self, session: &SessionKey, index: &str, key: &str) -> Result<Response<LockResult>> {
        self.acquire_locks(
            "acquire_index_read_lock",
            session,
            vec![LockableResource::Index { index: index.to_string(), key: key.to_string() }],
            LockMode::Read,
        )
    }

    pub fn acquire_index_write_lock(&self, session: &SessionKey, index: &str, key: &str) -> Result<Response<LockResult>> {
        self.acquire_locks(
            "acquire_index_write_lock",
            session,
            vec![LockableResource::Index { index: index.to_string(), key: key.to_string() }],
            LockMode::Write,
        )
    }

    /// §4.4 `commitSingleResourceTransaction`.
    pub fn commit_single_resource_transaction(
        &self,
        session: &SessionKey,
        resource_name: &str,
        payload: Vec<u8>,
    ) -> Result<Response<TxId>> {
        let span = tracing::info_span!("rtc.commit_single_resource_transaction", origin = session.origin_id.0, nonce = session.session_nonce.0, resource = resource_name);
        let _enter = span.enter();

        let guard = self.enter(session, false)?;

        if !self.ctx.data_sources.has_resource(resource_name) {
            guard.keep()?;
            return Err(RtcError::UnknownResource(resource_name.to_string()));
        }

        let txid = match self.ctx.data_sources.apply_prepared(resource_name, payload) {
            Ok(txid) => txid,
            Err(e) => {
                // §7: IOError during commit is propagated, but the
                // transaction is NOT silently rolled back; the slave will
                // explicitly call finishTransaction(success=false).
                guard.keep()?;
                return Err(RtcError::IoError(e));
            }
        };
        self.ctx.metrics.record_commit_applied();

        let response = self.packer().pack(txid, session, move |r| r.txid < txid);
        guard.keep()?;
        Ok(response)
    }

    /// §4.6 `finishTransaction`.
    pub fn finish_transaction(&self, session: &SessionKey, success: bool) -> Result<Response<()>> {
        let span = tracing::info_span!("rtc.finish_transaction", origin = session.origin_id.0, nonce = session.session_nonce.0, success);
        let _enter = span.enter();

        let guard = self.enter(session, false)?;
        let response = self.packer().pack((), session, accept_all);
        if success {
            guard.commit()?;
        } else {
            guard.rollback()?;
        }
        Ok(response)
    }

    /// §4.6 `allocateIds`. Stateless: uses `SessionKey::empty()`, no swap.
    pub fn allocate_ids(&self, id_type: &str) -> Result<Response<IdAllocation>> {
        let span = tracing::info_span!("rtc.allocate_ids", id_type);
        let _enter = span.enter();

        let allocation = self
            .ctx
            .id_allocator
            .allocate(id_type, self.id_batch_size)
            .map_err(RtcError::Internal)?;
        Ok(self.packer().pack_without_stream(allocation))
    }

    /// §4.6 `createRelationshipType`.
    pub fn create_relationship_type(&self, session: &SessionKey, name: &str) -> Result<Response<u32>> {
        let span = tracing::info_span!("rtc.create_relationship_type", origin = session.origin_id.0, nonce = session.session_nonce.0, name);
        let _enter = span.enter();

        let guard = self.enter(session, false)?;
        let id = {
            let mut types = self.relationship_types.lock().unwrap();
            match types.get(name) {
                Some(&id) => id,
                None => {
                    let id = self.next_relationship_type_id.fetch_add(1, Ordering::SeqCst);
                    types.insert(name.to_string(), id);
                    id
                }
            }
        };
        let response = self.packer().pack(id, session, accept_all);
        guard.keep()?;
        Ok(response)
    }

    /// §4.6 `pullUpdates`: no-op payload, purely to receive the commit-tail.
    pub fn pull_updates(&self, session: &SessionKey) -> Result<Response<()>> {
        let span = tracing::info_span!("rtc.pull_updates", origin = session.origin_id.0, nonce = session.session_nonce.0);
        let _enter = span.enter();

        let guard = self.enter(session, false)?;
        let response = self.packer().pack((), session, accept_all);
        guard.keep()?;
        Ok(response)
    }

    /// §4.6 `getMasterIdForCommittedTx`. Stateless query, no swap.
    pub fn get_master_id_for_committed_tx(&self, txid: TxId, store_id: &str) -> Result<Response<(u64, TxId)>> {
        let span = tracing::info_span!("rtc.get_master_id_for_committed_tx", store_id, txid = txid.0);
        let _enter = span.enter();

        tracing::debug!(store_id, txid = txid.0, "get_master_id_for_committed_tx");
        let pair = self
            .ctx
            .data_sources
            .master_for(txid)
            .ok_or_else(|| RtcError::IoError(rtc_base::err(format!("no master record for txid {}", txid.0))))?;
        Ok(self.packer().pack_without_stream(pair))
    }

    /// §4.6 `copyStore`.
    pub fn copy_store(&self, session: &SessionKey, writer: &mut dyn std::io::Write) -> Result<Response<()>> {
        let span = tracing::info_span!("rtc.copy_store", origin = session.origin_id.0, nonce = session.session_nonce.0);
        let _enter = span.enter();

        let guard = self.enter(session, false)?;
        if let Err(e) = self.ctx.data_sources.copy_to(writer) {
            guard.keep()?;
            return Err(RtcError::IoError(e));
        }
        let response = self.packer().pack((), session, accept_all);
        guard.keep()?;
        Ok(response)
    }

    /// §4.6 `shutdown`: stop Reaper, let in-flight requests drain (best
    /// effort: we simply join the Reaper thread; in-flight request
    /// threads are not tracked by RTC itself, only by the wire layer).
    pub fn shutdown(&self) -> Response<()> {
        tracing::info!("rtc: shutdown requested");
        if let Some(reaper) = self.reaper.lock().unwrap().take() {
            reaper.shutdown();
        }
        Response {
            value: (),
            commit_tail: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaper::sweep_once;
    use crate::testing::{
        FakeDataSourceSet, FakeIdAllocator, FakeLocalTxManager, FakeLockService, FakeMetricsSink,
    };
    use rtc_base::FakeClock;
    use rtc_net::{EventSeq, OriginId, SessionNonce};
    use test_log::test;

    struct Harness {
        rtc: Rtc,
        local_tx: Arc<FakeLocalTxManager>,
        lock_service: Arc<FakeLockService>,
        data_sources: Arc<FakeDataSourceSet>,
        clock: Arc<FakeClock>,
        metrics: Arc<FakeMetricsSink>,
    }

    fn harness() -> Harness {
        let local_tx = Arc::new(FakeLocalTxManager::new());
        let lock_service = Arc::new(FakeLockService::new());
        let data_sources = Arc::new(FakeDataSourceSet::with_resources(["neostore"]));
        let id_allocator = Arc::new(FakeIdAllocator::new());
        let clock = Arc::new(FakeClock::new(0));
        let metrics = Arc::new(FakeMetricsSink::new());

        let ctx = RtcContext {
            local_tx: local_tx.clone(),
            lock_service: lock_service.clone(),
            lock_tracker: lock_service.clone(),
            data_sources: data_sources.clone(),
            id_allocator,
            clock: clock.clone(),
            metrics: metrics.clone(),
        };
        // A tick_seconds large enough that the background Reaper thread
        // never races with test assertions; tests that need a sweep call
        // `sweep_once` directly instead of waiting on the real thread.
        let tuning = RtcTuning {
            read_lock_timeout_seconds: 5,
            reaper_tick_seconds: 3600,
            id_batch_size: 100,
        };
        let rtc = Rtc::new(ctx, tuning);

        Harness {
            rtc,
            local_tx,
            lock_service,
            data_sources,
            clock,
            metrics,
        }
    }

    fn session(nonce: u64) -> SessionKey {
        SessionKey::new(OriginId(1), SessionNonce(nonce), EventSeq(1))
    }

    /// S1: begin + commit.
    #[test]
    fn s1_begin_and_commit() {
        let h = harness();
        let s = session(1);

        h.rtc.initialize_tx(&s).unwrap();
        assert!(h.rtc.registry.contains(s.lookup_key()));
        assert_eq!(h.metrics.sessions_created(), 1);

        let resp = h
            .rtc
            .commit_single_resource_transaction(&s, "neostore", vec![1, 2, 3])
            .unwrap();
        let txid = resp.value;
        assert!(resp.commit_tail.iter().all(|r| r.txid < txid));
        assert_eq!(h.metrics.commits_applied(), 1);

        h.rtc.finish_transaction(&s, true).unwrap();
        assert!(!h.rtc.registry.contains(s.lookup_key()));
    }

    /// S2: no-session write attempt.
    #[test]
    fn s2_no_session_write_attempt() {
        let h = harness();
        let s_unknown = session(999);

        let err = h.rtc.acquire_node_write_lock(&s_unknown, &[42]).unwrap_err();
        assert!(matches!(err, RtcError::NoSuchSession));
        assert!(!h.rtc.registry.contains(s_unknown.lookup_key()));
    }

    /// S4: deadlock return, no exception crosses the API boundary.
    #[test]
    fn s4_deadlock_return() {
        let h = harness();
        let s = session(2);
        h.rtc.initialize_tx(&s).unwrap();

        h.lock_service.deadlock_on(LockableResource::Node(7));

        let resp = h.rtc.acquire_node_write_lock(&s, &[7]).unwrap();
        assert!(matches!(resp.value, LockResult::DeadLocked { .. }));
        // the session survives: the slave gets a structured reply, not a
        // torn-down transaction.
        assert!(h.rtc.registry.contains(s.lookup_key()));
        assert_eq!(h.metrics.deadlocks_returned(), 1);
    }

    /// Invariant 6: initializeTx + finishTransaction(false) leaves the
    /// registry unchanged from before initializeTx.
    #[test]
    fn invariant_6_round_trip_is_a_noop() {
        let h = harness();
        let s = session(3);
        assert!(!h.rtc.registry.contains(s.lookup_key()));

        h.rtc.initialize_tx(&s).unwrap();
        h.rtc.finish_transaction(&s, false).unwrap();

        assert!(!h.rtc.registry.contains(s.lookup_key()));
    }

    /// Invariant 7: two back-to-back identical write-lock calls are
    /// idempotent from the master's view.
    #[test]
    fn invariant_7_repeated_write_lock_is_idempotent() {
        let h = harness();
        let s = session(4);
        h.rtc.initialize_tx(&s).unwrap();

        let first = h.rtc.acquire_node_write_lock(&s, &[1]).unwrap();
        let second = h.rtc.acquire_node_write_lock(&s, &[1]).unwrap();
        assert_eq!(first.value, LockResult::OkLocked);
        assert_eq!(second.value, LockResult::OkLocked);
    }

    #[test]
    fn allocate_ids_and_master_lookup_need_no_session() {
        let h = harness();
        let resp = h.rtc.allocate_ids("Node").unwrap();
        assert_eq!(resp.value.low, 1);
        assert!(resp.commit_tail.is_empty());

        let s = session(5);
        h.rtc.initialize_tx(&s).unwrap();
        let committed = h
            .rtc
            .commit_single_resource_transaction(&s, "neostore", vec![9])
            .unwrap();
        h.rtc.finish_transaction(&s, true).unwrap();

        let (_, prev) = h
            .rtc
            .get_master_id_for_committed_tx(committed.value, "store-1")
            .unwrap()
            .value;
        assert!(prev < committed.value);
    }

    #[test]
    fn commit_unknown_resource_keeps_session_alive() {
        let h = harness();
        let s = session(6);
        h.rtc.initialize_tx(&s).unwrap();

        let err = h
            .rtc
            .commit_single_resource_transaction(&s, "no-such-resource", vec![])
            .unwrap_err();
        assert!(matches!(err, RtcError::UnknownResource(_)));
        assert!(h.rtc.registry.contains(s.lookup_key()));
    }

    #[test]
    fn create_relationship_type_is_stable_across_calls() {
        let h = harness();
        let s = session(7);
        h.rtc.initialize_tx(&s).unwrap();

        let a = h.rtc.create_relationship_type(&s, "KNOWS").unwrap().value;
        let b = h.rtc.create_relationship_type(&s, "KNOWS").unwrap().value;
        let c = h.rtc.create_relationship_type(&s, "LIKES").unwrap().value;
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn copy_store_streams_through_writer() {
        let h = harness();
        let s = session(8);
        h.rtc.initialize_tx(&s).unwrap();
        h.data_sources.apply_prepared("neostore", vec![1]).unwrap();

        let mut buf = Vec::new();
        h.rtc.copy_store(&s, &mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("neostore"));
    }

    #[test]
    fn shutdown_stops_reaper_and_is_idempotent() {
        let h = harness();
        h.rtc.shutdown();
        h.rtc.shutdown(); // second call: nothing to take, must not panic
    }

    /// Exercises the Reaper sweep against the registry a full `Rtc`
    /// populates, independent of the background thread's own timing
    /// (already covered on its own in reaper.rs).
    #[test]
    fn reaper_sweep_reclaims_through_the_facade() {
        let h = harness();
        let s = session(10);
        h.rtc.initialize_tx(&s).unwrap();

        h.clock.set(10_000);
        sweep_once(&*h.local_tx, &*h.rtc.registry, &*h.clock, &*h.metrics, 5);

        assert!(!h.rtc.registry.contains(s.lookup_key()));
        assert_eq!(h.metrics.sessions_reaped(), 1);
    }
}
