// SPEC_FULL.md §10.4: in-memory fakes for every external collaborator
// trait in `collaborators.rs`, so `Rtc` can be exercised without a real
// store, lock manager, or id allocator. Used by this crate's own tests
// and re-exported for downstream integration tests.

use std::collections::{HashMap, HashSet};
use std::io::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rtc_base::Result as BaseResult;
use rtc_net::{ResourceName, TxId};

use crate::collaborators::{
    CommitRecord, DataSourceSet, IdAllocation, IdAllocator, LockMode, LockResult, LockService,
    LockTracker, LockableResource, MetricsSink,
};
use crate::session::TxHandle;

/// Fake `LocalTxManager`. "Thread-affine" in the real system; here a
/// single shared `current` slot is enough since tests drive one
/// `SwapGuard` at a time per manager instance.
#[derive(Default)]
pub struct FakeLocalTxManager {
    next: AtomicU64,
    current: Mutex<Option<TxHandle>>,
    committed: Mutex<HashSet<TxHandle>>,
    rolled_back: Mutex<HashSet<TxHandle>>,
}

impl FakeLocalTxManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_committed(&self, handle: TxHandle) -> bool {
        self.committed.lock().unwrap().contains(&handle)
    }

    pub fn was_rolled_back(&self, handle: TxHandle) -> bool {
        self.rolled_back.lock().unwrap().contains(&handle)
    }

    /// Test-only escape hatch to simulate a thread that already had a
    /// transaction bound before calling into a fresh `SwapGuard::enter`.
    pub fn force_resume_for_test(&self, handle: TxHandle) {
        *self.current.lock().unwrap() = Some(handle);
    }
}

impl crate::collaborators::LocalTxManager for FakeLocalTxManager {
    fn begin(&self) -> BaseResult<TxHandle> {
        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = TxHandle(id);
        *self.current.lock().unwrap() = Some(handle);
        Ok(handle)
    }

    fn current(&self) -> Option<TxHandle> {
        *self.current.lock().unwrap()
    }

    fn suspend(&self) -> BaseResult<()> {
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    fn resume(&self, handle: TxHandle) -> BaseResult<()> {
        *self.current.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn commit(&self, handle: TxHandle) -> BaseResult<()> {
        self.committed.lock().unwrap().insert(handle);
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    fn rollback(&self, handle: TxHandle) -> BaseResult<()> {
        self.rolled_back.lock().unwrap().insert(handle);
        *self.current.lock().unwrap() = None;
        Ok(())
    }
}

/// Fake `LockService`/`LockTracker`. Grants every lock immediately and
/// never detects a deadlock, unless pre-loaded with `deny_next` or
/// `deadlock_next` via the constructors below.
#[derive(Default)]
pub struct FakeLockService {
    deadlock_on: Mutex<HashSet<LockableResource>>,
    granted: Mutex<Vec<(TxHandle, LockableResource, LockMode)>>,
}

impl FakeLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every future acquisition of `resource` return `DeadLocked`.
    pub fn deadlock_on(&self, resource: LockableResource) {
        self.deadlock_on.lock().unwrap().insert(resource);
    }

    pub fn granted(&self) -> Vec<(TxHandle, LockableResource, LockMode)> {
        self.granted.lock().unwrap().clone()
    }

    fn acquire(&self, holder: TxHandle, resource: &LockableResource, mode: LockMode) -> LockResult {
        if self.deadlock_on.lock().unwrap().contains(resource) {
            return LockResult::DeadLocked {
                message: format!("fake deadlock on {resource:?}"),
            };
        }
        self.granted
            .lock()
            .unwrap()
            .push((holder, resource.clone(), mode));
        LockResult::OkLocked
    }
}

impl LockService for FakeLockService {
    fn get_read_lock(&self, holder: TxHandle, resource: &LockableResource) -> LockResult {
        self.acquire(holder, resource, LockMode::Read)
    }

    fn get_write_lock(&self, holder: TxHandle, resource: &LockableResource) -> LockResult {
        self.acquire(holder, resource, LockMode::Write)
    }
}

impl LockTracker for FakeLockService {
    fn add_lock_to_transaction(
        &self,
        _holder: TxHandle,
        _resource: LockableResource,
        _mode: LockMode,
    ) -> BaseResult<()> {
        Ok(())
    }
}

/// Fake `DataSourceSet`: an in-memory append-only log per resource name.
#[derive(Default)]
pub struct FakeDataSourceSet {
    resources: Mutex<HashMap<ResourceName, Vec<CommitRecord>>>,
    next_txid: AtomicU64,
}

impl FakeDataSourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources<I: IntoIterator<Item = &'static str>>(names: I) -> Self {
        let ds = Self::default();
        let mut resources = ds.resources.lock().unwrap();
        for name in names {
            resources.entry(name.to_string()).or_default();
        }
        drop(resources);
        ds
    }
}

impl DataSourceSet for FakeDataSourceSet {
    fn has_resource(&self, name: &str) -> bool {
        self.resources.lock().unwrap().contains_key(name)
    }

    fn apply_prepared(&self, resource: &str, payload: Vec<u8>) -> BaseResult<TxId> {
        let id = self.next_txid.fetch_add(1, Ordering::SeqCst) + 1;
        let txid = TxId(id);
        let mut resources = self.resources.lock().unwrap();
        let log = resources.entry(resource.to_string()).or_default();
        log.push(CommitRecord {
            resource: resource.to_string(),
            txid,
            payload,
        });
        Ok(txid)
    }

    fn tail_since(&self, resource: &str, since: Option<TxId>) -> Vec<CommitRecord> {
        let resources = self.resources.lock().unwrap();
        match resources.get(resource) {
            None => Vec::new(),
            Some(log) => log
                .iter()
                .filter(|r| match since {
                    Some(s) => r.txid > s,
                    None => true,
                })
                .cloned()
                .collect(),
        }
    }

    fn master_for(&self, txid: TxId) -> Option<(u64, TxId)> {
        let resources = self.resources.lock().unwrap();
        for log in resources.values() {
            if log.iter().any(|r| r.txid == txid) {
                return Some((0, TxId(txid.0.saturating_sub(1))));
            }
        }
        None
    }

    fn resource_names(&self) -> Vec<ResourceName> {
        self.resources.lock().unwrap().keys().cloned().collect()
    }

    fn copy_to(&self, writer: &mut dyn std::io::Write) -> BaseResult<()> {
        let resources = self.resources.lock().unwrap();
        for (name, log) in resources.iter() {
            writeln!(writer, "{name}: {} records", log.len())
                .map_err(rtc_base::Error::new)?;
        }
        Ok(())
    }
}

/// Fake `IdAllocator`: hands out contiguous batches starting at 1.
#[derive(Default)]
pub struct FakeIdAllocator {
    next: Mutex<HashMap<String, u64>>,
}

impl FakeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdAllocator for FakeIdAllocator {
    fn allocate(&self, id_type: &str, batch_size: u64) -> BaseResult<IdAllocation> {
        let mut next = self.next.lock().unwrap();
        let low = *next.get(id_type).unwrap_or(&1);
        let high_watermark = low + batch_size;
        next.insert(id_type.to_string(), high_watermark);
        Ok(IdAllocation {
            low,
            high_watermark,
            defrag_count: 0,
        })
    }
}

/// Fake `MetricsSink`: plain counters a test can read back directly,
/// without going through `rtc-admin`.
#[derive(Default)]
pub struct FakeMetricsSink {
    sessions_created: AtomicU64,
    sessions_reaped: AtomicU64,
    commits_applied: AtomicU64,
    deadlocks_returned: AtomicU64,
}

impl FakeMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions_created(&self) -> u64 {
        self.sessions_created.load(Ordering::Relaxed)
    }

    pub fn sessions_reaped(&self) -> u64 {
        self.sessions_reaped.load(Ordering::Relaxed)
    }

    pub fn commits_applied(&self) -> u64 {
        self.commits_applied.load(Ordering::Relaxed)
    }

    pub fn deadlocks_returned(&self) -> u64 {
        self.deadlocks_returned.load(Ordering::Relaxed)
    }
}

impl MetricsSink for FakeMetricsSink {
    fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    fn record_session_reaped(&self) {
        self.sessions_reaped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_commit_applied(&self) {
        self.commits_applied.fetch_add(1, Ordering::Relaxed);
    }

    fn record_deadlock_returned(&self) {
        self.deadlocks_returned.fetch_add(1, Ordering::Relaxed);
    }
}
