// SPEC_FULL.md §2 and §9 ("Global singletons"): every external collaborator
// RTC depends on is an explicit trait threaded in through `RtcContext`,
// never a process-wide singleton. This module defines those traits plus
// the small value types they exchange.

use rtc_base::Result as BaseResult;
use rtc_net::{ResourceName, TxId};

use crate::session::TxHandle;

/// Thread-affine local transaction manager (§2, §4.1). Implementations
/// must enforce that `current`/`suspend`/`resume`/`commit`/`rollback` only
/// ever observe the calling thread's own binding; RTC relies on that to
/// reason about the swap protocol.
pub trait LocalTxManager: Send + Sync {
    /// Starts a new transaction and binds it to the calling thread.
    fn begin(&self) -> BaseResult<TxHandle>;
    /// The handle currently bound to the calling thread, if any.
    fn current(&self) -> Option<TxHandle>;
    /// Detaches the calling thread's current transaction without ending it.
    fn suspend(&self) -> BaseResult<()>;
    /// Binds `handle` to the calling thread. Fails if another thread still
    /// has it bound (§4.1 step 6 assumes the caller already suspended any
    /// prior holder via the registry's own discipline).
    fn resume(&self, handle: TxHandle) -> BaseResult<()>;
    /// Commits the calling thread's current transaction.
    fn commit(&self, handle: TxHandle) -> BaseResult<()>;
    /// Rolls back the calling thread's current transaction.
    fn rollback(&self, handle: TxHandle) -> BaseResult<()>;
}

/// A value used purely as a lock key (§3). Equality is by (kind, payload):
/// two distinct requests naming the same node id must produce equal keys.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LockableResource {
    Node(u64),
    Relationship(u64),
    GraphProps,
    Index { index: String, key: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LockMode {
    Read,
    Write,
}

/// §3 `LockResult` sum type. Deadlock and "not lockable" never propagate
/// as errors (§7): they are ordinary return values the slave inspects.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LockResult {
    OkLocked,
    NotLocked,
    DeadLocked { message: String },
}

/// Read/write lock service with deadlock detection (§2, §4.3). Acquisition
/// blocks the calling thread until the lock is granted or a deadlock is
/// detected; it must not be called while holding the `TxRegistry` monitor
/// (§5).
pub trait LockService: Send + Sync {
    fn get_read_lock(&self, holder: TxHandle, resource: &LockableResource) -> LockResult;
    fn get_write_lock(&self, holder: TxHandle, resource: &LockableResource) -> LockResult;
}

/// Records locks against the currently resumed transaction so they can be
/// released on commit or rollback (§2). RTC calls this immediately after
/// each successful `LockService` acquisition, in caller order (§4.3).
pub trait LockTracker: Send + Sync {
    fn add_lock_to_transaction(
        &self,
        holder: TxHandle,
        resource: LockableResource,
        mode: LockMode,
    ) -> BaseResult<()>;
}

/// One commit record in a resource's append-only log, as replayed in a
/// commit-tail (§4.5).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommitRecord {
    pub resource: ResourceName,
    pub txid: TxId,
    pub payload: Vec<u8>,
}

/// A named append-only log (§2, §4.4). `apply_prepared` is the sole write
/// path; `tail_since` supports response packing (§4.5).
pub trait DataSourceSet: Send + Sync {
    /// Resolves a resource name to confirm it exists. `Err` only means "no
    /// such resource"; RTC maps that to `RtcError::UnknownResource`.
    fn has_resource(&self, name: &str) -> bool;

    /// Applies a prepared (already-serialized) redo payload to the named
    /// resource's log, returning its durable, monotone txid (§8 invariant
    /// 5). Serialized per-resource internally (§5).
    fn apply_prepared(&self, resource: &str, payload: Vec<u8>) -> BaseResult<TxId>;

    /// All commit records for `resource` with `txid > since`, in ascending
    /// order. Used by `ResponsePacker` to build a commit-tail.
    fn tail_since(&self, resource: &str, since: Option<TxId>) -> Vec<CommitRecord>;

    /// The master epoch and previous txid associated with a historical
    /// commit, for `get_master_id_for_committed_tx` (§4.6).
    fn master_for(&self, txid: TxId) -> Option<(u64, TxId)>;

    /// All resource names currently registered, for building a commit-tail
    /// across every resource the caller might be behind on.
    fn resource_names(&self) -> Vec<ResourceName>;

    /// Rotates logs and streams a store image through `writer` (§4.6
    /// `copyStore`). The out-of-scope wire layer is responsible for
    /// getting `writer`'s bytes to the requesting slave.
    fn copy_to(&self, writer: &mut dyn std::io::Write) -> BaseResult<()>;
}

/// Supplies batches of entity identifiers (§2, §4.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IdAllocation {
    pub low: u64,
    pub high_watermark: u64,
    pub defrag_count: u64,
}

pub trait IdAllocator: Send + Sync {
    fn allocate(&self, id_type: &str, batch_size: u64) -> BaseResult<IdAllocation>;
}

/// Records the ambient counters from §10.3 (sessions created, sessions
/// reaped, commits applied, deadlocks returned). Threaded through
/// `RtcContext` the same way `Clock` is, so the real implementation (the
/// admin crate's `RtcMetrics`) lives outside this crate but is still
/// driven from the actual request path in `facade.rs` and `reaper.rs`.
pub trait MetricsSink: Send + Sync {
    fn record_session_created(&self);
    fn record_session_reaped(&self);
    fn record_commit_applied(&self);
    fn record_deadlock_returned(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockable_resource_equality_is_by_kind_and_payload() {
        assert_eq!(LockableResource::Node(42), LockableResource::Node(42));
        assert_ne!(LockableResource::Node(42), LockableResource::Node(43));
        assert_ne!(LockableResource::Node(1), LockableResource::Relationship(1));
    }
}
