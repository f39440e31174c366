//! The master-side Remote Transaction Controller (RTC): multiplexes many
//! remote participants through a single thread-affine local transaction
//! manager, arbitrates lock contention, applies single-resource commits,
//! and replies with a filtered tail of the commit log so callers can
//! catch up.
//!
//! Out of scope (external collaborators, see [`collaborators`]): the
//! graph data model, storage engine, ID generator, replication-topology
//! discovery, the wire codec, and the slave-side lock client.

mod collaborators;
mod error;
mod facade;
mod reaper;
mod registry;
mod response;
mod session;
mod swap;

pub mod testing;

pub use collaborators::{
    CommitRecord, DataSourceSet, IdAllocation, IdAllocator, LockMode, LockResult, LockService,
    LockTracker, LockableResource, LocalTxManager, MetricsSink,
};
pub use error::{Result, RtcError};
pub use facade::{Rtc, RtcContext, RtcTuning};
pub use response::{accept_all, Response, ResponsePacker};
pub use session::{SessionEntry, SessionKey, TxHandle};
pub use swap::SwapGuard;
