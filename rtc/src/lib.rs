//! Top-level process wiring: joins `rtc-core`'s Remote Transaction
//! Controller to `rtc-admin`'s configuration and logging.
//!
//! A server collects together the Remote Transaction Controller and
//! whatever collaborator implementations (`LocalTxManager`, `LockService`,
//! `DataSourceSet`, ...) a real deployment supplies; those are external
//! to this workspace (SPEC_FULL.md §1), so `Server` only owns the wiring,
//! not their implementation.

use rtc_admin::{init_logging, RtcConfig};
use rtc_core::{Rtc, RtcContext, RtcTuning};

pub use rtc_core::{
    CommitRecord, DataSourceSet, IdAllocation, IdAllocator, LockMode, LockResult, LockService,
    LockTracker, LockableResource, LocalTxManager, Response, RtcError, SessionEntry, SessionKey,
    TxHandle,
};
pub use rtc_admin::{MetricsSnapshot, RtcMetrics};

/// One running master process.
pub struct Server {
    rtc: Rtc,
}

impl Server {
    /// Installs logging and starts the Reaper. `ctx` supplies the real
    /// collaborator implementations; `config` is the `ha.*`/`master.*`
    /// configuration table from §6.
    pub fn new(ctx: RtcContext, config: &RtcConfig) -> Server {
        init_logging();
        let tuning = RtcTuning {
            read_lock_timeout_seconds: config.read_lock_timeout_seconds,
            reaper_tick_seconds: config.reaper_tick_seconds,
            id_batch_size: config.id_batch_size,
        };
        tracing::info!(cluster_name = %config.cluster_name, "server: starting");
        Server {
            rtc: Rtc::new(ctx, tuning),
        }
    }

    pub fn rtc(&self) -> &Rtc {
        &self.rtc
    }

    pub fn shutdown(&self) {
        tracing::info!("server: shutting down");
        self.rtc.shutdown();
    }
}
