//! Stand-alone illustration of wiring a `Server`. A real deployment
//! supplies its own `LocalTxManager`/`LockService`/`LockTracker`/
//! `DataSourceSet`/`IdAllocator` backed by the actual store; those are
//! external collaborators (SPEC_FULL.md §1) that this workspace does not
//! implement, so this binary wires up the in-memory fakes instead.

use std::sync::Arc;

use rtc_admin::{RtcConfig, RtcMetrics};
use rtc_core::testing::{FakeDataSourceSet, FakeIdAllocator, FakeLocalTxManager, FakeLockService};
use rtc_core::RtcContext;
use rtc::Server;

fn main() {
    let lock_service = Arc::new(FakeLockService::new());
    let ctx = RtcContext {
        local_tx: Arc::new(FakeLocalTxManager::new()),
        lock_service: lock_service.clone(),
        lock_tracker: lock_service,
        data_sources: Arc::new(FakeDataSourceSet::with_resources(["neostore"])),
        id_allocator: Arc::new(FakeIdAllocator::new()),
        clock: Arc::new(rtc_base::SystemClock),
        metrics: Arc::new(RtcMetrics::new()),
    };

    let config = RtcConfig::from_env();
    let server = Server::new(ctx, &config);

    tracing::info!("rtc: running, press Ctrl+C to stop");
    let _ = std::io::stdin().lines().next();

    server.shutdown();
}
