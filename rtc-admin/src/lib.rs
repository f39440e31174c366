//! Admin, config, system policies, logging, audit, metrics. The ambient
//! engineering stack around the Remote Transaction Controller (see
//! SPEC_FULL.md §10): `RtcConfig` for the configuration table in §6,
//! `RtcMetrics` for the in-process counters in §10.3, and the one-time
//! `tracing_subscriber` install in §10.2.

mod config;
mod logging;
mod metrics;

pub use config::RtcConfig;
pub use logging::init_logging;
pub use metrics::{MetricsSnapshot, RtcMetrics};
