// SPEC_FULL.md §10.3: configuration mirroring §6's configuration table.

use std::env;

/// §6 configuration table. `cluster_name` is never read by `rtc-core`
/// itself; it exists to be logged and reported by whatever admin surface
/// wires this crate up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RtcConfig {
    pub cluster_name: String,
    /// Seconds an idle session may sit before the Reaper reclaims it. The
    /// spec documents this as "default reader-dependent"; we pick a
    /// conservative value long enough to exceed any legitimate request
    /// round-trip.
    pub read_lock_timeout_seconds: u64,
    pub id_batch_size: u64,
    pub reaper_tick_seconds: u64,
}

impl Default for RtcConfig {
    fn default() -> Self {
        RtcConfig {
            cluster_name: "default".to_string(),
            read_lock_timeout_seconds: 20,
            id_batch_size: 1000,
            reaper_tick_seconds: 5,
        }
    }
}

impl RtcConfig {
    /// Reads `HA_CLUSTER_NAME`, `HA_READ_LOCK_TIMEOUT_SECONDS`,
    /// `MASTER_ID_BATCH_SIZE`, `MASTER_REAPER_TICK_SECONDS`, falling back
    /// to defaults on a missing or unparsable value. A bad env var is
    /// logged at `warn!`, not a hard error: config of a coordinator
    /// should never crash-loop over a typo.
    pub fn from_env() -> Self {
        let defaults = RtcConfig::default();
        RtcConfig {
            cluster_name: env::var("HA_CLUSTER_NAME").unwrap_or(defaults.cluster_name),
            read_lock_timeout_seconds: read_env_u64(
                "HA_READ_LOCK_TIMEOUT_SECONDS",
                defaults.read_lock_timeout_seconds,
            ),
            id_batch_size: read_env_u64("MASTER_ID_BATCH_SIZE", defaults.id_batch_size),
            reaper_tick_seconds: read_env_u64(
                "MASTER_REAPER_TICK_SECONDS",
                defaults.reaper_tick_seconds,
            ),
        }
    }
}

fn read_env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Err(_) => default,
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(name, raw, error = %e, "config: unparsable env var, using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RtcConfig::default();
        assert_eq!(cfg.id_batch_size, 1000);
        assert_eq!(cfg.reaper_tick_seconds, 5);
    }

    #[test]
    fn from_env_falls_back_on_missing_vars() {
        // These vars are not expected to be set in the test environment;
        // from_env must not panic and must fall back to defaults.
        env::remove_var("HA_CLUSTER_NAME");
        env::remove_var("HA_READ_LOCK_TIMEOUT_SECONDS");
        let cfg = RtcConfig::from_env();
        assert_eq!(cfg.cluster_name, "default");
        assert_eq!(cfg.read_lock_timeout_seconds, 20);
    }

    #[test]
    fn read_env_u64_falls_back_on_unparsable_value() {
        env::set_var("MASTER_ID_BATCH_SIZE", "not-a-number");
        assert_eq!(read_env_u64("MASTER_ID_BATCH_SIZE", 1000), 1000);
        env::remove_var("MASTER_ID_BATCH_SIZE");
    }
}
