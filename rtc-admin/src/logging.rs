// SPEC_FULL.md §10.2: structured logging via `tracing`. This module owns
// the one-time process-wide subscriber install; everything else in the
// workspace only ever calls into the `tracing` macros, never into this
// crate, keeping the dependency direction one-way (domain crates don't
// know how their logs are rendered).

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber` fmt layer reading its filter from
/// `RUST_LOG`, falling back to `info` if unset. Safe to call once per
/// process; a second call is a no-op (the underlying `set_global_default`
/// error is swallowed, matching the ambient-stack stance that config/logging
/// setup should never crash-loop the process).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("logging: subscriber already installed, skipping");
    }
}
