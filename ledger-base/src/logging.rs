// Shared subscriber setup so the three binaries (coordinator, participant,
// client) all format and filter logs the same way. Each binary still picks
// its own `target` when it logs, so log lines read e.g. `coordinator: ...`.

use tracing_subscriber::EnvFilter;

/// Install a compact, `RUST_LOG`-filterable subscriber for `target`.
///
/// Defaults to `info` when `RUST_LOG` is unset. Safe to call once per
/// process; calling it twice in the same process will panic, which is
/// acceptable since only `main` ever calls it.
pub fn init(target: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
    tracing::info!(target: "ledger", component = target, "logging initialized");
}
