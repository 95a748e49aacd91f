//! Development helper: initialize a tracing subscriber when `RUST_LOG` is set.

/// Install an env-filtered fmt subscriber.
///
/// Tests and demos can call `netkit::dev_tracing::init_tracing()` to see the
/// `[DIAL]`/`[CONNECT]`/`[RESOLVE]` logs. This is a no-op when `RUST_LOG` is
/// not set or when a global subscriber is already installed.
pub fn init_tracing() {
    use std::env;

    if env::var("RUST_LOG").is_ok() {
        // Best-effort: another subscriber may already be installed.
        let installed = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!("[TRACING] subscriber installed from RUST_LOG");
        }
    }
}
