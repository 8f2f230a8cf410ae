//! Tracing subscriber setup.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "APPSIM_LOG";

static INIT: Once = Once::new();

/// Installs a fmt subscriber once per process.
///
/// The filter comes from `APPSIM_LOG`, falling back to `fallback`. Output goes
/// through the test writer so libtest captures it per test. If another global
/// subscriber is already installed it is left in place.
pub fn init(fallback: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Returns true once `init` has run in this process.
#[must_use]
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init("warn");
        init("trace");
        assert!(is_initialized());
    }
}
