//! Runtime configuration for stores and dispatchers.

use std::time::Duration;

use tracing::warn;

/// Environment variable holding the default settlement timeout in milliseconds.
pub const SETTLE_TIMEOUT_ENV: &str = "FLUXCORE_SETTLE_TIMEOUT_MS";
/// Environment variable enabling per-store dispatch tracing (`1`/`true`).
pub const TRACE_DISPATCH_ENV: &str = "FLUXCORE_TRACE_DISPATCH";

/// Flux configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FluxConfig {
    /// Default bound for blocking `Settlement::wait`. `None` waits forever.
    pub settle_timeout: Option<Duration>,
    /// Log every store a dispatched action reached.
    pub trace_dispatch: bool,
}

impl FluxConfig {
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = Some(timeout);
        self
    }

    pub fn with_trace_dispatch(mut self, enabled: bool) -> Self {
        self.trace_dispatch = enabled;
        self
    }

    /// Read overrides from the environment.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(SETTLE_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.settle_timeout = Some(Duration::from_millis(ms)),
                Err(e) => warn!(key = SETTLE_TIMEOUT_ENV, value = %raw, error = %e, "ignoring invalid setting"),
            }
        }

        if let Some(raw) = lookup(TRACE_DISPATCH_ENV) {
            config.trace_dispatch = matches!(raw.trim(), "1" | "true" | "yes" | "on");
        }

        config
    }
}
