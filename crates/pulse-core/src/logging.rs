//! Logging setup based on `tracing-subscriber`.

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is not set.
///
/// The GPU stack is very chatty at debug level, so its targets are capped.
pub const DEFAULT_FILTER: &str = "debug,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Install a fmt subscriber filtered by `RUST_LOG`, or [`DEFAULT_FILTER`].
///
/// # Panics
/// Panics if a global subscriber has already been installed.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Install a fmt subscriber; `RUST_LOG` takes precedence over `default`.
pub fn init_with_filter(default: &str) {
    tracing_subscriber::fmt().with_env_filter(env_filter(default)).init();
}

/// Like [`init`], but returns `false` instead of panicking when a subscriber
/// is already set. Convenient in tests and examples.
pub fn try_init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .try_init()
        .is_ok()
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_try_init_twice() {
        // Only one of the two calls may install the global subscriber.
        let first = try_init();
        let second = try_init();
        assert!(!(first && second));
    }
}
