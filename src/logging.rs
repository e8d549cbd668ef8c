//! Subscriber setup for binaries. Library code only emits events.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless; the second
/// call leaves the first subscriber in place.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
