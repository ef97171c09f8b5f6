//! Logging setup for programs embedding the client.
//!
//! The library only emits `tracing` events; installing a subscriber is left to the binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::errors::{Error, Result};

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
///
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(env_filter),
        )
        .try_init()
        .map_err(|err| Error::Config(format!("logging already initialized: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_instead_of_panicking() {
        // Another test may have installed a subscriber first; either way the second call fails.
        let _ = init_logging();
        assert!(matches!(init_logging(), Err(Error::Config(_))));
    }
}
