//! Logging setup.
//!
//! stdout carries the LSP wire protocol, so log output always goes to stderr.
//! The level comes from `RUST_LOG`, or "embedls=info" when that is unset.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "embedls=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Installing twice is not an error; the first subscriber stays in place.
pub fn init_logging() {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_filter(env_filter());

    if tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init_logging();
        init_logging();
    }
}
