//! Log subscriber setup for the binary.

use std::str::FromStr;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::EstafetaError;

/// Default filter when neither `RUST_LOG` nor a level is given.
pub const DEFAULT_LEVEL: &str = "info";

/// Install a stderr subscriber.
///
/// `RUST_LOG` wins over `level`; an unparsable level falls back to
/// [`DEFAULT_LEVEL`]. Stdout stays free for command output.
pub fn init_logger(level: &str) -> Result<(), EstafetaError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .map_err(|e| EstafetaError::Settings(format!("Failed to install logger: {}", e)))?;

    tracing::debug!("Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        // First call may race other tests; only the second is deterministic
        let _ = init_logger("debug");
        assert!(init_logger("debug").is_err());
    }
}
