//! Diagnostic logging setup for the command-line tools

use crate::error::{ReconError, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when neither a level nor `RUST_LOG` is given
pub const DEFAULT_LEVEL: &str = "info";

/// Build the filter: an explicit `level` wins, then `RUST_LOG`, then [`DEFAULT_LEVEL`].
pub fn build_filter(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| ReconError::Configuration(format!("invalid log level '{}': {}", level, e))),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))),
    }
}

/// Install a `fmt` subscriber writing to stderr.
///
/// Stdout stays free for report output.
pub fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = build_filter(level)?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| ReconError::Configuration(format!("logging already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter() {
        assert!(build_filter(Some("debug")).is_ok());
        assert!(build_filter(Some("fieldrecon=trace,warn")).is_ok());
        assert!(build_filter(None).is_ok());
        let err = build_filter(Some("fieldrecon=loud")).unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
