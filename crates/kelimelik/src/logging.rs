//! Logging setup for binaries built on this crate.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::KelimelikError;

/// Installs a global `tracing` subscriber that writes to stderr.
///
/// The filter comes from `RUST_LOG` when set and defaults to `info`
/// otherwise, so `RUST_LOG=kelimelik_protocol=trace` shows every decoded
/// frame.
///
/// # Errors
/// `Logging` if a global subscriber is already installed.
pub fn init_logging() -> Result<(), KelimelikError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_fails() {
        // Whichever call comes first wins; the second must report it.
        let _ = init_logging();
        assert!(matches!(init_logging(), Err(KelimelikError::Logging(_))));
    }
}
