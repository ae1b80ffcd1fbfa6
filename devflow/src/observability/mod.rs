//! Observability utilities.
//!
//! Logs go to stderr through `tracing-subscriber`, so stdout only ever
//! carries the run's JSON result. The end-of-run report is written by
//! [`write_summary`].

mod summary;

pub use summary::{render_summary, write_summary, SUMMARY_FILE};

use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Filter used when `RUST_LOG` is not set.
#[must_use]
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "devflow=info",
        1 => "devflow=debug",
        _ => "devflow=trace",
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `verbosity`. Returns false if a subscriber was
/// already installed by this function.
///
/// # Errors
///
/// Fails when the filter directive is invalid or another global subscriber
/// is already set.
pub fn init_tracing(verbosity: u8, json: bool) -> anyhow::Result<bool> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(false);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbosity)))?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_directives() {
        assert_eq!(default_directive(0), "devflow=info");
        assert_eq!(default_directive(1), "devflow=debug");
        assert_eq!(default_directive(5), "devflow=trace");
    }
}
