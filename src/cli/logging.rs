//! Tracing subscriber setup

use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when RUST_LOG is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "audio_vault=debug"
    } else {
        "audio_vault=warn"
    }
}

/// Install the global subscriber writing to stderr.
///
/// `RUST_LOG` wins over `--verbose`. Calling this twice is a no-op.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
