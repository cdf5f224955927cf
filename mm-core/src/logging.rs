//! Crate-standard logging setup.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `verbosity` is any `EnvFilter` directive string (`info`, `debug`, `mm_gen=trace,warn`, ...).
/// `RUST_LOG`, when set, takes precedence so operators can override the CLI flag.  An unparsable
/// directive falls back to `info` rather than refusing to start.  Logs go to stderr.
pub fn setup(verbosity: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(verbosity))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout may carry rendered metrics; try_init so repeated calls don't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .try_init();
}

/// Parse a verbosity string the same way [`setup`] does, without installing anything.
#[must_use]
pub fn is_valid_verbosity(verbosity: &str) -> bool {
    EnvFilter::try_new(verbosity).is_ok()
}
