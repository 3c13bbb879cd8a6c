//! Logging integration for modeltype.
//!
//! [`setup_logging`] installs the process subscriber for the command-line
//! tool. Events go to stderr so that command output on stdout stays
//! machine-readable. [`request_span`] and [`generation_span`] scope the
//! events of one request or one generation run.

use tracing_subscriber::EnvFilter;

use crate::settings::{LogFormat, Settings};

/// The filter used when `log_level` does not parse.
pub const FALLBACK_LOG_LEVEL: &str = "info";

/// Builds the event filter from `settings.log_level`.
pub fn log_filter(settings: &Settings) -> EnvFilter {
    EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LOG_LEVEL))
}

/// Installs the global subscriber described by `settings`.
///
/// `log_format` picks the line format; `debug` adds event targets and source
/// locations. Returns `false` when a subscriber was already installed, in
/// which case nothing changes.
pub fn setup_logging(settings: &Settings) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(settings))
        .with_writer(std::io::stderr)
        .with_target(settings.debug)
        .with_file(settings.debug)
        .with_line_number(settings.debug);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    installed.is_ok()
}

/// Creates a tracing span for one request.
///
/// # Examples
///
/// ```
/// use modeltype_core::logging::request_span;
///
/// let span = request_span("req-1", "Thing");
/// let _guard = span.enter();
/// tracing::info!("handling list request");
/// ```
pub fn request_span(request_id: &str, model: &str) -> tracing::Span {
    tracing::info_span!("request", id = request_id, model = model)
}

/// Creates a tracing span for one schema generation run.
pub fn generation_span(run_id: &str, models: usize) -> tracing::Span {
    tracing::info_span!("generation", run = run_id, models = models)
}
