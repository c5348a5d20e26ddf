//! Telemetry initialization.
//!
//! Events go to stderr so stdout stays clean for `sdls normalize` and
//! `sdls config`. The filter comes from `SDLS_LOG` (same syntax as
//! `RUST_LOG`) and defaults to `info`.
//!
//! With span timing on, every instrumented stage logs its duration when it
//! closes, e.g. `close time.busy=4.1ms` for `pipeline.category`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "SDLS_LOG";

/// Output format for log events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (e.g. a second
/// call in the same process); the existing one is kept.
pub fn init(format: LogFormat, span_timing: bool) -> bool {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let spans = if span_timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_span_events(spans),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(spans),
            )
            .try_init(),
    };
    installed.is_ok()
}
