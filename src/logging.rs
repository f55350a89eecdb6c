/// Diagnostic output for a benchmark run.
///
/// Everything tracing emits goes to stderr; stdout carries only the summary
/// table printed after the run. Interactive runs get colored text, batch
/// jobs (stderr redirected to a file) get one JSON object per event.

use std::io::IsTerminal;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn for_stderr() -> Self {
        if std::io::stderr().is_terminal() {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    }
}

/// `RUST_LOG` directives when present and parseable, else the configured level.
fn build_filter(log_level: &str, rust_log: Option<String>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(log_level))
}

/// Install the global subscriber. Call once, after configuration is loaded.
pub fn init_logging(config: &Config) {
    let filter = build_filter(
        &config.log_level,
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    let events = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let subscriber = tracing_subscriber::registry().with(filter);

    match LogFormat::for_stderr() {
        LogFormat::Text => subscriber.with(events.with_ansi(true)).init(),
        LogFormat::Json => subscriber.with(events.json().flatten_event(true)).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_configured_level_used_without_rust_log() {
        let filter = build_filter("warn", None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_rust_log_overrides_configured_level() {
        let filter = build_filter("warn", Some("querybench=trace".to_string()));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }
}
