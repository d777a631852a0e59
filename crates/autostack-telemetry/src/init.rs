//! Subscriber installation for Autostack binaries.
//!
//! # Design
//! - `RUST_LOG` wins; otherwise the configured directive seeds the `EnvFilter`.
//! - A single boxed fmt layer, pretty or JSON, always writing to stderr.
//! - Span close events are opt-in so setup latency can be read from the logs.
//! - The build SHA is captured by the first successful call.

use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{Result, TelemetryError};

/// Directive used when neither `RUST_LOG` nor the caller supplies one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const UNKNOWN_BUILD: &str = "dev";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] when a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let span_events = if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let output = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_span_events(span_events)
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter(config.level))
        .with(output)
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })?;

    let build = BUILD_SHA.get_or_init(|| config.build_sha.to_owned());
    tracing::debug!(build_sha = %build, format = config.format.as_str(), "logging initialised");
    Ok(())
}

/// Build identifier recorded by [`init_logging`], or `dev` before it ran.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or(UNKNOWN_BUILD, String::as_str)
}

/// Subscriber settings.
#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig<'a> {
    /// Filter directive, e.g. `warn` or `autostack_flags=debug`.
    pub level: &'a str,
    /// Output encoding.
    pub format: LogFormat,
    /// Build identifier stamped on the startup event.
    pub build_sha: &'a str,
    /// Emit an event with timings when each span closes.
    pub span_timings: bool,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: UNKNOWN_BUILD,
            span_timings: false,
        }
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable multi-field lines.
    Pretty,
}

impl LogFormat {
    /// Pretty in debug builds, JSON in release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse `json` or `pretty`, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if value.eq_ignore_ascii_case("pretty") {
            Some(Self::Pretty)
        } else {
            None
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_known_names_only() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" Pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("yaml"), None);
        assert_eq!(LogFormat::Json.as_str(), "json");
    }

    #[test]
    fn defaults_are_quiet_and_unversioned() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.format, LogFormat::infer());
        assert_eq!(config.build_sha, "dev");
        assert!(!config.span_timings);
    }

    #[test]
    fn second_install_is_rejected() {
        let config = LoggingConfig {
            level: "debug",
            format: LogFormat::Json,
            build_sha: "abc123",
            span_timings: true,
        };
        let first = init_logging(&config);
        assert!(init_logging(&config).is_err());
        if first.is_ok() {
            assert_eq!(build_sha(), "abc123");
        }
    }
}
