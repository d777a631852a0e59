//! Error types for telemetry operations.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn subscriber_install_error_keeps_source() {
        let first = tracing_subscriber::registry().try_init();
        let err = match first {
            Err(source) => source,
            Ok(()) => match tracing_subscriber::registry().try_init() {
                Err(source) => source,
                Ok(()) => return,
            },
        };
        let err = TelemetryError::SubscriberInstall { source: err };
        assert_eq!(err.to_string(), "failed to install tracing subscriber");
        assert!(err.source().is_some());
    }
}
