//! Error types for flag registration and remote synchronisation.
//!
//! # Design
//! - Keep error messages constant while carrying context fields for debugging.
//! - Registration errors are fatal at startup; source errors never escape `setup`.

use thiserror::Error;

/// Convenience alias for flag registration results.
pub type FlagResult<T> = Result<T, FlagError>;

/// Convenience alias for remote source results.
pub type SourceResult<T> = Result<T, SourceError>;

/// Configuration errors raised while declaring flags.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlagError {
    /// Flag key was empty or whitespace only.
    #[error("flag key must not be empty")]
    EmptyKey,
    /// A flag with the same key is already registered.
    #[error("duplicate flag definition")]
    DuplicateKey {
        /// Key that was declared twice.
        key: String,
    },
    /// Variant flag was declared without any allowed values.
    #[error("variant flag declares no options")]
    NoVariantOptions {
        /// Key of the offending variant.
        key: String,
    },
    /// Variant flag listed the same option more than once.
    #[error("variant flag declares a duplicate option")]
    DuplicateOption {
        /// Key of the offending variant.
        key: String,
        /// Option that appeared more than once.
        option: String,
    },
    /// Variant default is not one of the allowed values.
    #[error("variant default is not an allowed value")]
    DefaultNotAllowed {
        /// Key of the offending variant.
        key: String,
        /// Default value supplied by the caller.
        default: String,
    },
}

/// Failures raised by remote configuration sources.
///
/// These are recovered inside `RemoteSync::setup` and surface only as a
/// degraded sync status plus a log line.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Environment key was blank or contained whitespace/control characters.
    #[error("environment key is malformed")]
    MalformedKey {
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
    /// Endpoint or base URL could not be parsed or extended.
    #[error("invalid configuration endpoint")]
    InvalidEndpoint {
        /// Offending endpoint value.
        value: String,
    },
    /// HTTP transport or body decoding failed.
    #[error("http operation failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// Endpoint answered with a non-success status.
    #[error("configuration endpoint returned an error status")]
    Status {
        /// URL used for the request.
        url: String,
        /// HTTP status code returned by the endpoint.
        status: u16,
    },
    /// Payload did not have the expected shape.
    #[error("configuration payload was malformed")]
    Payload {
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
    /// Source could not serve values for another reason.
    #[error("remote source unavailable")]
    Unavailable {
        /// Human-readable detail from the source.
        detail: String,
    },
}
