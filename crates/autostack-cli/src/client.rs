//! HTTP client construction and the error type shared by command handlers.

use std::time::Duration;

use anyhow::anyhow;
use autostack_flags::{App, FlagsConfig};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use thiserror::Error;

/// Header carrying the invocation trace id on every outbound request.
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// Command failure, split by the exit code it maps to.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Bad arguments or configuration.
    #[error("{0}")]
    Validation(String),
    /// Operational failure, including a degraded flag sync.
    #[error("{0:#}")]
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }
}

/// State handed to every command handler.
#[derive(Debug, Clone)]
pub(crate) struct CommandContext {
    pub(crate) client: Client,
    pub(crate) flags: FlagsConfig,
    pub(crate) app: App,
}

/// Build the shared client, tagging requests with `trace_id`.
pub(crate) fn build_client(timeout: Duration, trace_id: &str) -> CliResult<Client> {
    let request_id = HeaderValue::from_str(trace_id)
        .map_err(|_| CliError::failure(anyhow!("trace identifier contains invalid characters")))?;
    let mut headers = HeaderMap::with_capacity(1);
    headers.insert(HEADER_REQUEST_ID, request_id);

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))
}

/// `value_parser` for URL arguments.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    autostack_flags::source::parse_base_url(input).map_err(|_| format!("invalid URL '{input}'"))
}
