//! Remote source implementations: in-memory values and the HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::model::{FetchSource, RemoteValues};
use crate::sync::{RemoteFetch, RemoteSource};

/// Source serving a fixed set of values, reported as `cache`.
///
/// Useful for local overrides and embedded configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    values: RemoteValues,
}

impl StaticSource {
    /// Serve `values` for every key.
    #[must_use]
    pub const fn new(values: RemoteValues) -> Self {
        Self { values }
    }
}

#[async_trait]
impl RemoteSource for StaticSource {
    async fn fetch(&self, _env_key: &str) -> SourceResult<RemoteFetch> {
        Ok(RemoteFetch {
            values: self.values.clone(),
            source: FetchSource::Cache,
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Source fetching `GET {endpoint}/{env_key}` over HTTP(S).
///
/// The response body is either `{"flags": {...}}` or a bare object of flag
/// values.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    endpoint: Url,
}

impl HttpSource {
    /// Build a source with its own client and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidEndpoint`] when `endpoint` does not parse
    /// or cannot carry path segments, and [`SourceError::Http`] when the client
    /// cannot be constructed.
    pub fn new(endpoint: &str, timeout: Duration) -> SourceResult<Self> {
        let endpoint = parse_base_url(endpoint)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SourceError::Http {
                operation: "flags.http_source.client",
                url: endpoint.to_string(),
                source,
            })?;
        Ok(Self { client, endpoint })
    }

    /// Build a source around an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidEndpoint`] when `endpoint` does not parse
    /// or cannot carry path segments.
    pub fn with_client(client: Client, endpoint: &str) -> SourceResult<Self> {
        Ok(Self {
            client,
            endpoint: parse_base_url(endpoint)?,
        })
    }

    /// Configured endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url_for(&self, env_key: &str) -> SourceResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::InvalidEndpoint {
                value: self.endpoint.to_string(),
            })?
            .pop_if_empty()
            .push(env_key);
        Ok(url)
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch(&self, env_key: &str) -> SourceResult<RemoteFetch> {
        let url = self.url_for(env_key)?;
        let endpoint = self.endpoint.as_str();
        debug!(endpoint, "fetching flag configuration");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| SourceError::Http {
                operation: "flags.http_source.send",
                url: endpoint.to_string(),
                source: source.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|source| SourceError::Http {
            operation: "flags.http_source.decode",
            url: endpoint.to_string(),
            source: source.without_url(),
        })?;

        Ok(RemoteFetch {
            values: parse_payload(body)?,
            source: FetchSource::Network,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Parse a base URL that must be able to carry extra path segments.
///
/// # Errors
///
/// Returns [`SourceError::InvalidEndpoint`] when the value does not parse or is
/// not hierarchical (e.g. `mailto:`).
pub fn parse_base_url(value: &str) -> SourceResult<Url> {
    let url = Url::parse(value.trim()).map_err(|_| SourceError::InvalidEndpoint {
        value: value.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(SourceError::InvalidEndpoint {
            value: value.to_string(),
        });
    }
    Ok(url)
}

fn parse_payload(body: Value) -> SourceResult<RemoteValues> {
    let Value::Object(mut document) = body else {
        return Err(SourceError::Payload {
            reason: "payload must be a JSON object",
        });
    };

    match document.remove("flags") {
        Some(Value::Object(flags)) => Ok(flags.into_iter().collect()),
        Some(_) => Err(SourceError::Payload {
            reason: "flags must be a JSON object",
        }),
        None => Ok(document.into_iter().collect()),
    }
}
