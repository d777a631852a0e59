//! Environment configuration and environment-key resolution.
//!
//! Key priority: explicit key, `AUTOSTACK_FM_KEY`, legacy `FM_KEY`, then the
//! runtime document `{base_url}/config/fm.json` (`{ "envKey": "<key>" }`).

use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{SourceError, SourceResult};
use crate::source::parse_base_url;
use crate::validate::normalize_env_key;

/// Primary environment variable carrying the environment key.
pub const ENV_KEY_VAR: &str = "AUTOSTACK_FM_KEY";
/// Legacy environment variable carrying the environment key.
pub const LEGACY_ENV_KEY_VAR: &str = "FM_KEY";
/// Environment variable naming the configuration endpoint.
pub const ENDPOINT_VAR: &str = "AUTOSTACK_FM_ENDPOINT";
/// Environment variable naming the base URL serving the runtime document.
pub const BASE_URL_VAR: &str = "AUTOSTACK_BASE_URL";
/// Environment variable overriding the HTTP timeout, in seconds.
pub const TIMEOUT_VAR: &str = "AUTOSTACK_FM_TIMEOUT_SECS";
/// Path of the runtime key document relative to the base URL.
pub const RUNTIME_CONFIG_PATH: &str = "config/fm.json";
/// Default HTTP timeout for the configuration endpoint.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Flag layer configuration gathered from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagsConfig {
    /// Environment key, if configured.
    pub env_key: Option<String>,
    /// Configuration endpoint base URL.
    pub endpoint: Option<String>,
    /// Base URL serving `config/fm.json`.
    pub base_url: Option<String>,
    /// HTTP timeout for flag requests.
    pub timeout: Duration,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            env_key: None,
            endpoint: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FlagsConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_iter(std::env::vars())
    }

    /// Read configuration from an iterator of environment pairs.
    #[must_use]
    pub fn from_env_iter<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        let mut legacy_key = None;
        for (name, value) in vars {
            let value = value.into();
            match name.as_ref() {
                ENV_KEY_VAR => config.env_key = Some(value),
                LEGACY_ENV_KEY_VAR => legacy_key = Some(value),
                ENDPOINT_VAR => config.endpoint = non_blank(value),
                BASE_URL_VAR => config.base_url = non_blank(value),
                TIMEOUT_VAR => match value.trim().parse::<u64>() {
                    Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                    _ => warn!(value = %value, "ignoring invalid flag timeout"),
                },
                _ => {}
            }
        }
        config.env_key = config
            .env_key
            .or(legacy_key)
            .and_then(|key| normalize_env_key(Some(key.as_str())).map(str::to_string));
        config
    }

    /// Override the environment key; blank and `local-mode` clear it.
    #[must_use]
    pub fn with_env_key(mut self, key: Option<&str>) -> Self {
        if key.is_some() {
            self.env_key = normalize_env_key(key).map(str::to_string);
        }
        self
    }

    /// Resolve the environment key, falling back to the runtime document.
    ///
    /// Failure to fetch the document is logged and treated as "no key".
    pub async fn resolve_env_key(&self, client: &Client) -> Option<String> {
        if let Some(key) = &self.env_key {
            return Some(key.clone());
        }

        let base_url = self.base_url.as_deref()?;
        match fetch_runtime_key(client, base_url).await {
            Ok(Some(key)) => {
                info!("loaded environment key from runtime config");
                Some(key)
            }
            Ok(None) => {
                debug!("runtime config carried no environment key");
                None
            }
            Err(err) => {
                debug!(error = ?err, "no runtime config found; using default flag values");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RuntimeKeyDocument {
    #[serde(rename = "envKey", default)]
    env_key: Option<String>,
}

/// URL of the runtime key document under `base_url`.
///
/// # Errors
///
/// Returns [`SourceError::InvalidEndpoint`] when `base_url` is not a usable base.
pub fn runtime_config_url(base_url: &str) -> SourceResult<reqwest::Url> {
    let trimmed = base_url.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    parse_base_url(&normalized)?
        .join(RUNTIME_CONFIG_PATH)
        .map_err(|_| SourceError::InvalidEndpoint {
            value: base_url.to_string(),
        })
}

/// Fetch and parse the runtime key document.
///
/// # Errors
///
/// Returns a [`SourceError`] when the request fails, the server answers with
/// a non-success status, or the body is not the expected JSON document.
pub async fn fetch_runtime_key(client: &Client, base_url: &str) -> SourceResult<Option<String>> {
    let url = runtime_config_url(base_url)?;
    debug!(url = %url, "fetching runtime flag config");

    let response = client
        .get(url.clone())
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|source| SourceError::Http {
            operation: "flags.runtime_config.send",
            url: url.to_string(),
            source: source.without_url(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let document: RuntimeKeyDocument =
        response.json().await.map_err(|source| SourceError::Http {
            operation: "flags.runtime_config.decode",
            url: url.to_string(),
            source: source.without_url(),
        })?;

    Ok(normalize_env_key(document.env_key.as_deref()).map(str::to_string))
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn primary_key_wins_over_legacy_regardless_of_order() {
        let config = FlagsConfig::from_env_iter([
            (ENV_KEY_VAR, "primary"),
            (LEGACY_ENV_KEY_VAR, "legacy"),
        ]);
        assert_eq!(config.env_key.as_deref(), Some("primary"));

        let config = FlagsConfig::from_env_iter([
            (LEGACY_ENV_KEY_VAR, "legacy"),
            (ENV_KEY_VAR, "primary"),
        ]);
        assert_eq!(config.env_key.as_deref(), Some("primary"));

        let legacy_only = FlagsConfig::from_env_iter([(LEGACY_ENV_KEY_VAR, "legacy")]);
        assert_eq!(legacy_only.env_key.as_deref(), Some("legacy"));
    }

    #[test]
    fn local_mode_sentinel_means_no_key() {
        let config = FlagsConfig::from_env_iter([(ENV_KEY_VAR, "local-mode")]);
        assert_eq!(config.env_key, None);
        assert_eq!(
            FlagsConfig::default()
                .with_env_key(Some("abc"))
                .with_env_key(Some(" "))
                .env_key,
            None
        );
        assert_eq!(
            FlagsConfig::default().with_env_key(None).env_key,
            None
        );
    }

    #[test]
    fn timeout_and_urls_are_read() {
        let config = FlagsConfig::from_env_iter([
            (TIMEOUT_VAR, "3"),
            (ENDPOINT_VAR, " https://flags.example/v1 "),
            (BASE_URL_VAR, ""),
        ]);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.endpoint.as_deref(), Some("https://flags.example/v1"));
        assert_eq!(config.base_url, None);

        let invalid = FlagsConfig::from_env_iter([(TIMEOUT_VAR, "soon")]);
        assert_eq!(invalid.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn runtime_config_url_handles_trailing_slash() {
        assert_eq!(
            runtime_config_url("https://cars.example/app").unwrap().as_str(),
            "https://cars.example/app/config/fm.json"
        );
        assert_eq!(
            runtime_config_url("https://cars.example/app/").unwrap().as_str(),
            "https://cars.example/app/config/fm.json"
        );
    }

    #[tokio::test]
    async fn explicit_key_skips_runtime_document() {
        let config = FlagsConfig {
            env_key: Some("explicit".into()),
            base_url: Some("http://127.0.0.1:9".into()),
            ..FlagsConfig::default()
        };
        assert_eq!(
            config.resolve_env_key(&Client::new()).await.as_deref(),
            Some("explicit")
        );
    }

    #[tokio::test]
    async fn runtime_document_supplies_key() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/app/config/fm.json");
            then.status(200).json_body(json!({ "envKey": "from-helm" }));
        });

        let config = FlagsConfig {
            base_url: Some(server.url("/app")),
            ..FlagsConfig::default()
        };
        let key = config.resolve_env_key(&Client::new()).await;

        mock.assert();
        assert_eq!(key.as_deref(), Some("from-helm"));
    }

    #[tokio::test]
    async fn missing_runtime_document_means_no_key() {
        let server = MockServer::start_async().await;
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/config/fm.json");
            then.status(404);
        });

        let config = FlagsConfig {
            base_url: Some(server.base_url()),
            ..FlagsConfig::default()
        };
        assert_eq!(config.resolve_env_key(&Client::new()).await, None);
    }
}
