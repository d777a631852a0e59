//! One-shot remote synchronisation.
//!
//! # Design
//! - Exactly one attempt per [`RemoteSync`]; concurrent callers await the same
//!   attempt and later callers get the recorded status.
//! - Failures degrade to defaults and are logged; `setup` never returns an error.
//! - Completion callbacks are isolated so a panicking hook cannot escape `setup`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{error, info, instrument, warn};

use crate::error::SourceResult;
use crate::model::{FetchResult, FetchSource, RemoteValues, SyncStatus};
use crate::registry::FlagRegistry;
use crate::validate::{normalize_env_key, validate_env_key};

/// Values returned by a [`RemoteSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFetch {
    /// Raw flag values keyed by flag key.
    pub values: RemoteValues,
    /// Where the values came from.
    pub source: FetchSource,
}

#[async_trait]
/// Abstraction over remote configuration backends.
pub trait RemoteSource: Send + Sync {
    /// Fetch the flag values for the given environment key.
    async fn fetch(&self, env_key: &str) -> SourceResult<RemoteFetch>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "remote"
    }
}

type FetchedCallback = Box<dyn Fn(&FetchResult) + Send + Sync>;
type CompleteCallback = Box<dyn Fn(&SyncStatus) + Send + Sync>;

/// Optional hooks invoked during setup.
#[derive(Default)]
pub struct SyncOptions {
    pub(crate) on_fetched: Option<FetchedCallback>,
    pub(crate) on_complete: Option<CompleteCallback>,
}

impl SyncOptions {
    /// Options without hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `callback` once per completed fetch.
    #[must_use]
    pub fn on_fetched<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FetchResult) + Send + Sync + 'static,
    {
        self.on_fetched = Some(Box::new(callback));
        self
    }

    /// Invoke `callback` once when setup finishes, whatever the outcome.
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncOptions")
            .field("on_fetched", &self.on_fetched.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Serialises the single remote setup attempt.
pub struct RemoteSync {
    source: Arc<dyn RemoteSource>,
    status: OnceCell<SyncStatus>,
}

impl RemoteSync {
    /// Wrap a remote source.
    #[must_use]
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self {
            source,
            status: OnceCell::new(),
        }
    }

    /// Status of the finished attempt, if any.
    #[must_use]
    pub fn status(&self) -> Option<&SyncStatus> {
        self.status.get()
    }

    /// Run the setup attempt, or wait for / return the one already made.
    ///
    /// Hooks in `options` only fire for the call that performs the attempt.
    /// `on_complete` runs after the status is recorded, so [`Self::status`]
    /// is already populated inside it.
    pub async fn setup(
        &self,
        registry: &FlagRegistry,
        env_key: Option<&str>,
        options: SyncOptions,
    ) -> SyncStatus {
        let mut attempted = false;
        let status = self
            .status
            .get_or_init(|| {
                attempted = true;
                self.fetch_and_apply(registry, env_key, &options)
            })
            .await
            .clone();

        if attempted && let Some(callback) = &options.on_complete {
            guard_hook("on_complete", || callback(&status));
        }
        status
    }

    #[instrument(name = "remote_sync.attempt", skip_all, fields(source = self.source.name()))]
    async fn fetch_and_apply(
        &self,
        registry: &FlagRegistry,
        env_key: Option<&str>,
        options: &SyncOptions,
    ) -> SyncStatus {
        let Some(raw_key) = normalize_env_key(env_key) else {
            info!("no environment key configured; serving default flag values");
            return SyncStatus::LocalMode;
        };

        let key = match validate_env_key(raw_key) {
            Ok(key) => key,
            Err(err) => {
                warn!(error = ?err, "environment key rejected; serving default flag values");
                return SyncStatus::Degraded {
                    reason: err.to_string(),
                };
            }
        };

        match self.source.fetch(key).await {
            Ok(fetch) => {
                let has_changes = registry.apply_remote(fetch.values);
                let result = FetchResult {
                    has_changes,
                    source: fetch.source,
                };
                info!(
                    has_changes,
                    fetch_source = %result.source,
                    "flag configuration fetched"
                );
                if let Some(callback) = &options.on_fetched {
                    guard_hook("on_fetched", || callback(&result));
                }
                SyncStatus::Synced { result }
            }
            Err(err) => {
                warn!(error = ?err, "flag sync failed; continuing with default values");
                SyncStatus::Degraded {
                    reason: err.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for RemoteSync {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteSync")
            .field("source", &self.source.name())
            .field("status", &self.status.get())
            .finish()
    }
}

fn guard_hook(hook: &'static str, call: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
        error!(hook, "flag sync hook panicked");
    }
}
