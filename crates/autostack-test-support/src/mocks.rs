//! Scripted remote sources for exercising setup paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use autostack_flags::{
    FetchSource, RemoteFetch, RemoteSource, RemoteValues, SourceError, SourceResult,
};

/// Source returning fixed values after an optional delay, recording every call.
#[derive(Debug)]
pub struct ScriptedSource {
    values: RemoteValues,
    source: FetchSource,
    delay: Duration,
    calls: AtomicUsize,
    keys: Mutex<Vec<String>>,
}

impl ScriptedSource {
    /// Serve `values` as a network fetch.
    #[must_use]
    pub fn new(values: RemoteValues) -> Self {
        Self {
            values,
            source: FetchSource::Network,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
        }
    }

    /// Report fetches as coming from `source`.
    #[must_use]
    pub const fn with_source(mut self, source: FetchSource) -> Self {
        self.source = source;
        self
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wrap in an `Arc` for sharing with a context.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of fetches issued.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Environment keys passed to `fetch`, in call order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RemoteSource for ScriptedSource {
    async fn fetch(&self, env_key: &str) -> SourceResult<RemoteFetch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(env_key.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(RemoteFetch {
            values: self.values.clone(),
            source: self.source,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Source that always fails with [`SourceError::Unavailable`].
#[derive(Debug, Default)]
pub struct FailingSource {
    calls: AtomicUsize,
}

impl FailingSource {
    /// Construct a shared failing source.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of fetches attempted.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for FailingSource {
    async fn fetch(&self, env_key: &str) -> SourceResult<RemoteFetch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::Unavailable {
            detail: format!("scripted failure for {env_key}"),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
