//! Process-scoped flag context tying the registry, store, bus and sync together.
//!
//! # Design
//! - Constructed once at startup and passed by reference or clone; no globals.
//! - Reads never block on the remote sync and always see a complete snapshot.
//! - Every notification is also published on a watch channel for async consumers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::Utc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::bus::{Delivery, Subscription, SubscriptionBus};
use crate::model::{BoolFlag, ChangeReason, FlagValue, Lifecycle, SyncStatus, VariantFlag};
use crate::registry::FlagRegistry;
use crate::snapshot::{Snapshot, SnapshotStore, SnapshotUpdate};
use crate::source::StaticSource;
use crate::sync::{RemoteSource, RemoteSync, SyncOptions};

/// Stream of snapshot updates; yields the latest update first.
pub type SnapshotWatch = WatchStream<SnapshotUpdate>;

/// Cloneable handle to the flag layer.
#[derive(Clone, Debug)]
pub struct FlagContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    registry: Arc<FlagRegistry>,
    store: SnapshotStore,
    bus: SubscriptionBus,
    sync: RemoteSync,
    lifecycle: AtomicU8,
    updates: watch::Sender<SnapshotUpdate>,
}

impl FlagContext {
    /// Build a context over a frozen registry and a remote source.
    ///
    /// The initial snapshot holds the declared defaults.
    #[must_use]
    pub fn new(registry: FlagRegistry, source: Arc<dyn RemoteSource>) -> Self {
        let registry = Arc::new(registry);
        let store = SnapshotStore::new(Arc::clone(&registry));
        let (updates, _) = watch::channel(SnapshotUpdate {
            revision: 0,
            reason: ChangeReason::Defaults,
            timestamp: Utc::now(),
            snapshot: store.current(),
        });

        Self {
            inner: Arc::new(ContextInner {
                registry,
                store,
                bus: SubscriptionBus::new(),
                sync: RemoteSync::new(source),
                lifecycle: AtomicU8::new(Lifecycle::Uninitialized.as_u8()),
                updates,
            }),
        }
    }

    /// Build a context that never contacts a remote service.
    ///
    /// Setup with a key applies nothing and reports an unchanged `cache` fetch.
    #[must_use]
    pub fn local(registry: FlagRegistry) -> Self {
        Self::new(registry, Arc::new(StaticSource::default()))
    }

    /// Underlying registry.
    #[must_use]
    pub fn registry(&self) -> &FlagRegistry {
        &self.inner.registry
    }

    /// Live boolean read; `None` for unknown keys and variants.
    #[must_use]
    pub fn is_enabled(&self, key: &str) -> Option<bool> {
        self.inner.registry.is_enabled(key)
    }

    /// Live value read; `None` for unknown keys.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<FlagValue> {
        self.inner.registry.get_value(key)
    }

    /// Live typed boolean read.
    #[must_use]
    pub fn enabled(&self, flag: BoolFlag) -> bool {
        self.inner.registry.enabled(flag)
    }

    /// Live typed variant read.
    #[must_use]
    pub fn variant(&self, flag: VariantFlag) -> String {
        self.inner.registry.variant(flag)
    }

    /// Last stored snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.store.current()
    }

    /// Re-evaluate every flag and replace the stored snapshot.
    pub fn rebuild(&self) -> Snapshot {
        self.advance(Lifecycle::DefaultsOnly);
        self.inner.store.rebuild()
    }

    /// Deliver `snapshot` to every subscriber and watcher.
    ///
    /// The revision is assigned under the watch channel's lock, so watchers
    /// never observe revisions going backwards.
    pub fn notify(&self, reason: &ChangeReason, snapshot: &Snapshot) -> Delivery {
        let mut revision = 0;
        self.inner.updates.send_modify(|update| {
            revision = update.revision + 1;
            *update = SnapshotUpdate {
                revision,
                reason: reason.clone(),
                timestamp: Utc::now(),
                snapshot: snapshot.clone(),
            };
        });
        debug!(revision, reason = %reason, flags = snapshot.len(), "flag snapshot updated");
        self.inner.bus.notify(reason, snapshot)
    }

    /// Rebuild the snapshot and notify with `reason`.
    pub fn refresh(&self, reason: &ChangeReason) -> Snapshot {
        let snapshot = self.rebuild();
        let _ = self.notify(reason, &snapshot);
        snapshot
    }

    /// Register a callback for snapshot notifications.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeReason, &Snapshot) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(callback)
    }

    /// Async stream of snapshot updates, starting with the latest one.
    #[must_use]
    pub fn watch(&self) -> SnapshotWatch {
        WatchStream::new(self.inner.updates.subscribe())
    }

    /// Most recently published update.
    #[must_use]
    pub fn latest_update(&self) -> SnapshotUpdate {
        self.inner.updates.borrow().clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.inner.lifecycle.load(Ordering::Acquire))
    }

    /// Status of the finished setup, if any.
    #[must_use]
    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.inner.sync.status().cloned()
    }

    /// Run the single remote setup.
    ///
    /// On fetch the snapshot is rebuilt and `fetched` is notified; on
    /// completion the context enters [`Lifecycle::Synced`] and `initialized`
    /// (or `error` when degraded) is notified. Concurrent callers share one
    /// attempt; only the attempting call's hooks fire.
    pub async fn setup(&self, env_key: Option<&str>, options: SyncOptions) -> SyncStatus {
        self.advance(Lifecycle::DefaultsOnly);

        let SyncOptions {
            on_fetched,
            on_complete,
        } = options;
        let fetched_ctx = self.clone();
        let complete_ctx = self.clone();
        let hooks = SyncOptions::new()
            .on_fetched(move |result| {
                let _ = fetched_ctx.refresh(&ChangeReason::Fetched);
                if let Some(callback) = &on_fetched {
                    callback(result);
                }
            })
            .on_complete(move |status| {
                complete_ctx.advance(Lifecycle::Synced);
                let _ = complete_ctx.refresh(&status.change_reason());
                info!(status = ?status, "flag setup complete");
                if let Some(callback) = &on_complete {
                    callback(status);
                }
            });

        self.inner
            .sync
            .setup(&self.inner.registry, env_key, hooks)
            .await
    }

    fn advance(&self, target: Lifecycle) {
        self.inner
            .lifecycle
            .fetch_max(target.as_u8(), Ordering::AcqRel);
    }
}
