#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Reactive feature-flag layer for Autostack clients.
//!
//! Layout: `model.rs` (flag specs, values, sync payloads), `validate.rs`
//! (definition checks and remote value coercion), `registry.rs` (declared
//! flags and the applied remote layer), `snapshot.rs` (immutable snapshots and
//! their store), `bus.rs` (subscription bus), `sync.rs` (one-shot remote
//! setup), `source.rs` (static and HTTP sources), `config.rs` (environment
//! configuration and key resolution), `context.rs` (`FlagContext` facade),
//! `catalog.rs` (declared autostack flags).

pub mod bus;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod sync;
pub mod validate;

pub use bus::{Delivery, SubscriberId, Subscription, SubscriptionBus, SubscriptionGuard};
pub use catalog::{
    App, AutostackFlags, FlagValues, PricingDisplay, SearchAlgorithm, UnknownVariant,
    VehicleRecommendations,
};
pub use config::FlagsConfig;
pub use context::{FlagContext, SnapshotWatch};
pub use error::{FlagError, FlagResult, SourceError, SourceResult};
pub use model::{
    BoolFlag, ChangeReason, FetchResult, FetchSource, FlagDefinition, FlagKind, FlagSpec,
    FlagValue, Lifecycle, RemoteValues, SyncStatus, VariantFlag,
};
pub use registry::{FlagRegistry, FlagRegistryBuilder};
pub use snapshot::{Snapshot, SnapshotStore, SnapshotUpdate};
pub use source::{HttpSource, StaticSource};
pub use sync::{RemoteFetch, RemoteSource, RemoteSync, SyncOptions};
pub use validate::{LOCAL_MODE_KEY, normalize_env_key};
