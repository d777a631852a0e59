//! Immutable flag snapshots and the store that swaps them.
//!
//! A [`Snapshot`] is never mutated after construction; cloning shares the same
//! map. The [`SnapshotStore`] replaces its current reference on every rebuild so
//! readers always observe a complete set of values.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::model::{BoolFlag, ChangeReason, FlagValue, VariantFlag};
use crate::registry::FlagRegistry;

/// Complete, immutable mapping from flag key to evaluated value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    values: Arc<BTreeMap<String, FlagValue>>,
}

impl Snapshot {
    /// Wrap an evaluated value map.
    #[must_use]
    pub fn new(values: BTreeMap<String, FlagValue>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    /// Value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FlagValue> {
        self.values.get(key)
    }

    /// Boolean state for `key`; `None` for unknown keys and variants.
    #[must_use]
    pub fn is_enabled(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(FlagValue::as_bool)
    }

    /// Variant string for `key`; `None` for unknown keys and booleans.
    #[must_use]
    pub fn value_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FlagValue::as_str)
    }

    /// Typed boolean read, falling back to the handle's default.
    #[must_use]
    pub fn enabled(&self, flag: BoolFlag) -> bool {
        self.is_enabled(flag.key())
            .unwrap_or_else(|| flag.default_value())
    }

    /// Typed variant read, falling back to the handle's default.
    #[must_use]
    pub fn variant(&self, flag: VariantFlag) -> &str {
        self.value_str(flag.key())
            .unwrap_or_else(|| flag.default_value())
    }

    /// Number of flags captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Whether both snapshots share the same underlying map.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    /// Keys whose values differ between `self` and `other`, in key order.
    #[must_use]
    pub fn changed_keys(&self, other: &Self) -> Vec<String> {
        let mut changed: Vec<String> = self
            .values
            .iter()
            .filter(|(key, value)| other.values.get(*key) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect();
        changed.extend(
            other
                .values
                .keys()
                .filter(|key| !self.values.contains_key(*key))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.as_ref().serialize(serializer)
    }
}

/// Notification envelope published to watchers.
#[derive(Debug, Clone)]
pub struct SnapshotUpdate {
    /// Monotonic notification counter, starting at zero for the bootstrap snapshot.
    pub revision: u64,
    /// Why the notification was emitted.
    pub reason: ChangeReason,
    /// When the notification was emitted.
    pub timestamp: DateTime<Utc>,
    /// Snapshot delivered with the notification.
    pub snapshot: Snapshot,
}

/// Holds the current snapshot and rebuilds it from the registry.
#[derive(Debug)]
pub struct SnapshotStore {
    registry: Arc<FlagRegistry>,
    current: RwLock<Snapshot>,
}

impl SnapshotStore {
    /// Create a store whose first snapshot holds the registry's current values.
    #[must_use]
    pub fn new(registry: Arc<FlagRegistry>) -> Self {
        let initial = Snapshot::new(registry.evaluate_all());
        Self {
            registry,
            current: RwLock::new(initial),
        }
    }

    /// Last stored snapshot.
    #[must_use]
    pub fn current(&self) -> Snapshot {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-evaluate every flag and replace the stored snapshot.
    ///
    /// Evaluation happens outside the lock; concurrent rebuilds race and the
    /// last write wins.
    pub fn rebuild(&self) -> Snapshot {
        let snapshot = Snapshot::new(self.registry.evaluate_all());
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RemoteValues;
    use serde_json::json;

    fn store() -> (Arc<FlagRegistry>, SnapshotStore) {
        let mut builder = FlagRegistry::builder();
        builder.define_bool("showDealerRatings", true).unwrap();
        builder
            .define_variant(
                "pricingDisplay",
                "total-price",
                &["total-price", "monthly-payment", "both"],
            )
            .unwrap();
        let registry = Arc::new(builder.build());
        let store = SnapshotStore::new(Arc::clone(&registry));
        (registry, store)
    }

    #[test]
    fn initial_snapshot_holds_defaults() {
        let (_, store) = store();
        let snapshot = store.current();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.is_enabled("showDealerRatings"), Some(true));
        assert_eq!(snapshot.value_str("pricingDisplay"), Some("total-price"));
    }

    #[test]
    fn rebuild_is_idempotent_by_value() {
        let (_, store) = store();
        let first = store.rebuild();
        let second = store.rebuild();
        assert_eq!(first, second);
        assert!(!first.ptr_eq(&second));
        assert!(store.current().ptr_eq(&second));
    }

    #[test]
    fn rebuild_swaps_without_touching_previous_snapshot() {
        let (registry, store) = store();
        let before = store.current();
        registry.apply_remote(RemoteValues::new().with("pricingDisplay", "monthly-payment"));
        let after = store.rebuild();

        assert_eq!(before.value_str("pricingDisplay"), Some("total-price"));
        assert_eq!(after.value_str("pricingDisplay"), Some("monthly-payment"));
        assert_eq!(before.changed_keys(&after), vec!["pricingDisplay".to_string()]);
    }

    #[test]
    fn snapshot_serializes_as_plain_map() {
        let (_, store) = store();
        let value = serde_json::to_value(store.current()).unwrap();
        assert_eq!(
            value,
            json!({ "pricingDisplay": "total-price", "showDealerRatings": true })
        );
    }
}
