//! Observer bus delivering `(reason, snapshot)` notifications.
//!
//! Callbacks run in registration order, outside the bus lock, so a callback may
//! subscribe or unsubscribe while a notification is in flight; such changes take
//! effect from the next `notify`. A panicking callback is caught and logged and
//! does not stop delivery to the others.

use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::error;

use crate::model::ChangeReason;
use crate::snapshot::Snapshot;

/// Identifier assigned to each subscription.
pub type SubscriberId = u64;

type Callback = Arc<dyn Fn(&ChangeReason, &Snapshot) + Send + Sync>;

struct Entry {
    id: SubscriberId,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn lock_entries(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }
}

/// Counts reported by a single `notify` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Callbacks that returned normally.
    pub delivered: usize,
    /// Callbacks that panicked.
    pub failed: usize,
}

/// Shared observer registry.
#[derive(Clone, Default)]
pub struct SubscriptionBus {
    inner: Arc<BusInner>,
}

impl SubscriptionBus {
    /// Construct an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every notification.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeReason, &Snapshot) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.lock_entries().push(Entry {
            id,
            callback: Arc::new(callback),
        });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
            active: AtomicBool::new(true),
        }
    }

    /// Invoke every registered callback once, in registration order, with the
    /// same snapshot reference.
    pub fn notify(&self, reason: &ChangeReason, snapshot: &Snapshot) -> Delivery {
        let callbacks: Vec<(SubscriberId, Callback)> = self
            .inner
            .lock_entries()
            .iter()
            .map(|entry| (entry.id, Arc::clone(&entry.callback)))
            .collect();

        let mut delivery = Delivery::default();
        for (id, callback) in callbacks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(reason, snapshot)));
            match outcome {
                Ok(()) => delivery.delivered += 1,
                Err(payload) => {
                    delivery.failed += 1;
                    error!(
                        subscriber = id,
                        reason = %reason,
                        panic = panic_message(payload.as_ref()),
                        "flag subscriber panicked during notification"
                    );
                }
            }
        }
        delivery
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock_entries().len()
    }

    /// Whether no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock_entries().is_empty()
    }
}

impl Debug for SubscriptionBus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SubscriptionBus")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Disposer returned by [`SubscriptionBus::subscribe`].
///
/// Dropping it does not unsubscribe; wrap it in a [`SubscriptionGuard`] for
/// scope-bound registration.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: SubscriberId,
    bus: Weak<BusInner>,
    active: AtomicBool,
}

impl Subscription {
    /// Identifier of this subscription.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether `unsubscribe` has not been called yet and the bus is alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.bus.strong_count() > 0
    }

    /// Remove the callback from the bus.
    ///
    /// Idempotent: returns `true` only for the call that removed the entry.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.bus.upgrade().is_some_and(|bus| bus.remove(self.id))
    }

    /// Convert into a guard that unsubscribes when dropped.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { subscription: self }
    }
}

/// Unsubscribes its [`Subscription`] on drop.
#[derive(Debug)]
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    subscription: Subscription,
}

impl SubscriptionGuard {
    /// Borrow the wrapped subscription.
    pub const fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let _ = self.subscription.unsubscribe();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use crate::model::FlagValue;

    fn sample_snapshot() -> Snapshot {
        let mut values = BTreeMap::new();
        values.insert("showDealerRatings".to_string(), FlagValue::Bool(true));
        Snapshot::new(values)
    }

    #[test]
    fn notify_delivers_reason_and_snapshot_once() {
        let bus = SubscriptionBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let _subscription = bus.subscribe(move |reason, snapshot| {
            recorder
                .lock()
                .unwrap()
                .push((reason.clone(), snapshot.clone()));
        });

        let snapshot = sample_snapshot();
        let delivery = bus.notify(&ChangeReason::from("x"), &snapshot);

        assert_eq!(delivery, Delivery { delivered: 1, failed: 0 });
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, ChangeReason::Custom("x".into()));
        assert!(seen[0].1.ptr_eq(&snapshot));
    }

    #[test]
    fn unsubscribe_before_notify_prevents_delivery() {
        let bus = SubscriptionBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = bus.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert!(!subscription.is_active());

        let delivery = bus.notify(&ChangeReason::Manual, &sample_snapshot());
        assert_eq!(delivery.delivered, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let bus = SubscriptionBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let _failing = bus.subscribe(|_, _| panic!("subscriber exploded"));
        let counter = Arc::clone(&calls);
        let _healthy = bus.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let delivery = bus.notify(&ChangeReason::Fetched, &sample_snapshot());
        assert_eq!(delivery, Delivery { delivered: 1, failed: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let bus = SubscriptionBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut subscriptions = Vec::new();
        for index in 0..4 {
            let order = Arc::clone(&order);
            subscriptions.push(bus.subscribe(move |_, _| order.lock().unwrap().push(index)));
        }

        let _ = bus.notify(&ChangeReason::Manual, &sample_snapshot());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(subscriptions.len(), bus.len());
    }

    #[test]
    fn callback_may_unsubscribe_itself_during_notify() {
        let bus = SubscriptionBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let counter = Arc::clone(&calls);
        let own = Arc::clone(&slot);
        let subscription = bus.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(subscription) = own.lock().unwrap().as_ref() {
                let _ = subscription.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(subscription);

        let _ = bus.notify(&ChangeReason::Manual, &sample_snapshot());
        let _ = bus.notify(&ChangeReason::Manual, &sample_snapshot());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn guard_unsubscribes_on_drop() {
        let bus = SubscriptionBus::new();
        {
            let guard = bus.subscribe(|_, _| {}).into_guard();
            assert!(guard.subscription().is_active());
            assert_eq!(bus.len(), 1);
        }
        assert!(bus.is_empty());
    }

    #[test]
    fn subscription_outliving_bus_is_inert() {
        let bus = SubscriptionBus::new();
        let subscription = bus.subscribe(|_, _| {});
        drop(bus);
        assert!(!subscription.is_active());
        assert!(!subscription.unsubscribe());
    }
}
