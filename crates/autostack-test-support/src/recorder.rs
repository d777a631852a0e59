//! Capture of subscriber notifications.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use autostack_flags::{ChangeReason, FlagContext, Snapshot, Subscription};

/// A single delivered notification.
#[derive(Debug, Clone)]
pub struct RecordedNotification {
    /// Reason passed to the subscriber.
    pub reason: ChangeReason,
    /// Snapshot passed to the subscriber.
    pub snapshot: Snapshot,
}

/// Records every notification delivered to its subscription.
#[derive(Debug, Clone, Default)]
pub struct NotificationRecorder {
    seen: Arc<Mutex<Vec<RecordedNotification>>>,
}

impl NotificationRecorder {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe the recorder to `ctx`.
    pub fn attach(&self, ctx: &FlagContext) -> Subscription {
        let seen = Arc::clone(&self.seen);
        ctx.subscribe(move |reason, snapshot| {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(RecordedNotification {
                    reason: reason.clone(),
                    snapshot: snapshot.clone(),
                });
        })
    }

    /// Every notification in delivery order.
    #[must_use]
    pub fn notifications(&self) -> Vec<RecordedNotification> {
        self.lock().clone()
    }

    /// Reason labels in delivery order.
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|notification| notification.reason.to_string())
            .collect()
    }

    /// Most recent notification.
    #[must_use]
    pub fn last(&self) -> Option<RecordedNotification> {
        self.lock().last().cloned()
    }

    /// Number of notifications received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedNotification>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::scenario_registry;
    use autostack_flags::FlagResult;

    #[test]
    fn recorder_captures_reason_and_snapshot() -> FlagResult<()> {
        let (registry, flags) = scenario_registry()?;
        let ctx = FlagContext::local(registry);
        let recorder = NotificationRecorder::new();
        let subscription = recorder.attach(&ctx);

        let snapshot = ctx.refresh(&ChangeReason::Manual);
        assert_eq!(recorder.reasons(), vec!["manual".to_string()]);
        let last = recorder.last().map(|notification| notification.snapshot);
        assert!(last.is_some_and(|seen| seen.ptr_eq(&snapshot)));
        assert!(snapshot.enabled(flags.show_dealer_ratings));

        assert!(subscription.unsubscribe());
        let _ = ctx.refresh(&ChangeReason::Manual);
        assert_eq!(recorder.len(), 1);
        Ok(())
    }
}
