use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use autostack_flags::{
    ChangeReason, FetchSource, FlagContext, FlagValue, Lifecycle, PricingDisplay, RemoteValues,
    SyncOptions, SyncStatus,
};
use autostack_test_support::fixtures::{SCENARIO_ENV_KEY, catalog_context, scenario_context};
use autostack_test_support::mocks::{FailingSource, ScriptedSource};
use autostack_test_support::recorder::NotificationRecorder;
use tokio_stream::StreamExt;

#[tokio::test]
async fn remote_variant_reaches_subscribers_after_rebuild() -> anyhow::Result<()> {
    let source = ScriptedSource::new(RemoteValues::new().with("pricingDisplay", "monthly-payment"))
        .shared();
    let (ctx, flags) = scenario_context(source.clone())?;

    assert_eq!(ctx.is_enabled("showDealerRatings"), Some(true));
    assert_eq!(
        ctx.get_value("pricingDisplay"),
        Some(FlagValue::from("total-price"))
    );

    let recorder = NotificationRecorder::new();
    let _subscription = recorder.attach(&ctx);
    let before = ctx.snapshot();

    let status = ctx.setup(Some(SCENARIO_ENV_KEY), SyncOptions::new()).await;
    assert!(matches!(status, SyncStatus::Synced { result } if result.has_changes));
    assert_eq!(source.keys(), vec![SCENARIO_ENV_KEY.to_string()]);

    let fetched = recorder
        .notifications()
        .into_iter()
        .find(|notification| notification.reason == ChangeReason::Fetched)
        .ok_or_else(|| anyhow::anyhow!("no fetched notification"))?;
    assert_eq!(
        fetched.snapshot.value_str("pricingDisplay"),
        Some("monthly-payment")
    );
    assert!(fetched.snapshot.enabled(flags.show_dealer_ratings));

    let after = ctx.rebuild();
    assert_eq!(before.changed_keys(&after), vec!["pricingDisplay".to_string()]);
    assert_eq!(ctx.variant(flags.pricing_display), "monthly-payment");
    Ok(())
}

#[tokio::test]
async fn rejected_setup_notifies_error_with_defaults() -> anyhow::Result<()> {
    let source = FailingSource::shared();
    let (ctx, _) = scenario_context(source.clone())?;
    let defaults = ctx.snapshot();

    let recorder = NotificationRecorder::new();
    let _subscription = recorder.attach(&ctx);

    let status = ctx.setup(Some(SCENARIO_ENV_KEY), SyncOptions::new()).await;

    assert!(status.is_degraded());
    assert_eq!(source.calls(), 1);
    assert!(!ctx.registry().has_remote());
    assert_eq!(recorder.reasons(), vec!["error".to_string()]);
    let last = recorder
        .last()
        .ok_or_else(|| anyhow::anyhow!("no notification"))?;
    assert_eq!(last.snapshot, defaults);
    assert_eq!(ctx.lifecycle(), Lifecycle::Synced);
    Ok(())
}

#[tokio::test]
async fn concurrent_setup_issues_one_fetch_and_one_completion() -> anyhow::Result<()> {
    let source = ScriptedSource::new(RemoteValues::new().with("showDealerRatings", false))
        .with_delay(Duration::from_millis(25))
        .shared();
    let (ctx, flags) = scenario_context(source.clone())?;
    let completions = Arc::new(AtomicUsize::new(0));

    let first_counter = Arc::clone(&completions);
    let second_counter = Arc::clone(&completions);
    let (first, second) = tokio::join!(
        ctx.setup(
            Some(SCENARIO_ENV_KEY),
            SyncOptions::new().on_complete(move |_| {
                first_counter.fetch_add(1, Ordering::SeqCst);
            }),
        ),
        ctx.setup(
            Some(SCENARIO_ENV_KEY),
            SyncOptions::new().on_complete(move |_| {
                second_counter.fetch_add(1, Ordering::SeqCst);
            }),
        ),
    );

    assert_eq!(first, second);
    assert_eq!(source.calls(), 1);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(!ctx.enabled(flags.show_dealer_ratings));
    assert_eq!(ctx.sync_status(), Some(first));
    Ok(())
}

#[tokio::test]
async fn local_mode_never_contacts_source() -> anyhow::Result<()> {
    let source = ScriptedSource::new(RemoteValues::new().with("pricingDisplay", "both")).shared();
    let (ctx, flags) = catalog_context(source.clone())?;
    let recorder = NotificationRecorder::new();
    let _subscription = recorder.attach(&ctx);

    let status = ctx.setup(Some("local-mode"), SyncOptions::new()).await;

    assert_eq!(status, SyncStatus::LocalMode);
    assert_eq!(source.calls(), 0);
    assert_eq!(recorder.reasons(), vec!["initialized".to_string()]);
    assert_eq!(flags.pricing_display(&ctx), PricingDisplay::TotalPrice);
    Ok(())
}

#[tokio::test]
async fn watchers_see_increasing_revisions() -> anyhow::Result<()> {
    let source = ScriptedSource::new(RemoteValues::new().with("pricingDisplay", "both"))
        .with_source(FetchSource::Cache)
        .shared();
    let (ctx, flags) = catalog_context(source)?;
    let mut updates = ctx.watch();

    let bootstrap = updates
        .next()
        .await
        .ok_or_else(|| anyhow::anyhow!("watch closed"))?;
    assert_eq!(bootstrap.revision, 0);
    assert_eq!(bootstrap.reason, ChangeReason::Defaults);

    let fetched_flag = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&fetched_flag);
    let status = ctx
        .setup(
            Some(SCENARIO_ENV_KEY),
            SyncOptions::new().on_fetched(move |result| {
                assert_eq!(result.source, FetchSource::Cache);
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await;
    assert!(!status.is_degraded());
    assert_eq!(fetched_flag.load(Ordering::SeqCst), 1);

    let latest = updates
        .next()
        .await
        .ok_or_else(|| anyhow::anyhow!("watch closed"))?;
    assert_eq!(latest.revision, 2);
    assert_eq!(latest.reason, ChangeReason::Initialized);
    assert_eq!(flags.values_from(&latest.snapshot).pricing_display, PricingDisplay::Both);
    Ok(())
}

#[tokio::test]
async fn panicking_subscriber_does_not_break_setup() -> anyhow::Result<()> {
    let source = ScriptedSource::new(RemoteValues::new()).shared();
    let (ctx, _) = scenario_context(source)?;
    let _failing = ctx.subscribe(|_, _| panic!("subscriber exploded"));
    let recorder = NotificationRecorder::new();
    let _subscription = recorder.attach(&ctx);

    let status = ctx.setup(Some(SCENARIO_ENV_KEY), SyncOptions::new()).await;

    assert!(matches!(status, SyncStatus::Synced { result } if !result.has_changes));
    assert_eq!(
        recorder.reasons(),
        vec!["fetched".to_string(), "initialized".to_string()]
    );
    Ok(())
}

#[test]
fn guard_scopes_subscription() -> anyhow::Result<()> {
    let (registry, _) = autostack_flags::AutostackFlags::registry()?;
    let ctx = FlagContext::local(registry);
    let recorder = NotificationRecorder::new();
    {
        let _guard = recorder.attach(&ctx).into_guard();
        let _ = ctx.refresh(&ChangeReason::Manual);
    }
    let _ = ctx.refresh(&ChangeReason::Manual);
    assert_eq!(recorder.len(), 1);
    Ok(())
}
