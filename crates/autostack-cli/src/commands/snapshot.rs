use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use autostack_flags::config::ENDPOINT_VAR;
use autostack_flags::{App, FlagContext, FlagValue, HttpSource, Lifecycle, SyncOptions, SyncStatus};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult, CommandContext};
use crate::commands::definitions::catalog_registry;
use crate::output::render_snapshot;

/// Result of a one-shot setup, restricted to the selected app's flags.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SnapshotReport {
    pub(crate) app: App,
    pub(crate) sync: SyncStatus,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) revision: u64,
    pub(crate) flags: BTreeMap<String, FlagValue>,
}

pub(crate) async fn handle_snapshot(ctx: &CommandContext, format: OutputFormat) -> CliResult<()> {
    let report = collect_snapshot(ctx).await?;
    println!("{}", render_snapshot(&report, format)?);

    if let SyncStatus::Degraded { reason } = &report.sync {
        return Err(CliError::failure(anyhow!(
            "flag sync degraded, defaults shown: {reason}"
        )));
    }
    Ok(())
}

pub(crate) async fn collect_snapshot(ctx: &CommandContext) -> CliResult<SnapshotReport> {
    let registry = catalog_registry()?;
    let env_key = ctx.flags.resolve_env_key(&ctx.client).await;

    let flags = match (&env_key, ctx.flags.endpoint.as_deref()) {
        (None, _) => FlagContext::local(registry),
        (Some(_), Some(endpoint)) => {
            let source = HttpSource::with_client(ctx.client.clone(), endpoint).map_err(|_| {
                CliError::validation(format!("invalid configuration endpoint '{endpoint}'"))
            })?;
            FlagContext::new(registry, Arc::new(source))
        }
        (Some(_), None) => {
            return Err(CliError::validation(format!(
                "a configuration endpoint is required when an environment key is set \
                 (pass --endpoint or set {ENDPOINT_VAR})"
            )));
        }
    };

    let sync = flags.setup(env_key.as_deref(), SyncOptions::new()).await;
    let snapshot = flags.snapshot();

    Ok(SnapshotReport {
        app: ctx.app,
        sync,
        lifecycle: flags.lifecycle(),
        revision: flags.latest_update().revision,
        flags: snapshot
            .iter()
            .filter(|(key, _)| ctx.app.reads(key))
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
    })
}
