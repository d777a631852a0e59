//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use autostack_flags::{FlagDefinition, FlagSpec, SyncStatus};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};
use crate::commands::snapshot::SnapshotReport;

pub(crate) fn render_definitions(
    definitions: &[&FlagDefinition],
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&definitions),
        OutputFormat::Table => {
            let mut lines = vec![format!(
                "{:<26} {:<8} {:<18} OPTIONS",
                "KEY", "KIND", "DEFAULT"
            )];
            for definition in definitions {
                let default = definition.default_value().to_string();
                let options = match definition.spec() {
                    FlagSpec::Boolean { .. } => "-".to_string(),
                    FlagSpec::Variant { options, .. } => options.join(", "),
                };
                lines.push(format!(
                    "{:<26} {:<8} {:<18} {}",
                    definition.key(),
                    definition.kind().as_str(),
                    default,
                    options
                ));
            }
            Ok(lines.join("\n"))
        }
    }
}

pub(crate) fn render_snapshot(report: &SnapshotReport, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Table => {
            let mut lines = vec![
                format!("app: {}", report.app.as_str()),
                format!("sync: {}", describe_status(&report.sync)),
                format!("lifecycle: {}", report.lifecycle.as_str()),
                format!("revision: {}", report.revision),
                format!("{:<26} VALUE", "KEY"),
            ];
            for (key, value) in &report.flags {
                lines.push(format!("{key:<26} {value}"));
            }
            Ok(lines.join("\n"))
        }
    }
}

#[must_use]
pub(crate) fn describe_status(status: &SyncStatus) -> String {
    match status {
        SyncStatus::Synced { result } => format!(
            "synced ({}, {})",
            result.source,
            if result.has_changes {
                "changed"
            } else {
                "unchanged"
            }
        ),
        SyncStatus::LocalMode => "local mode".to_string(),
        SyncStatus::Degraded { reason } => format!("degraded ({reason})"),
    }
}

fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}
