//! Command-line entrypoint for inspecting Autostack feature flags.

use std::time::Duration;

use autostack_flags::config::{BASE_URL_VAR, ENDPOINT_VAR};
use autostack_flags::{App, FlagsConfig};
use autostack_telemetry::{LogFormat, LoggingConfig, init_logging};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Url;
use tracing::debug;
use uuid::Uuid;

use crate::client::{CliResult, CommandContext, build_client, parse_url};
use crate::commands::definitions::handle_definitions;
use crate::commands::snapshot::handle_snapshot;

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Parse arguments and run the command. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    install_logging(&cli);

    let trace_id = Uuid::new_v4().to_string();
    debug!(trace_id = %trace_id, command = command_label(&cli.command), "running command");

    match dispatch(cli, &trace_id).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

fn install_logging(cli: &Cli) {
    let defaults = LoggingConfig::default();
    let config = LoggingConfig {
        level: &cli.log_level,
        format: cli
            .log_format
            .as_deref()
            .and_then(LogFormat::parse)
            .unwrap_or(defaults.format),
        build_sha: option_env!("AUTOSTACK_BUILD_SHA").unwrap_or(defaults.build_sha),
        span_timings: cli.log_spans,
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: {err}");
    }
}

async fn dispatch(cli: Cli, trace_id: &str) -> CliResult<()> {
    let flags = cli.flags.into_config(FlagsConfig::from_env());
    let ctx = CommandContext {
        client: build_client(flags.timeout, trace_id)?,
        flags,
        app: cli.app.into(),
    };

    match cli.command {
        Command::Definitions => handle_definitions(&ctx, cli.output),
        Command::Snapshot => handle_snapshot(&ctx, cli.output).await,
    }
}

#[derive(Parser)]
#[command(
    name = "autostack-flags",
    about = "Inspect Autostack feature flag definitions and live values"
)]
pub(crate) struct Cli {
    #[command(flatten)]
    flags: FlagArgs,
    #[arg(
        long,
        global = true,
        env = "AUTOSTACK_APP",
        value_enum,
        default_value_t = AppArg::Web,
        help = "Client application whose flags are shown"
    )]
    app: AppArg,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[arg(
        long,
        global = true,
        env = "AUTOSTACK_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    log_level: String,
    #[arg(long, global = true, env = "AUTOSTACK_LOG_FORMAT", help = "json or pretty")]
    log_format: Option<String>,
    #[arg(
        long,
        global = true,
        env = "AUTOSTACK_LOG_SPANS",
        help = "Log span timings, including the remote setup attempt"
    )]
    log_spans: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Default)]
pub(crate) struct FlagArgs {
    #[arg(
        long,
        global = true,
        env = ENDPOINT_VAR,
        value_parser = parse_url,
        help = "Configuration endpoint; the environment key is appended as a path segment"
    )]
    pub(crate) endpoint: Option<Url>,
    #[arg(
        long,
        global = true,
        help = "Environment key; `local-mode` skips the remote fetch"
    )]
    pub(crate) env_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = BASE_URL_VAR,
        value_parser = parse_url,
        help = "Base URL serving config/fm.json when no key is configured"
    )]
    pub(crate) base_url: Option<Url>,
    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "HTTP timeout in seconds for flag requests"
    )]
    pub(crate) timeout: Option<u64>,
}

impl FlagArgs {
    /// Overlay explicit arguments on the environment-derived configuration.
    pub(crate) fn into_config(self, base: FlagsConfig) -> FlagsConfig {
        let mut config = base.with_env_key(self.env_key.as_deref());
        if let Some(endpoint) = self.endpoint {
            config.endpoint = Some(endpoint.to_string());
        }
        if let Some(base_url) = self.base_url {
            config.base_url = Some(base_url.to_string());
        }
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    /// List declared flags with their kinds, defaults and options.
    Definitions,
    /// Run the remote setup once and print the resulting snapshot.
    Snapshot,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum AppArg {
    #[default]
    Web,
    Mobile,
}

impl From<AppArg> for App {
    fn from(value: AppArg) -> Self {
        match value {
            AppArg::Web => Self::Web,
            AppArg::Mobile => Self::Mobile,
        }
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Definitions => "definitions",
        Command::Snapshot => "snapshot",
    }
}
