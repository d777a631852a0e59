use anyhow::anyhow;
use autostack_flags::{AutostackFlags, FlagDefinition, FlagRegistry};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult, CommandContext};
use crate::output::render_definitions;

pub(crate) fn handle_definitions(ctx: &CommandContext, format: OutputFormat) -> CliResult<()> {
    let registry = catalog_registry()?;
    let definitions = app_definitions(ctx, &registry);
    println!("{}", render_definitions(&definitions, format)?);
    Ok(())
}

pub(crate) fn catalog_registry() -> CliResult<FlagRegistry> {
    AutostackFlags::registry()
        .map(|(registry, _)| registry)
        .map_err(|err| CliError::failure(anyhow!("flag catalog is invalid: {err}")))
}

pub(crate) fn app_definitions<'a>(
    ctx: &CommandContext,
    registry: &'a FlagRegistry,
) -> Vec<&'a FlagDefinition> {
    registry
        .definitions()
        .iter()
        .filter(|definition| ctx.app.reads(definition.key()))
        .collect()
}
