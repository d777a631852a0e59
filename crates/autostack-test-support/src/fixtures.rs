//! Registry and context fixtures.

use std::sync::Arc;

use autostack_flags::{
    AutostackFlags, BoolFlag, FlagContext, FlagRegistry, FlagResult, RemoteSource, VariantFlag,
};

/// Environment key used by scripted scenarios.
pub const SCENARIO_ENV_KEY: &str = "env-test-key";

/// Handles for the two-flag scenario registry.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioFlags {
    /// `showDealerRatings`, default `true`.
    pub show_dealer_ratings: BoolFlag,
    /// `pricingDisplay`, default `total-price`.
    pub pricing_display: VariantFlag,
}

/// Registry with one boolean and one variant flag.
///
/// # Errors
///
/// Returns an error only if the fixture definitions become invalid.
pub fn scenario_registry() -> FlagResult<(FlagRegistry, ScenarioFlags)> {
    let mut builder = FlagRegistry::builder();
    let show_dealer_ratings = builder.define_bool("showDealerRatings", true)?;
    let pricing_display = builder.define_variant(
        "pricingDisplay",
        "total-price",
        &["total-price", "monthly-payment", "both"],
    )?;
    Ok((
        builder.build(),
        ScenarioFlags {
            show_dealer_ratings,
            pricing_display,
        },
    ))
}

/// Context over the scenario registry backed by `source`.
///
/// # Errors
///
/// Propagates [`scenario_registry`] failures.
pub fn scenario_context(
    source: Arc<dyn RemoteSource>,
) -> FlagResult<(FlagContext, ScenarioFlags)> {
    let (registry, flags) = scenario_registry()?;
    Ok((FlagContext::new(registry, source), flags))
}

/// Context over the full catalog backed by `source`.
///
/// # Errors
///
/// Propagates catalog registration failures.
pub fn catalog_context(
    source: Arc<dyn RemoteSource>,
) -> FlagResult<(FlagContext, AutostackFlags)> {
    let (registry, flags) = AutostackFlags::registry()?;
    Ok((FlagContext::new(registry, source), flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autostack_flags::StaticSource;

    #[test]
    fn scenario_registry_serves_defaults() -> FlagResult<()> {
        let (registry, flags) = scenario_registry()?;
        assert_eq!(registry.len(), 2);
        assert!(registry.enabled(flags.show_dealer_ratings));
        assert_eq!(registry.variant(flags.pricing_display), "total-price");
        Ok(())
    }

    #[test]
    fn catalog_context_starts_uninitialised() -> FlagResult<()> {
        let (ctx, flags) = catalog_context(Arc::new(StaticSource::default()))?;
        assert!(flags.show_dealer_ratings(&ctx));
        assert_eq!(ctx.snapshot().len(), ctx.registry().len());
        Ok(())
    }
}
