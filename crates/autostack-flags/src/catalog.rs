//! Declared autostack flags with typed accessors.
//!
//! # Design
//! - The catalog is the union of the web and mobile client flags; [`App`]
//!   narrows it to the keys a given client reads.
//! - Variant flags get typed enums that parse from and render to wire strings.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::FlagContext;
use crate::error::FlagResult;
use crate::model::{BoolFlag, VariantFlag};
use crate::registry::{FlagRegistry, FlagRegistryBuilder};
use crate::snapshot::Snapshot;

/// Search result ordering.
pub const SEARCH_ALGORITHM: &str = "searchAlgorithm";
/// Dealer ratings on listings.
pub const SHOW_DEALER_RATINGS: &str = "showDealerRatings";
/// Instant trade-in offer flow.
pub const ENABLE_INSTANT_TRADE_IN: &str = "enableInstantTradeIn";
/// Advanced search filters.
pub const ENABLE_ADVANCED_FILTERS: &str = "enableAdvancedFilters";
/// Price presentation mode.
pub const PRICING_DISPLAY: &str = "pricingDisplay";
/// Financing calculator widget.
pub const SHOW_FINANCING_CALCULATOR: &str = "showFinancingCalculator";
/// 360 degree photo viewer.
pub const ENABLE_360_PHOTOS: &str = "enable360Photos";
/// Recommendation engine.
pub const VEHICLE_RECOMMENDATIONS: &str = "vehicleRecommendations";
/// Monthly payment shown ahead of the total price.
pub const SHOW_MONTHLY_PAYMENT_FIRST: &str = "showMonthlyPaymentFirst";
/// AI recommendation carousel.
pub const SHOW_AI_RECOMMENDATIONS: &str = "showAIRecommendations";
/// High resolution listing images.
pub const ENABLE_HIGH_RES_IMAGES: &str = "enableHighResImages";

const WEB_KEYS: [&str; 8] = [
    SEARCH_ALGORITHM,
    SHOW_DEALER_RATINGS,
    ENABLE_INSTANT_TRADE_IN,
    ENABLE_ADVANCED_FILTERS,
    PRICING_DISPLAY,
    SHOW_FINANCING_CALCULATOR,
    ENABLE_360_PHOTOS,
    VEHICLE_RECOMMENDATIONS,
];

const MOBILE_KEYS: [&str; 11] = [
    SEARCH_ALGORITHM,
    SHOW_DEALER_RATINGS,
    ENABLE_INSTANT_TRADE_IN,
    ENABLE_ADVANCED_FILTERS,
    PRICING_DISPLAY,
    SHOW_FINANCING_CALCULATOR,
    ENABLE_360_PHOTOS,
    VEHICLE_RECOMMENDATIONS,
    SHOW_MONTHLY_PAYMENT_FIRST,
    SHOW_AI_RECOMMENDATIONS,
    ENABLE_HIGH_RES_IMAGES,
];

/// Client application reading the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum App {
    /// Browser client.
    #[default]
    Web,
    /// Native mobile client; reads every catalog flag.
    Mobile,
}

impl App {
    /// Flag keys read by this client, in declaration order.
    #[must_use]
    pub const fn flag_keys(self) -> &'static [&'static str] {
        match self {
            Self::Web => &WEB_KEYS,
            Self::Mobile => &MOBILE_KEYS,
        }
    }

    /// Whether this client reads `key`.
    #[must_use]
    pub fn reads(self, key: &str) -> bool {
        self.flag_keys().contains(&key)
    }

    /// Render the app as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Mobile => "mobile",
        }
    }
}

/// Error returned when a wire string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown catalog value")]
pub struct UnknownVariant {
    /// Catalog type being parsed.
    pub kind: &'static str,
    /// Offending input.
    pub value: String,
}

macro_rules! catalog_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $wire)] $variant),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &[Self] = &[$(Self::$variant),+];

            /// Wire representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            fn wire_options() -> Vec<&'static str> {
                Self::ALL.iter().copied().map(Self::as_str).collect()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

catalog_enum! {
    /// Ordering applied to search results.
    SearchAlgorithm, "searchAlgorithm" {
        /// Cheapest first.
        #[default]
        PriceLowToHigh => "price-low-to-high",
        /// Most recently listed first.
        NewestFirst => "newest-first",
        /// Ranked by the recommendation service.
        Recommended => "recommended",
    }
}

catalog_enum! {
    /// How listing prices are presented.
    PricingDisplay, "pricingDisplay" {
        /// Full purchase price.
        #[default]
        TotalPrice => "total-price",
        /// Estimated monthly payment.
        MonthlyPayment => "monthly-payment",
        /// Both figures.
        Both => "both",
    }
}

catalog_enum! {
    /// Strategy behind vehicle recommendations.
    VehicleRecommendations, "vehicleRecommendations" {
        /// Similar price band.
        #[default]
        PriceBased => "price-based",
        /// Similar features.
        FeatureBased => "feature-based",
        /// Model-driven ranking.
        AiPowered => "ai-powered",
    }
}

/// Typed handles for every catalog flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutostackFlags {
    search_algorithm: VariantFlag,
    show_dealer_ratings: BoolFlag,
    enable_instant_trade_in: BoolFlag,
    enable_advanced_filters: BoolFlag,
    pricing_display: VariantFlag,
    show_financing_calculator: BoolFlag,
    enable_360_photos: BoolFlag,
    vehicle_recommendations: VariantFlag,
    show_monthly_payment_first: BoolFlag,
    show_ai_recommendations: BoolFlag,
    enable_high_res_images: BoolFlag,
}

impl AutostackFlags {
    /// Declare every catalog flag on `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FlagError::DuplicateKey`] when `builder` already holds
    /// one of the catalog keys.
    pub fn register(builder: &mut FlagRegistryBuilder) -> FlagResult<Self> {
        Ok(Self {
            search_algorithm: builder.define_variant(
                SEARCH_ALGORITHM,
                SearchAlgorithm::default().as_str(),
                &SearchAlgorithm::wire_options(),
            )?,
            show_dealer_ratings: builder.define_bool(SHOW_DEALER_RATINGS, true)?,
            enable_instant_trade_in: builder.define_bool(ENABLE_INSTANT_TRADE_IN, false)?,
            enable_advanced_filters: builder.define_bool(ENABLE_ADVANCED_FILTERS, false)?,
            pricing_display: builder.define_variant(
                PRICING_DISPLAY,
                PricingDisplay::default().as_str(),
                &PricingDisplay::wire_options(),
            )?,
            show_financing_calculator: builder.define_bool(SHOW_FINANCING_CALCULATOR, true)?,
            enable_360_photos: builder.define_bool(ENABLE_360_PHOTOS, false)?,
            vehicle_recommendations: builder.define_variant(
                VEHICLE_RECOMMENDATIONS,
                VehicleRecommendations::default().as_str(),
                &VehicleRecommendations::wire_options(),
            )?,
            show_monthly_payment_first: builder.define_bool(SHOW_MONTHLY_PAYMENT_FIRST, false)?,
            show_ai_recommendations: builder.define_bool(SHOW_AI_RECOMMENDATIONS, false)?,
            enable_high_res_images: builder.define_bool(ENABLE_HIGH_RES_IMAGES, true)?,
        })
    }

    /// Build a registry holding exactly the catalog.
    ///
    /// # Errors
    ///
    /// Propagates [`AutostackFlags::register`] failures.
    pub fn registry() -> FlagResult<(FlagRegistry, Self)> {
        let mut builder = FlagRegistry::builder();
        let flags = Self::register(&mut builder)?;
        Ok((builder.build(), flags))
    }

    /// Current search ordering.
    #[must_use]
    pub fn search_algorithm(&self, ctx: &FlagContext) -> SearchAlgorithm {
        parse_or_default(&ctx.variant(self.search_algorithm))
    }

    /// Whether dealer ratings are shown.
    #[must_use]
    pub fn show_dealer_ratings(&self, ctx: &FlagContext) -> bool {
        ctx.enabled(self.show_dealer_ratings)
    }

    /// Whether instant trade-in is offered.
    #[must_use]
    pub fn enable_instant_trade_in(&self, ctx: &FlagContext) -> bool {
        ctx.enabled(self.enable_instant_trade_in)
    }

    /// Whether advanced filters are available.
    #[must_use]
    pub fn enable_advanced_filters(&self, ctx: &FlagContext) -> bool {
        ctx.enabled(self.enable_advanced_filters)
    }

    /// Current price presentation.
    #[must_use]
    pub fn pricing_display(&self, ctx: &FlagContext) -> PricingDisplay {
        parse_or_default(&ctx.variant(self.pricing_display))
    }

    /// Whether the financing calculator is shown.
    #[must_use]
    pub fn show_financing_calculator(&self, ctx: &FlagContext) -> bool {
        ctx.enabled(self.show_financing_calculator)
    }

    /// Whether 360 degree photos are enabled.
    #[must_use]
    pub fn enable_360_photos(&self, ctx: &FlagContext) -> bool {
        ctx.enabled(self.enable_360_photos)
    }

    /// Current recommendation strategy.
    #[must_use]
    pub fn vehicle_recommendations(&self, ctx: &FlagContext) -> VehicleRecommendations {
        parse_or_default(&ctx.variant(self.vehicle_recommendations))
    }

    /// Whether the monthly payment leads the price block.
    #[must_use]
    pub fn show_monthly_payment_first(&self, ctx: &FlagContext) -> bool {
        ctx.enabled(self.show_monthly_payment_first)
    }

    /// Whether AI recommendations are shown.
    #[must_use]
    pub fn show_ai_recommendations(&self, ctx: &FlagContext) -> bool {
        ctx.enabled(self.show_ai_recommendations)
    }

    /// Whether high resolution images are served.
    #[must_use]
    pub fn enable_high_res_images(&self, ctx: &FlagContext) -> bool {
        ctx.enabled(self.enable_high_res_images)
    }

    /// Typed view of every catalog flag from the last stored snapshot.
    #[must_use]
    pub fn values(&self, ctx: &FlagContext) -> FlagValues {
        self.values_from(&ctx.snapshot())
    }

    /// Typed view of every catalog flag in `snapshot`.
    #[must_use]
    pub fn values_from(&self, snapshot: &Snapshot) -> FlagValues {
        FlagValues {
            search_algorithm: parse_or_default(snapshot.variant(self.search_algorithm)),
            show_dealer_ratings: snapshot.enabled(self.show_dealer_ratings),
            enable_instant_trade_in: snapshot.enabled(self.enable_instant_trade_in),
            enable_advanced_filters: snapshot.enabled(self.enable_advanced_filters),
            pricing_display: parse_or_default(snapshot.variant(self.pricing_display)),
            show_financing_calculator: snapshot.enabled(self.show_financing_calculator),
            enable_360_photos: snapshot.enabled(self.enable_360_photos),
            vehicle_recommendations: parse_or_default(
                snapshot.variant(self.vehicle_recommendations),
            ),
            show_monthly_payment_first: snapshot.enabled(self.show_monthly_payment_first),
            show_ai_recommendations: snapshot.enabled(self.show_ai_recommendations),
            enable_high_res_images: snapshot.enabled(self.enable_high_res_images),
        }
    }
}

/// Typed values of every catalog flag, serialised with wire keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct FlagValues {
    /// `searchAlgorithm`.
    pub search_algorithm: SearchAlgorithm,
    /// `showDealerRatings`.
    pub show_dealer_ratings: bool,
    /// `enableInstantTradeIn`.
    pub enable_instant_trade_in: bool,
    /// `enableAdvancedFilters`.
    pub enable_advanced_filters: bool,
    /// `pricingDisplay`.
    pub pricing_display: PricingDisplay,
    /// `showFinancingCalculator`.
    pub show_financing_calculator: bool,
    /// `enable360Photos`.
    #[serde(rename = "enable360Photos")]
    pub enable_360_photos: bool,
    /// `vehicleRecommendations`.
    pub vehicle_recommendations: VehicleRecommendations,
    /// `showMonthlyPaymentFirst`.
    pub show_monthly_payment_first: bool,
    /// `showAIRecommendations`.
    #[serde(rename = "showAIRecommendations")]
    pub show_ai_recommendations: bool,
    /// `enableHighResImages`.
    pub enable_high_res_images: bool,
}

// Registered options mirror the enum variants, so a parse failure means the
// value bypassed coercion; the default is served instead.
fn parse_or_default<T: FromStr + Default>(value: &str) -> T {
    value.parse().unwrap_or_default()
}
