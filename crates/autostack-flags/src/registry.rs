//! Flag registry: declared definitions plus the remote value layer.
//!
//! # Design
//! - Definitions are collected on a builder and frozen by `build()`.
//! - The remote layer is replaced wholesale; reads coerce it against the declared
//!   kind and fall back to the default instead of failing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{FlagError, FlagResult};
use crate::model::{BoolFlag, FlagDefinition, FlagSpec, FlagValue, RemoteValues, VariantFlag};
use crate::validate::{coerce, validate_definition};

/// Collects flag definitions during startup.
#[derive(Debug, Default)]
pub struct FlagRegistryBuilder {
    definitions: Vec<FlagDefinition>,
    index: HashMap<String, usize>,
}

impl FlagRegistryBuilder {
    /// Start an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flag definition.
    ///
    /// # Errors
    ///
    /// Returns a [`FlagError`] if the key is empty or already registered, or if a
    /// variant declares no options, duplicates an option, or has a default
    /// outside its options.
    pub fn define(
        &mut self,
        key: impl Into<String>,
        spec: FlagSpec,
    ) -> FlagResult<&FlagDefinition> {
        let key = key.into();
        validate_definition(&key, &spec)?;
        if self.index.contains_key(&key) {
            return Err(FlagError::DuplicateKey { key });
        }

        let position = self.definitions.len();
        self.index.insert(key.clone(), position);
        self.definitions.push(FlagDefinition::new(key, spec));
        Ok(&self.definitions[position])
    }

    /// Register a boolean flag and return its typed handle.
    ///
    /// # Errors
    ///
    /// Returns a [`FlagError`] if the key is empty or already registered.
    pub fn define_bool(&mut self, key: &'static str, default: bool) -> FlagResult<BoolFlag> {
        self.define(key, FlagSpec::boolean(default))?;
        Ok(BoolFlag::new(key, default))
    }

    /// Register a variant flag and return its typed handle.
    ///
    /// # Errors
    ///
    /// Returns a [`FlagError`] if the key is empty or already registered, or if
    /// the options are empty, duplicated, or do not contain `default`.
    pub fn define_variant(
        &mut self,
        key: &'static str,
        default: &'static str,
        options: &[&'static str],
    ) -> FlagResult<VariantFlag> {
        self.define(key, FlagSpec::variant(default, options.iter().copied()))?;
        Ok(VariantFlag::new(key, default))
    }

    /// Number of flags declared so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no flags have been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Freeze the definitions into a read-only registry.
    #[must_use]
    pub fn build(self) -> FlagRegistry {
        FlagRegistry {
            definitions: self.definitions,
            index: self.index,
            remote: RwLock::new(None),
        }
    }
}

/// Frozen set of flag definitions with an optional remote value layer.
#[derive(Debug)]
pub struct FlagRegistry {
    definitions: Vec<FlagDefinition>,
    index: HashMap<String, usize>,
    remote: RwLock<Option<Arc<RemoteValues>>>,
}

impl FlagRegistry {
    /// Start a builder.
    #[must_use]
    pub fn builder() -> FlagRegistryBuilder {
        FlagRegistryBuilder::new()
    }

    /// All definitions in declaration order.
    #[must_use]
    pub fn definitions(&self) -> &[FlagDefinition] {
        &self.definitions
    }

    /// Definition for `key`, if declared.
    #[must_use]
    pub fn definition(&self, key: &str) -> Option<&FlagDefinition> {
        self.index
            .get(key)
            .and_then(|position| self.definitions.get(*position))
    }

    /// Whether `key` is declared.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of declared flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Whether remote values have been applied.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote_layer().is_some()
    }

    /// Current state of a boolean flag.
    ///
    /// Returns `None` for unknown keys and for variant flags.
    #[must_use]
    pub fn is_enabled(&self, key: &str) -> Option<bool> {
        self.get_value(key).as_ref().and_then(FlagValue::as_bool)
    }

    /// Current value of any flag, or `None` for unknown keys.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<FlagValue> {
        let definition = self.definition(key)?;
        let remote = self.remote_layer();
        Some(evaluate(definition, remote.as_deref()))
    }

    /// Current state of a typed boolean flag.
    #[must_use]
    pub fn enabled(&self, flag: BoolFlag) -> bool {
        self.is_enabled(flag.key())
            .unwrap_or_else(|| flag.default_value())
    }

    /// Current value of a typed variant flag.
    #[must_use]
    pub fn variant(&self, flag: VariantFlag) -> String {
        self.get_value(flag.key())
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| flag.default_value().to_string())
    }

    /// Evaluate every declared flag against one consistent view of the remote layer.
    #[must_use]
    pub fn evaluate_all(&self) -> BTreeMap<String, FlagValue> {
        let remote = self.remote_layer();
        self.definitions
            .iter()
            .map(|definition| {
                (
                    definition.key().to_string(),
                    evaluate(definition, remote.as_deref()),
                )
            })
            .collect()
    }

    /// Replace the remote layer wholesale.
    ///
    /// Returns `true` when at least one effective flag value changed.
    pub fn apply_remote(&self, values: RemoteValues) -> bool {
        let ignored = values.iter().filter(|(key, _)| !self.contains(key)).count();
        if ignored > 0 {
            debug!(ignored, "remote payload carried undeclared flag keys");
        }

        let before = self.evaluate_all();
        {
            let mut remote = self
                .remote
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *remote = Some(Arc::new(values));
        }
        let after = self.evaluate_all();
        before != after
    }

    fn remote_layer(&self) -> Option<Arc<RemoteValues>> {
        self.remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn evaluate(definition: &FlagDefinition, remote: Option<&RemoteValues>) -> FlagValue {
    let Some(raw) = remote.and_then(|values| values.get(definition.key())) else {
        return definition.default_value();
    };

    coerce(definition.spec(), raw).unwrap_or_else(|| {
        debug!(
            flag = definition.key(),
            kind = definition.kind().as_str(),
            "remote value does not match declared kind; serving default"
        );
        definition.default_value()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario() -> (FlagRegistry, BoolFlag, VariantFlag) {
        let mut builder = FlagRegistry::builder();
        let ratings = builder.define_bool("showDealerRatings", true).unwrap();
        let pricing = builder
            .define_variant(
                "pricingDisplay",
                "total-price",
                &["total-price", "monthly-payment", "both"],
            )
            .unwrap();
        (builder.build(), ratings, pricing)
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut builder = FlagRegistry::builder();
        builder.define_bool("enable360Photos", false).unwrap();
        let err = builder.define_bool("enable360Photos", true).unwrap_err();
        assert_eq!(
            err,
            FlagError::DuplicateKey {
                key: "enable360Photos".into()
            }
        );
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn reads_return_defaults_before_remote_values() {
        let (registry, ratings, pricing) = scenario();
        assert!(!registry.has_remote());
        assert_eq!(registry.is_enabled("showDealerRatings"), Some(true));
        assert_eq!(
            registry.get_value("pricingDisplay"),
            Some(FlagValue::Variant("total-price".into()))
        );
        assert!(registry.enabled(ratings));
        assert_eq!(registry.variant(pricing), "total-price");
    }

    #[test]
    fn unknown_keys_and_kind_mismatches_read_as_none() {
        let (registry, _, _) = scenario();
        assert_eq!(registry.get_value("missing"), None);
        assert_eq!(registry.is_enabled("pricingDisplay"), None);
    }

    #[test]
    fn remote_values_are_coerced_with_default_fallback() {
        let (registry, ratings, pricing) = scenario();
        let changed = registry.apply_remote(
            RemoteValues::new()
                .with("showDealerRatings", "false")
                .with("pricingDisplay", json!(42)),
        );
        assert!(changed);
        assert!(!registry.enabled(ratings));
        assert_eq!(registry.variant(pricing), "total-price");
    }

    #[test]
    fn apply_remote_reports_only_effective_changes() {
        let (registry, _, _) = scenario();
        assert!(!registry.apply_remote(RemoteValues::new().with("showDealerRatings", true)));
        assert!(!registry.apply_remote(RemoteValues::new().with("unknownFlag", true)));
        assert!(registry.apply_remote(RemoteValues::new().with("pricingDisplay", "both")));
        assert!(!registry.apply_remote(RemoteValues::new().with("pricingDisplay", "both")));
        assert!(registry.has_remote());
    }

    #[test]
    fn evaluate_all_covers_every_definition() {
        let (registry, _, _) = scenario();
        let values = registry.evaluate_all();
        assert_eq!(values.len(), registry.len());
        assert_eq!(values["showDealerRatings"], FlagValue::Bool(true));
    }
}
