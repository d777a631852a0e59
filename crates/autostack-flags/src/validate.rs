//! Validation and coercion helpers for flag definitions, remote values and keys.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{FlagError, FlagResult, SourceError, SourceResult};
use crate::model::{FlagSpec, FlagValue};

/// Sentinel key meaning "do not contact the remote service".
pub const LOCAL_MODE_KEY: &str = "local-mode";

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn validate_definition(key: &str, spec: &FlagSpec) -> FlagResult<()> {
    if key.trim().is_empty() {
        return Err(FlagError::EmptyKey);
    }

    let FlagSpec::Variant { default, options } = spec else {
        return Ok(());
    };

    if options.is_empty() {
        return Err(FlagError::NoVariantOptions {
            key: key.to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(options.len());
    for option in options {
        if !seen.insert(option.as_str()) {
            return Err(FlagError::DuplicateOption {
                key: key.to_string(),
                option: option.clone(),
            });
        }
    }

    if !seen.contains(default.as_str()) {
        return Err(FlagError::DefaultNotAllowed {
            key: key.to_string(),
            default: default.clone(),
        });
    }

    Ok(())
}

/// Coerce a raw remote value to the declared kind.
///
/// Returns `None` when the value has the wrong shape or names an option the
/// flag does not allow; callers fall back to the default.
#[allow(clippy::redundant_pub_crate)]
pub(crate) fn coerce(spec: &FlagSpec, raw: &Value) -> Option<FlagValue> {
    match spec {
        FlagSpec::Boolean { .. } => match raw {
            Value::Bool(value) => Some(FlagValue::Bool(*value)),
            Value::String(text) if text.eq_ignore_ascii_case("true") => Some(FlagValue::Bool(true)),
            Value::String(text) if text.eq_ignore_ascii_case("false") => {
                Some(FlagValue::Bool(false))
            }
            _ => None,
        },
        FlagSpec::Variant { options, .. } => match raw {
            Value::String(text) if options.iter().any(|option| option == text) => {
                Some(FlagValue::Variant(text.clone()))
            }
            _ => None,
        },
    }
}

/// Normalise an optional environment key, treating blanks and the local-mode
/// sentinel as "no key".
#[must_use]
pub fn normalize_env_key(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim)
        .filter(|key| !key.is_empty() && !key.eq_ignore_ascii_case(LOCAL_MODE_KEY))
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn validate_env_key(key: &str) -> SourceResult<&str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(SourceError::MalformedKey {
            reason: "key is empty",
        });
    }
    if trimmed
        .chars()
        .any(|ch| ch.is_whitespace() || ch.is_control())
    {
        return Err(SourceError::MalformedKey {
            reason: "key contains whitespace or control characters",
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pricing() -> FlagSpec {
        FlagSpec::variant("total-price", ["total-price", "monthly-payment", "both"])
    }

    #[test]
    fn definition_rejects_blank_key() {
        assert_eq!(
            validate_definition("  ", &FlagSpec::boolean(true)),
            Err(FlagError::EmptyKey)
        );
    }

    #[test]
    fn variant_default_must_be_allowed() {
        let spec = FlagSpec::variant("cheapest", ["total-price", "both"]);
        let err = validate_definition("pricingDisplay", &spec).unwrap_err();
        assert_eq!(
            err,
            FlagError::DefaultNotAllowed {
                key: "pricingDisplay".into(),
                default: "cheapest".into(),
            }
        );
    }

    #[test]
    fn variant_requires_unique_non_empty_options() {
        let empty = FlagSpec::variant("x", Vec::<String>::new());
        assert!(matches!(
            validate_definition("v", &empty),
            Err(FlagError::NoVariantOptions { .. })
        ));

        let duplicated = FlagSpec::variant("a", ["a", "b", "a"]);
        assert!(matches!(
            validate_definition("v", &duplicated),
            Err(FlagError::DuplicateOption { option, .. }) if option == "a"
        ));

        assert!(validate_definition("pricingDisplay", &pricing()).is_ok());
    }

    #[test]
    fn boolean_coercion_accepts_bools_and_bool_strings() {
        let spec = FlagSpec::boolean(false);
        assert_eq!(coerce(&spec, &json!(true)), Some(FlagValue::Bool(true)));
        assert_eq!(coerce(&spec, &json!("FALSE")), Some(FlagValue::Bool(false)));
        assert_eq!(coerce(&spec, &json!(1)), None);
        assert_eq!(coerce(&spec, &json!("yes")), None);
    }

    #[test]
    fn variant_coercion_requires_allowed_string() {
        let spec = pricing();
        assert_eq!(
            coerce(&spec, &json!("both")),
            Some(FlagValue::Variant("both".into()))
        );
        assert_eq!(coerce(&spec, &json!("cheapest")), None);
        assert_eq!(coerce(&spec, &json!(true)), None);
    }

    #[test]
    fn env_key_normalisation_handles_local_mode() {
        assert_eq!(normalize_env_key(None), None);
        assert_eq!(normalize_env_key(Some("   ")), None);
        assert_eq!(normalize_env_key(Some("local-mode")), None);
        assert_eq!(normalize_env_key(Some(" abc123 ")), Some("abc123"));
    }

    #[test]
    fn env_key_validation_rejects_embedded_whitespace() {
        assert!(validate_env_key("abc def").is_err());
        assert!(validate_env_key("").is_err());
        assert_eq!(validate_env_key(" abc ").unwrap(), "abc");
    }
}
