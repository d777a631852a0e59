//! Typed flag models, values and sync payloads.
//!
//! # Design
//! - Pure data carriers shared by the registry, store, bus and sync.
//! - Flags form a closed tagged union (`Boolean` or `Variant`) validated at registration.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Discriminator for the two supported flag shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    /// On/off toggle.
    Boolean,
    /// String variant chosen from a fixed option list.
    Variant,
}

impl FlagKind {
    #[must_use]
    /// Render the kind as its lowercase string representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Variant => "variant",
        }
    }
}

/// Declared shape and default of a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FlagSpec {
    /// Boolean toggle with its default state.
    Boolean {
        /// Value served until a remote value is applied.
        default: bool,
    },
    /// String variant with its default and allowed options.
    Variant {
        /// Value served until a remote value is applied.
        default: String,
        /// Allowed values, in declaration order.
        options: Vec<String>,
    },
}

impl FlagSpec {
    /// Convenience constructor for boolean specs.
    #[must_use]
    pub const fn boolean(default: bool) -> Self {
        Self::Boolean { default }
    }

    /// Convenience constructor for variant specs.
    #[must_use]
    pub fn variant<I, S>(default: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Variant {
            default: default.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Shape of the flag.
    #[must_use]
    pub const fn kind(&self) -> FlagKind {
        match self {
            Self::Boolean { .. } => FlagKind::Boolean,
            Self::Variant { .. } => FlagKind::Variant,
        }
    }

    /// Default value as a [`FlagValue`].
    #[must_use]
    pub fn default_value(&self) -> FlagValue {
        match self {
            Self::Boolean { default } => FlagValue::Bool(*default),
            Self::Variant { default, .. } => FlagValue::Variant(default.clone()),
        }
    }

    /// Allowed variant values; empty for booleans.
    #[must_use]
    pub fn options(&self) -> &[String] {
        match self {
            Self::Boolean { .. } => &[],
            Self::Variant { options, .. } => options,
        }
    }
}

/// A registered flag. Immutable once accepted by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagDefinition {
    key: String,
    #[serde(flatten)]
    spec: FlagSpec,
}

impl FlagDefinition {
    pub(crate) const fn new(key: String, spec: FlagSpec) -> Self {
        Self { key, spec }
    }

    /// Unique flag key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared shape and default.
    #[must_use]
    pub const fn spec(&self) -> &FlagSpec {
        &self.spec
    }

    /// Shape of the flag.
    #[must_use]
    pub const fn kind(&self) -> FlagKind {
        self.spec.kind()
    }

    /// Default value as a [`FlagValue`].
    #[must_use]
    pub fn default_value(&self) -> FlagValue {
        self.spec.default_value()
    }
}

/// Evaluated flag value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// Boolean toggle state.
    Bool(bool),
    /// Selected variant.
    Variant(String),
}

impl FlagValue {
    /// Boolean state, if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Variant(_) => None,
        }
    }

    /// Variant string, if this is a variant value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bool(_) => None,
            Self::Variant(value) => Some(value),
        }
    }

    /// Shape of the value.
    #[must_use]
    pub const fn kind(&self) -> FlagKind {
        match self {
            Self::Bool(_) => FlagKind::Boolean,
            Self::Variant(_) => FlagKind::Variant,
        }
    }
}

impl Display for FlagValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(formatter, "{value}"),
            Self::Variant(value) => formatter.write_str(value),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::Variant(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        Self::Variant(value)
    }
}

/// Typed handle for a registered boolean flag.
///
/// Handles are only produced by the registry builder, so they always name a
/// declared key. The default travels with the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoolFlag {
    key: &'static str,
    default: bool,
}

impl BoolFlag {
    pub(crate) const fn new(key: &'static str, default: bool) -> Self {
        Self { key, default }
    }

    /// Flag key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        self.key
    }

    /// Declared default.
    #[must_use]
    pub const fn default_value(self) -> bool {
        self.default
    }
}

/// Typed handle for a registered variant flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantFlag {
    key: &'static str,
    default: &'static str,
}

impl VariantFlag {
    pub(crate) const fn new(key: &'static str, default: &'static str) -> Self {
        Self { key, default }
    }

    /// Flag key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        self.key
    }

    /// Declared default.
    #[must_use]
    pub const fn default_value(self) -> &'static str {
        self.default
    }
}

/// Raw flag values supplied by a remote source, keyed by flag key.
///
/// Values stay untyped until the registry coerces them against the declared kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteValues(BTreeMap<String, Value>);

impl RemoteValues {
    /// Empty value set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add or replace a raw value, returning the updated set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Add or replace a raw value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value for a key, if supplied.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of supplied values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the source supplied nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over supplied key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for RemoteValues {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value)).collect())
    }
}

/// Why a snapshot notification was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// Bootstrap snapshot built from defaults.
    Defaults,
    /// Setup completed (successfully or in local mode).
    Initialized,
    /// Remote configuration was fetched and applied.
    Fetched,
    /// Setup failed; values are defaults.
    Error,
    /// Caller requested an explicit refresh.
    Manual,
    /// Caller-supplied label.
    Custom(String),
}

impl ChangeReason {
    /// Render the reason as its lowercase string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Defaults => "defaults",
            Self::Initialized => "initialized",
            Self::Fetched => "fetched",
            Self::Error => "error",
            Self::Manual => "manual",
            Self::Custom(label) => label,
        }
    }
}

impl Display for ChangeReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<&str> for ChangeReason {
    fn from(value: &str) -> Self {
        match value {
            "defaults" => Self::Defaults,
            "initialized" => Self::Initialized,
            "fetched" => Self::Fetched,
            "error" => Self::Error,
            "manual" => Self::Manual,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl Serialize for ChangeReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Where fetched values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSource {
    /// Locally held values (overrides, embedded configuration).
    Cache,
    /// Values fetched over the network.
    Network,
}

impl FetchSource {
    /// Render the source as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Network => "network",
        }
    }
}

impl Display for FetchSource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Outcome reported to `on_fetched` callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    /// Whether any effective flag value changed.
    pub has_changes: bool,
    /// Where the values came from.
    pub source: FetchSource,
}

/// Terminal status of a setup attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Remote values were fetched and applied.
    Synced {
        /// Fetch outcome.
        result: FetchResult,
    },
    /// No environment key was configured; defaults are served.
    LocalMode,
    /// The single attempt failed; defaults are served for the process lifetime.
    Degraded {
        /// Failure description recorded for diagnostics.
        reason: String,
    },
}

impl SyncStatus {
    /// Whether the attempt failed.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Notification reason emitted when setup completes with this status.
    #[must_use]
    pub const fn change_reason(&self) -> ChangeReason {
        match self {
            Self::Synced { .. } | Self::LocalMode => ChangeReason::Initialized,
            Self::Degraded { .. } => ChangeReason::Error,
        }
    }
}

/// Coarse lifecycle of a flag context. Advances monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Context constructed; nothing rebuilt and no setup started.
    Uninitialized,
    /// Serving defaults while setup is pending or before it was requested.
    DefaultsOnly,
    /// Setup completed (synced, local mode or degraded).
    Synced,
}

impl Lifecycle {
    #[must_use]
    /// Render the lifecycle as its lowercase string representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::DefaultsOnly => "defaults_only",
            Self::Synced => "synced",
        }
    }

    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::DefaultsOnly => 1,
            Self::Synced => 2,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::DefaultsOnly,
            _ => Self::Synced,
        }
    }
}
