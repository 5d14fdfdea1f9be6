//! Feature availability.
//!
//! Every permission name and manifest key can carry a rule restricting it to
//! certain extension types, install locations, manifest versions, release
//! channels or extension ids. The loader asks a [`FeatureProvider`] before
//! accepting a permission or key; an unavailable one becomes an install
//! warning rather than a load failure.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::extensions::id::ExtensionId;
use crate::extensions::manifest::{ExtensionType, Location};

/// Release channel, most experimental first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Canary,
    Dev,
    Beta,
    #[default]
    Stable,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Canary => "canary",
            Channel::Dev => "dev",
            Channel::Beta => "beta",
            Channel::Stable => "stable",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "canary" | "trunk" => Ok(Channel::Canary),
            "dev" => Ok(Channel::Dev),
            "beta" => Ok(Channel::Beta),
            "stable" => Ok(Channel::Stable),
            other => Err(format!("unknown channel '{}'", other)),
        }
    }
}

/// The extension a feature is being checked for.
#[derive(Debug, Clone, Copy)]
pub struct FeatureContext<'a> {
    pub extension_id: &'a ExtensionId,
    pub extension_type: ExtensionType,
    pub location: Location,
    pub manifest_version: i64,
    pub channel: Channel,
}

/// Why a feature is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    NotFoundInWhitelist,
    InvalidType,
    InvalidLocation,
    ManifestVersionTooLow,
    ManifestVersionTooHigh,
    UnsupportedChannel,
}

/// Outcome of an availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable {
        reason: UnavailableReason,
        message: String,
    },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// Human-readable reason; empty when available.
    pub fn message(&self) -> &str {
        match self {
            Availability::Available => "",
            Availability::Unavailable { message, .. } => message,
        }
    }

    pub fn reason(&self) -> Option<UnavailableReason> {
        match self {
            Availability::Available => None,
            Availability::Unavailable { reason, .. } => Some(*reason),
        }
    }
}

/// Source of availability answers.
pub trait FeatureProvider: Send + Sync {
    /// Names without a rule are available.
    fn is_available(&self, name: &str, context: &FeatureContext<'_>) -> Availability;
}

/// A declarative availability rule.
#[derive(Debug, Clone, Default)]
pub struct SimpleFeature {
    /// Allowed types; empty allows every type.
    pub extension_types: Vec<ExtensionType>,
    pub component_only: bool,
    /// Allowed extension ids; empty allows every id.
    pub whitelist: Vec<String>,
    pub min_manifest_version: Option<i64>,
    pub max_manifest_version: Option<i64>,
    /// Least stable channel the feature ships on; `None` means stable.
    pub channel: Option<Channel>,
}

impl SimpleFeature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(mut self, types: &[ExtensionType]) -> Self {
        self.extension_types = types.to_vec();
        self
    }

    pub fn component_only(mut self) -> Self {
        self.component_only = true;
        self
    }

    pub fn whitelist<S: Into<String> + Clone>(mut self, ids: &[S]) -> Self {
        self.whitelist = ids.iter().cloned().map(Into::into).collect();
        self
    }

    pub fn min_manifest_version(mut self, version: i64) -> Self {
        self.min_manifest_version = Some(version);
        self
    }

    pub fn max_manifest_version(mut self, version: i64) -> Self {
        self.max_manifest_version = Some(version);
        self
    }

    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn is_available(&self, name: &str, context: &FeatureContext<'_>) -> Availability {
        if !self.whitelist.is_empty()
            && !self
                .whitelist
                .iter()
                .any(|id| id == context.extension_id.as_str())
        {
            return unavailable(
                UnavailableReason::NotFoundInWhitelist,
                format!("'{}' is not allowed for specified extension ID.", name),
            );
        }

        if !self.extension_types.is_empty()
            && !self.extension_types.contains(&context.extension_type)
        {
            return unavailable(
                UnavailableReason::InvalidType,
                format!(
                    "'{}' is only allowed for {}, but this is a {}.",
                    name,
                    list_display_names(&self.extension_types),
                    context.extension_type.display_name()
                ),
            );
        }

        if self.component_only && context.location != Location::Component {
            return unavailable(
                UnavailableReason::InvalidLocation,
                format!("'{}' is not allowed for specified install location.", name),
            );
        }

        if let Some(min) = self.min_manifest_version {
            if context.manifest_version < min {
                return unavailable(
                    UnavailableReason::ManifestVersionTooLow,
                    format!("'{}' requires manifest version of at least {}.", name, min),
                );
            }
        }

        if let Some(max) = self.max_manifest_version {
            if context.manifest_version > max {
                return unavailable(
                    UnavailableReason::ManifestVersionTooHigh,
                    format!("'{}' requires manifest version of {} or lower.", name, max),
                );
            }
        }

        let channel = self.channel.unwrap_or(Channel::Stable);
        if context.channel > channel {
            return unavailable(
                UnavailableReason::UnsupportedChannel,
                format!(
                    "'{}' requires the {} channel or newer, but this is the {} channel.",
                    name, channel, context.channel
                ),
            );
        }

        Availability::Available
    }
}

fn unavailable(reason: UnavailableReason, message: String) -> Availability {
    Availability::Unavailable { reason, message }
}

/// "a", "a and b", "a, b, and c".
fn list_display_names(types: &[ExtensionType]) -> String {
    let names: Vec<&str> = types.iter().map(|t| t.plural_display_name()).collect();
    match names.as_slice() {
        [] => String::new(),
        [one] => (*one).to_string(),
        [a, b] => format!("{} and {}", a, b),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

/// A name-keyed table of [`SimpleFeature`] rules.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    features: HashMap<String, SimpleFeature>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, feature: SimpleFeature) {
        self.features.insert(name.into(), feature);
    }

    pub fn with(mut self, name: &str, feature: SimpleFeature) -> Self {
        self.insert(name, feature);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SimpleFeature> {
        self.features.get(name)
    }

    /// Rules for permission names.
    pub fn default_permissions() -> Self {
        use ExtensionType::*;

        let platform = [PlatformApp];
        let apps_and_extensions = [Extension, LegacyPackagedApp, PlatformApp];
        let not_hosted = [Extension, LegacyPackagedApp, PlatformApp, UserScript];

        Self::new()
            .with("app.currentWindowInternal", SimpleFeature::new().types(&platform))
            .with("app.runtime", SimpleFeature::new().types(&platform))
            .with("app.window", SimpleFeature::new().types(&platform))
            .with("socket", SimpleFeature::new().types(&platform))
            .with("fileSystem", SimpleFeature::new().types(&platform))
            .with("browsingData", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("contentSettings", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("debugger", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("pageCapture", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("privacy", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("proxy", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("tabs", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("webNavigation", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("webRequest", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with(
                "webRequestBlocking",
                SimpleFeature::new().types(&[Extension, LegacyPackagedApp]),
            )
            .with("ttsEngine", SimpleFeature::new().types(&[Extension]))
            .with("topSites", SimpleFeature::new().types(&[Extension, LegacyPackagedApp]))
            .with("alarms", SimpleFeature::new().types(&apps_and_extensions))
            .with("storage", SimpleFeature::new().types(&not_hosted))
            .with("systemIndicator", SimpleFeature::new().channel(Channel::Dev))
            .with("experimental", SimpleFeature::new())
    }

    /// Rules for top-level manifest keys.
    pub fn default_manifest() -> Self {
        use ExtensionType::*;

        Self::new()
            .with("app", SimpleFeature::new().types(&[HostedApp, LegacyPackagedApp, PlatformApp]))
            .with("theme", SimpleFeature::new().types(&[Theme]))
            .with("browser_action", SimpleFeature::new().types(&[Extension]))
            .with("page_action", SimpleFeature::new().types(&[Extension]))
            .with(
                "content_scripts",
                SimpleFeature::new().types(&[Extension, LegacyPackagedApp, UserScript]),
            )
            .with("converted_from_user_script", SimpleFeature::new().types(&[UserScript]))
            .with(
                "background",
                SimpleFeature::new().types(&[Extension, LegacyPackagedApp, HostedApp]),
            )
            .with(
                "background_page",
                SimpleFeature::new()
                    .types(&[Extension, LegacyPackagedApp, HostedApp])
                    .max_manifest_version(1),
            )
            .with("sandbox", SimpleFeature::new().types(&[Extension, LegacyPackagedApp, PlatformApp]))
            .with("content_pack", SimpleFeature::new().types(&[Extension]).channel(Channel::Dev))
            .with("system_indicator", SimpleFeature::new().types(&[Extension]).channel(Channel::Dev))
            .with(
                "externally_connectable",
                SimpleFeature::new().types(&[Extension, LegacyPackagedApp, PlatformApp, HostedApp]),
            )
            .with(
                "display_in_launcher",
                SimpleFeature::new().types(&[HostedApp, LegacyPackagedApp, PlatformApp]),
            )
            .with(
                "display_in_new_tab_page",
                SimpleFeature::new().types(&[HostedApp, LegacyPackagedApp, PlatformApp]),
            )
    }
}

impl FeatureProvider for FeatureTable {
    fn is_available(&self, name: &str, context: &FeatureContext<'_>) -> Availability {
        match self.features.get(name) {
            Some(feature) => feature.is_available(name, context),
            None => Availability::Available,
        }
    }
}
