//! Manifest document model.
//!
//! Wraps the raw `manifest.json` tree (a `serde_json` object, key order
//! preserved) together with the install location and the extension type
//! detected from the document's shape. Lookups take dotted paths such as
//! `app.launch.web_url` and tell an absent key apart from a key of the wrong
//! type: absent means "use the default", wrong type is a validation error.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::error::{InstallWarning, ManifestError, ManifestResult};
use super::permissions::features::{FeatureContext, FeatureProvider};

/// Manifest key names.
pub mod keys {
    pub const ALL_FRAMES: &str = "all_frames";
    pub const APP: &str = "app";
    pub const BACKGROUND_ALLOW_JS_ACCESS: &str = "background.allow_js_access";
    pub const BACKGROUND_PAGE: &str = "background.page";
    pub const BACKGROUND_PAGE_LEGACY: &str = "background_page";
    pub const BACKGROUND_PERSISTENT: &str = "background.persistent";
    pub const BACKGROUND_SCRIPTS: &str = "background.scripts";
    pub const BROWSER_ACTION: &str = "browser_action";
    pub const CONTENT_PACK: &str = "content_pack";
    pub const CONTENT_PACK_SITES: &str = "sites";
    pub const CONTENT_SCRIPTS: &str = "content_scripts";
    pub const CONTENT_SECURITY_POLICY: &str = "content_security_policy";
    pub const CONVERTED_FROM_USER_SCRIPT: &str = "converted_from_user_script";
    pub const CSS: &str = "css";
    pub const DESCRIPTION: &str = "description";
    pub const DISPLAY_IN_LAUNCHER: &str = "display_in_launcher";
    pub const DISPLAY_IN_NEW_TAB_PAGE: &str = "display_in_new_tab_page";
    pub const EXCLUDE_GLOBS: &str = "exclude_globs";
    pub const EXCLUDE_MATCHES: &str = "exclude_matches";
    pub const EXTERNALLY_CONNECTABLE: &str = "externally_connectable";
    pub const EXTERNALLY_CONNECTABLE_IDS: &str = "ids";
    pub const EXTERNALLY_CONNECTABLE_MATCHES: &str = "matches";
    pub const ICONS: &str = "icons";
    pub const INCLUDE_GLOBS: &str = "include_globs";
    pub const INCOGNITO: &str = "incognito";
    pub const ISOLATION: &str = "app.isolation";
    pub const JS: &str = "js";
    pub const LAUNCH: &str = "app.launch";
    pub const LAUNCH_CONTAINER: &str = "app.launch.container";
    pub const LAUNCH_HEIGHT: &str = "app.launch.height";
    pub const LAUNCH_LOCAL_PATH: &str = "app.launch.local_path";
    pub const LAUNCH_WEB_URL: &str = "app.launch.web_url";
    pub const LAUNCH_WIDTH: &str = "app.launch.width";
    pub const MANIFEST_VERSION: &str = "manifest_version";
    pub const MATCHES: &str = "matches";
    pub const MINIMUM_CHROME_VERSION: &str = "minimum_chrome_version";
    pub const NACL_MODULES: &str = "nacl_modules";
    pub const NACL_MODULES_MIME_TYPE: &str = "mime_type";
    pub const NACL_MODULES_PATH: &str = "path";
    pub const NAME: &str = "name";
    pub const OFFLINE_ENABLED: &str = "offline_enabled";
    pub const OPTIONAL_PERMISSIONS: &str = "optional_permissions";
    pub const PAGE_ACTION: &str = "page_action";
    pub const PAGE_ACTION_DEFAULT_ICON: &str = "default_icon";
    pub const PAGE_ACTION_DEFAULT_POPUP: &str = "default_popup";
    pub const PAGE_ACTION_DEFAULT_TITLE: &str = "default_title";
    pub const PERMISSIONS: &str = "permissions";
    pub const PLATFORM_APP_BACKGROUND: &str = "app.background";
    pub const PLATFORM_APP_BACKGROUND_PAGE: &str = "app.background.page";
    pub const PLATFORM_APP_BACKGROUND_SCRIPTS: &str = "app.background.scripts";
    pub const PLATFORM_APP_CONTENT_SECURITY_POLICY: &str = "app.content_security_policy";
    pub const PLUGINS: &str = "plugins";
    pub const PLUGINS_PATH: &str = "path";
    pub const PLUGINS_PUBLIC: &str = "public";
    pub const PUBLIC_KEY: &str = "key";
    pub const REQUIREMENTS: &str = "requirements";
    pub const RUN_AT: &str = "run_at";
    pub const SANDBOXED_PAGES: &str = "sandbox.pages";
    pub const SANDBOXED_PAGES_CSP: &str = "sandbox.content_security_policy";
    pub const SYSTEM_INDICATOR: &str = "system_indicator";
    pub const THEME: &str = "theme";
    pub const VERSION: &str = "version";
    pub const WEB_URLS: &str = "app.urls";
}

/// Where an extension was installed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Location {
    /// Installed from the store or a packed file.
    Internal,
    ExternalPref,
    ExternalRegistry,
    ExternalPrefDownload,
    /// Force-installed by enterprise policy.
    ExternalPolicyDownload,
    /// Shipped with the host application.
    Component,
    /// Loaded unpacked from a directory.
    Unpacked,
    CommandLine,
}

impl Location {
    pub fn is_unpacked(self) -> bool {
        matches!(self, Location::Unpacked | Location::CommandLine)
    }

    pub fn is_external(self) -> bool {
        matches!(
            self,
            Location::ExternalPref
                | Location::ExternalRegistry
                | Location::ExternalPrefDownload
                | Location::ExternalPolicyDownload
        )
    }

    pub fn is_policy(self) -> bool {
        self == Location::ExternalPolicyDownload
    }

    fn as_str(self) -> &'static str {
        match self {
            Location::Internal => "internal",
            Location::ExternalPref => "external-pref",
            Location::ExternalRegistry => "external-registry",
            Location::ExternalPrefDownload => "external-pref-download",
            Location::ExternalPolicyDownload => "external-policy-download",
            Location::Component => "component",
            Location::Unpacked => "unpacked",
            Location::CommandLine => "command-line",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(Location::Internal),
            "external-pref" | "external" => Ok(Location::ExternalPref),
            "external-registry" => Ok(Location::ExternalRegistry),
            "external-pref-download" => Ok(Location::ExternalPrefDownload),
            "external-policy-download" | "policy" => Ok(Location::ExternalPolicyDownload),
            "component" => Ok(Location::Component),
            "unpacked" => Ok(Location::Unpacked),
            "command-line" => Ok(Location::CommandLine),
            other => Err(format!("unknown install location '{}'", other)),
        }
    }
}

/// Kind of package, detected from which keys the manifest declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionType {
    Extension,
    Theme,
    UserScript,
    HostedApp,
    LegacyPackagedApp,
    PlatformApp,
}

impl ExtensionType {
    pub const ALL: [ExtensionType; 6] = [
        ExtensionType::Extension,
        ExtensionType::Theme,
        ExtensionType::UserScript,
        ExtensionType::HostedApp,
        ExtensionType::LegacyPackagedApp,
        ExtensionType::PlatformApp,
    ];

    pub fn is_app(self) -> bool {
        matches!(
            self,
            ExtensionType::HostedApp | ExtensionType::LegacyPackagedApp | ExtensionType::PlatformApp
        )
    }

    /// Singular display name, as used in availability messages.
    pub fn display_name(self) -> &'static str {
        match self {
            ExtensionType::Extension => "extension",
            ExtensionType::Theme => "theme",
            ExtensionType::UserScript => "user script",
            ExtensionType::HostedApp => "hosted app",
            ExtensionType::LegacyPackagedApp => "legacy packaged app",
            ExtensionType::PlatformApp => "packaged app",
        }
    }

    pub fn plural_display_name(self) -> &'static str {
        match self {
            ExtensionType::Extension => "extensions",
            ExtensionType::Theme => "themes",
            ExtensionType::UserScript => "user scripts",
            ExtensionType::HostedApp => "hosted apps",
            ExtensionType::LegacyPackagedApp => "legacy packaged apps",
            ExtensionType::PlatformApp => "packaged apps",
        }
    }

    /// Detect the type of a raw manifest object.
    pub fn detect(value: &Map<String, Value>) -> ExtensionType {
        let root = DictView::new(value);
        if root.has_key(keys::THEME) {
            ExtensionType::Theme
        } else if root.has_key(keys::APP) {
            if root.has_key(keys::WEB_URLS) || root.has_key(keys::LAUNCH_WEB_URL) {
                ExtensionType::HostedApp
            } else if root.has_key(keys::PLATFORM_APP_BACKGROUND) {
                ExtensionType::PlatformApp
            } else {
                ExtensionType::LegacyPackagedApp
            }
        } else if root.get_bool(keys::CONVERTED_FROM_USER_SCRIPT) == Ok(true) {
            ExtensionType::UserScript
        } else {
            ExtensionType::Extension
        }
    }
}

impl fmt::Display for ExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Why a typed lookup produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("key is absent")]
    Absent,

    #[error("key has the wrong type")]
    WrongType,
}

/// Result of a typed lookup.
pub type Lookup<T> = Result<T, LookupError>;

/// Turns "absent" into `Ok(None)` so only wrong-type values stay errors.
pub trait LookupExt<T> {
    fn optional(self) -> Result<Option<T>, LookupError>;
}

impl<T> LookupExt<T> for Lookup<T> {
    fn optional(self) -> Result<Option<T>, LookupError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(LookupError::Absent) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Typed access to a JSON object through dotted paths.
pub trait ValueLookup {
    /// Raw value at `path`, if any.
    fn find(&self, path: &str) -> Option<&Value>;

    fn has_key(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    fn get(&self, path: &str) -> Lookup<&Value> {
        self.find(path).ok_or(LookupError::Absent)
    }

    fn get_str(&self, path: &str) -> Lookup<&str> {
        self.get(path)?.as_str().ok_or(LookupError::WrongType)
    }

    /// Integral numbers only; `1.5` and `1.0` are the wrong type.
    fn get_i64(&self, path: &str) -> Lookup<i64> {
        match self.get(path)? {
            Value::Number(n) if !n.is_f64() => n.as_i64().ok_or(LookupError::WrongType),
            _ => Err(LookupError::WrongType),
        }
    }

    fn get_bool(&self, path: &str) -> Lookup<bool> {
        self.get(path)?.as_bool().ok_or(LookupError::WrongType)
    }

    fn get_list(&self, path: &str) -> Lookup<&Vec<Value>> {
        self.get(path)?.as_array().ok_or(LookupError::WrongType)
    }

    fn get_dict(&self, path: &str) -> Lookup<DictView<'_>> {
        self.get(path)?
            .as_object()
            .map(DictView::new)
            .ok_or(LookupError::WrongType)
    }
}

fn find_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Borrowed view of a nested JSON object.
#[derive(Debug, Clone, Copy)]
pub struct DictView<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> DictView<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Top-level entries, in document order.
    pub fn entries(&self) -> serde_json::map::Iter<'a> {
        self.map.iter()
    }

    /// Direct child lookup that does not split on dots.
    pub fn get_without_path_expansion(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }
}

impl ValueLookup for DictView<'_> {
    fn find(&self, path: &str) -> Option<&Value> {
        find_path(self.map, path)
    }
}

/// A parsed manifest with its install metadata.
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    value: Map<String, Value>,
    location: Location,
    extension_type: ExtensionType,
    hidden_keys: HashSet<String>,
}

impl ManifestDocument {
    /// Wrap a manifest value, which must be a JSON object.
    pub fn new(location: Location, value: Value) -> ManifestResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(location, map)),
            other => Err(ManifestError::InvalidManifest(format!(
                "expected an object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn from_map(location: Location, value: Map<String, Value>) -> Self {
        let extension_type = ExtensionType::detect(&value);
        Self {
            value,
            location,
            extension_type,
            hidden_keys: HashSet::new(),
        }
    }

    pub fn from_json_str(location: Location, text: &str) -> ManifestResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ManifestError::InvalidManifest(e.to_string()))?;
        Self::new(location, value)
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn extension_type(&self) -> ExtensionType {
        self.extension_type
    }

    pub fn is_app(&self) -> bool {
        self.extension_type.is_app()
    }

    pub fn is_platform_app(&self) -> bool {
        self.extension_type == ExtensionType::PlatformApp
    }

    pub fn is_hosted_app(&self) -> bool {
        self.extension_type == ExtensionType::HostedApp
    }

    pub fn is_legacy_packaged_app(&self) -> bool {
        self.extension_type == ExtensionType::LegacyPackagedApp
    }

    pub fn is_theme(&self) -> bool {
        self.extension_type == ExtensionType::Theme
    }

    /// Declared manifest version, 1 when absent or not an integer.
    pub fn manifest_version(&self) -> i64 {
        DictView::new(&self.value)
            .get_i64(keys::MANIFEST_VERSION)
            .unwrap_or(1)
    }

    /// The underlying object, including keys hidden by [`validate_keys`].
    ///
    /// [`validate_keys`]: ManifestDocument::validate_keys
    pub fn raw(&self) -> &Map<String, Value> {
        &self.value
    }

    /// Check every top-level key against the manifest feature table. Keys
    /// unavailable to this extension produce a warning and are hidden from
    /// later lookups; keys without a rule are kept for forward
    /// compatibility.
    pub fn validate_keys(
        &mut self,
        features: &dyn FeatureProvider,
        context: &FeatureContext<'_>,
    ) -> Vec<InstallWarning> {
        let mut warnings = Vec::new();
        for key in self.value.keys() {
            let availability = features.is_available(key, context);
            if !availability.is_available() {
                debug!(key = %key, "manifest key not available");
                warnings.push(InstallWarning::text(availability.message()));
                self.hidden_keys.insert(key.clone());
            }
        }
        warnings
    }

    fn is_hidden(&self, path: &str) -> bool {
        let top = path.split('.').next().unwrap_or(path);
        self.hidden_keys.contains(top)
    }
}

impl ValueLookup for ManifestDocument {
    fn find(&self, path: &str) -> Option<&Value> {
        if self.is_hidden(path) {
            return None;
        }
        find_path(&self.value, path)
    }
}

/// JSON type name for diagnostics.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dictionary",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> ManifestDocument {
        ManifestDocument::new(Location::Internal, value).unwrap()
    }

    #[test]
    fn test_type_detection() {
        let cases = [
            (json!({"name": "x"}), ExtensionType::Extension),
            (json!({"theme": {}}), ExtensionType::Theme),
            (json!({"converted_from_user_script": true}), ExtensionType::UserScript),
            (json!({"converted_from_user_script": false}), ExtensionType::Extension),
            (json!({"app": {"urls": ["http://a.com/"]}}), ExtensionType::HostedApp),
            (json!({"app": {"launch": {"web_url": "http://a.com/"}}}), ExtensionType::HostedApp),
            (json!({"app": {"background": {"scripts": ["a.js"]}}}), ExtensionType::PlatformApp),
            (json!({"app": {"launch": {"local_path": "a.html"}}}), ExtensionType::LegacyPackagedApp),
        ];
        for (value, expected) in cases {
            assert_eq!(doc(value.clone()).extension_type(), expected, "{}", value);
        }
    }

    #[test]
    fn test_absent_vs_wrong_type() {
        let d = doc(json!({"name": 5, "version": "1.0", "app": {"launch": {"width": 10}}}));
        assert_eq!(d.get_str("name"), Err(LookupError::WrongType));
        assert_eq!(d.get_str("missing"), Err(LookupError::Absent));
        assert_eq!(d.get_str("version"), Ok("1.0"));
        assert_eq!(d.get_i64("app.launch.width"), Ok(10));
        assert_eq!(d.get_i64("app.launch.height").optional(), Ok(None));
        assert_eq!(d.get_bool("name").optional(), Err(LookupError::WrongType));
    }

    #[test]
    fn test_integers_are_strict() {
        let d = doc(json!({"a": 1.0, "b": 2, "c": "3"}));
        assert_eq!(d.get_i64("a"), Err(LookupError::WrongType));
        assert_eq!(d.get_i64("b"), Ok(2));
        assert_eq!(d.get_i64("c"), Err(LookupError::WrongType));
    }

    #[test]
    fn test_manifest_version_default() {
        assert_eq!(doc(json!({})).manifest_version(), 1);
        assert_eq!(doc(json!({"manifest_version": 2})).manifest_version(), 2);
        assert_eq!(doc(json!({"manifest_version": "2"})).manifest_version(), 1);
    }

    #[test]
    fn test_non_object_rejected() {
        let err = ManifestDocument::new(Location::Internal, json!([1, 2])).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidManifest(_)));
        assert!(ManifestDocument::from_json_str(Location::Internal, "{not json").is_err());
    }

    #[test]
    fn test_dict_view_preserves_order() {
        let d = ManifestDocument::from_json_str(
            Location::Unpacked,
            r#"{"icons": {"48": "b.png", "16": "a.png"}}"#,
        )
        .unwrap();
        let icons = d.get_dict("icons").unwrap();
        let keys: Vec<&str> = icons.entries().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["48", "16"]);
    }

    #[test]
    fn test_location_parse() {
        assert_eq!("unpacked".parse::<Location>().unwrap(), Location::Unpacked);
        assert_eq!("policy".parse::<Location>().unwrap(), Location::ExternalPolicyDownload);
        assert!("bogus".parse::<Location>().is_err());
        assert!(Location::CommandLine.is_unpacked());
        assert!(Location::ExternalRegistry.is_external());
    }
}
