//! Error types for manifest loading and permission checks.

use std::fmt;

use thiserror::Error;

/// Fatal manifest validation failures. Loading stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("Value 'key' is missing or invalid.")]
    InvalidKey,

    #[error("Missing 'key' value in manifest. A signing key is required.")]
    MissingKey,

    #[error("Unable to derive an extension id from an empty path.")]
    EmptyPath,

    #[error("Invalid value for 'manifest_version'. Must be an integer greater than zero.")]
    InvalidManifestVersion,

    #[error(
        "The 'manifest_version' key must be present and set to {required} (without quotes)."
    )]
    ManifestVersionTooOld { required: i64 },

    #[error("Manifest is not a valid JSON object: {0}")]
    InvalidManifest(String),

    #[error("Manifest file is missing or unreadable: {0}")]
    ManifestUnreadable(String),

    #[error("Invalid value for 'minimum_chrome_version'.")]
    InvalidMinimumVersion,

    #[error("This extension requires {product} version {required} or greater.")]
    HostVersionTooLow { product: String, required: String },

    #[error("Required value 'name' is missing or invalid.")]
    InvalidName,

    #[error(
        "Required value 'version' is missing or invalid. It must be between 1-4 \
         dot-separated integers each between 0 and 65536."
    )]
    InvalidVersion,

    #[error("Invalid value for '{key}'.")]
    InvalidValue { key: String },

    #[error("Invalid value for '{key}': {detail}")]
    InvalidPattern { key: String, detail: String },

    #[error("Invalid value for '{0}'.")]
    InvalidPermissions(String),

    #[error("Invalid value for '{list}[{entry}]'.")]
    InvalidPermission { list: String, entry: String },

    #[error("Invalid scheme for '{list}[{entry}]'.")]
    InvalidPermissionScheme { list: String, entry: String },

    #[error("Permission '{0}' cannot be specified in the manifest.")]
    PermissionNotAllowedInManifest(String),

    #[error("Permission '{0}' must be specified in the optional section of the manifest.")]
    PermissionMustBeOptional(String),

    #[error(
        "Loading extensions with 'experimental' permission is turned off by default. \
         Enable experimental extension APIs to load it."
    )]
    ExperimentalFlagRequired,

    #[error("Invalid value for 'app.urls'.")]
    InvalidWebUrls,

    #[error("Invalid value for 'app.urls[{index}]': {detail}")]
    InvalidWebUrl { index: usize, detail: String },

    #[error("The 'app.launch.local_path' and 'app.launch.web_url' keys cannot both be set.")]
    LaunchPathAndUrlAreExclusive,

    #[error("The 'app.launch.local_path' and 'app.urls' keys cannot both be set.")]
    LaunchPathAndExtentAreExclusive,

    #[error("Either 'app.launch.local_path' or 'app.launch.web_url' is required.")]
    LaunchUrlRequired,

    #[error("Invalid container type for '{0}'.")]
    InvalidLaunchContainer(String),

    #[error("Invalid value for 'content_scripts[{index}].matches'. There must be at least one match specified.")]
    InvalidMatchCount { index: usize },

    #[error("Invalid value for 'content_scripts[{index}].matches[{match_index}]': {detail}")]
    InvalidMatch {
        index: usize,
        match_index: usize,
        detail: String,
    },

    #[error("At least one js or css file is required for 'content_scripts[{index}]'.")]
    MissingFile { index: usize },

    #[error("Invalid ID '{0}'")]
    InvalidExternalId(String),

    #[error("Invalid match pattern '{0}'")]
    InvalidExternalMatch(String),

    #[error("The background.page and background.scripts properties cannot be used at the same time.")]
    InvalidBackgroundCombination,

    #[error(
        "Invalid value for 'background_page'. Hosted apps must specify an absolute HTTPS URL \
         for the background page."
    )]
    InvalidBackgroundInHostedApp,

    #[error("Hosted apps that use 'background_page' must have the 'background' permission.")]
    BackgroundPermissionNeeded,

    #[error("Must specify one of background.page or background.scripts to use background.persistent.")]
    BackgroundPersistentNoPage,

    #[error("Invalid value for '{0}'.")]
    InvalidContentSecurityPolicy(String),

    #[error(
        "Invalid value for '{0}': Both 'script-src' and 'object-src' directives must be \
         specified (either explicitly, or implicitly via 'default-src'), and both must \
         whitelist only secure resources."
    )]
    InsecureContentSecurityPolicy(String),

    #[error(
        "Invalid value for 'sandbox.content_security_policy'. The policy must sandbox the \
         page and may not allow same-origin access."
    )]
    InvalidSandboxedPagesCsp,

    #[error("Only one of 'browser_action', 'page_action', and 'app' can be specified.")]
    OneUiSurfaceOnly,

    #[error("Packaged apps must have a background page or background scripts.")]
    BackgroundRequiredForPlatformApps,

    #[error("Invalid value for 'incognito'. Packaged apps must use split incognito mode.")]
    InvalidIncognitoModeForPlatformApp,

    #[error("The 'webRequestBlocking' API cannot be used with event pages.")]
    WebRequestConflictsWithLazyBackground,
}

/// Result type for manifest loading.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Runtime permission denials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("Cannot access contents of url \"{url}\". Extension manifest must request permission to access this host.")]
    CannotAccessPage { url: String },

    #[error("Cannot access a chrome:// URL")]
    CannotAccessChromeUrl,

    #[error("Cannot access contents of the page. Extension manifest must request permission to access the respective host.")]
    CannotAccessExtensionUrl,

    #[error("The extensions gallery cannot be scripted.")]
    CannotScriptGallery,

    #[error("Permission set is not a subset of the declared permissions: {0}")]
    OutOfBounds(String),
}

/// Result type for permission operations.
pub type PermissionResult<T> = Result<T, PermissionError>;

/// Kind of a non-fatal load diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningFormat {
    Text,
    Html,
}

/// A non-fatal diagnostic attached to a loaded extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstallWarning {
    pub format: WarningFormat,
    pub message: String,
}

impl InstallWarning {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            format: WarningFormat::Text,
            message: message.into(),
        }
    }
}

impl fmt::Display for InstallWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Warning texts shared by several loader stages.
pub mod warnings {
    pub fn unknown_permission(raw: &str) -> String {
        format!("Permission '{}' is unknown or URL pattern is malformed.", raw)
    }

    pub fn wildcard_hosts_not_allowed(pattern: &str) -> String {
        format!(
            "Wildcard domain patterns such as \"{}\" are not allowed",
            pattern
        )
    }

    pub fn top_level_domains_not_allowed(host: &str, pattern: &str) -> String {
        format!(
            "\"{}\" is an effective top level domain for which wildcard subdomains such as \
             \"{}\" are not allowed",
            host, pattern
        )
    }

    pub const NOTHING_EXTERNALLY_CONNECTABLE: &str =
        "'externally_connectable' specifies neither 'matches' nor 'ids'; nothing will be able \
         to connect";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_embed_offending_value() {
        let err = ManifestError::PermissionNotAllowedInManifest("webConnectable".into());
        assert_eq!(
            err.to_string(),
            "Permission 'webConnectable' cannot be specified in the manifest."
        );

        let err = ManifestError::InvalidPermission {
            list: "optional_permissions".into(),
            entry: "3".into(),
        };
        assert_eq!(err.to_string(), "Invalid value for 'optional_permissions[3]'.");
    }

    #[test]
    fn test_tld_warning_text() {
        assert_eq!(
            warnings::top_level_domains_not_allowed("co.uk", "http://*.co.uk/*"),
            "\"co.uk\" is an effective top level domain for which wildcard subdomains such as \
             \"http://*.co.uk/*\" are not allowed"
        );
    }
}
