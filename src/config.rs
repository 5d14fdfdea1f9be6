use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::extensions::id::ExtensionId;
use crate::extensions::permissions::Channel;
use crate::extensions::version::Version;

/// Names of the developer-override switches understood by the loader.
pub mod switches {
    /// Accept manifests below the required manifest version.
    pub const ALLOW_LEGACY_EXTENSION_MANIFESTS: &str = "allow-legacy-extension-manifests";
    /// Accept the `experimental` permission from any extension.
    pub const ENABLE_EXPERIMENTAL_EXTENSION_APIS: &str = "enable-experimental-extension-apis";
    /// Let hosted apps use a plain http background page.
    pub const ALLOW_HTTP_BACKGROUND_PAGE: &str = "allow-http-background-page";
    /// Let extensions script the web store.
    pub const ALLOW_SCRIPTING_GALLERY: &str = "allow-scripting-gallery";

    pub const ALL: [&str; 4] = [
        ALLOW_LEGACY_EXTENSION_MANIFESTS,
        ENABLE_EXPERIMENTAL_EXTENSION_APIS,
        ALLOW_HTTP_BACKGROUND_PAGE,
        ALLOW_SCRIPTING_GALLERY,
    ];
}

const DEFAULT_HOST_VERSION: [u32; 4] = [30, 0, 0, 0];

/// Extensions that were historically allowed to script every page.
pub const DEFAULT_SCRIPTING_WHITELIST: [&str; 2] = [
    "kgejglhpjiefppelpmljglcjbhoiplfn",
    "angkfkebojeancgemegoedelbnjgcgme",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub channel: Channel,
    /// Version of the host browser, compared against `minimum_chrome_version`.
    pub host_version: String,
    pub product_name: String,
    pub ui_locale: String,
    pub webstore_url: String,
    pub switches: Vec<String>,
    pub scripting_whitelist: Vec<String>,
    /// Public suffixes on top of the built-in table.
    pub extra_public_suffixes: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Stable,
            host_version: "30.0.0.0".to_string(),
            product_name: "Chromium".to_string(),
            ui_locale: "en".to_string(),
            webstore_url: "https://chrome.google.com/webstore".to_string(),
            switches: Vec::new(),
            scripting_whitelist: DEFAULT_SCRIPTING_WHITELIST
                .iter()
                .map(|id| id.to_string())
                .collect(),
            extra_public_suffixes: Vec::new(),
        }
    }
}

impl LoaderConfig {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("extmanifest")
            .join("config.toml")
    }

    /// Load config from the default path, or return defaults if it is
    /// missing or broken.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "using default loader config");
                Self::default()
            }
        }
    }

    /// Load config from `path`. Unlike [`LoaderConfig::load`], errors are
    /// returned.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content)?;
        config.validate();
        Ok(config)
    }

    /// Normalize values the loader cannot use as given.
    pub fn validate(&mut self) {
        if Version::parse(&self.host_version).is_none() {
            warn!(host_version = %self.host_version, "invalid host version, using default");
            self.host_version = Self::default().host_version;
        }

        if self.ui_locale.trim().is_empty() {
            self.ui_locale = "en".to_string();
        }

        let mut seen = BTreeSet::new();
        self.switches = self
            .switches
            .iter()
            .map(|s| s.trim().trim_start_matches("--").to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        for name in &self.switches {
            if !switches::ALL.contains(&name.as_str()) {
                warn!(switch = %name, "unknown switch");
            }
        }

        self.scripting_whitelist.retain(|id| {
            let valid = ExtensionId::is_valid(id);
            if !valid {
                warn!(id = %id, "dropping invalid id from scripting whitelist");
            }
            valid
        });
    }

    /// Save config to the default path.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn switches(&self) -> Switches {
        Switches::new(self.switches.iter())
    }

    pub fn scripting_whitelist(&self) -> ScriptingWhitelist {
        self.scripting_whitelist
            .iter()
            .filter(|id| ExtensionId::is_valid(id))
            .map(|id| ExtensionId::new_unchecked(id.as_str()))
            .collect()
    }

    /// Host version, or the default one if the configured value is invalid.
    pub fn host_version(&self) -> Version {
        Version::parse(&self.host_version)
            .unwrap_or_else(|| Version::from_components(DEFAULT_HOST_VERSION))
    }
}

/// Developer-override switches, queried by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Switches {
    enabled: BTreeSet<String>,
}

impl Switches {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            enabled: names
                .into_iter()
                .map(|s| s.as_ref().trim_start_matches("--").to_string())
                .collect(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn enable(&mut self, name: &str) {
        self.enabled.insert(name.to_string());
    }
}

/// Extensions allowed to script pages of every scheme, including other
/// extensions. Owned by the loader and replaced only through
/// `ExtensionLoader::set_scripting_whitelist`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptingWhitelist {
    ids: BTreeSet<ExtensionId>,
}

impl ScriptingWhitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ExtensionId) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ExtensionId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<ExtensionId> for ScriptingWhitelist {
    fn from_iter<I: IntoIterator<Item = ExtensionId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.channel, Channel::Stable);
        assert_eq!(config.scripting_whitelist().len(), 2);
        assert!(!config.switches().has(switches::ALLOW_SCRIPTING_GALLERY));
        assert_eq!(config.host_version().to_string(), "30.0.0.0");
    }

    #[test]
    fn test_validate_normalizes() {
        let mut config = LoaderConfig {
            host_version: "not.a.version".to_string(),
            ui_locale: " ".to_string(),
            switches: vec![
                "--allow-scripting-gallery".to_string(),
                "allow-scripting-gallery".to_string(),
                "".to_string(),
            ],
            scripting_whitelist: vec!["short".to_string(), "a".repeat(32)],
            ..LoaderConfig::default()
        };
        assert_eq!(config.host_version().to_string(), "30.0.0.0");
        config.validate();
        assert_eq!(config.host_version, "30.0.0.0");
        assert_eq!(config.ui_locale, "en");
        assert_eq!(config.switches, vec!["allow-scripting-gallery"]);
        assert_eq!(config.scripting_whitelist, vec!["a".repeat(32)]);
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = LoaderConfig {
            channel: Channel::Dev,
            switches: vec![switches::ENABLE_EXPERIMENTAL_EXTENSION_APIS.to_string()],
            ..LoaderConfig::default()
        };
        config.save_to(&path).unwrap();

        let loaded = LoaderConfig::load_from(&path).unwrap();
        assert_eq!(loaded.channel, Channel::Dev);
        assert!(loaded
            .switches()
            .has(switches::ENABLE_EXPERIMENTAL_EXTENSION_APIS));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "ui_locale = \"he\"\n").unwrap();

        let loaded = LoaderConfig::load_from(&path).unwrap();
        assert_eq!(loaded.ui_locale, "he");
        assert_eq!(loaded.product_name, "Chromium");
    }

    #[test]
    fn test_load_from_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            LoaderConfig::load_from(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));

        let path = dir.path().join("bad.toml");
        fs::write(&path, "channel = 3").unwrap();
        assert!(matches!(
            LoaderConfig::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
