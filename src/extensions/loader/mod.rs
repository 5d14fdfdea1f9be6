//! Manifest loader.
//!
//! Turns a manifest value into a validated [`Extension`]. Loading runs a fixed
//! list of stages over an [`ExtensionDraft`]; each stage reads its keys,
//! fills in its part of the draft and either hands the draft on or stops the
//! load with a [`ManifestError`].
//!
//! ```text
//! load(path, location, manifest, flags)
//! ├── identity: key -> id, extension url
//! ├── manifest_keys ─ manifest_version ─ minimum_version ─ name ─ version
//! ├── app ─ permissions ─ isolation
//! ├── shared_features ─ extension_features ─ content_pack ─ externally_connectable
//! ├── ui_surfaces ─ platform_app ─ background_conflicts
//! └── Extension::from_draft
//! ```
//!
//! Problems the loader can recover from (unknown permissions, keys not
//! available to this extension type, wildcard grants over public suffixes)
//! become install warnings on the loaded extension instead of failures.

mod app;
mod checks;
mod content_scripts;
mod draft;
mod features;
mod permissions;
mod required;
mod shared;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;
use serde_json::Value;
use tracing::{debug, info};

pub(crate) use draft::ExtensionDraft;

use crate::config::{switches, LoaderConfig, ScriptingWhitelist, Switches};
use crate::extensions::error::{ManifestError, ManifestResult};
use crate::extensions::extension::Extension;
use crate::extensions::id::{derive_id, ExtensionId};
use crate::extensions::l10n::{Localizer, StaticLocalizer};
use crate::extensions::manifest::{keys, LookupExt, ManifestDocument, ValueLookup};
use crate::extensions::manifest::{Location, Lookup};
use crate::extensions::permissions::{FeatureProvider, FeatureTable};
use crate::extensions::registry::RegistryDomains;
use crate::extensions::resource::{extension_url, DefaultResourceLocator, ResourceLocator};
use crate::extensions::version::Version;

/// Name of the manifest file inside an extension directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

bitflags! {
    /// Options chosen by whoever asks for the load.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CreationFlags: u32 {
        /// Reject manifests older than version 2.
        const REQUIRE_MODERN_MANIFEST_VERSION = 1 << 0;
        /// The manifest must carry a `key`.
        const REQUIRE_KEY = 1 << 1;
        /// Keep `file://` access declared in host permissions and content
        /// scripts.
        const ALLOW_FILE_ACCESS = 1 << 2;
        /// Resources may be symlinks pointing outside the extension root.
        const FOLLOW_SYMLINKS_ANYWHERE = 1 << 3;
        /// Installed from the web store.
        const FROM_WEBSTORE = 1 << 4;
    }
}

type Stage = fn(&ExtensionLoader, ExtensionDraft) -> ManifestResult<ExtensionDraft>;

/// Load stages in execution order. App settings come before permissions
/// since the app type decides which permissions are legal.
const STAGES: &[(&str, Stage)] = &[
    ("manifest_keys", required::validate_manifest_keys),
    ("manifest_version", required::load_manifest_version),
    ("minimum_version", required::check_minimum_version),
    ("name", required::load_name),
    ("version", required::load_version),
    ("app", app::load_app),
    ("permissions", permissions::load_permissions),
    ("isolation", app::load_isolation),
    ("shared_features", shared::load_shared_features),
    ("extension_features", features::load_extension_features),
    ("content_pack", features::load_content_pack),
    ("externally_connectable", features::load_externally_connectable),
    ("ui_surfaces", checks::check_ui_surfaces),
    ("platform_app", checks::check_platform_app),
    ("background_conflicts", checks::check_background_conflicts),
];

/// Builds [`Extension`]s from manifests.
///
/// A loader is cheap to share; every load works on its own draft. The
/// scripting whitelist is the only state that changes after construction,
/// and only through [`ExtensionLoader::set_scripting_whitelist`].
pub struct ExtensionLoader {
    config: LoaderConfig,
    switches: Switches,
    host_version: Version,
    registry: RegistryDomains,
    scripting_whitelist: ScriptingWhitelist,
    permission_features: Arc<dyn FeatureProvider>,
    manifest_features: Arc<dyn FeatureProvider>,
    localizer: Arc<dyn Localizer>,
    resources: Arc<dyn ResourceLocator>,
}

impl ExtensionLoader {
    pub fn new(mut config: LoaderConfig) -> Self {
        config.validate();
        Self {
            switches: config.switches(),
            host_version: config.host_version(),
            registry: RegistryDomains::with_extra(&config.extra_public_suffixes),
            scripting_whitelist: config.scripting_whitelist(),
            permission_features: Arc::new(FeatureTable::default_permissions()),
            manifest_features: Arc::new(FeatureTable::default_manifest()),
            localizer: Arc::new(StaticLocalizer::new(config.ui_locale.clone())),
            resources: Arc::new(DefaultResourceLocator),
            config,
        }
    }

    pub fn with_permission_features(mut self, features: Arc<dyn FeatureProvider>) -> Self {
        self.permission_features = features;
        self
    }

    pub fn with_manifest_features(mut self, features: Arc<dyn FeatureProvider>) -> Self {
        self.manifest_features = features;
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    pub fn with_resource_locator(mut self, resources: Arc<dyn ResourceLocator>) -> Self {
        self.resources = resources;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn switches(&self) -> &Switches {
        &self.switches
    }

    pub fn scripting_whitelist(&self) -> &ScriptingWhitelist {
        &self.scripting_whitelist
    }

    /// Replace the set of extensions allowed to script every page. Affects
    /// extensions loaded afterwards only.
    pub fn set_scripting_whitelist(&mut self, whitelist: ScriptingWhitelist) {
        info!(count = whitelist.len(), "scripting whitelist replaced");
        self.scripting_whitelist = whitelist;
    }

    /// Load an extension whose files live at `path`.
    pub fn load(
        &self,
        path: &Path,
        location: Location,
        manifest: Value,
        flags: CreationFlags,
    ) -> ManifestResult<Arc<Extension>> {
        self.load_with_id(path, location, manifest, flags, None)
    }

    /// Like [`ExtensionLoader::load`], with an id chosen by the caller. The
    /// explicit id wins over the manifest key and the path.
    pub fn load_with_id(
        &self,
        path: &Path,
        location: Location,
        manifest: Value,
        flags: CreationFlags,
        explicit_id: Option<&ExtensionId>,
    ) -> ManifestResult<Arc<Extension>> {
        let manifest = ManifestDocument::new(location, manifest)?;
        self.load_document(path, manifest, flags, explicit_id)
            .inspect_err(|err| debug!(path = %path.display(), error = %err, "extension failed to load"))
    }

    /// Read `manifest.json` from `dir` and load it.
    pub fn load_from_dir(
        &self,
        dir: &Path,
        location: Location,
        flags: CreationFlags,
    ) -> ManifestResult<Arc<Extension>> {
        let manifest_path = dir.join(MANIFEST_FILENAME);
        let text = fs::read_to_string(&manifest_path).map_err(|e| {
            ManifestError::ManifestUnreadable(format!("{}: {}", manifest_path.display(), e))
        })?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| ManifestError::InvalidManifest(e.to_string()))?;
        self.load(dir, location, value, flags)
    }

    fn load_document(
        &self,
        path: &Path,
        manifest: ManifestDocument,
        flags: CreationFlags,
        explicit_id: Option<&ExtensionId>,
    ) -> ManifestResult<Arc<Extension>> {
        let public_key = manifest
            .get_str(keys::PUBLIC_KEY)
            .optional()
            .map_err(|_| ManifestError::InvalidKey)?
            .map(str::to_string);
        let id = derive_id(
            public_key.as_deref(),
            explicit_id,
            path,
            flags.contains(CreationFlags::REQUIRE_KEY),
        )?;
        let url = extension_url(&id).map_err(|e| ManifestError::InvalidManifest(e.to_string()))?;

        let location = manifest.location();
        let mut draft = ExtensionDraft::new(
            manifest,
            id,
            path.to_path_buf(),
            flags,
            url,
            self.config.channel,
        );
        draft.public_key = public_key;
        draft.can_execute_script_everywhere =
            location == Location::Component || self.scripting_whitelist.contains(&draft.id);
        draft.gallery_host = self.gallery_host();

        let draft = STAGES.iter().try_fold(draft, |draft, (stage, run)| {
            debug!(stage = *stage, id = %draft.id, "running load stage");
            run(self, draft)
        })?;

        let extension = Extension::from_draft(draft)?;
        info!(
            id = %extension.id(),
            name = extension.name(),
            version = %extension.version(),
            warnings = extension.install_warnings().len(),
            "extension loaded"
        );
        Ok(Arc::new(extension))
    }

    /// Host of the web store, which extensions may not script unless the
    /// override switch is set.
    fn gallery_host(&self) -> Option<String> {
        if self.switches.has(switches::ALLOW_SCRIPTING_GALLERY) {
            return None;
        }
        url::Url::parse(&self.config.webstore_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    /// Whether the `experimental` permission may be granted.
    fn experimental_allowed(&self, draft: &ExtensionDraft) -> bool {
        draft.manifest.location() == Location::Component
            || self.switches.has(switches::ENABLE_EXPERIMENTAL_EXTENSION_APIS)
            || draft.flags.contains(CreationFlags::FROM_WEBSTORE)
    }
}

impl Default for ExtensionLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

fn invalid_value(key: impl Into<String>) -> ManifestError {
    ManifestError::InvalidValue { key: key.into() }
}

/// An absent key is `None`; a key of the wrong type is fatal.
fn optional<T>(lookup: Lookup<T>, key: &str) -> ManifestResult<Option<T>> {
    lookup.optional().map_err(|_| invalid_value(key))
}

/// A list whose entries must all be strings. Errors name the list itself or
/// the offending entry.
fn string_list(value: &Value, key: &str) -> ManifestResult<Vec<String>> {
    let list = value.as_array().ok_or_else(|| invalid_value(key))?;
    list.iter()
        .enumerate()
        .map(|(index, entry)| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid_value(format!("{}[{}]", key, index)))
        })
        .collect()
}
