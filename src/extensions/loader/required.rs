//! Keys every manifest is checked for first: key availability, manifest
//! version, minimum host version, name and version.

use tracing::debug;

use super::{CreationFlags, ExtensionDraft, ExtensionLoader};
use crate::config::switches;
use crate::extensions::error::{ManifestError, ManifestResult};
use crate::extensions::l10n::{adjust_string_for_locale_direction, localize_message};
use crate::extensions::manifest::{keys, LookupExt, ValueLookup};
use crate::extensions::permissions::FeatureContext;
use crate::extensions::version::Version;

/// Lowest manifest version accepted when a modern manifest is required.
pub const MODERN_MANIFEST_VERSION: i64 = 2;

pub(super) fn validate_manifest_keys(
    loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let context = FeatureContext {
        extension_id: &draft.id,
        extension_type: draft.manifest.extension_type(),
        location: draft.manifest.location(),
        manifest_version: draft.manifest.manifest_version(),
        channel: draft.channel,
    };
    let warnings = draft
        .manifest
        .validate_keys(loader.manifest_features.as_ref(), &context);
    draft.install_warnings.extend(warnings);
    Ok(draft)
}

pub(super) fn load_manifest_version(
    loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    if draft.manifest.has_key(keys::MANIFEST_VERSION) {
        match draft.manifest.get_i64(keys::MANIFEST_VERSION) {
            Ok(version) if version >= 1 => draft.manifest_version = version,
            _ => return Err(ManifestError::InvalidManifestVersion),
        }
    }

    if draft.manifest_version < MODERN_MANIFEST_VERSION
        && draft
            .flags
            .contains(CreationFlags::REQUIRE_MODERN_MANIFEST_VERSION)
        && !loader
            .switches
            .has(switches::ALLOW_LEGACY_EXTENSION_MANIFESTS)
    {
        return Err(ManifestError::ManifestVersionTooOld {
            required: MODERN_MANIFEST_VERSION,
        });
    }
    Ok(draft)
}

pub(super) fn check_minimum_version(
    loader: &ExtensionLoader,
    draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let minimum = draft
        .manifest
        .get_str(keys::MINIMUM_CHROME_VERSION)
        .optional()
        .map_err(|_| ManifestError::InvalidMinimumVersion)?;

    if let Some(minimum) = minimum {
        let required = Version::parse(minimum).ok_or(ManifestError::InvalidMinimumVersion)?;
        if loader.host_version < required {
            return Err(ManifestError::HostVersionTooLow {
                product: loader.config.product_name.clone(),
                required: required.to_string(),
            });
        }
    }
    Ok(draft)
}

pub(super) fn load_name(
    loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let raw = match draft.manifest.get_str(keys::NAME) {
        Ok(name) if !name.trim().is_empty() => name.to_string(),
        _ => return Err(ManifestError::InvalidName),
    };

    let localized = localize_message(&raw, loader.localizer.as_ref());
    draft.name = adjust_string_for_locale_direction(&localized, loader.localizer.ui_locale());
    draft.non_localized_name = raw;
    Ok(draft)
}

pub(super) fn load_version(
    _loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let version = draft
        .manifest
        .get_str(keys::VERSION)
        .ok()
        .and_then(Version::parse_extension)
        .ok_or(ManifestError::InvalidVersion)?;
    debug!(version = %version, "parsed extension version");
    draft.version = Some(version);
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::extensions::l10n::StaticLocalizer;
    use crate::extensions::manifest::Location;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Arc;

    fn load_with(loader: &ExtensionLoader, manifest: Value, flags: CreationFlags) -> ManifestResult<String> {
        loader
            .load(Path::new("/tmp/ext"), Location::Internal, manifest, flags)
            .map(|ext| ext.name().to_string())
    }

    fn load(manifest: Value) -> ManifestResult<String> {
        load_with(&ExtensionLoader::default(), manifest, CreationFlags::empty())
    }

    #[test]
    fn test_manifest_version_values() {
        assert!(load(json!({"name": "T", "version": "1", "manifest_version": 2})).is_ok());
        for bad in [json!(0), json!(-1), json!("2"), json!(2.5)] {
            assert_eq!(
                load(json!({"name": "T", "version": "1", "manifest_version": bad})).unwrap_err(),
                ManifestError::InvalidManifestVersion
            );
        }
    }

    #[test]
    fn test_require_modern_manifest() {
        let loader = ExtensionLoader::default();
        let manifest = json!({"name": "T", "version": "1"});
        assert_eq!(
            load_with(&loader, manifest.clone(), CreationFlags::REQUIRE_MODERN_MANIFEST_VERSION)
                .unwrap_err(),
            ManifestError::ManifestVersionTooOld { required: 2 }
        );

        let legacy = ExtensionLoader::new(LoaderConfig {
            switches: vec![switches::ALLOW_LEGACY_EXTENSION_MANIFESTS.to_string()],
            ..LoaderConfig::default()
        });
        assert!(load_with(&legacy, manifest, CreationFlags::REQUIRE_MODERN_MANIFEST_VERSION).is_ok());
    }

    #[test]
    fn test_minimum_version() {
        assert!(load(json!({"name": "T", "version": "1", "minimum_chrome_version": "29.1"})).is_ok());
        assert_eq!(
            load(json!({"name": "T", "version": "1", "minimum_chrome_version": "31"})).unwrap_err(),
            ManifestError::HostVersionTooLow {
                product: "Chromium".into(),
                required: "31".into()
            }
        );
        assert_eq!(
            load(json!({"name": "T", "version": "1", "minimum_chrome_version": "x"})).unwrap_err(),
            ManifestError::InvalidMinimumVersion
        );
        assert_eq!(
            load(json!({"name": "T", "version": "1", "minimum_chrome_version": 31})).unwrap_err(),
            ManifestError::InvalidMinimumVersion
        );
    }

    #[test]
    fn test_name_is_required() {
        assert_eq!(load(json!({"version": "1"})).unwrap_err(), ManifestError::InvalidName);
        assert_eq!(
            load(json!({"name": "", "version": "1"})).unwrap_err(),
            ManifestError::InvalidName
        );
        assert_eq!(
            load(json!({"name": 3, "version": "1"})).unwrap_err(),
            ManifestError::InvalidName
        );
    }

    #[test]
    fn test_localized_right_to_left_name() {
        let loader = ExtensionLoader::default().with_localizer(Arc::new(
            StaticLocalizer::new("he").with_message("appName", "Reader"),
        ));
        let ext = loader
            .load(
                Path::new("/tmp/ext"),
                Location::Internal,
                json!({"name": "__MSG_appName__", "version": "1"}),
                CreationFlags::empty(),
            )
            .unwrap();
        assert_eq!(ext.name(), "\u{202A}Reader\u{202C}");
        assert_eq!(ext.non_localized_name(), "__MSG_appName__");
    }

    #[test]
    fn test_version_is_validated() {
        for bad in [json!("1.2.3.4.5"), json!("1.70000"), json!("01.0"), json!(1), json!("")] {
            assert_eq!(
                load(json!({"name": "T", "version": bad})).unwrap_err(),
                ManifestError::InvalidVersion
            );
        }
        assert!(load(json!({"name": "T"})).is_err());
    }
}
