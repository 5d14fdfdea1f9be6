//! Rules that span several keys, run once everything is parsed.

use super::{ExtensionDraft, ExtensionLoader};
use crate::extensions::error::{ManifestError, ManifestResult};
use crate::extensions::permissions::ApiPermission;

pub(super) fn check_ui_surfaces(
    _loader: &ExtensionLoader,
    draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let surfaces = [
        draft.page_action.is_some(),
        draft.browser_action.is_some(),
        draft.manifest.is_app(),
    ];
    if surfaces.into_iter().filter(|present| *present).count() > 1 {
        return Err(ManifestError::OneUiSurfaceOnly);
    }
    Ok(draft)
}

pub(super) fn check_platform_app(
    _loader: &ExtensionLoader,
    draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    if !draft.manifest.is_platform_app() {
        return Ok(draft);
    }
    if !draft.has_background_page() {
        return Err(ManifestError::BackgroundRequiredForPlatformApps);
    }
    if !draft.incognito_split_mode {
        return Err(ManifestError::InvalidIncognitoModeForPlatformApp);
    }
    Ok(draft)
}

/// Blocking web requests need a page that stays alive.
pub(super) fn check_background_conflicts(
    _loader: &ExtensionLoader,
    draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let lazy = draft.has_background_page() && !draft.background.persistent;
    if lazy && draft.api_permissions.contains(ApiPermission::WebRequestBlocking) {
        return Err(ManifestError::WebRequestConflictsWithLazyBackground);
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::manifest::Location;
    use crate::extensions::CreationFlags;
    use serde_json::{json, Value};
    use std::path::Path;

    fn load(manifest: Value) -> ManifestResult<()> {
        ExtensionLoader::default()
            .load(
                Path::new("/tmp/ext"),
                Location::Internal,
                manifest,
                CreationFlags::empty(),
            )
            .map(|_| ())
    }

    #[test]
    fn test_one_ui_surface() {
        assert_eq!(
            load(json!({
                "name": "T", "version": "1",
                "page_action": {}, "browser_action": {}
            })),
            Err(ManifestError::OneUiSurfaceOnly)
        );
        assert!(load(json!({"name": "T", "version": "1", "browser_action": {}})).is_ok());
    }

    #[test]
    fn test_platform_app_needs_background() {
        let app = |background: Value| {
            json!({
                "name": "T", "version": "1", "manifest_version": 2,
                "app": {"background": background}
            })
        };
        assert_eq!(
            load(app(json!({}))),
            Err(ManifestError::BackgroundRequiredForPlatformApps)
        );
        assert!(load(app(json!({"scripts": ["main.js"]}))).is_ok());
    }

    #[test]
    fn test_platform_app_must_split_incognito() {
        assert_eq!(
            load(json!({
                "name": "T", "version": "1", "manifest_version": 2,
                "incognito": "spanning",
                "app": {"background": {"scripts": ["main.js"]}}
            })),
            Err(ManifestError::InvalidIncognitoModeForPlatformApp)
        );
    }

    #[test]
    fn test_blocking_requests_need_persistent_page() {
        let manifest = |persistent: bool| {
            json!({
                "name": "T", "version": "1",
                "permissions": ["webRequest", "webRequestBlocking"],
                "background": {"scripts": ["bg.js"], "persistent": persistent}
            })
        };
        assert_eq!(
            load(manifest(false)),
            Err(ManifestError::WebRequestConflictsWithLazyBackground)
        );
        assert!(load(manifest(true)).is_ok());
    }
}
