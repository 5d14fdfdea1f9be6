//! `permissions` and `optional_permissions`.

use serde_json::Value;
use tracing::warn;

use super::{CreationFlags, ExtensionDraft, ExtensionLoader};
use crate::extensions::error::{warnings, ManifestError, ManifestResult};
use crate::extensions::manifest::{keys, ValueLookup};
use crate::extensions::pattern_set::UrlPatternSet;
use crate::extensions::permissions::{ApiPermission, ApiPermissionSet};
use crate::extensions::url_pattern::{SchemeMask, UrlPattern, CHROME_UI_SCHEME, FILE_SCHEME};

const CHROME_UI_FAVICON_HOST: &str = "favicon";
const CHROME_UI_THUMBNAIL_HOST: &str = "thumb";

pub(super) fn load_permissions(
    loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let (mut apis, hosts) = parse_permission_list(loader, &mut draft, keys::PERMISSIONS)?;

    if let Some(permission) = apis.iter().find(|p| p.info().must_be_optional()) {
        return Err(ManifestError::PermissionMustBeOptional(
            permission.name().to_string(),
        ));
    }

    let (optional_apis, optional_hosts) =
        parse_permission_list(loader, &mut draft, keys::OPTIONAL_PERMISSIONS)?;

    for set in [&apis, &optional_apis] {
        if let Some(permission) = set.iter().find(|p| p.info().is_internal()) {
            return Err(ManifestError::PermissionNotAllowedInManifest(
                permission.name().to_string(),
            ));
        }
    }

    if draft.manifest.is_platform_app() {
        apis.insert(ApiPermission::AppCurrentWindowInternal);
        apis.insert(ApiPermission::AppRuntime);
        apis.insert(ApiPermission::AppWindow);
    }

    draft.api_permissions = apis;
    draft.host_permissions = hosts;
    draft.optional_api_permissions = optional_apis;
    draft.optional_host_permissions = optional_hosts;
    Ok(draft)
}

/// Split one permission list into API permissions and host patterns.
/// Permissions unavailable to this extension and strings that are neither a
/// permission nor a pattern become install warnings.
fn parse_permission_list(
    loader: &ExtensionLoader,
    draft: &mut ExtensionDraft,
    key: &str,
) -> ManifestResult<(ApiPermissionSet, UrlPatternSet)> {
    let list = match draft.manifest.get(key) {
        Ok(Value::Array(list)) => list.clone(),
        Ok(_) => return Err(ManifestError::InvalidPermissions(key.to_string())),
        Err(_) => return Ok((ApiPermissionSet::new(), UrlPatternSet::new())),
    };

    let (mut apis, host_data) = ApiPermissionSet::parse_from_json(&list, key)?;

    let unavailable: Vec<(ApiPermission, String)> = {
        let context = draft.feature_context();
        apis.iter()
            .filter_map(|permission| {
                let availability = loader
                    .permission_features
                    .is_available(permission.name(), &context);
                (!availability.is_available())
                    .then(|| (permission, availability.message().to_string()))
            })
            .collect()
    };
    for (permission, message) in unavailable {
        warn!(permission = permission.name(), reason = %message, "permission not available");
        apis.remove(permission);
        draft.warn(message);
    }

    if apis.contains(ApiPermission::Experimental) && !loader.experimental_allowed(draft) {
        return Err(ManifestError::ExperimentalFlagRequired);
    }

    let mask = if draft.can_execute_script_everywhere {
        SchemeMask::ALL
    } else {
        SchemeMask::HOST_PERMISSION
    };

    let mut hosts = UrlPatternSet::new();
    for raw in host_data {
        let mut pattern = match UrlPattern::parse(mask, &raw) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(entry = %raw, error = %err, "unknown permission");
                draft.warn(warnings::unknown_permission(&raw));
                continue;
            }
        };

        if !can_specify_host_permission(draft, &apis, &pattern) {
            return Err(ManifestError::InvalidPermissionScheme {
                list: key.to_string(),
                entry: raw,
            });
        }

        if let Some(message) = wildcard_over_registry(loader, &pattern) {
            warn!(entry = %raw, "wildcard over a public suffix");
            draft.warn(message);
            continue;
        }

        // The path of a host grant carries no meaning.
        pattern.set_path("/*");
        restrict_file_access(draft, &mut pattern);
        hosts.add_pattern(pattern);
    }

    Ok((apis, hosts))
}

/// Browser UI pages are off limits apart from favicons, and thumbnails for
/// experimental extensions. Extensions that may script everywhere are
/// exempt.
fn can_specify_host_permission(
    draft: &ExtensionDraft,
    apis: &ApiPermissionSet,
    pattern: &UrlPattern,
) -> bool {
    if pattern.match_all_urls() || !pattern.matches_scheme(CHROME_UI_SCHEME) {
        return true;
    }
    if pattern.host() == CHROME_UI_FAVICON_HOST {
        return true;
    }
    if pattern.host() == CHROME_UI_THUMBNAIL_HOST && apis.contains(ApiPermission::Experimental) {
        return true;
    }
    draft.can_execute_script_everywhere
}

/// Warning text if `pattern` grants every subdomain of a public suffix.
pub(super) fn wildcard_over_registry(
    loader: &ExtensionLoader,
    pattern: &UrlPattern,
) -> Option<String> {
    let host = pattern.host();
    if pattern.match_subdomains() && !host.is_empty() && loader.registry.is_registry(host) {
        Some(warnings::top_level_domains_not_allowed(
            host,
            &pattern.to_string(),
        ))
    } else {
        None
    }
}

/// Record that `pattern` asks for `file://` access, and take the access
/// away unless the loader was told to allow it.
pub(super) fn restrict_file_access(draft: &mut ExtensionDraft, pattern: &mut UrlPattern) {
    if draft.can_execute_script_everywhere || !pattern.matches_scheme(FILE_SCHEME) {
        return;
    }
    draft.wants_file_access = true;
    if !draft.flags.contains(CreationFlags::ALLOW_FILE_ACCESS) {
        pattern.set_valid_schemes(pattern.valid_schemes().difference(SchemeMask::FILE));
    }
}
