//! Keys shared by extensions and apps: description, icons, plugins, NaCl
//! modules, sandboxed pages, requirements, offline flag and background page.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{invalid_value, optional, string_list, ExtensionDraft, ExtensionLoader};
use crate::config::switches;
use crate::extensions::csp::{
    content_security_policy_is_legal, content_security_policy_is_sandboxed,
    DEFAULT_SANDBOXED_PAGE_CONTENT_SECURITY_POLICY,
};
use crate::extensions::error::{ManifestError, ManifestResult};
use crate::extensions::extension::{NaClModuleInfo, PluginInfo, Requirements};
use crate::extensions::l10n::localize_message;
use crate::extensions::manifest::{keys, DictView, ValueLookup};
use crate::extensions::permissions::ApiPermission;
use crate::extensions::resource::resource_url;
use crate::extensions::url_pattern::{SchemeMask, UrlPattern, EXTENSION_SCHEME};

/// Icon sizes a manifest may declare.
pub const ICON_SIZES: [u32; 7] = [16, 19, 32, 48, 64, 96, 128];

const REQUIREMENT_PLUGINS: &str = "plugins";
const REQUIREMENT_NPAPI: &str = "npapi";
const REQUIREMENT_3D: &str = "3D";
const REQUIREMENT_3D_FEATURES: &str = "features";
const FEATURE_WEBGL: &str = "webgl";
const FEATURE_CSS3D: &str = "css3d";

pub(super) fn load_shared_features(
    loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    if let Some(description) =
        optional(draft.manifest.get_str(keys::DESCRIPTION), keys::DESCRIPTION)?
    {
        draft.description = localize_message(description, loader.localizer.as_ref());
    }

    load_icons(&mut draft)?;
    load_plugins(&mut draft)?;
    load_nacl_modules(&mut draft)?;
    load_sandboxed_pages(&mut draft)?;
    load_requirements(&mut draft)?;

    draft.offline_enabled = optional(
        draft.manifest.get_bool(keys::OFFLINE_ENABLED),
        keys::OFFLINE_ENABLED,
    )?
    .unwrap_or_else(|| draft.manifest.is_platform_app());

    load_background(loader, &mut draft)?;
    Ok(draft)
}

fn load_icons(draft: &mut ExtensionDraft) -> ManifestResult<()> {
    let Some(icons) = optional(draft.manifest.get_dict(keys::ICONS), keys::ICONS)? else {
        return Ok(());
    };

    let mut parsed = BTreeMap::new();
    for size in ICON_SIZES {
        let Some(value) = icons.get_without_path_expansion(&size.to_string()) else {
            continue;
        };
        let path = value
            .as_str()
            .map(|path| path.trim_start_matches('/'))
            .filter(|path| !path.is_empty())
            .ok_or_else(|| invalid_value(format!("{}.{}", keys::ICONS, size)))?;
        parsed.insert(size, path.to_string());
    }
    draft.icons = parsed;
    Ok(())
}

/// Entries of a list of dictionaries, or an error naming the list or entry.
fn dict_list<'a>(
    value: Option<&'a Value>,
    key: &str,
) -> ManifestResult<Vec<DictView<'a>>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let list = value.as_array().ok_or_else(|| invalid_value(key))?;
    list.iter()
        .enumerate()
        .map(|(index, entry)| {
            entry
                .as_object()
                .map(DictView::new)
                .ok_or_else(|| invalid_value(format!("{}[{}]", key, index)))
        })
        .collect()
}

fn load_plugins(draft: &mut ExtensionDraft) -> ManifestResult<()> {
    let mut plugins = Vec::new();
    for (index, plugin) in dict_list(draft.manifest.get(keys::PLUGINS).ok(), keys::PLUGINS)?
        .into_iter()
        .enumerate()
    {
        let path = plugin
            .get_str(keys::PLUGINS_PATH)
            .map_err(|_| invalid_value(format!("{}[{}].path", keys::PLUGINS, index)))?;
        let is_public = optional(
            plugin.get_bool(keys::PLUGINS_PUBLIC),
            &format!("{}[{}].public", keys::PLUGINS, index),
        )?
        .unwrap_or(false);
        plugins.push(PluginInfo {
            path: draft.path.join(path),
            is_public,
        });
    }
    draft.plugins = plugins;
    Ok(())
}

fn load_nacl_modules(draft: &mut ExtensionDraft) -> ManifestResult<()> {
    let mut modules = Vec::new();
    for (index, module) in
        dict_list(draft.manifest.get(keys::NACL_MODULES).ok(), keys::NACL_MODULES)?
            .into_iter()
            .enumerate()
    {
        let path_key = format!("{}[{}].path", keys::NACL_MODULES, index);
        let path = module
            .get_str(keys::NACL_MODULES_PATH)
            .map_err(|_| invalid_value(path_key.as_str()))?;
        let mime_type = module
            .get_str(keys::NACL_MODULES_MIME_TYPE)
            .map_err(|_| invalid_value(format!("{}[{}].mime_type", keys::NACL_MODULES, index)))?;
        let url = resource_url(&draft.url, path).map_err(|_| invalid_value(path_key))?;
        modules.push(NaClModuleInfo {
            url,
            mime_type: mime_type.to_string(),
        });
    }
    draft.nacl_modules = modules;
    Ok(())
}

fn load_sandboxed_pages(draft: &mut ExtensionDraft) -> ManifestResult<()> {
    let Ok(pages) = draft.manifest.get(keys::SANDBOXED_PAGES) else {
        return Ok(());
    };
    let pages = string_list(pages, keys::SANDBOXED_PAGES)?;

    let host = draft.url.host_str().unwrap_or_default().to_string();
    for page in pages {
        let mut pattern = UrlPattern::new(SchemeMask::EXTENSION);
        pattern.set_scheme(EXTENSION_SCHEME);
        pattern.set_host(&host);
        pattern.set_path(&format!("/{}", page.trim_start_matches('/')));
        draft.sandboxed_pages.add_pattern(pattern);
    }

    let policy = draft
        .manifest
        .get_str(keys::SANDBOXED_PAGES_CSP)
        .ok()
        .map(str::to_string);
    draft.sandboxed_pages_csp = match policy {
        Some(policy) => {
            if !content_security_policy_is_legal(&policy)
                || !content_security_policy_is_sandboxed(&policy, draft.manifest.extension_type())
            {
                return Err(ManifestError::InvalidSandboxedPagesCsp);
            }
            policy
        }
        None if draft.manifest.has_key(keys::SANDBOXED_PAGES_CSP) => {
            return Err(ManifestError::InvalidSandboxedPagesCsp);
        }
        None => DEFAULT_SANDBOXED_PAGE_CONTENT_SECURITY_POLICY.to_string(),
    };
    Ok(())
}

fn load_requirements(draft: &mut ExtensionDraft) -> ManifestResult<()> {
    // Plugins imply NPAPI unless the manifest says otherwise.
    let mut requirements = Requirements {
        npapi: !draft.plugins.is_empty(),
        ..Requirements::default()
    };

    if let Some(sections) =
        optional(draft.manifest.get_dict(keys::REQUIREMENTS), keys::REQUIREMENTS)?
    {
        for (name, section) in sections.entries() {
            let section = section
                .as_object()
                .ok_or_else(|| invalid_value(keys::REQUIREMENTS))?;
            match name.as_str() {
                REQUIREMENT_PLUGINS => {
                    for (feature, enabled) in section {
                        if feature != REQUIREMENT_NPAPI {
                            return Err(invalid_value(keys::REQUIREMENTS));
                        }
                        requirements.npapi = enabled
                            .as_bool()
                            .ok_or_else(|| invalid_value(keys::REQUIREMENTS))?;
                    }
                }
                REQUIREMENT_3D => {
                    let features = section
                        .get(REQUIREMENT_3D_FEATURES)
                        .and_then(Value::as_array)
                        .ok_or_else(|| invalid_value(keys::REQUIREMENTS))?;
                    for feature in features.iter().filter_map(Value::as_str) {
                        match feature {
                            FEATURE_WEBGL => requirements.webgl = true,
                            FEATURE_CSS3D => requirements.css3d = true,
                            _ => return Err(invalid_value(keys::REQUIREMENTS)),
                        }
                    }
                }
                _ => return Err(invalid_value(keys::REQUIREMENTS)),
            }
        }
    }

    draft.requirements = requirements;
    Ok(())
}

fn load_background(loader: &ExtensionLoader, draft: &mut ExtensionDraft) -> ManifestResult<()> {
    let platform_app = draft.manifest.is_platform_app();

    let scripts_key = if platform_app {
        keys::PLATFORM_APP_BACKGROUND_SCRIPTS
    } else {
        keys::BACKGROUND_SCRIPTS
    };
    if let Ok(scripts) = draft.manifest.get(scripts_key) {
        draft.background.scripts = string_list(scripts, scripts_key)?;
    }

    let (page_key, page) = if platform_app {
        (
            keys::PLATFORM_APP_BACKGROUND_PAGE,
            draft.manifest.get(keys::PLATFORM_APP_BACKGROUND_PAGE).ok(),
        )
    } else {
        match draft.manifest.get(keys::BACKGROUND_PAGE).ok() {
            Some(page) => (keys::BACKGROUND_PAGE, Some(page)),
            None => (
                keys::BACKGROUND_PAGE_LEGACY,
                draft.manifest.get(keys::BACKGROUND_PAGE_LEGACY).ok(),
            ),
        }
    };

    if let Some(page) = page {
        if !draft.background.scripts.is_empty() {
            return Err(ManifestError::InvalidBackgroundCombination);
        }
        let raw = page.as_str().ok_or_else(|| invalid_value(page_key))?;

        let url = if draft.manifest.is_hosted_app() {
            if !draft.api_permissions.contains(ApiPermission::Background) {
                return Err(ManifestError::BackgroundPermissionNeeded);
            }
            let url = url::Url::parse(raw).map_err(|_| ManifestError::InvalidBackgroundInHostedApp)?;
            let allow_http = loader.switches.has(switches::ALLOW_HTTP_BACKGROUND_PAGE);
            if !(url.scheme() == "https" || (allow_http && url.scheme() == "http")) {
                return Err(ManifestError::InvalidBackgroundInHostedApp);
            }
            url
        } else {
            resource_url(&draft.url, raw).map_err(|_| invalid_value(page_key))?
        };
        draft.background.page = Some(url);
    }

    if platform_app {
        draft.background.persistent = false;
    } else if let Some(persistent) = optional(
        draft.manifest.get_bool(keys::BACKGROUND_PERSISTENT),
        keys::BACKGROUND_PERSISTENT,
    )? {
        if !draft.has_background_page() {
            return Err(ManifestError::BackgroundPersistentNoPage);
        }
        draft.background.persistent = persistent;
    }

    if let Some(allow_js_access) = optional(
        draft.manifest.get_bool(keys::BACKGROUND_ALLOW_JS_ACCESS),
        keys::BACKGROUND_ALLOW_JS_ACCESS,
    )? {
        draft.background.allow_js_access = allow_js_access;
    }
    Ok(())
}
