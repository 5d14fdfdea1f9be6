//! Extension-only surfaces: actions, content scripts, incognito mode, the
//! content security policy, content packs and `externally_connectable`.

use serde_json::Value;
use tracing::debug;

use super::permissions::wildcard_over_registry;
use super::{content_scripts, invalid_value, optional, string_list, ExtensionDraft, ExtensionLoader};
use crate::extensions::csp::{
    content_security_policy_is_legal, content_security_policy_is_secure,
    DEFAULT_CONTENT_SECURITY_POLICY, DEFAULT_PLATFORM_APP_CONTENT_SECURITY_POLICY,
};
use crate::extensions::error::{warnings, ManifestError, ManifestResult};
use crate::extensions::extension::{ActionInfo, ExternallyConnectable};
use crate::extensions::id::ExtensionId;
use crate::extensions::manifest::{keys, LookupExt, ValueLookup};
use crate::extensions::permissions::ApiPermission;
use crate::extensions::resource::resource_url;
use crate::extensions::url_pattern::{SchemeMask, UrlPattern};

/// Icon sizes an action may declare. A bare string is the smallest.
const ACTION_ICON_SIZES: [u32; 2] = [19, 38];

const INCOGNITO_SPANNING: &str = "spanning";
const INCOGNITO_SPLIT: &str = "split";

/// Grants connections from every extension.
const ALL_IDS: &str = "*";

pub(super) fn load_extension_features(
    loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    if let Some(converted) = optional(
        draft.manifest.get_bool(keys::CONVERTED_FROM_USER_SCRIPT),
        keys::CONVERTED_FROM_USER_SCRIPT,
    )? {
        draft.converted_from_user_script = converted;
    }

    content_scripts::load_content_scripts(loader, &mut draft)?;

    draft.page_action = load_action(&draft, keys::PAGE_ACTION)?;
    draft.browser_action = load_action(&draft, keys::BROWSER_ACTION)?;
    draft.system_indicator = load_action(&draft, keys::SYSTEM_INDICATOR)?;
    if draft.system_indicator.is_some() {
        draft.api_permissions.insert(ApiPermission::SystemIndicator);
    }

    load_incognito(&mut draft)?;
    load_content_security_policy(&mut draft)?;
    Ok(draft)
}

fn load_action(draft: &ExtensionDraft, key: &str) -> ManifestResult<Option<ActionInfo>> {
    let Some(dict) = optional(draft.manifest.get_dict(key), key)? else {
        return Ok(None);
    };
    let field = |name: &str| format!("{}.{}", key, name);

    let mut action = ActionInfo::default();
    let icon_key = field(keys::PAGE_ACTION_DEFAULT_ICON);
    match dict.get_without_path_expansion(keys::PAGE_ACTION_DEFAULT_ICON) {
        None => {}
        Some(Value::String(path)) => {
            let path = icon_path(path).ok_or_else(|| invalid_value(icon_key.as_str()))?;
            action.default_icon.insert(ACTION_ICON_SIZES[0], path);
        }
        Some(Value::Object(icons)) => {
            for size in ACTION_ICON_SIZES {
                let Some(path) = icons.get(&size.to_string()) else {
                    continue;
                };
                let path = path
                    .as_str()
                    .and_then(icon_path)
                    .ok_or_else(|| invalid_value(icon_key.as_str()))?;
                action.default_icon.insert(size, path);
            }
        }
        Some(_) => return Err(invalid_value(icon_key)),
    }

    let title_key = field(keys::PAGE_ACTION_DEFAULT_TITLE);
    if let Some(title) = optional(dict.get_str(keys::PAGE_ACTION_DEFAULT_TITLE), &title_key)? {
        action.default_title = title.to_string();
    }

    let popup_key = field(keys::PAGE_ACTION_DEFAULT_POPUP);
    action.default_popup = match optional(dict.get_str(keys::PAGE_ACTION_DEFAULT_POPUP), &popup_key)? {
        None | Some("") => None,
        Some(popup) => Some(resource_url(&draft.url, popup).map_err(|_| invalid_value(popup_key))?),
    };

    Ok(Some(action))
}

fn icon_path(path: &str) -> Option<String> {
    let path = path.trim_start_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}

fn load_incognito(draft: &mut ExtensionDraft) -> ManifestResult<()> {
    // Apps always run split; extensions span unless they ask otherwise.
    draft.incognito_split_mode = draft.manifest.is_app();
    match optional(draft.manifest.get_str(keys::INCOGNITO), keys::INCOGNITO)? {
        None => {}
        Some(INCOGNITO_SPANNING) => draft.incognito_split_mode = false,
        Some(INCOGNITO_SPLIT) => draft.incognito_split_mode = true,
        Some(_) => return Err(invalid_value(keys::INCOGNITO)),
    }
    Ok(())
}

fn load_content_security_policy(draft: &mut ExtensionDraft) -> ManifestResult<()> {
    let platform_app = draft.manifest.is_platform_app();
    let key = if platform_app {
        keys::PLATFORM_APP_CONTENT_SECURITY_POLICY
    } else {
        keys::CONTENT_SECURITY_POLICY
    };

    let policy = draft
        .manifest
        .get_str(key)
        .optional()
        .map_err(|_| ManifestError::InvalidContentSecurityPolicy(key.to_string()))?;

    draft.content_security_policy = match policy {
        Some(policy) => {
            if !content_security_policy_is_legal(policy) {
                return Err(ManifestError::InvalidContentSecurityPolicy(key.to_string()));
            }
            if draft.manifest_version >= 2
                && !content_security_policy_is_secure(policy, draft.manifest.extension_type())
            {
                return Err(ManifestError::InsecureContentSecurityPolicy(key.to_string()));
            }
            policy.to_string()
        }
        None if platform_app => DEFAULT_PLATFORM_APP_CONTENT_SECURITY_POLICY.to_string(),
        None if draft.manifest_version >= 2 => DEFAULT_CONTENT_SECURITY_POLICY.to_string(),
        None => String::new(),
    };
    Ok(())
}

pub(super) fn load_content_pack(
    _loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let Some(pack) = optional(draft.manifest.get_dict(keys::CONTENT_PACK), keys::CONTENT_PACK)?
    else {
        return Ok(draft);
    };
    let sites = pack
        .get_str(keys::CONTENT_PACK_SITES)
        .map_err(|_| invalid_value(format!("{}.{}", keys::CONTENT_PACK, keys::CONTENT_PACK_SITES)))?
        .to_string();
    draft.content_pack_site_list = Some(sites);
    Ok(draft)
}

pub(super) fn load_externally_connectable(
    loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    let Some(dict) = optional(
        draft.manifest.get_dict(keys::EXTERNALLY_CONNECTABLE),
        keys::EXTERNALLY_CONNECTABLE,
    )?
    else {
        return Ok(draft);
    };

    let list = |name: &str| -> ManifestResult<Option<Vec<String>>> {
        dict.get_without_path_expansion(name)
            .map(|value| string_list(value, &format!("{}.{}", keys::EXTERNALLY_CONNECTABLE, name)))
            .transpose()
    };
    let raw_matches = list(keys::EXTERNALLY_CONNECTABLE_MATCHES)?;
    let raw_ids = list(keys::EXTERNALLY_CONNECTABLE_IDS)?;

    if raw_matches.is_none() && raw_ids.is_none() {
        draft.warn(warnings::NOTHING_EXTERNALLY_CONNECTABLE);
    }

    let mut connectable = ExternallyConnectable::default();
    for raw in raw_matches.unwrap_or_default() {
        let pattern = UrlPattern::parse(SchemeMask::ALL, &raw)
            .map_err(|_| ManifestError::InvalidExternalMatch(raw.clone()))?;

        if pattern.match_all_urls() || pattern.host().is_empty() {
            draft.warn(warnings::wildcard_hosts_not_allowed(&raw));
            continue;
        }
        if let Some(warning) = wildcard_over_registry(loader, &pattern) {
            draft.warn(warning);
            continue;
        }
        connectable.matches.add_pattern(pattern);
    }

    for id in raw_ids.unwrap_or_default() {
        if id == ALL_IDS {
            connectable.all_ids = true;
        } else if ExtensionId::is_valid(&id) {
            connectable.ids.push(id);
        } else {
            return Err(ManifestError::InvalidExternalId(id));
        }
    }
    connectable.ids.sort();
    connectable.ids.dedup();

    if !connectable.matches.is_empty() {
        draft.api_permissions.insert(ApiPermission::WebConnectable);
    }
    debug!(
        matches = connectable.matches.len(),
        ids = connectable.ids.len(),
        all_ids = connectable.all_ids,
        "externally connectable parsed"
    );
    draft.externally_connectable = Some(connectable);
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::extensions::extension::Extension;
    use crate::extensions::manifest::Location;
    use crate::extensions::permissions::Channel;
    use crate::extensions::CreationFlags;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    fn load_with(loader: &ExtensionLoader, mut manifest: Value) -> ManifestResult<Arc<Extension>> {
        if let Some(map) = manifest.as_object_mut() {
            map.entry("name").or_insert(json!("T"));
            map.entry("version").or_insert(json!("1"));
        }
        loader.load(
            Path::new("/tmp/ext"),
            Location::Internal,
            manifest,
            CreationFlags::empty(),
        )
    }

    fn load(manifest: Value) -> ManifestResult<Arc<Extension>> {
        load_with(&ExtensionLoader::default(), manifest)
    }

    fn dev_loader() -> ExtensionLoader {
        ExtensionLoader::new(LoaderConfig {
            channel: Channel::Dev,
            ..LoaderConfig::default()
        })
    }

    #[test]
    fn test_browser_action() {
        let ext = load(json!({"browser_action": {
            "default_title": "Go",
            "default_icon": {"19": "/a.png", "38": "b.png"},
            "default_popup": "popup.html"
        }}))
        .unwrap();
        let action = ext.browser_action().unwrap();
        assert_eq!(action.default_title, "Go");
        assert_eq!(action.default_icon[&19], "a.png");
        assert_eq!(action.default_icon[&38], "b.png");
        assert_eq!(action.default_popup.as_ref().unwrap().path(), "/popup.html");
        assert!(ext.page_action().is_none());
    }

    #[test]
    fn test_page_action_icon_forms() {
        let ext = load(json!({"page_action": {"default_icon": "icon.png", "default_popup": ""}}))
            .unwrap();
        let action = ext.page_action().unwrap();
        assert_eq!(action.default_icon.get(&19).map(String::as_str), Some("icon.png"));
        assert!(action.default_popup.is_none());

        assert_eq!(
            load(json!({"page_action": {"default_icon": 3}})).unwrap_err(),
            invalid_value("page_action.default_icon")
        );
        assert_eq!(
            load(json!({"page_action": {"default_icon": ""}})).unwrap_err(),
            invalid_value("page_action.default_icon")
        );
        assert_eq!(
            load(json!({"page_action": {"default_title": []}})).unwrap_err(),
            invalid_value("page_action.default_title")
        );
        assert_eq!(
            load(json!({"page_action": "yes"})).unwrap_err(),
            invalid_value("page_action")
        );
    }

    #[test]
    fn test_system_indicator_needs_dev_channel() {
        let stable = load(json!({"system_indicator": {}})).unwrap();
        assert!(stable.system_indicator().is_none());
        assert_eq!(stable.install_warnings().len(), 1);

        let dev = load_with(&dev_loader(), json!({"system_indicator": {"default_title": "S"}}))
            .unwrap();
        assert_eq!(dev.system_indicator().unwrap().default_title, "S");
        assert!(dev.has_api_permission(ApiPermission::SystemIndicator));
    }

    #[test]
    fn test_incognito() {
        assert!(!load(json!({})).unwrap().incognito_split_mode());
        assert!(load(json!({"incognito": "split"})).unwrap().incognito_split_mode());
        assert!(!load(json!({"incognito": "spanning"})).unwrap().incognito_split_mode());
        assert_eq!(
            load(json!({"incognito": "both"})).unwrap_err(),
            invalid_value("incognito")
        );

        let app = load(json!({"app": {"launch": {"local_path": "main.html"}}})).unwrap();
        assert!(app.incognito_split_mode());
    }

    #[test]
    fn test_default_content_security_policy() {
        assert_eq!(load(json!({})).unwrap().content_security_policy(), "");
        assert_eq!(
            load(json!({"manifest_version": 2})).unwrap().content_security_policy(),
            DEFAULT_CONTENT_SECURITY_POLICY
        );
    }

    #[test]
    fn test_content_security_policy_checks() {
        let secure = "script-src 'self'; object-src 'self'";
        let ext = load(json!({"manifest_version": 2, "content_security_policy": secure})).unwrap();
        assert_eq!(ext.content_security_policy(), secure);

        assert_eq!(
            load(json!({"content_security_policy": "default-src 'self',"})).unwrap_err(),
            ManifestError::InvalidContentSecurityPolicy("content_security_policy".into())
        );
        assert_eq!(
            load(json!({"content_security_policy": 1})).unwrap_err(),
            ManifestError::InvalidContentSecurityPolicy("content_security_policy".into())
        );

        let insecure = json!({
            "manifest_version": 2,
            "content_security_policy": "script-src 'self' http://evil.com; object-src 'self'"
        });
        assert_eq!(
            load(insecure).unwrap_err(),
            ManifestError::InsecureContentSecurityPolicy("content_security_policy".into())
        );

        // Version 1 manifests may keep an insecure policy.
        assert!(load(json!({"content_security_policy": "script-src http://evil.com"})).is_ok());
    }

    #[test]
    fn test_content_pack() {
        let ext = load_with(&dev_loader(), json!({"content_pack": {"sites": "sites.json"}})).unwrap();
        assert_eq!(ext.content_pack_site_list(), Some("sites.json"));

        assert_eq!(
            load_with(&dev_loader(), json!({"content_pack": {"sites": 1}})).unwrap_err(),
            invalid_value("content_pack.sites")
        );
        assert_eq!(
            load_with(&dev_loader(), json!({"content_pack": []})).unwrap_err(),
            invalid_value("content_pack")
        );
    }

    #[test]
    fn test_externally_connectable() {
        let friend = "a".repeat(32);
        let ext = load(json!({"externally_connectable": {
            "matches": ["https://*.example.com/*", "*://*/*", "https://*.com/*"],
            "ids": [friend.clone(), "b".repeat(32)]
        }}))
        .unwrap();

        let connectable = ext.externally_connectable().unwrap();
        assert_eq!(connectable.matches.to_strings(), vec!["https://*.example.com/*"]);
        assert!(connectable.id_can_connect(&friend));
        assert!(!connectable.id_can_connect(&"c".repeat(32)));
        assert!(!connectable.all_ids);
        assert_eq!(ext.install_warnings().len(), 2);
        assert!(ext.has_api_permission(ApiPermission::WebConnectable));
    }

    #[test]
    fn test_externally_connectable_all_ids() {
        let ext = load(json!({"externally_connectable": {"ids": ["*"]}})).unwrap();
        let connectable = ext.externally_connectable().unwrap();
        assert!(connectable.all_ids);
        assert!(connectable.id_can_connect(&"p".repeat(32)));
        assert!(!ext.has_api_permission(ApiPermission::WebConnectable));
    }

    #[test]
    fn test_externally_connectable_errors() {
        assert_eq!(
            load(json!({"externally_connectable": {"ids": ["not-an-id"]}})).unwrap_err(),
            ManifestError::InvalidExternalId("not-an-id".into())
        );
        assert_eq!(
            load(json!({"externally_connectable": {"matches": ["no scheme"]}})).unwrap_err(),
            ManifestError::InvalidExternalMatch("no scheme".into())
        );
        assert_eq!(
            load(json!({"externally_connectable": {"matches": "https://a.com/*"}})).unwrap_err(),
            invalid_value("externally_connectable.matches")
        );
    }

    #[test]
    fn test_externally_connectable_empty() {
        let ext = load(json!({"externally_connectable": {}})).unwrap();
        assert_eq!(
            ext.install_warnings()[0].message,
            warnings::NOTHING_EXTERNALLY_CONNECTABLE
        );
        assert!(ext.externally_connectable().unwrap().matches.is_empty());
    }
}
