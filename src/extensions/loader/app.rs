//! App settings: web extent, launch target and container, launcher flags and
//! storage isolation.

use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{invalid_value, optional, ExtensionDraft, ExtensionLoader};
use crate::extensions::error::{ManifestError, ManifestResult};
use crate::extensions::extension::{AppInfo, LaunchContainer};
use crate::extensions::manifest::{keys, ValueLookup};
use crate::extensions::permissions::ApiPermission;
use crate::extensions::resource::resource_url;
use crate::extensions::url_pattern::{ParseError, SchemeMask, UrlPattern};

const EXPECT_STRING: &str = "Expect string value.";
const CANNOT_CLAIM_ALL_URLS: &str = "Cannot claim all URLs in an extent.";
const CANNOT_CLAIM_ALL_HOSTS: &str = "Cannot claim all hosts ('*') in an extent.";
const NO_WILDCARDS_IN_PATHS: &str = "Wildcards are not allowed in extent URL pattern paths.";

const STORAGE_ISOLATION: &str = "storage";

pub(super) fn load_app(
    _loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    if !draft.manifest.is_app() {
        return Ok(draft);
    }

    let mut app = AppInfo::default();
    load_extent(&draft, &mut app)?;
    load_launch_target(&draft, &mut app)?;
    load_launch_container(&draft, &mut app)?;

    app.display_in_launcher = optional(
        draft.manifest.get_bool(keys::DISPLAY_IN_LAUNCHER),
        keys::DISPLAY_IN_LAUNCHER,
    )?
    .unwrap_or(true);
    // The new tab page follows the launcher unless told otherwise.
    app.display_in_new_tab_page = optional(
        draft.manifest.get_bool(keys::DISPLAY_IN_NEW_TAB_PAGE),
        keys::DISPLAY_IN_NEW_TAB_PAGE,
    )?
    .unwrap_or(app.display_in_launcher);

    draft.app = Some(app);
    Ok(draft)
}

fn load_extent(draft: &ExtensionDraft, app: &mut AppInfo) -> ManifestResult<()> {
    let urls = match draft.manifest.get(keys::WEB_URLS) {
        Ok(Value::Array(urls)) => urls,
        Ok(_) => return Err(ManifestError::InvalidWebUrls),
        Err(_) => return Ok(()),
    };

    for (index, entry) in urls.iter().enumerate() {
        let invalid = |detail: &str| ManifestError::InvalidWebUrl {
            index,
            detail: detail.to_string(),
        };

        let raw = entry.as_str().ok_or_else(|| invalid(EXPECT_STRING))?;
        let mut pattern = match UrlPattern::parse(SchemeMask::WEB, raw) {
            Ok(pattern) => pattern,
            // "http://example.com" is accepted as "http://example.com/".
            Err(ParseError::EmptyPath) => UrlPattern::parse(SchemeMask::WEB, &format!("{}/", raw))
                .map_err(|err| invalid(&err.to_string()))?,
            Err(err) => return Err(invalid(&err.to_string())),
        };

        if pattern.match_all_urls() {
            return Err(invalid(CANNOT_CLAIM_ALL_URLS));
        }
        if pattern.host().is_empty() {
            return Err(invalid(CANNOT_CLAIM_ALL_HOSTS));
        }
        if pattern.path().contains('*') {
            return Err(invalid(NO_WILDCARDS_IN_PATHS));
        }

        // Extent entries cover everything below the given path.
        let path = format!("{}*", pattern.path());
        pattern.set_path(&path);
        app.extent.add_pattern(pattern);
    }
    Ok(())
}

fn load_launch_target(draft: &ExtensionDraft, app: &mut AppInfo) -> ManifestResult<()> {
    let manifest = &draft.manifest;
    let local_path = manifest.get(keys::LAUNCH_LOCAL_PATH).ok();
    let web_url = manifest.get(keys::LAUNCH_WEB_URL).ok();

    if let Some(value) = local_path {
        if web_url.is_some() {
            return Err(ManifestError::LaunchPathAndUrlAreExclusive);
        }
        if manifest.has_key(keys::WEB_URLS) {
            return Err(ManifestError::LaunchPathAndExtentAreExclusive);
        }

        let path = value
            .as_str()
            .ok_or_else(|| invalid_value(keys::LAUNCH_LOCAL_PATH))?;
        let resolved =
            resource_url(&draft.url, path).map_err(|_| invalid_value(keys::LAUNCH_LOCAL_PATH))?;
        if resolved.scheme() != draft.url.scheme() || resolved.host_str() != draft.url.host_str() {
            return Err(invalid_value(keys::LAUNCH_LOCAL_PATH));
        }
        app.launch_local_path = Some(path.to_string());
    } else if let Some(value) = web_url {
        let raw = value
            .as_str()
            .ok_or_else(|| invalid_value(keys::LAUNCH_WEB_URL))?;
        let url = Url::parse(raw).map_err(|_| invalid_value(keys::LAUNCH_WEB_URL))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid_value(keys::LAUNCH_WEB_URL));
        }
        app.launch_web_url = Some(raw.to_string());
    } else if manifest.is_hosted_app() || manifest.is_legacy_packaged_app() {
        return Err(ManifestError::LaunchUrlRequired);
    }

    // A hosted app without `app.urls` owns the origin of its launch URL.
    if app.extent.is_empty() {
        let host = app
            .launch_web_url
            .as_deref()
            .and_then(|raw| Url::parse(raw).ok())
            .and_then(|url| url.host_str().map(str::to_string));
        if let Some(host) = host {
            let mut pattern = UrlPattern::new(SchemeMask::WEB);
            pattern.set_scheme("*");
            pattern.set_host(&host);
            pattern.set_path("/*");
            app.extent.add_pattern(pattern);
        }
    }
    Ok(())
}

fn load_launch_container(draft: &ExtensionDraft, app: &mut AppInfo) -> ManifestResult<()> {
    let manifest = &draft.manifest;
    app.launch_container = match optional(
        manifest.get_str(keys::LAUNCH_CONTAINER),
        keys::LAUNCH_CONTAINER,
    )? {
        None | Some("tab") => LaunchContainer::Tab,
        Some("panel") => LaunchContainer::Panel,
        Some(_) => return Err(invalid_value(keys::LAUNCH_CONTAINER)),
    };

    // Sizes only mean something for panels.
    let size = |key: &str| -> ManifestResult<i64> {
        if !manifest.has_key(key) {
            return Ok(0);
        }
        if app.launch_container != LaunchContainer::Panel {
            return Err(ManifestError::InvalidLaunchContainer(key.to_string()));
        }
        match manifest.get_i64(key) {
            Ok(value) if value >= 0 => Ok(value),
            _ => Err(invalid_value(key)),
        }
    };
    let width = size(keys::LAUNCH_WIDTH)?;
    let height = size(keys::LAUNCH_HEIGHT)?;
    app.launch_width = width;
    app.launch_height = height;
    Ok(())
}

/// `app.isolation` is honored for experimental apps only; platform apps are
/// always isolated.
pub(super) fn load_isolation(
    _loader: &ExtensionLoader,
    mut draft: ExtensionDraft,
) -> ManifestResult<ExtensionDraft> {
    {
        let ExtensionDraft {
            manifest,
            app,
            api_permissions,
            ..
        } = &mut draft;
        let Some(app) = app.as_mut() else {
            return Ok(draft);
        };

        if manifest.is_platform_app() {
            app.is_storage_isolated = true;
        } else if api_permissions.contains(ApiPermission::Experimental) {
            let entries = match manifest.get(keys::ISOLATION) {
                Ok(Value::Array(entries)) => entries.as_slice(),
                Ok(_) => return Err(invalid_value(keys::ISOLATION)),
                Err(_) => &[],
            };
            for (index, entry) in entries.iter().enumerate() {
                let value = entry
                    .as_str()
                    .ok_or_else(|| invalid_value(format!("{}[{}]", keys::ISOLATION, index)))?;
                if value == STORAGE_ISOLATION {
                    app.is_storage_isolated = true;
                } else {
                    debug!(value, "ignoring unknown isolation type");
                }
            }
        }
    }
    Ok(draft)
}
