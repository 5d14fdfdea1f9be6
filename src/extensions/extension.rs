//! A loaded extension.
//!
//! Everything parsed from the manifest is immutable. The only mutable state
//! is the active permission set and the per-tab grants, both kept behind one
//! lock:
//!
//! ```text
//! Extension
//! ├── manifest data (id, name, version, content scripts, ...)
//! ├── required_permissions: Arc<PermissionSet>
//! ├── optional_permissions: Arc<PermissionSet>
//! └── runtime: Mutex<RuntimeData>
//!     ├── active_permissions: Arc<PermissionSet>
//!     └── tab_permissions: HashMap<tab id, Arc<PermissionSet>>
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::content_script::ContentScript;
use super::error::{InstallWarning, ManifestError, ManifestResult, PermissionError, PermissionResult};
use super::id::ExtensionId;
use super::loader::{CreationFlags, ExtensionDraft};
use super::manifest::{ExtensionType, Location};
use super::pattern_set::UrlPatternSet;
use super::permissions::{ApiPermission, PermissionCheck, PermissionMessage, PermissionSet};
use super::resource::{resource_url, ExtensionResource};
use super::url_pattern::{SchemeMask, UrlPattern, CHROME_UI_SCHEME, EXTENSION_SCHEME};
use super::version::Version;

/// Page generated to host `background.scripts`.
pub const GENERATED_BACKGROUND_PAGE: &str = "_generated_background_page.html";

const CHROME_UI_FAVICON_HOST: &str = "favicon";
const CHROME_UI_THUMBNAIL_HOST: &str = "thumb";

/// Where an app opens when launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchContainer {
    #[default]
    Tab,
    Panel,
}

/// App-only settings.
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    /// URLs that belong to a hosted app.
    #[serde(serialize_with = "serialize_patterns")]
    pub extent: UrlPatternSet,
    pub launch_local_path: Option<String>,
    pub launch_web_url: Option<String>,
    pub launch_container: LaunchContainer,
    pub launch_width: i64,
    pub launch_height: i64,
    pub display_in_launcher: bool,
    pub display_in_new_tab_page: bool,
    pub is_storage_isolated: bool,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            extent: UrlPatternSet::new(),
            launch_local_path: None,
            launch_web_url: None,
            launch_container: LaunchContainer::Tab,
            launch_width: 0,
            launch_height: 0,
            display_in_launcher: true,
            display_in_new_tab_page: true,
            is_storage_isolated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub path: PathBuf,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NaClModuleInfo {
    pub url: Url,
    pub mime_type: String,
}

/// Hardware and plugin features the extension needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Requirements {
    pub webgl: bool,
    pub css3d: bool,
    pub npapi: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundInfo {
    /// Explicit background page. Absolute for hosted apps, a resource URL
    /// otherwise.
    pub page: Option<Url>,
    pub scripts: Vec<String>,
    pub persistent: bool,
    pub allow_js_access: bool,
}

impl Default for BackgroundInfo {
    fn default() -> Self {
        Self {
            page: None,
            scripts: Vec::new(),
            persistent: true,
            allow_js_access: true,
        }
    }
}

/// Page action, browser action or system indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionInfo {
    pub default_title: String,
    /// Icon paths keyed by size.
    pub default_icon: BTreeMap<u32, String>,
    pub default_popup: Option<Url>,
}

/// Which web pages and extensions may message this extension.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExternallyConnectable {
    #[serde(serialize_with = "serialize_patterns")]
    pub matches: UrlPatternSet,
    /// Sorted, so lookups can binary search.
    pub ids: Vec<String>,
    pub all_ids: bool,
}

impl ExternallyConnectable {
    pub fn id_can_connect(&self, id: &str) -> bool {
        self.all_ids || self.ids.binary_search_by(|probe| probe.as_str().cmp(id)).is_ok()
    }
}

fn serialize_patterns<S: serde::Serializer>(
    patterns: &UrlPatternSet,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(patterns.to_strings())
}

#[derive(Debug)]
struct RuntimeData {
    active_permissions: Arc<PermissionSet>,
    tab_permissions: HashMap<i32, Arc<PermissionSet>>,
}

/// A validated extension. Shared as `Arc<Extension>`.
pub struct Extension {
    id: ExtensionId,
    path: PathBuf,
    location: Location,
    extension_type: ExtensionType,
    creation_flags: CreationFlags,
    manifest_version: i64,
    name: String,
    non_localized_name: String,
    version: Version,
    description: String,
    public_key: Option<String>,
    url: Url,
    icons: BTreeMap<u32, String>,
    app: Option<AppInfo>,
    plugins: Vec<PluginInfo>,
    nacl_modules: Vec<NaClModuleInfo>,
    sandboxed_pages: UrlPatternSet,
    sandboxed_pages_csp: String,
    requirements: Requirements,
    offline_enabled: bool,
    background: BackgroundInfo,
    converted_from_user_script: bool,
    content_scripts: Vec<ContentScript>,
    page_action: Option<ActionInfo>,
    browser_action: Option<ActionInfo>,
    system_indicator: Option<ActionInfo>,
    incognito_split_mode: bool,
    content_security_policy: String,
    content_pack_site_list: Option<String>,
    externally_connectable: Option<ExternallyConnectable>,
    wants_file_access: bool,
    can_execute_script_everywhere: bool,
    gallery_host: Option<String>,
    required_permissions: Arc<PermissionSet>,
    optional_permissions: Arc<PermissionSet>,
    install_warnings: Vec<InstallWarning>,
    runtime: Mutex<RuntimeData>,
}

impl Extension {
    /// Freeze a fully parsed draft. The active set starts as the required
    /// set.
    pub(crate) fn from_draft(draft: ExtensionDraft) -> ManifestResult<Self> {
        let version = draft.version.ok_or(ManifestError::InvalidVersion)?;

        let mut scriptable_hosts = UrlPatternSet::new();
        for script in &draft.content_scripts {
            scriptable_hosts.extend(script.matches.iter().cloned());
        }

        let mut apis = draft.api_permissions;
        if !draft.plugins.is_empty() {
            apis.insert(ApiPermission::Plugin);
        }

        let required = Arc::new(PermissionSet::new(
            apis,
            draft.host_permissions,
            scriptable_hosts,
        ));
        let optional = Arc::new(PermissionSet::new(
            draft.optional_api_permissions,
            draft.optional_host_permissions,
            UrlPatternSet::new(),
        ));

        Ok(Self {
            id: draft.id,
            path: draft.path,
            location: draft.manifest.location(),
            extension_type: draft.manifest.extension_type(),
            creation_flags: draft.flags,
            manifest_version: draft.manifest_version,
            name: draft.name,
            non_localized_name: draft.non_localized_name,
            version,
            description: draft.description,
            public_key: draft.public_key,
            url: draft.url,
            icons: draft.icons,
            app: draft.app,
            plugins: draft.plugins,
            nacl_modules: draft.nacl_modules,
            sandboxed_pages: draft.sandboxed_pages,
            sandboxed_pages_csp: draft.sandboxed_pages_csp,
            requirements: draft.requirements,
            offline_enabled: draft.offline_enabled,
            background: draft.background,
            converted_from_user_script: draft.converted_from_user_script,
            content_scripts: draft.content_scripts,
            page_action: draft.page_action,
            browser_action: draft.browser_action,
            system_indicator: draft.system_indicator,
            incognito_split_mode: draft.incognito_split_mode,
            content_security_policy: draft.content_security_policy,
            content_pack_site_list: draft.content_pack_site_list,
            externally_connectable: draft.externally_connectable,
            wants_file_access: draft.wants_file_access,
            can_execute_script_everywhere: draft.can_execute_script_everywhere,
            gallery_host: draft.gallery_host,
            required_permissions: Arc::clone(&required),
            optional_permissions: optional,
            install_warnings: draft.install_warnings,
            runtime: Mutex::new(RuntimeData {
                active_permissions: required,
                tab_permissions: HashMap::new(),
            }),
        })
    }

    pub fn id(&self) -> &ExtensionId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn extension_type(&self) -> ExtensionType {
        self.extension_type
    }

    pub fn creation_flags(&self) -> CreationFlags {
        self.creation_flags
    }

    pub fn manifest_version(&self) -> i64 {
        self.manifest_version
    }

    /// Display name, localized and adjusted for the UI text direction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name exactly as written in the manifest.
    pub fn non_localized_name(&self) -> &str {
        &self.non_localized_name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// Origin URL, `chrome-extension://<id>/`.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn icons(&self) -> &BTreeMap<u32, String> {
        &self.icons
    }

    pub fn app(&self) -> Option<&AppInfo> {
        self.app.as_ref()
    }

    pub fn web_extent(&self) -> Option<&UrlPatternSet> {
        self.app.as_ref().map(|app| &app.extent)
    }

    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }

    pub fn nacl_modules(&self) -> &[NaClModuleInfo] {
        &self.nacl_modules
    }

    pub fn sandboxed_pages(&self) -> &UrlPatternSet {
        &self.sandboxed_pages
    }

    pub fn sandboxed_pages_content_security_policy(&self) -> &str {
        &self.sandboxed_pages_csp
    }

    pub fn requirements(&self) -> Requirements {
        self.requirements
    }

    pub fn offline_enabled(&self) -> bool {
        self.offline_enabled
    }

    pub fn background(&self) -> &BackgroundInfo {
        &self.background
    }

    pub fn converted_from_user_script(&self) -> bool {
        self.converted_from_user_script
    }

    pub fn content_scripts(&self) -> &[ContentScript] {
        &self.content_scripts
    }

    pub fn page_action(&self) -> Option<&ActionInfo> {
        self.page_action.as_ref()
    }

    pub fn browser_action(&self) -> Option<&ActionInfo> {
        self.browser_action.as_ref()
    }

    pub fn system_indicator(&self) -> Option<&ActionInfo> {
        self.system_indicator.as_ref()
    }

    pub fn incognito_split_mode(&self) -> bool {
        self.incognito_split_mode
    }

    pub fn content_security_policy(&self) -> &str {
        &self.content_security_policy
    }

    pub fn content_pack_site_list(&self) -> Option<&str> {
        self.content_pack_site_list.as_deref()
    }

    pub fn externally_connectable(&self) -> Option<&ExternallyConnectable> {
        self.externally_connectable.as_ref()
    }

    /// Whether some host or match pattern asked for `file://` access.
    pub fn wants_file_access(&self) -> bool {
        self.wants_file_access
    }

    /// Component extensions and whitelisted ids may script every scheme.
    pub fn can_execute_script_everywhere(&self) -> bool {
        self.can_execute_script_everywhere
    }

    pub fn install_warnings(&self) -> &[InstallWarning] {
        &self.install_warnings
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

    // Background pages.

    pub fn has_background_page(&self) -> bool {
        self.background.page.is_some() || !self.background.scripts.is_empty()
    }

    pub fn has_persistent_background_page(&self) -> bool {
        self.has_background_page() && self.background.persistent
    }

    pub fn has_lazy_background_page(&self) -> bool {
        self.has_background_page() && !self.background.persistent
    }

    /// URL of the background page; scripts get a generated page.
    pub fn background_url(&self) -> Option<Url> {
        if !self.background.scripts.is_empty() {
            return self.get_resource_url(GENERATED_BACKGROUND_PAGE);
        }
        self.background.page.clone()
    }

    // Resources.

    pub fn get_resource(&self, relative_path: &str) -> ExtensionResource {
        let mut resource = ExtensionResource::new(
            self.id.clone(),
            &self.path,
            relative_path.trim_start_matches('/'),
        );
        if self.creation_flags.contains(CreationFlags::FOLLOW_SYMLINKS_ANYWHERE) {
            resource.set_follow_symlinks_anywhere();
        }
        resource
    }

    pub fn get_resource_url(&self, relative_path: &str) -> Option<Url> {
        resource_url(&self.url, relative_path).ok()
    }

    pub fn is_sandboxed_page(&self, relative_path: &str) -> bool {
        self.get_resource_url(relative_path)
            .is_some_and(|url| self.sandboxed_pages.matches_url(&url))
    }

    /// Policy for a page inside the extension. Sandboxed pages get the
    /// sandbox policy.
    pub fn get_resource_content_security_policy(&self, relative_path: &str) -> &str {
        if self.is_sandboxed_page(relative_path) {
            &self.sandboxed_pages_csp
        } else {
            &self.content_security_policy
        }
    }

    /// Launch URL of an app, resolved against the extension origin for
    /// local paths.
    pub fn full_launch_url(&self) -> Option<Url> {
        let app = self.app.as_ref()?;
        if let Some(local_path) = &app.launch_local_path {
            return self.url.join(local_path).ok();
        }
        app.launch_web_url
            .as_deref()
            .and_then(|url| Url::parse(url).ok())
    }

    /// Whether the web extent, or the extension origin itself, covers
    /// `origin`. Ports are ignored.
    pub fn overlaps_with_origin(&self, origin: &Url) -> bool {
        if origin.scheme() == EXTENSION_SCHEME
            && origin.host_str() == self.url.host_str()
        {
            return true;
        }
        let Some(extent) = self.web_extent().filter(|e| !e.is_empty()) else {
            return false;
        };

        let mut pattern = UrlPattern::new(SchemeMask::WEB);
        if !pattern.set_scheme(origin.scheme()) {
            return false;
        }
        pattern.set_host(origin.host_str().unwrap_or_default());
        pattern.set_path("/*");
        let origin_only: UrlPatternSet = std::iter::once(pattern).collect();
        extent.overlaps_with(&origin_only)
    }

    pub fn has_content_script_at_url(&self, url: &Url) -> bool {
        self.content_scripts.iter().any(|script| script.matches_url(url))
    }

    // Display.

    pub fn should_display_in_app_launcher(&self) -> bool {
        self.app.as_ref().is_some_and(|app| app.display_in_launcher)
    }

    pub fn should_display_in_new_tab_page(&self) -> bool {
        self.app.as_ref().is_some_and(|app| app.display_in_new_tab_page)
    }

    pub fn should_display_in_extension_settings(&self) -> bool {
        if self.is_theme() || self.location == Location::Component {
            return false;
        }
        if self.location.is_unpacked() {
            return true;
        }
        !self.is_hosted_app()
    }

    // Permissions.

    pub fn required_permissions(&self) -> Arc<PermissionSet> {
        Arc::clone(&self.required_permissions)
    }

    pub fn optional_permissions(&self) -> Arc<PermissionSet> {
        Arc::clone(&self.optional_permissions)
    }

    pub fn active_permissions(&self) -> Arc<PermissionSet> {
        Arc::clone(&self.runtime.lock().active_permissions)
    }

    /// Replace the active set. It must stay within required ∪ optional.
    pub fn set_active_permissions(&self, permissions: Arc<PermissionSet>) -> PermissionResult<()> {
        let bounds = self.required_permissions.union(&self.optional_permissions);
        if !bounds.contains(&permissions) {
            let excess = permissions.difference(&bounds);
            let mut names: Vec<String> = excess.apis().iter().map(|p| p.name().to_string()).collect();
            names.extend(excess.effective_hosts().to_strings());
            return Err(PermissionError::OutOfBounds(names.join(", ")));
        }
        debug!(id = %self.id, "active permissions replaced");
        self.runtime.lock().active_permissions = permissions;
        Ok(())
    }

    pub fn tab_specific_permissions(&self, tab_id: i32) -> Option<Arc<PermissionSet>> {
        self.runtime.lock().tab_permissions.get(&tab_id).cloned()
    }

    /// Grant `permissions` to one tab, on top of any earlier grant.
    pub fn update_tab_specific_permissions(&self, tab_id: i32, permissions: &PermissionSet) {
        let mut runtime = self.runtime.lock();
        let merged = match runtime.tab_permissions.get(&tab_id) {
            Some(existing) => existing.union(permissions),
            None => permissions.clone(),
        };
        runtime.tab_permissions.insert(tab_id, Arc::new(merged));
    }

    pub fn clear_tab_specific_permissions(&self, tab_id: i32) {
        self.runtime.lock().tab_permissions.remove(&tab_id);
    }

    pub fn has_api_permission(&self, permission: ApiPermission) -> bool {
        self.runtime.lock().active_permissions.has_api_permission(permission)
    }

    /// Active permissions plus whatever was granted to `tab_id`.
    pub fn has_api_permission_for_tab(&self, tab_id: i32, permission: ApiPermission) -> bool {
        let runtime = self.runtime.lock();
        runtime.active_permissions.has_api_permission(permission)
            || runtime
                .tab_permissions
                .get(&tab_id)
                .is_some_and(|tab| tab.has_api_permission(permission))
    }

    pub fn check_api_permission_with_param(
        &self,
        permission: ApiPermission,
        check: &PermissionCheck<'_>,
    ) -> bool {
        self.runtime
            .lock()
            .active_permissions
            .check_api_permission_with_param(permission, check)
    }

    /// Browser UI pages other than favicons and thumbnails are reserved for
    /// component extensions.
    pub fn has_host_permission(&self, url: &Url) -> bool {
        if url.scheme() == CHROME_UI_SCHEME
            && !matches!(
                url.host_str(),
                Some(CHROME_UI_FAVICON_HOST) | Some(CHROME_UI_THUMBNAIL_HOST)
            )
            && self.location != Location::Component
        {
            return false;
        }
        self.runtime
            .lock()
            .active_permissions
            .has_explicit_access_to_origin(url)
    }

    pub fn has_effective_access_to_all_hosts(&self) -> bool {
        self.runtime
            .lock()
            .active_permissions
            .has_effective_access_to_all_hosts()
    }

    pub fn has_full_permissions(&self) -> bool {
        self.runtime
            .lock()
            .active_permissions
            .has_effective_full_access()
    }

    /// Whether script may run in `document_url` inside a tab whose top
    /// frame is `top_frame_url`. With `script`, its match patterns decide;
    /// without one, the explicit host permissions do.
    pub fn can_execute_script_on_page(
        &self,
        document_url: &Url,
        top_frame_url: &Url,
        tab_id: Option<i32>,
        script: Option<&ContentScript>,
    ) -> PermissionResult<()> {
        if let Some(gallery) = &self.gallery_host {
            if document_url.host_str() == Some(gallery.as_str())
                && !self.can_execute_script_everywhere
            {
                return Err(PermissionError::CannotScriptGallery);
            }
        }

        if document_url.scheme() == CHROME_UI_SCHEME && !self.can_execute_script_everywhere {
            return Err(PermissionError::CannotAccessChromeUrl);
        }

        if top_frame_url.scheme() == EXTENSION_SCHEME
            && top_frame_url.host_str() != self.url.host_str()
            && !self.can_execute_script_everywhere
        {
            return Err(PermissionError::CannotAccessExtensionUrl);
        }

        let runtime = self.runtime.lock();
        if let Some(tab) = tab_id.and_then(|id| runtime.tab_permissions.get(&id)) {
            if tab.explicit_hosts().matches_security_origin(document_url) {
                return Ok(());
            }
        }

        let allowed = match script {
            Some(script) => script.matches_url(document_url),
            None => runtime
                .active_permissions
                .has_explicit_access_to_origin(document_url),
        };
        if allowed {
            Ok(())
        } else {
            Err(PermissionError::CannotAccessPage {
                url: document_url.to_string(),
            })
        }
    }

    /// Whether the visible area of a tab showing `page_url` may be captured.
    pub fn can_capture_visible_page(
        &self,
        page_url: &Url,
        tab_id: Option<i32>,
    ) -> PermissionResult<()> {
        if let Some(id) = tab_id {
            if self
                .tab_specific_permissions(id)
                .is_some_and(|tab| tab.explicit_hosts().matches_security_origin(page_url))
            {
                return Ok(());
            }
        }
        let same_origin =
            page_url.scheme() == self.url.scheme() && page_url.host_str() == self.url.host_str();
        if self.has_host_permission(page_url) || same_origin {
            return Ok(());
        }
        Err(PermissionError::CannotAccessPage {
            url: page_url.to_string(),
        })
    }

    /// Install warnings for the active permissions.
    pub fn permission_messages(&self) -> Vec<PermissionMessage> {
        self.runtime
            .lock()
            .active_permissions
            .permission_messages(self.extension_type)
    }

    pub fn permission_message_strings(&self) -> Vec<String> {
        self.permission_messages()
            .into_iter()
            .map(|m| m.message().to_string())
            .collect()
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("type", &self.extension_type)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::loader::ExtensionLoader;
    use crate::extensions::permissions::ApiPermissionSet;
    use serde_json::{json, Value};

    fn load_at(location: Location, manifest: Value) -> Arc<Extension> {
        ExtensionLoader::default()
            .load(
                Path::new("/opt/extensions/runtime"),
                location,
                manifest,
                CreationFlags::empty(),
            )
            .unwrap()
    }

    fn load(manifest: Value) -> Arc<Extension> {
        load_at(Location::Internal, manifest)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn host_grant(pattern: &str) -> PermissionSet {
        PermissionSet::new(
            ApiPermissionSet::new(),
            UrlPatternSet::parse(SchemeMask::ALL, &[pattern]).unwrap(),
            UrlPatternSet::new(),
        )
    }

    #[test]
    fn test_capture_uses_tab_host_grant() {
        let ext = load(json!({"name": "T", "version": "1"}));
        let bank = url("https://bank.example.com/account");
        assert!(ext.can_capture_visible_page(&bank, Some(1)).is_err());

        ext.update_tab_specific_permissions(1, &host_grant("https://bank.example.com/*"));
        assert!(ext.can_capture_visible_page(&bank, Some(1)).is_ok());
        assert!(ext.can_capture_visible_page(&bank, Some(3)).is_err());
        assert!(ext.can_capture_visible_page(&bank, None).is_err());
    }

    #[test]
    fn test_capture_ignores_tab_api_grant() {
        let ext = load(json!({"name": "T", "version": "1"}));
        let mut apis = ApiPermissionSet::new();
        apis.insert(ApiPermission::Tabs);
        ext.update_tab_specific_permissions(
            2,
            &PermissionSet::new(apis, UrlPatternSet::new(), UrlPatternSet::new()),
        );

        let page = url("https://unrelated.example.net/");
        assert_eq!(
            ext.can_capture_visible_page(&page, Some(2)),
            Err(PermissionError::CannotAccessPage {
                url: page.to_string()
            })
        );
    }

    #[test]
    fn test_capture_with_host_permission_or_own_page() {
        let ext = load(json!({
            "name": "T", "version": "1",
            "permissions": ["https://*.example.com/*"]
        }));
        assert!(ext
            .can_capture_visible_page(&url("https://www.example.com/"), None)
            .is_ok());
        let own_page = ext.url().join("options.html").unwrap();
        assert!(ext.can_capture_visible_page(&own_page, None).is_ok());
    }

    #[test]
    fn test_overlaps_with_origin() {
        let ext = load(json!({"name": "T", "version": "1"}));
        assert!(ext.overlaps_with_origin(ext.url()));
        assert!(!ext.overlaps_with_origin(&url("https://www.example.com/")));

        let app = load(json!({
            "name": "App", "version": "1",
            "app": {
                "urls": ["https://www.example.com/app/"],
                "launch": {"web_url": "https://www.example.com/app/start"}
            }
        }));
        assert!(app.overlaps_with_origin(&url("https://www.example.com/")));
        assert!(!app.overlaps_with_origin(&url("https://other.example.com/")));
        assert!(!app.overlaps_with_origin(&url("ftp://www.example.com/")));
        assert!(!app.overlaps_with_origin(ext.url()));
    }

    #[test]
    fn test_host_permission_on_browser_pages() {
        let ext = load(json!({
            "name": "T", "version": "1",
            "permissions": ["chrome://favicon/*", "<all_urls>"]
        }));
        assert!(ext.has_host_permission(&url("chrome://favicon/size/16")));
        assert!(!ext.has_host_permission(&url("chrome://settings/")));
        assert!(ext.has_host_permission(&url("https://example.com/")));

        let component = load_at(
            Location::Component,
            json!({"name": "C", "version": "1", "permissions": ["chrome://settings/*"]}),
        );
        assert!(component.has_host_permission(&url("chrome://settings/")));
    }

    #[test]
    fn test_script_on_browser_pages() {
        let ext = load(json!({"name": "T", "version": "1", "permissions": ["<all_urls>"]}));
        let settings = url("chrome://settings/");
        assert_eq!(
            ext.can_execute_script_on_page(&settings, &settings, None, None),
            Err(PermissionError::CannotAccessChromeUrl)
        );

        let component = load_at(
            Location::Component,
            json!({"name": "C", "version": "1", "permissions": ["chrome://settings/*"]}),
        );
        assert!(component
            .can_execute_script_on_page(&settings, &settings, None, None)
            .is_ok());
    }

    #[test]
    fn test_script_in_foreign_extension_frame() {
        let ext = load(json!({"name": "T", "version": "1", "permissions": ["<all_urls>"]}));
        let page = url("https://example.com/embedded");

        let foreign = url("chrome-extension://abcdefghijklmnopabcdefghijklmnop/page.html");
        assert_eq!(
            ext.can_execute_script_on_page(&page, &foreign, None, None),
            Err(PermissionError::CannotAccessExtensionUrl)
        );

        let own = ext.url().join("page.html").unwrap();
        assert!(ext.can_execute_script_on_page(&page, &own, None, None).is_ok());
    }
}
