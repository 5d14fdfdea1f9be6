//! The partial result threaded through the load stages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use url::Url;

use super::CreationFlags;
use crate::extensions::content_script::ContentScript;
use crate::extensions::error::InstallWarning;
use crate::extensions::extension::{
    ActionInfo, AppInfo, BackgroundInfo, ExternallyConnectable, NaClModuleInfo, PluginInfo,
    Requirements,
};
use crate::extensions::id::ExtensionId;
use crate::extensions::manifest::ManifestDocument;
use crate::extensions::pattern_set::UrlPatternSet;
use crate::extensions::permissions::{ApiPermissionSet, Channel, FeatureContext};
use crate::extensions::version::Version;

/// Everything a stage may read or fill in. Stages own the draft while they
/// run and hand it to the next one.
#[derive(Debug)]
pub(crate) struct ExtensionDraft {
    pub manifest: ManifestDocument,
    pub id: ExtensionId,
    pub path: PathBuf,
    pub flags: CreationFlags,
    pub url: Url,
    pub channel: Channel,
    pub can_execute_script_everywhere: bool,
    pub gallery_host: Option<String>,

    pub manifest_version: i64,
    pub name: String,
    pub non_localized_name: String,
    pub version: Option<Version>,
    pub description: String,
    pub public_key: Option<String>,
    pub icons: BTreeMap<u32, String>,
    pub app: Option<AppInfo>,
    pub plugins: Vec<PluginInfo>,
    pub nacl_modules: Vec<NaClModuleInfo>,
    pub sandboxed_pages: UrlPatternSet,
    pub sandboxed_pages_csp: String,
    pub requirements: Requirements,
    pub offline_enabled: bool,
    pub background: BackgroundInfo,
    pub converted_from_user_script: bool,
    pub content_scripts: Vec<ContentScript>,
    pub page_action: Option<ActionInfo>,
    pub browser_action: Option<ActionInfo>,
    pub system_indicator: Option<ActionInfo>,
    pub incognito_split_mode: bool,
    pub content_security_policy: String,
    pub content_pack_site_list: Option<String>,
    pub externally_connectable: Option<ExternallyConnectable>,
    pub wants_file_access: bool,

    pub api_permissions: ApiPermissionSet,
    pub host_permissions: UrlPatternSet,
    pub optional_api_permissions: ApiPermissionSet,
    pub optional_host_permissions: UrlPatternSet,

    pub install_warnings: Vec<InstallWarning>,
}

impl ExtensionDraft {
    pub fn new(
        manifest: ManifestDocument,
        id: ExtensionId,
        path: PathBuf,
        flags: CreationFlags,
        url: Url,
        channel: Channel,
    ) -> Self {
        Self {
            manifest,
            id,
            path,
            flags,
            url,
            channel,
            can_execute_script_everywhere: false,
            gallery_host: None,
            manifest_version: 1,
            name: String::new(),
            non_localized_name: String::new(),
            version: None,
            description: String::new(),
            public_key: None,
            icons: BTreeMap::new(),
            app: None,
            plugins: Vec::new(),
            nacl_modules: Vec::new(),
            sandboxed_pages: UrlPatternSet::new(),
            sandboxed_pages_csp: String::new(),
            requirements: Requirements::default(),
            offline_enabled: false,
            background: BackgroundInfo::default(),
            converted_from_user_script: false,
            content_scripts: Vec::new(),
            page_action: None,
            browser_action: None,
            system_indicator: None,
            incognito_split_mode: false,
            content_security_policy: String::new(),
            content_pack_site_list: None,
            externally_connectable: None,
            wants_file_access: false,
            api_permissions: ApiPermissionSet::new(),
            host_permissions: UrlPatternSet::new(),
            optional_api_permissions: ApiPermissionSet::new(),
            optional_host_permissions: UrlPatternSet::new(),
            install_warnings: Vec::new(),
        }
    }

    pub fn feature_context(&self) -> FeatureContext<'_> {
        FeatureContext {
            extension_id: &self.id,
            extension_type: self.manifest.extension_type(),
            location: self.manifest.location(),
            manifest_version: self.manifest.manifest_version(),
            channel: self.channel,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.install_warnings.push(InstallWarning::text(message));
    }

    pub fn has_background_page(&self) -> bool {
        self.background.page.is_some() || !self.background.scripts.is_empty()
    }
}
