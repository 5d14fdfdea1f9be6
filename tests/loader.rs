//! End-to-end loader behavior through the public API.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use extmanifest::extensions::csp::DEFAULT_SANDBOXED_PAGE_CONTENT_SECURITY_POLICY;
use extmanifest::extensions::{ApiPermissionSet, SchemeMask};
use extmanifest::{
    ApiPermission, CreationFlags, Extension, ExtensionId, ExtensionLoader, Location,
    ManifestError, PermissionError, PermissionSet, UrlPattern, UrlPatternSet,
};
use serde_json::{json, Value};
use url::Url;

const EXT_PATH: &str = "/opt/extensions/reader";

fn load(manifest: Value) -> Result<Arc<Extension>, ManifestError> {
    ExtensionLoader::default().load(
        Path::new(EXT_PATH),
        Location::Internal,
        manifest,
        CreationFlags::empty(),
    )
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn hosts(patterns: &[&str]) -> UrlPatternSet {
    UrlPatternSet::parse(SchemeMask::ALL, patterns).unwrap()
}

#[test]
fn test_minimal_manifest_with_tabs() {
    let ext = load(json!({"name": "T", "version": "1.0", "permissions": ["tabs"]})).unwrap();

    assert_eq!(ext.id(), &ExtensionId::for_path(Path::new(EXT_PATH)).unwrap());
    assert!(ext.required_permissions().has_api_permission(ApiPermission::Tabs));
    assert_eq!(ext.active_permissions(), ext.required_permissions());
    assert!(ext.install_warnings().is_empty());
}

#[test]
fn test_id_from_key_is_stable() {
    let manifest = json!({
        "name": "T",
        "version": "1",
        "key": "-----BEGIN PUBLIC KEY-----\nAAECAwQFBgcICQ==\n-----END PUBLIC KEY-----"
    });
    let first = load(manifest.clone()).unwrap();
    let second = ExtensionLoader::default()
        .load(
            Path::new("/somewhere/else"),
            Location::Unpacked,
            manifest,
            CreationFlags::empty(),
        )
        .unwrap();

    assert_eq!(first.id(), second.id());
    assert_ne!(first.id(), &ExtensionId::for_path(Path::new(EXT_PATH)).unwrap());
    assert!(ExtensionId::is_valid(first.id().as_str()));
    assert_eq!(first.url().as_str(), format!("chrome-extension://{}/", first.id()));
}

#[test]
fn test_forbidden_permission_names_it() {
    let err = load(json!({"name": "T", "version": "1", "permissions": ["webConnectable"]}))
        .unwrap_err();
    assert_eq!(
        err,
        ManifestError::PermissionNotAllowedInManifest("webConnectable".into())
    );
    assert!(err.to_string().contains("webConnectable"));
}

#[test]
fn test_unknown_permission_is_a_warning() {
    let ext = load(json!({"name": "T", "version": "1", "permissions": ["tabs", "teleport"]}))
        .unwrap();
    assert_eq!(ext.install_warnings().len(), 1);
    assert!(ext.install_warnings()[0].message.contains("teleport"));
    assert_eq!(ext.required_permissions().apis().len(), 1);
}

#[test]
fn test_public_suffix_host_patterns() {
    let exact = UrlPattern::parse(SchemeMask::ALL, "http://appspot.com/*").unwrap();
    assert!(exact.matches_url(&url("http://appspot.com/path")));
    assert!(!exact.matches_url(&url("http://codereview.appspot.com/path")));

    let ext = load(json!({
        "name": "T",
        "version": "1",
        "permissions": ["http://appspot.com/*", "http://*.appspot.com/*"]
    }))
    .unwrap();
    let explicit = ext.required_permissions().explicit_hosts().to_strings();
    assert_eq!(explicit, vec!["http://appspot.com/*"]);
    assert_eq!(ext.install_warnings().len(), 1);
    assert!(!ext.has_host_permission(&url("http://codereview.appspot.com/")));
    assert!(ext.has_host_permission(&url("http://appspot.com/")));
}

#[test]
fn test_google_wildcard_matches() {
    let pattern = UrlPattern::parse(SchemeMask::ALL, "http://*.google.com/*").unwrap();
    assert!(pattern.matches_url(&url("http://www.google.com/")));
    assert!(pattern.matches_url(&url("http://google.com/index.html")));
    assert!(!pattern.matches_url(&url("https://google.com/")));

    let any_scheme = UrlPattern::parse(SchemeMask::ALL, "*://*.google.com/*").unwrap();
    assert!(any_scheme.matches_url(&url("https://google.com/")));
}

#[test]
fn test_content_script_requirements() {
    assert_eq!(
        load(json!({
            "name": "T", "version": "1",
            "content_scripts": [{"matches": [], "js": ["a.js"]}]
        }))
        .unwrap_err(),
        ManifestError::InvalidMatchCount { index: 0 }
    );
    assert_eq!(
        load(json!({
            "name": "T", "version": "1",
            "content_scripts": [{"matches": ["https://a.com/*"]}]
        }))
        .unwrap_err(),
        ManifestError::MissingFile { index: 0 }
    );
}

#[test]
fn test_platform_app_rules() {
    assert_eq!(
        load(json!({"name": "T", "version": "1", "manifest_version": 2, "app": {"background": {}}}))
            .unwrap_err(),
        ManifestError::BackgroundRequiredForPlatformApps
    );
    assert_eq!(
        load(json!({
            "name": "T", "version": "1", "manifest_version": 2,
            "incognito": "spanning",
            "app": {"background": {"scripts": ["main.js"]}}
        }))
        .unwrap_err(),
        ManifestError::InvalidIncognitoModeForPlatformApp
    );

    let app = load(json!({
        "name": "T", "version": "1", "manifest_version": 2,
        "app": {"background": {"scripts": ["main.js"]}}
    }))
    .unwrap();
    assert!(app.is_platform_app());
    assert!(app.has_lazy_background_page());
    assert!(app.has_api_permission(ApiPermission::AppWindow));
}

#[test]
fn test_load_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ExtensionLoader::default();

    let err = loader
        .load_from_dir(dir.path(), Location::Unpacked, CreationFlags::empty())
        .unwrap_err();
    assert!(matches!(err, ManifestError::ManifestUnreadable(_)));

    fs::write(dir.path().join("manifest.json"), "{\"name\": ").unwrap();
    let err = loader
        .load_from_dir(dir.path(), Location::Unpacked, CreationFlags::empty())
        .unwrap_err();
    assert!(matches!(err, ManifestError::InvalidManifest(_)));

    fs::write(
        dir.path().join("manifest.json"),
        r#"{"name": "Disk", "version": "2.0.1", "manifest_version": 2,
            "sandbox": {"pages": ["sandbox.html"]}}"#,
    )
    .unwrap();
    let ext = loader
        .load_from_dir(dir.path(), Location::Unpacked, CreationFlags::empty())
        .unwrap();
    assert_eq!(ext.name(), "Disk");
    assert_eq!(ext.path(), dir.path());
    assert_eq!(
        ext.get_resource_content_security_policy("sandbox.html"),
        DEFAULT_SANDBOXED_PAGE_CONTENT_SECURITY_POLICY
    );
    assert_eq!(
        ext.get_resource_content_security_policy("popup.html"),
        ext.content_security_policy()
    );
}

#[test]
fn test_active_permissions_stay_within_bounds() {
    let ext = load(json!({
        "name": "T", "version": "1",
        "permissions": ["tabs"],
        "optional_permissions": ["history", "https://*.example.com/*"]
    }))
    .unwrap();

    let mut apis = ApiPermissionSet::new();
    apis.insert(ApiPermission::Tabs);
    apis.insert(ApiPermission::History);
    let grown = PermissionSet::new(apis, hosts(&["https://*.example.com/*"]), UrlPatternSet::new());
    ext.set_active_permissions(Arc::new(grown)).unwrap();
    assert!(ext.has_api_permission(ApiPermission::History));
    assert!(ext.has_host_permission(&url("https://www.example.com/")));

    let mut apis = ApiPermissionSet::new();
    apis.insert(ApiPermission::Cookies);
    let err = ext
        .set_active_permissions(Arc::new(PermissionSet::new(
            apis,
            UrlPatternSet::new(),
            UrlPatternSet::new(),
        )))
        .unwrap_err();
    assert!(matches!(err, PermissionError::OutOfBounds(ref names) if names.contains("cookies")));
    assert!(ext.has_api_permission(ApiPermission::History));
}

#[test]
fn test_tab_grants_from_many_threads() {
    let ext = load(json!({"name": "T", "version": "1"})).unwrap();
    let page = url("https://news.example.org/story");
    assert!(ext.can_execute_script_on_page(&page, &page, Some(1), None).is_err());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ext = Arc::clone(&ext);
            thread::spawn(move || {
                let grant = PermissionSet::new(
                    ApiPermissionSet::new(),
                    UrlPatternSet::parse(SchemeMask::ALL, &[format!("https://host{}.org/*", i)])
                        .unwrap(),
                    UrlPatternSet::new(),
                );
                ext.update_tab_specific_permissions(1, &grant);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Grants to one tab accumulate.
    let tab = ext.tab_specific_permissions(1).unwrap();
    assert_eq!(tab.explicit_hosts().len(), 4);
    let granted = url("https://host2.org/");
    assert!(ext.can_execute_script_on_page(&granted, &granted, Some(1), None).is_ok());
    assert!(ext.can_execute_script_on_page(&granted, &granted, Some(2), None).is_err());

    ext.clear_tab_specific_permissions(1);
    assert!(ext.tab_specific_permissions(1).is_none());
    assert!(ext.can_execute_script_on_page(&granted, &granted, Some(1), None).is_err());
}

#[test]
fn test_gallery_cannot_be_scripted() {
    let ext = load(json!({"name": "T", "version": "1", "permissions": ["<all_urls>"]})).unwrap();
    let gallery = url("https://chrome.google.com/webstore/detail/x");
    assert_eq!(
        ext.can_execute_script_on_page(&gallery, &gallery, None, None),
        Err(PermissionError::CannotScriptGallery)
    );
    let other = url("https://example.com/");
    assert!(ext.can_execute_script_on_page(&other, &other, None, None).is_ok());
    assert!(ext.has_effective_access_to_all_hosts());
}
