//! Files packaged with an extension and the URLs that address them.

use std::fs;
use std::path::{Component, Path, PathBuf};

use url::Url;

use super::id::ExtensionId;
use super::url_pattern::EXTENSION_SCHEME;

/// Origin URL of an extension: `chrome-extension://<id>/`.
pub fn extension_url(id: &ExtensionId) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}://{}/", EXTENSION_SCHEME, id))
}

/// URL of a packaged file relative to `base`. Leading slashes are ignored.
pub fn resource_url(base: &Url, relative_path: &str) -> Result<Url, url::ParseError> {
    let path = relative_path
        .trim_start_matches('/')
        .replace('%', "%25")
        .replace('?', "%3F")
        .replace('#', "%23");
    Url::parse(&format!("{}{}", base, path))
}

/// A file inside an extension directory. The path is resolved lazily, so
/// building a resource never touches the disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionResource {
    extension_id: ExtensionId,
    extension_root: PathBuf,
    relative_path: PathBuf,
    follow_symlinks_anywhere: bool,
}

impl ExtensionResource {
    pub fn new(
        extension_id: ExtensionId,
        extension_root: impl Into<PathBuf>,
        relative_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            extension_id,
            extension_root: extension_root.into(),
            relative_path: relative_path.into(),
            follow_symlinks_anywhere: false,
        }
    }

    /// Allow the resolved file to be a symlink pointing outside the root.
    pub fn set_follow_symlinks_anywhere(&mut self) {
        self.follow_symlinks_anywhere = true;
    }

    pub fn follow_symlinks_anywhere(&self) -> bool {
        self.follow_symlinks_anywhere
    }

    pub fn extension_id(&self) -> &ExtensionId {
        &self.extension_id
    }

    pub fn extension_root(&self) -> &Path {
        &self.extension_root
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn is_empty(&self) -> bool {
        self.extension_root.as_os_str().is_empty() || self.relative_path.as_os_str().is_empty()
    }

    /// Absolute path of an existing file inside the extension root, or
    /// `None` if the file is missing or escapes the root.
    pub fn file_path(&self) -> Option<PathBuf> {
        resolve_file_path(
            &self.extension_root,
            &self.relative_path,
            self.follow_symlinks_anywhere,
        )
    }
}

fn resolve_file_path(root: &Path, relative: &Path, follow_symlinks_anywhere: bool) -> Option<PathBuf> {
    let root = fs::canonicalize(root).ok()?;

    // Before symlinks are resolved the path must still stay inside the root.
    if follow_symlinks_anywhere {
        let mut depth: i32 = 0;
        for component in relative.components() {
            match component {
                Component::ParentDir => depth -= 1,
                Component::CurDir => {}
                Component::Normal(_) => depth += 1,
                Component::RootDir | Component::Prefix(_) => return None,
            }
            if depth < 0 {
                return None;
            }
        }
    }

    let full = fs::canonicalize(root.join(relative)).ok()?;
    if follow_symlinks_anywhere || (full.starts_with(&root) && full != root) {
        Some(full)
    } else {
        None
    }
}

/// Builds resource handles for files named in a manifest.
pub trait ResourceLocator: Send + Sync {
    fn locate(&self, extension_id: &ExtensionId, root: &Path, relative_path: &str)
        -> ExtensionResource;
}

/// Joins the relative path onto the extension root.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResourceLocator;

impl ResourceLocator for DefaultResourceLocator {
    fn locate(
        &self,
        extension_id: &ExtensionId,
        root: &Path,
        relative_path: &str,
    ) -> ExtensionResource {
        ExtensionResource::new(
            extension_id.clone(),
            root,
            relative_path.trim_start_matches('/'),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id() -> ExtensionId {
        ExtensionId::new_unchecked("abcdefghijklmnopabcdefghijklmnop")
    }

    #[test]
    fn test_extension_and_resource_urls() {
        let base = extension_url(&id()).unwrap();
        assert_eq!(base.as_str(), "chrome-extension://abcdefghijklmnopabcdefghijklmnop/");
        assert_eq!(
            resource_url(&base, "/js/main.js").unwrap().as_str(),
            "chrome-extension://abcdefghijklmnopabcdefghijklmnop/js/main.js"
        );
        assert_eq!(
            resource_url(&base, "a?b#c.js").unwrap().path(),
            "/a%3Fb%23c.js"
        );
    }

    #[test]
    fn test_file_path_inside_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/main.js"), "x").unwrap();

        let resource = DefaultResourceLocator.locate(&id(), dir.path(), "js/main.js");
        let resolved = resource.file_path().unwrap();
        assert!(resolved.ends_with("js/main.js"));

        let missing = DefaultResourceLocator.locate(&id(), dir.path(), "nope.js");
        assert!(missing.file_path().is_none());
    }

    #[test]
    fn test_file_path_cannot_escape_root() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("ext");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), "x").unwrap();

        let resource = ExtensionResource::new(id(), &root, "../secret.txt");
        assert!(resource.file_path().is_none());

        let mut anywhere = resource.clone();
        anywhere.set_follow_symlinks_anywhere();
        assert!(anywhere.file_path().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_policy() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("ext");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("shared.js"), "x").unwrap();
        std::os::unix::fs::symlink(outer.path().join("shared.js"), root.join("link.js")).unwrap();

        let mut resource = ExtensionResource::new(id(), &root, "link.js");
        assert!(resource.file_path().is_none());
        resource.set_follow_symlinks_anywhere();
        assert!(resource.file_path().is_some());
    }

    #[test]
    fn test_is_empty() {
        assert!(ExtensionResource::new(id(), "", "a.js").is_empty());
        assert!(!ExtensionResource::new(id(), "/x", "a.js").is_empty());
    }
}
