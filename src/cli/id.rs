//! Id command for `extmanifest id`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use crate::extensions::manifest::keys;
use crate::extensions::{derive_id, MANIFEST_FILENAME};

/// Print the id derived from the manifest key, or from the path when the
/// manifest has no key.
pub fn run_id(path: &str) -> Result<bool> {
    let ext_dir = PathBuf::from(path)
        .canonicalize()
        .context(format!("Extension directory not found: {}", path))?;

    let key = read_public_key(&ext_dir.join(MANIFEST_FILENAME))?;
    let id = derive_id(key.as_deref(), None, &ext_dir, false)?;

    let source = if key.is_some() { "manifest key" } else { "path" };
    println!("{} {}", style(&id).bold(), style(format!("(from {})", source)).dim());
    Ok(true)
}

/// The manifest `key`, if the manifest exists and has one.
fn read_public_key(manifest_path: &Path) -> Result<Option<String>> {
    if !manifest_path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(manifest_path)
        .context(format!("Failed to read {}", manifest_path.display()))?;
    let manifest: Value = serde_json::from_str(&text)
        .context(format!("Failed to parse {}", manifest_path.display()))?;
    Ok(manifest
        .get(keys::PUBLIC_KEY)
        .and_then(Value::as_str)
        .map(str::to_string))
}
