//! `content_scripts`.

use serde_json::Value;
use tracing::debug;

use super::permissions::{restrict_file_access, wildcard_over_registry};
use super::{invalid_value, optional, string_list, CreationFlags, ExtensionDraft, ExtensionLoader};
use crate::extensions::content_script::{ContentScript, ScriptFile};
use crate::extensions::error::{ManifestError, ManifestResult};
use crate::extensions::manifest::{keys, DictView, ValueLookup};
use crate::extensions::resource::resource_url;
use crate::extensions::url_pattern::{SchemeMask, UrlPattern};

const EXPECT_STRING: &str = "Expect string value.";

pub(super) fn load_content_scripts(
    loader: &ExtensionLoader,
    draft: &mut ExtensionDraft,
) -> ManifestResult<()> {
    let Ok(value) = draft.manifest.get(keys::CONTENT_SCRIPTS) else {
        return Ok(());
    };
    // Owned copy: parsing records warnings and file access on the draft.
    let entries = value
        .as_array()
        .ok_or_else(|| invalid_value(keys::CONTENT_SCRIPTS))?
        .clone();

    for (index, entry) in entries.iter().enumerate() {
        if let Some(script) = load_content_script(loader, draft, index, entry)? {
            draft.content_scripts.push(script);
        }
    }
    Ok(())
}

/// Parse one entry. `None` when every match pattern was dropped with a
/// warning.
fn load_content_script(
    loader: &ExtensionLoader,
    draft: &mut ExtensionDraft,
    index: usize,
    entry: &Value,
) -> ManifestResult<Option<ContentScript>> {
    let key = |name: &str| format!("{}[{}].{}", keys::CONTENT_SCRIPTS, index, name);
    let dict = entry
        .as_object()
        .map(DictView::new)
        .ok_or_else(|| invalid_value(format!("{}[{}]", keys::CONTENT_SCRIPTS, index)))?;

    let mut script = ContentScript::default();

    if let Some(run_at) = optional(dict.get_str(keys::RUN_AT), &key(keys::RUN_AT))? {
        script.run_location = run_at
            .parse()
            .map_err(|_| invalid_value(key(keys::RUN_AT)))?;
    }
    if let Some(all_frames) = optional(dict.get_bool(keys::ALL_FRAMES), &key(keys::ALL_FRAMES))? {
        script.match_all_frames = all_frames;
    }

    let matches = dict
        .get_list(keys::MATCHES)
        .map_err(|_| invalid_value(key(keys::MATCHES)))?;
    if matches.is_empty() {
        return Err(ManifestError::InvalidMatchCount { index });
    }

    let valid_schemes = if draft.can_execute_script_everywhere {
        SchemeMask::ALL
    } else {
        SchemeMask::USER_SCRIPT
    };
    for (match_index, raw) in matches.iter().enumerate() {
        let invalid_match = |detail: String| ManifestError::InvalidMatch {
            index,
            match_index,
            detail,
        };
        let raw = raw
            .as_str()
            .ok_or_else(|| invalid_match(EXPECT_STRING.to_string()))?;
        let mut pattern = UrlPattern::parse(valid_schemes, raw)
            .map_err(|err| invalid_match(err.to_string()))?;

        restrict_file_access(draft, &mut pattern);
        if let Some(warning) = wildcard_over_registry(loader, &pattern) {
            draft.warn(warning);
            continue;
        }
        script.matches.add_pattern(pattern);
    }

    if let Ok(excludes) = dict.get(keys::EXCLUDE_MATCHES) {
        let list_key = key(keys::EXCLUDE_MATCHES);
        let excludes = excludes
            .as_array()
            .ok_or_else(|| invalid_value(list_key.as_str()))?;
        for (exclude_index, raw) in excludes.iter().enumerate() {
            let entry_key = format!("{}[{}]", list_key, exclude_index);
            let raw = raw
                .as_str()
                .ok_or_else(|| invalid_value(entry_key.as_str()))?;
            let mut pattern =
                UrlPattern::parse(valid_schemes, raw).map_err(|err| ManifestError::InvalidPattern {
                    key: entry_key,
                    detail: err.to_string(),
                })?;
            restrict_file_access(draft, &mut pattern);
            script.exclude_matches.add_pattern(pattern);
        }
    }

    if let Ok(globs) = dict.get(keys::INCLUDE_GLOBS) {
        script.include_globs = string_list(globs, &key(keys::INCLUDE_GLOBS))?;
    }
    if let Ok(globs) = dict.get(keys::EXCLUDE_GLOBS) {
        script.exclude_globs = string_list(globs, &key(keys::EXCLUDE_GLOBS))?;
    }

    script.js = script_files(loader, draft, dict, index, keys::JS)?;
    script.css = script_files(loader, draft, dict, index, keys::CSS)?;
    if script.js.is_empty() && script.css.is_empty() {
        return Err(ManifestError::MissingFile { index });
    }

    if draft.converted_from_user_script {
        // Greasemonkey scripts run in every frame.
        script.emulate_greasemonkey = true;
        script.match_all_frames = true;
    }

    if script.matches.is_empty() {
        debug!(index, "content script dropped, no usable match patterns");
        return Ok(None);
    }
    Ok(Some(script))
}

fn script_files(
    loader: &ExtensionLoader,
    draft: &ExtensionDraft,
    dict: DictView<'_>,
    index: usize,
    name: &str,
) -> ManifestResult<Vec<ScriptFile>> {
    let Ok(value) = dict.get(name) else {
        return Ok(Vec::new());
    };
    let list_key = format!("{}[{}].{}", keys::CONTENT_SCRIPTS, index, name);
    let list = value
        .as_array()
        .ok_or_else(|| invalid_value(list_key.as_str()))?;

    list.iter()
        .enumerate()
        .map(|(file_index, entry)| {
            let invalid_entry = || invalid_value(format!("{}[{}]", list_key, file_index));
            let relative = entry.as_str().ok_or_else(invalid_entry)?;
            let url = resource_url(&draft.url, relative).map_err(|_| invalid_entry())?;
            let mut resource = loader.resources.locate(&draft.id, &draft.path, relative);
            if draft.flags.contains(CreationFlags::FOLLOW_SYMLINKS_ANYWHERE) {
                resource.set_follow_symlinks_anywhere();
            }
            Ok(ScriptFile { url, resource })
        })
        .collect()
}
