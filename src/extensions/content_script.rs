//! Content scripts declared in a manifest.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

use super::pattern_set::UrlPatternSet;
use super::resource::ExtensionResource;

/// When a content script is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLocation {
    DocumentStart,
    DocumentEnd,
    #[default]
    DocumentIdle,
}

impl RunLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            RunLocation::DocumentStart => "document_start",
            RunLocation::DocumentEnd => "document_end",
            RunLocation::DocumentIdle => "document_idle",
        }
    }
}

impl FromStr for RunLocation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document_start" => Ok(RunLocation::DocumentStart),
            "document_end" => Ok(RunLocation::DocumentEnd),
            "document_idle" => Ok(RunLocation::DocumentIdle),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RunLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script or stylesheet injected by a content script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub url: Url,
    pub resource: ExtensionResource,
}

/// One entry of `content_scripts`.
#[derive(Debug, Clone, Default)]
pub struct ContentScript {
    pub matches: UrlPatternSet,
    pub exclude_matches: UrlPatternSet,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub run_location: RunLocation,
    pub match_all_frames: bool,
    pub emulate_greasemonkey: bool,
    pub js: Vec<ScriptFile>,
    pub css: Vec<ScriptFile>,
}

impl ContentScript {
    /// Whether the script would be injected into `url`. Globs are matched
    /// against the full URL string.
    pub fn matches_url(&self, url: &Url) -> bool {
        if !self.matches.matches_url(url) {
            return false;
        }
        if self.exclude_matches.matches_url(url) {
            return false;
        }
        let spec = url.as_str();
        if !self.include_globs.is_empty()
            && !self.include_globs.iter().any(|g| wildcard_match(g, spec))
        {
            return false;
        }
        !self.exclude_globs.iter().any(|g| wildcard_match(g, spec))
    }
}

/// Glob match where `*` matches any run of characters and `?` exactly one.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            pi += 1;
            mark = ti;
        } else if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
