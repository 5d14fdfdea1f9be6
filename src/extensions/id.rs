//! Extension identity.
//!
//! An id is the first 16 bytes of a SHA-256 digest, rendered as 32 letters
//! in `a..=p` (one letter per nibble) so it never looks like a number when
//! used as a host name. The digest input is the DER public key from the
//! manifest `key`, or the absolute path of an unpacked extension.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::error::{ManifestError, ManifestResult};

/// Number of digest bytes that make up an id.
pub const ID_SIZE: usize = 16;

/// Length of a rendered id.
pub const ID_LENGTH: usize = ID_SIZE * 2;

const KEY_BEGIN_HEADER_MARKER: &str = "-----BEGIN";
const KEY_INFO_END_MARKER: &str = "KEY-----";
const KEY_BEGIN_FOOTER_MARKER: &str = "-----END";
const PEM_OUTPUT_COLUMNS: usize = 65;

/// A 32-character extension id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Hash arbitrary bytes into an id.
    pub fn generate(input: &[u8]) -> Self {
        let digest = Sha256::digest(input);
        let id = digest[..ID_SIZE]
            .iter()
            .flat_map(|byte| [byte >> 4, byte & 0x0f])
            .map(|nibble| char::from(b'a' + nibble))
            .collect();
        ExtensionId(id)
    }

    /// Id for an unpacked extension at `path`.
    pub fn for_path(path: &Path) -> ManifestResult<Self> {
        if path.as_os_str().is_empty() {
            return Err(ManifestError::EmptyPath);
        }
        let normalized = normalize_path(path);
        Ok(Self::generate(normalized.as_os_str().as_encoded_bytes()))
    }

    /// Wrap a caller-supplied id without checking it.
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        ExtensionId(id.into())
    }

    /// Whether `id` has the shape of a generated id.
    pub fn is_valid(id: &str) -> bool {
        id.len() == ID_LENGTH && id.bytes().all(|b| (b'a'..=b'p').contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExtensionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ExtensionId {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(ExtensionId(s.to_string()))
        } else {
            Err(ManifestError::InvalidExternalId(s.to_string()))
        }
    }
}

/// Resolve the id of an extension being loaded.
///
/// Priority: an explicit id from the loading context, then the manifest
/// `key`, then the install path (unless a key is required).
pub fn derive_id(
    public_key: Option<&str>,
    explicit_id: Option<&ExtensionId>,
    path: &Path,
    require_key: bool,
) -> ManifestResult<ExtensionId> {
    if let Some(id) = explicit_id {
        return Ok(id.clone());
    }

    if let Some(key) = public_key {
        let bytes = parse_pem_key_bytes(key).map_err(|_| ManifestError::InvalidKey)?;
        return Ok(ExtensionId::generate(&bytes));
    }

    if require_key {
        return Err(ManifestError::MissingKey);
    }

    ExtensionId::for_path(path)
}

/// Absolute form of `path` with Windows drive letters upper-cased, so the
/// same directory always hashes to the same id.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let bytes = absolute.as_os_str().as_encoded_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_lowercase() {
        if let Some(text) = absolute.to_str() {
            let mut upper = text.to_string();
            upper[..1].make_ascii_uppercase();
            return PathBuf::from(upper);
        }
    }
    absolute
}

/// Failures while decoding a key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key is empty")]
    Empty,

    #[error("key header is malformed")]
    MalformedHeader,

    #[error("key footer is missing")]
    MissingFooter,

    #[error("key is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Decode a base64 key, stripping PEM armor when present.
pub fn parse_pem_key_bytes(input: &str) -> Result<Vec<u8>, KeyError> {
    if input.is_empty() {
        return Err(KeyError::Empty);
    }

    let mut working = input.to_string();
    if working.starts_with(KEY_BEGIN_HEADER_MARKER) {
        working = collapse_whitespace(&working);
        let header_pos = working[KEY_BEGIN_HEADER_MARKER.len()..]
            .find(KEY_INFO_END_MARKER)
            .map(|pos| pos + KEY_BEGIN_HEADER_MARKER.len())
            .ok_or(KeyError::MalformedHeader)?;
        let start = header_pos + KEY_INFO_END_MARKER.len();
        let end = working
            .rfind(KEY_BEGIN_FOOTER_MARKER)
            .ok_or(KeyError::MissingFooter)?;
        if start >= end {
            return Err(KeyError::MalformedHeader);
        }
        working = working[start..end].to_string();
    }

    let payload: String = working.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(KeyError::Empty);
    }
    let bytes = STANDARD.decode(payload)?;
    if bytes.is_empty() {
        return Err(KeyError::Empty);
    }
    Ok(bytes)
}

/// Base64 form of raw key bytes.
pub fn produce_pem(input: &[u8]) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    Some(STANDARD.encode(input))
}

/// Armor a base64 payload for writing to a `.pem` file.
pub fn format_pem_for_output(base64: &str, is_public: bool) -> Option<String> {
    if base64.is_empty() {
        return None;
    }
    let kind = if is_public { "PUBLIC" } else { "PRIVATE" };
    let mut out = format!("{} {} {}\n", KEY_BEGIN_HEADER_MARKER, kind, KEY_INFO_END_MARKER);
    let bytes = base64.as_bytes();
    for chunk in bytes.chunks(PEM_OUTPUT_COLUMNS) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!(
        "{} {} {}\n",
        KEY_BEGIN_FOOTER_MARKER, kind, KEY_INFO_END_MARKER
    ));
    Some(out)
}

/// Collapse whitespace runs to a single space, dropping runs that contain
/// a line break, and trim both ends.
fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut run = String::new();
    for c in input.chars() {
        if c.is_ascii_whitespace() {
            run.push(c);
            continue;
        }
        if !run.is_empty() {
            if !out.is_empty() && !run.contains(['\n', '\r']) {
                out.push(' ');
            }
            run.clear();
        }
        out.push(c);
    }
    out
}
