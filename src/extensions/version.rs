//! Dotted numeric versions (`1.0`, `2.3.4.5`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Most components an extension version may have.
pub const MAX_EXTENSION_COMPONENTS: usize = 4;

/// A version made of dot-separated unsigned integers.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u32>,
}

impl Version {
    /// Parse a version. Components must be plain decimal digits without a
    /// sign, and the first one may not carry a leading zero.
    pub fn parse(s: &str) -> Option<Version> {
        if s.is_empty() {
            return None;
        }
        let mut components = Vec::new();
        for part in s.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            if components.is_empty() && part.len() > 1 && part.starts_with('0') {
                return None;
            }
            components.push(part.parse::<u32>().ok()?);
        }
        Some(Version { components })
    }

    /// Parse a version legal for an extension: at most four components,
    /// each below 65536.
    pub fn parse_extension(s: &str) -> Option<Version> {
        let version = Self::parse(s)?;
        if version.components.len() > MAX_EXTENSION_COMPONENTS
            || version.components.iter().any(|c| *c > u32::from(u16::MAX))
        {
            return None;
        }
        Some(version)
    }

    /// Build a version from its components. An empty list is treated as
    /// `0`.
    pub fn from_components(components: impl Into<Vec<u32>>) -> Version {
        let mut components = components.into();
        if components.is_empty() {
            components.push(0);
        }
        Version { components }
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }
}

impl FromStr for Version {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s).ok_or(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Missing trailing components compare as zero, so `1.0` equals `1`.
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}
