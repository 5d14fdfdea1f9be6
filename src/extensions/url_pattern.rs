//! URL match patterns.
//!
//! A pattern has the shape `scheme://host/path`, or is the special
//! `<all_urls>` pattern. Patterns are parsed against a caller-supplied
//! [`SchemeMask`] that decides which schemes are legal in the current
//! context (host permissions, content scripts, app extents, ...).
//!
//! ```text
//! http://*.google.com/foo*bar
//! ^^^^   ^ ^^^^^^^^^^ ^^^^^^^^
//! scheme | host       path glob (only '*' is special)
//!        subdomain wildcard
//! ```
//!
//! Ports are parsed and kept so a pattern renders back to what was written,
//! but they never take part in matching.

use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

use bitflags::bitflags;
use thiserror::Error;
use url::{Host, Url};

pub const ALL_URLS: &str = "<all_urls>";

const STANDARD_SCHEME_SEPARATOR: &str = "://";
const PATH_SEPARATOR: char = '/';

bitflags! {
    /// Set of schemes a pattern may legally name or match.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SchemeMask: u32 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        const FILE = 1 << 2;
        const FTP = 1 << 3;
        const CHROME_UI = 1 << 4;
        const EXTENSION = 1 << 5;
        const FILESYSTEM = 1 << 6;

        const ALL = u32::MAX;

        const WEB = Self::HTTP.bits() | Self::HTTPS.bits();
        const USER_SCRIPT = Self::WEB.bits() | Self::FILE.bits() | Self::FTP.bits();
        const HOST_PERMISSION = Self::USER_SCRIPT.bits() | Self::CHROME_UI.bits();
    }
}

/// Scheme names paired with their mask bit.
const SCHEMES: &[(&str, SchemeMask)] = &[
    ("http", SchemeMask::HTTP),
    ("https", SchemeMask::HTTPS),
    ("file", SchemeMask::FILE),
    ("ftp", SchemeMask::FTP),
    ("chrome", SchemeMask::CHROME_UI),
    ("chrome-extension", SchemeMask::EXTENSION),
    ("filesystem", SchemeMask::FILESYSTEM),
];

pub const FILE_SCHEME: &str = "file";
pub const CHROME_UI_SCHEME: &str = "chrome";
pub const EXTENSION_SCHEME: &str = "chrome-extension";

impl SchemeMask {
    /// The mask bit for a known scheme name.
    pub fn for_scheme(scheme: &str) -> Option<SchemeMask> {
        SCHEMES
            .iter()
            .find(|(name, _)| *name == scheme)
            .map(|(_, bit)| *bit)
    }
}

/// Why a pattern string could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Missing scheme separator.")]
    MissingSchemeSeparator,

    #[error("Invalid scheme.")]
    InvalidScheme,

    #[error("Wrong scheme type.")]
    WrongSchemeSeparator,

    #[error("Host can not be empty.")]
    EmptyHost,

    #[error("Invalid host wildcard.")]
    InvalidHostWildcard,

    #[error("Empty path.")]
    EmptyPath,

    #[error("Invalid port.")]
    InvalidPort,
}

/// A parsed URL match pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlPattern {
    valid_schemes: SchemeMask,
    match_all_urls: bool,
    scheme: String,
    host: String,
    match_subdomains: bool,
    port: String,
    path: String,
}

impl UrlPattern {
    /// An empty pattern that only matches once fields are set.
    pub fn new(valid_schemes: SchemeMask) -> Self {
        Self {
            valid_schemes,
            match_all_urls: false,
            scheme: String::new(),
            host: String::new(),
            match_subdomains: false,
            port: "*".to_string(),
            path: String::new(),
        }
    }

    /// Parse `pattern`, accepting only schemes in `valid_schemes`.
    pub fn parse(valid_schemes: SchemeMask, pattern: &str) -> Result<Self, ParseError> {
        let mut parsed = Self::new(valid_schemes);

        if pattern == ALL_URLS {
            parsed.match_all_urls = true;
            parsed.match_subdomains = true;
            parsed.scheme = "*".to_string();
            parsed.path = "/*".to_string();
            return Ok(parsed);
        }

        let (scheme_end, has_standard_separator) = match pattern.find(STANDARD_SCHEME_SEPARATOR)
        {
            Some(pos) => (pos, true),
            None => match pattern.find(':') {
                Some(pos) => (pos, false),
                None => return Err(ParseError::MissingSchemeSeparator),
            },
        };

        if !parsed.set_scheme(&pattern[..scheme_end]) {
            return Err(ParseError::InvalidScheme);
        }

        // Every scheme we know about uses the `://` separator.
        if !has_standard_separator {
            return Err(ParseError::WrongSchemeSeparator);
        }

        let host_start = scheme_end + STANDARD_SCHEME_SEPARATOR.len();
        if host_start >= pattern.len() {
            return Err(ParseError::EmptyHost);
        }

        let rest = &pattern[host_start..];
        let path_start;
        if parsed.scheme == FILE_SCHEME {
            // The host of a file pattern is ignored; `file://*` means `file:///*`.
            path_start = match rest.find(PATH_SEPARATOR) {
                Some(pos) => host_start + pos,
                None => host_start - 1,
            };
        } else {
            let host_end = match rest.find(PATH_SEPARATOR) {
                Some(0) => return Err(ParseError::EmptyHost),
                Some(pos) => host_start + pos,
                None => return Err(ParseError::EmptyPath),
            };

            let host = &pattern[host_start..host_end];
            let mut components: Vec<&str> = host.split('.').collect();
            if components.first() == Some(&"*") {
                parsed.match_subdomains = true;
                components.remove(0);
            }
            parsed.host = components.join(".");
            path_start = host_end;
        }

        parsed.set_path(&pattern[path_start..]);

        if let Some(port_pos) = parsed.host.find(':') {
            let port = parsed.host[port_pos + 1..].to_string();
            if !parsed.set_port(&port) {
                return Err(ParseError::InvalidPort);
            }
            parsed.host.truncate(port_pos);
        }

        // '*' is only meaningful as the whole first host component.
        if parsed.host.contains('*') {
            return Err(ParseError::InvalidHostWildcard);
        }

        Ok(parsed)
    }

    pub fn valid_schemes(&self) -> SchemeMask {
        self.valid_schemes
    }

    pub fn set_valid_schemes(&mut self, valid_schemes: SchemeMask) {
        self.valid_schemes = valid_schemes;
    }

    pub fn match_all_urls(&self) -> bool {
        self.match_all_urls
    }

    pub fn set_match_all_urls(&mut self, value: bool) {
        self.match_all_urls = value;
        if value {
            self.match_subdomains = true;
            self.scheme = "*".to_string();
            self.host.clear();
            self.set_path("/*");
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Set the scheme, returning false if it is not legal for this pattern.
    /// The wildcard scheme narrows the valid schemes to http and https.
    pub fn set_scheme(&mut self, scheme: &str) -> bool {
        self.scheme = scheme.to_string();
        if scheme == "*" {
            self.valid_schemes &= SchemeMask::WEB;
            return true;
        }
        self.is_valid_scheme(scheme)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_host(&mut self, host: &str) {
        self.host = host.to_string();
    }

    pub fn match_subdomains(&self) -> bool {
        self.match_subdomains
    }

    pub fn set_match_subdomains(&mut self, value: bool) {
        self.match_subdomains = value;
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Accepts `*` or a decimal port. File patterns only take `*`.
    pub fn set_port(&mut self, port: &str) -> bool {
        let valid = port == "*"
            || (self.scheme != FILE_SCHEME
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
                && port.parse::<u16>().is_ok());
        if valid {
            self.port = port.to_string();
        }
        valid
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
    }

    /// Whether `scheme` is one this pattern may name or match.
    pub fn is_valid_scheme(&self, scheme: &str) -> bool {
        if self.valid_schemes == SchemeMask::ALL {
            return true;
        }
        SchemeMask::for_scheme(scheme).is_some_and(|bit| self.valid_schemes.contains(bit))
    }

    pub fn matches_scheme(&self, scheme: &str) -> bool {
        if !self.is_valid_scheme(scheme) {
            return false;
        }
        self.scheme == "*" || self.scheme == scheme
    }

    pub fn matches_any_scheme<S: AsRef<str>>(&self, schemes: &[S]) -> bool {
        schemes.iter().any(|s| self.matches_scheme(s.as_ref()))
    }

    pub fn matches_all_schemes<S: AsRef<str>>(&self, schemes: &[S]) -> bool {
        schemes.iter().all(|s| self.matches_scheme(s.as_ref()))
    }

    /// Known scheme names this pattern matches.
    pub fn explicit_schemes(&self) -> Vec<&'static str> {
        SCHEMES
            .iter()
            .filter(|(name, _)| self.matches_scheme(name))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Whether `url` is matched by this pattern.
    pub fn matches_url(&self, url: &Url) -> bool {
        if !self.matches_scheme(url.scheme()) {
            return false;
        }
        if self.match_all_urls {
            return true;
        }
        self.matches_security_origin_helper(url) && self.matches_path(&path_for_request(url))
    }

    /// Like [`UrlPattern::matches_url`] but ignores the path.
    pub fn matches_security_origin(&self, origin: &Url) -> bool {
        if !self.matches_scheme(origin.scheme()) {
            return false;
        }
        self.match_all_urls || self.matches_security_origin_helper(origin)
    }

    fn matches_security_origin_helper(&self, url: &Url) -> bool {
        // Hosts of file URLs are ignored.
        self.scheme == FILE_SCHEME || self.matches_url_host(url)
    }

    fn matches_url_host(&self, url: &Url) -> bool {
        match url.host() {
            Some(Host::Domain(domain)) => self.matches_host_helper(domain, false),
            Some(Host::Ipv4(addr)) => self.matches_host_helper(&addr.to_string(), true),
            Some(Host::Ipv6(addr)) => self.matches_host_helper(&format!("[{}]", addr), true),
            None => self.matches_host_helper("", false),
        }
    }

    /// Host matching against a bare host string.
    pub fn matches_host(&self, host: &str) -> bool {
        let trimmed = host.trim_start_matches('[').trim_end_matches(']');
        let is_ip = trimmed.parse::<IpAddr>().is_ok();
        self.matches_host_helper(host, is_ip)
    }

    fn matches_host_helper(&self, test_host: &str, is_ip: bool) -> bool {
        if test_host == self.host {
            return true;
        }
        // A subdomain wildcard with no host matches every host.
        if self.match_subdomains && self.host.is_empty() {
            return true;
        }
        if !self.match_subdomains || is_ip {
            return false;
        }
        if test_host.len() <= self.host.len() + 1 {
            return false;
        }
        test_host.ends_with(self.host.as_str())
            && test_host.as_bytes()[test_host.len() - self.host.len() - 1] == b'.'
    }

    /// Glob match of the path. Only `*` is a wildcard.
    pub fn matches_path(&self, test: &str) -> bool {
        glob_match(&self.path, test)
    }

    /// Whether some URL could be matched by both patterns. Both paths are
    /// expected to end in their only wildcard.
    pub fn overlaps_with(&self, other: &UrlPattern) -> bool {
        if self.match_all_urls || other.match_all_urls {
            return self.matches_any_scheme(&other.explicit_schemes())
                || other.matches_any_scheme(&self.explicit_schemes());
        }
        if !self.matches_any_scheme(&other.explicit_schemes())
            && !other.matches_any_scheme(&self.explicit_schemes())
        {
            return false;
        }
        if !self.matches_host(&other.host) && !other.matches_host(&self.host) {
            return false;
        }
        self.matches_path(strip_trailing_wildcard(&other.path))
            || other.matches_path(strip_trailing_wildcard(&self.path))
    }

    /// Whether every URL matched by `other` is matched by this pattern.
    pub fn contains(&self, other: &UrlPattern) -> bool {
        if self.match_all_urls {
            return self.matches_all_schemes(&other.explicit_schemes());
        }
        if other.match_all_urls {
            return false;
        }
        if other.match_subdomains && !self.match_subdomains {
            return false;
        }
        self.matches_all_schemes(&other.explicit_schemes())
            && self.matches_host(&other.host)
            && self.matches_path(&other.path)
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.match_all_urls {
            return f.write_str(ALL_URLS);
        }
        write!(f, "{}{}", self.scheme, STANDARD_SCHEME_SEPARATOR)?;
        if self.scheme != FILE_SCHEME {
            if self.match_subdomains {
                f.write_str("*")?;
                if !self.host.is_empty() {
                    f.write_str(".")?;
                }
            }
            f.write_str(&self.host)?;
            if self.port != "*" {
                write!(f, ":{}", self.port)?;
            }
        }
        f.write_str(&self.path)
    }
}

impl PartialOrd for UrlPattern {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UrlPattern {
    /// Patterns order by their rendered form so sets iterate predictably.
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string()
            .cmp(&other.to_string())
            .then_with(|| self.valid_schemes.cmp(&other.valid_schemes))
    }
}

/// The path used for matching: path plus `?query` when a query is present.
pub fn path_for_request(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn strip_trailing_wildcard(path: &str) -> &str {
    path.strip_suffix('*').unwrap_or(path)
}

/// Glob match where `*` matches any run of characters and everything else,
/// including `?`, is literal.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some(pi);
            pi += 1;
            mark = ti;
        } else if pi < p.len() && p[pi] == t[ti] {
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
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}
