//! Public-suffix lookups.
//!
//! Wildcard host grants over an effective top-level domain (`*.co.uk`,
//! `*.appspot.com`) would cover sites run by unrelated parties, so they are
//! refused wherever host patterns come from a manifest. The built-in table
//! covers the common ICANN suffixes plus the well-known hosting suffixes;
//! deployments can add more through the loader configuration.

use std::collections::HashSet;

use once_cell::sync::Lazy;

static BUILTIN_SUFFIXES: &[&str] = &[
    // Generic
    "com", "org", "net", "edu", "gov", "mil", "int", "info", "biz", "name", "pro", "mobi",
    "io", "dev", "app", "co", "me", "tv", "xyz", "online", "site",
    // Country codes and their common second levels
    "uk", "co.uk", "org.uk", "ac.uk", "gov.uk", "ltd.uk", "me.uk", "net.uk", "plc.uk",
    "jp", "co.jp", "ne.jp", "or.jp", "ac.jp", "go.jp",
    "au", "com.au", "net.au", "org.au", "edu.au", "gov.au",
    "nz", "co.nz", "org.nz", "net.nz",
    "br", "com.br", "net.br", "org.br",
    "cn", "com.cn", "net.cn", "org.cn",
    "in", "co.in", "net.in", "org.in",
    "kr", "co.kr", "or.kr",
    "za", "co.za",
    "de", "fr", "it", "es", "nl", "be", "ch", "at", "se", "no", "dk", "fi", "pl", "ru",
    "ca", "us", "mx", "com.mx", "ar", "com.ar", "tr", "com.tr", "tw", "com.tw",
    "hk", "com.hk", "sg", "com.sg", "il", "co.il", "ie", "pt", "gr", "cz", "hu", "ro",
    // Private registries
    "appspot.com", "blogspot.com", "github.io", "herokuapp.com", "cloudfront.net",
    "azurewebsites.net", "netlify.app", "vercel.app", "pages.dev", "firebaseapp.com",
];

static BUILTIN: Lazy<HashSet<&'static str>> = Lazy::new(|| BUILTIN_SUFFIXES.iter().copied().collect());

/// Public-suffix table: the built-in entries plus configured extras.
#[derive(Debug, Clone, Default)]
pub struct RegistryDomains {
    extra: HashSet<String>,
}

impl RegistryDomains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with additional suffixes (leading dots are ignored).
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extra: extra
                .into_iter()
                .map(|s| s.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    fn is_listed(&self, suffix: &str) -> bool {
        BUILTIN.contains(suffix) || self.extra.contains(suffix)
    }

    /// Length of the registry part of `host`, or 0 when `host` has no label
    /// in front of its registry (the host is itself a registry, or a single
    /// unknown label such as an intranet name).
    pub fn registry_length(&self, host: &str) -> usize {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return 0;
        }

        // Longest listed suffix wins; an unknown top label is its own registry.
        let mut registry = host.rsplit('.').next().unwrap_or_default().len();
        let mut pos = host.len();
        while let Some(dot) = host[..pos].rfind('.') {
            let candidate = &host[dot + 1..];
            if self.is_listed(candidate) {
                registry = candidate.len();
            }
            pos = dot;
        }
        if self.is_listed(&host) {
            registry = host.len();
        }

        if registry >= host.len() {
            0
        } else {
            registry
        }
    }

    /// Whether `host` is nothing but a public suffix.
    pub fn is_registry(&self, host: &str) -> bool {
        self.registry_length(host) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_suffixes() {
        let domains = RegistryDomains::new();
        assert!(domains.is_registry("com"));
        assert!(domains.is_registry("co.uk"));
        assert!(domains.is_registry("appspot.com"));
        assert!(!domains.is_registry("google.com"));
        assert!(!domains.is_registry("bbc.co.uk"));
        assert!(!domains.is_registry("codereview.appspot.com"));
    }

    #[test]
    fn test_registry_length() {
        let domains = RegistryDomains::new();
        assert_eq!(domains.registry_length("www.google.com"), 3);
        assert_eq!(domains.registry_length("news.bbc.co.uk"), 5);
        assert_eq!(domains.registry_length("foo.appspot.com"), 11);
        assert_eq!(domains.registry_length("co.uk"), 0);
    }

    #[test]
    fn test_unknown_single_label_is_registry() {
        let domains = RegistryDomains::new();
        assert!(domains.is_registry("notatld"));
        assert!(!domains.is_registry("foo.notatld"));
    }

    #[test]
    fn test_extra_suffixes() {
        let domains = RegistryDomains::with_extra([".corp.example"]);
        assert!(domains.is_registry("corp.example"));
        assert!(!domains.is_registry("team.corp.example"));
        assert!(!RegistryDomains::new().is_registry("corp.example"));
    }
}
