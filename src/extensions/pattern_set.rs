//! Ordered sets of URL match patterns.

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

use url::Url;

use super::url_pattern::{ParseError, SchemeMask, UrlPattern};

/// An ordered, de-duplicated collection of [`UrlPattern`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlPatternSet {
    patterns: BTreeSet<UrlPattern>,
}

impl UrlPatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every string with the same scheme mask, stopping at the first
    /// failure.
    pub fn parse<S: AsRef<str>>(
        valid_schemes: SchemeMask,
        patterns: &[S],
    ) -> Result<Self, (String, ParseError)> {
        let mut set = Self::new();
        for raw in patterns {
            let raw = raw.as_ref();
            let pattern =
                UrlPattern::parse(valid_schemes, raw).map_err(|e| (raw.to_string(), e))?;
            set.add_pattern(pattern);
        }
        Ok(set)
    }

    /// Returns false if an equal pattern was already present.
    pub fn add_pattern(&mut self, pattern: UrlPattern) -> bool {
        self.patterns.insert(pattern)
    }

    pub fn remove_pattern(&mut self, pattern: &UrlPattern) -> bool {
        self.patterns.remove(pattern)
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, UrlPattern> {
        self.patterns.iter()
    }

    pub fn contains_pattern(&self, pattern: &UrlPattern) -> bool {
        self.patterns.contains(pattern)
    }

    pub fn union(&self, other: &UrlPatternSet) -> UrlPatternSet {
        self.patterns.union(&other.patterns).cloned().collect()
    }

    pub fn difference(&self, other: &UrlPatternSet) -> UrlPatternSet {
        self.patterns.difference(&other.patterns).cloned().collect()
    }

    pub fn intersection(&self, other: &UrlPatternSet) -> UrlPatternSet {
        self.patterns
            .intersection(&other.patterns)
            .cloned()
            .collect()
    }

    /// Whether every pattern of `other` is also a member of this set.
    pub fn contains(&self, other: &UrlPatternSet) -> bool {
        other.patterns.is_subset(&self.patterns)
    }

    pub fn matches_url(&self, url: &Url) -> bool {
        self.patterns.iter().any(|p| p.matches_url(url))
    }

    pub fn matches_security_origin(&self, origin: &Url) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_security_origin(origin))
    }

    pub fn overlaps_with(&self, other: &UrlPatternSet) -> bool {
        self.patterns
            .iter()
            .any(|a| other.patterns.iter().any(|b| a.overlaps_with(b)))
    }

    /// Rendered patterns, in set order.
    pub fn to_strings(&self) -> Vec<String> {
        self.patterns.iter().map(ToString::to_string).collect()
    }
}

impl FromIterator<UrlPattern> for UrlPatternSet {
    fn from_iter<I: IntoIterator<Item = UrlPattern>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}

impl Extend<UrlPattern> for UrlPatternSet {
    fn extend<I: IntoIterator<Item = UrlPattern>>(&mut self, iter: I) {
        self.patterns.extend(iter);
    }
}

impl<'a> IntoIterator for &'a UrlPatternSet {
    type Item = &'a UrlPattern;
    type IntoIter = btree_set::Iter<'a, UrlPattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

impl fmt::Display for UrlPatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_strings().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> UrlPatternSet {
        UrlPatternSet::parse(SchemeMask::ALL, patterns).unwrap()
    }

    #[test]
    fn test_parse_reports_offending_pattern() {
        let err = UrlPatternSet::parse(SchemeMask::ALL, &["http://a.com/*", "bogus"]).unwrap_err();
        assert_eq!(err.0, "bogus");
        assert_eq!(err.1, ParseError::MissingSchemeSeparator);
    }

    #[test]
    fn test_set_operations() {
        let a = set(&["http://a.com/*", "http://b.com/*"]);
        let b = set(&["http://b.com/*", "http://c.com/*"]);

        assert_eq!(a.union(&b).len(), 3);
        assert_eq!(a.difference(&b), set(&["http://a.com/*"]));
        assert_eq!(a.intersection(&b), set(&["http://b.com/*"]));
        assert!(a.union(&b).contains(&a));
        assert!(!a.contains(&b));
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut s = set(&["http://a.com/*"]);
        assert!(!s.add_pattern(UrlPattern::parse(SchemeMask::ALL, "http://a.com/*").unwrap()));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_matches_url_and_overlap() {
        let s = set(&["http://*.google.com/*", "https://example.com/foo*"]);
        assert!(s.matches_url(&Url::parse("http://mail.google.com/x").unwrap()));
        assert!(s.matches_url(&Url::parse("https://example.com/foobar").unwrap()));
        assert!(!s.matches_url(&Url::parse("https://example.com/bar").unwrap()));

        assert!(s.overlaps_with(&set(&["http://www.google.com/*"])));
        assert!(!s.overlaps_with(&set(&["http://yahoo.com/*"])));
    }

    #[test]
    fn test_iteration_is_sorted() {
        let s = set(&["http://z.com/*", "http://a.com/*"]);
        assert_eq!(s.to_strings(), vec!["http://a.com/*", "http://z.com/*"]);
    }
}
