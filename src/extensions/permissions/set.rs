//! Permission sets.
//!
//! A [`PermissionSet`] is an immutable value: API permissions plus two host
//! pattern sets (hosts granted explicitly, hosts reachable through content
//! scripts). Combining sets always produces a new value.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use url::Url;

use super::catalog::{ApiPermission, PermissionCheck, SocketRule};
use super::messages::{PermissionMessage, PermissionMessageId};
use crate::extensions::error::{ManifestError, ManifestResult};
use crate::extensions::manifest::ExtensionType;
use crate::extensions::pattern_set::UrlPatternSet;
use crate::extensions::url_pattern::FILE_SCHEME;

/// API permissions with their parameters. Only `socket` carries
/// parameters; every other permission maps to an empty rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ApiPermissionSet {
    entries: BTreeMap<ApiPermission, BTreeSet<SocketRule>>,
}

impl ApiPermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, permission: ApiPermission) -> bool {
        if self.entries.contains_key(&permission) {
            return false;
        }
        self.entries.insert(permission, BTreeSet::new());
        true
    }

    /// Insert a permission, merging `rules` into any already present.
    pub fn insert_with_rules(&mut self, permission: ApiPermission, rules: BTreeSet<SocketRule>) {
        self.entries.entry(permission).or_default().extend(rules);
    }

    pub fn remove(&mut self, permission: ApiPermission) -> bool {
        self.entries.remove(&permission).is_some()
    }

    pub fn contains(&self, permission: ApiPermission) -> bool {
        self.entries.contains_key(&permission)
    }

    pub fn rules(&self, permission: ApiPermission) -> Option<&BTreeSet<SocketRule>> {
        self.entries.get(&permission)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Permissions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = ApiPermission> + '_ {
        self.entries.keys().copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(ApiPermission::name).collect()
    }

    pub fn union(&self, other: &ApiPermissionSet) -> ApiPermissionSet {
        let mut result = self.clone();
        for (permission, rules) in &other.entries {
            result.insert_with_rules(*permission, rules.clone());
        }
        result
    }

    /// Entries of `self` not covered by `other`. A parameterized permission
    /// keeps whatever rules `other` lacks.
    pub fn difference(&self, other: &ApiPermissionSet) -> ApiPermissionSet {
        let mut result = ApiPermissionSet::new();
        for (permission, rules) in &self.entries {
            match other.entries.get(permission) {
                None => {
                    result.entries.insert(*permission, rules.clone());
                }
                Some(other_rules) => {
                    let remaining: BTreeSet<SocketRule> =
                        rules.difference(other_rules).cloned().collect();
                    if !remaining.is_empty() {
                        result.entries.insert(*permission, remaining);
                    }
                }
            }
        }
        result
    }

    pub fn intersection(&self, other: &ApiPermissionSet) -> ApiPermissionSet {
        let mut result = ApiPermissionSet::new();
        for (permission, rules) in &self.entries {
            let Some(other_rules) = other.entries.get(permission) else {
                continue;
            };
            let shared: BTreeSet<SocketRule> = rules.intersection(other_rules).cloned().collect();
            let parameterized = !rules.is_empty() || !other_rules.is_empty();
            if !parameterized || !shared.is_empty() {
                result.entries.insert(*permission, shared);
            }
        }
        result
    }

    /// Whether every entry of `other`, with all of its rules, is present.
    pub fn contains_all(&self, other: &ApiPermissionSet) -> bool {
        other.entries.iter().all(|(permission, rules)| {
            self.entries
                .get(permission)
                .is_some_and(|own| rules.is_subset(own))
        })
    }

    /// Whether `permission` is present and its parameters allow `check`.
    pub fn check_param(&self, permission: ApiPermission, check: &PermissionCheck<'_>) -> bool {
        let Some(rules) = self.entries.get(&permission) else {
            return false;
        };
        match check {
            PermissionCheck::Socket {
                operation,
                host,
                port,
            } => rules.iter().any(|rule| rule.allows(*operation, host, *port)),
        }
    }

    /// Parse a manifest permission list. Entries that name no known
    /// permission are returned untouched for host-pattern parsing.
    pub fn parse_from_json(
        list: &[Value],
        list_name: &str,
    ) -> ManifestResult<(ApiPermissionSet, Vec<String>)> {
        let mut set = ApiPermissionSet::new();
        let mut host_data = Vec::new();

        for (index, entry) in list.iter().enumerate() {
            let invalid = |entry: String| ManifestError::InvalidPermission {
                list: list_name.to_string(),
                entry,
            };

            // A permission is a string or a single-key dictionary.
            let (name, params) = match entry {
                Value::String(name) => (name.as_str(), None),
                Value::Object(map) if map.len() == 1 => match map.iter().next() {
                    Some((name, value)) => (name.as_str(), Some(value)),
                    None => return Err(invalid(index.to_string())),
                },
                _ => return Err(invalid(index.to_string())),
            };

            match ApiPermission::from_name(name) {
                Some(permission) => {
                    let rules = parse_parameters(permission, params)
                        .ok_or_else(|| invalid(permission.name().to_string()))?;
                    set.insert_with_rules(permission, rules);
                }
                None => host_data.push(name.to_string()),
            }
        }

        Ok((set, host_data))
    }

    fn messages(&self) -> BTreeSet<PermissionMessage> {
        let mut messages = BTreeSet::new();
        for (permission, rules) in &self.entries {
            if *permission == ApiPermission::Socket {
                messages.extend(socket_messages(rules));
                continue;
            }
            if let Some(message) = permission
                .info()
                .message_id
                .and_then(PermissionMessage::for_id)
            {
                messages.insert(message);
            }
        }
        messages
    }
}

impl FromIterator<ApiPermission> for ApiPermissionSet {
    fn from_iter<I: IntoIterator<Item = ApiPermission>>(iter: I) -> Self {
        let mut set = ApiPermissionSet::new();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

fn parse_parameters(
    permission: ApiPermission,
    params: Option<&Value>,
) -> Option<BTreeSet<SocketRule>> {
    if !permission.info().accepts_parameters() {
        return params.is_none().then(BTreeSet::new);
    }
    let list = params?.as_array()?;
    if list.is_empty() {
        return None;
    }
    list.iter()
        .map(|rule| rule.as_str().and_then(SocketRule::parse))
        .collect()
}

fn socket_messages(rules: &BTreeSet<SocketRule>) -> Vec<PermissionMessage> {
    let address_rules: Vec<&SocketRule> = rules
        .iter()
        .filter(|rule| rule.operation().takes_address())
        .collect();

    if address_rules.iter().any(|rule| rule.host().is_empty()) {
        return PermissionMessage::for_id(PermissionMessageId::SocketAnyHost)
            .into_iter()
            .collect();
    }

    let domains: BTreeSet<&str> = address_rules
        .iter()
        .filter(|rule| rule.match_subdomains())
        .map(|rule| rule.host())
        .collect();
    let hosts: BTreeSet<&str> = address_rules
        .iter()
        .filter(|rule| !rule.match_subdomains())
        .map(|rule| rule.host())
        .collect();

    let mut messages = Vec::new();
    match domains.len() {
        0 => {}
        1 => messages.push(PermissionMessage::new(
            PermissionMessageId::SocketDomainHosts,
            format!(
                "Exchange data with any computer in the domain {}",
                join(&domains)
            ),
        )),
        _ => messages.push(PermissionMessage::new(
            PermissionMessageId::SocketDomainHosts,
            format!(
                "Exchange data with any computer in the domains: {}",
                join(&domains)
            ),
        )),
    }
    match hosts.len() {
        0 => {}
        1 => messages.push(PermissionMessage::new(
            PermissionMessageId::SocketSpecificHosts,
            format!("Exchange data with the computer named {}", join(&hosts)),
        )),
        _ => messages.push(PermissionMessage::new(
            PermissionMessageId::SocketSpecificHosts,
            format!("Exchange data with the computers named: {}", join(&hosts)),
        )),
    }
    messages
}

fn join(items: &BTreeSet<&str>) -> String {
    items.iter().copied().collect::<Vec<_>>().join(" ")
}

/// API permissions plus explicit and scriptable host access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PermissionSet {
    apis: ApiPermissionSet,
    explicit_hosts: UrlPatternSet,
    scriptable_hosts: UrlPatternSet,
    effective_hosts: UrlPatternSet,
}

impl PermissionSet {
    pub fn new(
        apis: ApiPermissionSet,
        explicit_hosts: UrlPatternSet,
        scriptable_hosts: UrlPatternSet,
    ) -> Self {
        let effective_hosts = explicit_hosts.union(&scriptable_hosts);
        Self {
            apis,
            explicit_hosts,
            scriptable_hosts,
            effective_hosts,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn apis(&self) -> &ApiPermissionSet {
        &self.apis
    }

    pub fn explicit_hosts(&self) -> &UrlPatternSet {
        &self.explicit_hosts
    }

    pub fn scriptable_hosts(&self) -> &UrlPatternSet {
        &self.scriptable_hosts
    }

    /// Explicit and scriptable hosts together.
    pub fn effective_hosts(&self) -> &UrlPatternSet {
        &self.effective_hosts
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty() && self.effective_hosts.is_empty()
    }

    pub fn has_api_permission(&self, permission: ApiPermission) -> bool {
        self.apis.contains(permission)
    }

    pub fn check_api_permission_with_param(
        &self,
        permission: ApiPermission,
        check: &PermissionCheck<'_>,
    ) -> bool {
        self.apis.check_param(permission, check)
    }

    pub fn has_explicit_access_to_origin(&self, origin: &Url) -> bool {
        self.explicit_hosts.matches_url(origin)
    }

    pub fn has_scriptable_access_to_url(&self, url: &Url) -> bool {
        self.scriptable_hosts.matches_url(url)
    }

    pub fn has_effective_access_to_url(&self, url: &Url) -> bool {
        self.effective_hosts.matches_url(url)
    }

    /// True when some host pattern covers every host, or some API permission
    /// implies access to every URL.
    pub fn has_effective_access_to_all_hosts(&self) -> bool {
        let all_hosts = self
            .effective_hosts
            .iter()
            .any(|p| p.match_all_urls() || (p.match_subdomains() && p.host().is_empty()));
        all_hosts
            || self
                .apis
                .iter()
                .any(|permission| permission.info().implies_full_url_access())
    }

    /// True when some API permission grants native code execution.
    pub fn has_effective_full_access(&self) -> bool {
        self.apis
            .iter()
            .any(|permission| permission.info().implies_full_access())
    }

    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        PermissionSet::new(
            self.apis.union(&other.apis),
            self.explicit_hosts.union(&other.explicit_hosts),
            self.scriptable_hosts.union(&other.scriptable_hosts),
        )
    }

    pub fn difference(&self, other: &PermissionSet) -> PermissionSet {
        PermissionSet::new(
            self.apis.difference(&other.apis),
            self.explicit_hosts.difference(&other.explicit_hosts),
            self.scriptable_hosts.difference(&other.scriptable_hosts),
        )
    }

    pub fn intersection(&self, other: &PermissionSet) -> PermissionSet {
        PermissionSet::new(
            self.apis.intersection(&other.apis),
            self.explicit_hosts.intersection(&other.explicit_hosts),
            self.scriptable_hosts.intersection(&other.scriptable_hosts),
        )
    }

    /// Whether every permission and pattern of `other` is also in this set.
    pub fn contains(&self, other: &PermissionSet) -> bool {
        self.apis.contains_all(&other.apis)
            && self.explicit_hosts.contains(&other.explicit_hosts)
            && self.scriptable_hosts.contains(&other.scriptable_hosts)
    }

    /// Hosts as shown to users: `*.` prefix for subdomain wildcards,
    /// duplicates removed, sorted.
    pub fn distinct_hosts(&self, exclude_file_scheme: bool) -> Vec<String> {
        let mut hosts = BTreeSet::new();
        for pattern in &self.effective_hosts {
            if exclude_file_scheme && pattern.scheme() == FILE_SCHEME {
                continue;
            }
            let host = if pattern.match_subdomains() {
                format!("*.{}", pattern.host())
            } else {
                pattern.host().to_string()
            };
            hosts.insert(host);
        }
        hosts.into_iter().collect()
    }

    /// Warnings for this set, host access first, then API messages by id.
    pub fn permission_messages(&self, extension_type: ExtensionType) -> Vec<PermissionMessage> {
        if self.has_effective_full_access() {
            return PermissionMessage::for_id(PermissionMessageId::FullAccess)
                .into_iter()
                .collect();
        }

        let mut messages = Vec::new();
        // Platform apps use isolated storage, so host access needs no prompt.
        if extension_type != ExtensionType::PlatformApp {
            if self.has_effective_access_to_all_hosts() {
                messages.extend(PermissionMessage::for_id(PermissionMessageId::HostsAll));
            } else {
                messages.extend(PermissionMessage::for_hosts(&self.distinct_hosts(true)));
            }
        }
        messages.extend(self.apis.messages());
        messages
    }

    pub fn permission_message_strings(&self, extension_type: ExtensionType) -> Vec<String> {
        self.permission_messages(extension_type)
            .into_iter()
            .map(|m| m.message().to_string())
            .collect()
    }

    /// Whether moving from this set to `other` would escalate privileges.
    pub fn has_less_privileges_than(
        &self,
        other: &PermissionSet,
        extension_type: ExtensionType,
    ) -> bool {
        if self.has_effective_full_access() {
            return false;
        }
        if other.has_effective_full_access() {
            return true;
        }
        self.has_less_host_privileges_than(other, extension_type)
            || self.has_less_api_privileges_than(other)
    }

    fn has_less_api_privileges_than(&self, other: &PermissionSet) -> bool {
        let current = self.apis.messages();
        other
            .apis
            .messages()
            .iter()
            .any(|message| !current.contains(message))
    }

    fn has_less_host_privileges_than(
        &self,
        other: &PermissionSet,
        extension_type: ExtensionType,
    ) -> bool {
        if extension_type == ExtensionType::PlatformApp {
            return false;
        }
        if self.has_effective_access_to_all_hosts() {
            return false;
        }
        if other.has_effective_access_to_all_hosts() {
            return true;
        }
        let current: BTreeSet<String> = self.distinct_hosts(false).into_iter().collect();
        other
            .distinct_hosts(false)
            .iter()
            .any(|host| !current.contains(host))
    }
}
