//! Permission catalog.
//!
//! Static metadata for every API permission the loader understands: its
//! manifest name, behavior flags and the warning message it contributes.
//! Names are resolved through a lazily built table that also knows the
//! legacy aliases.

use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;
use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};

use super::messages::PermissionMessageId;

bitflags! {
    /// Behavior flags attached to a permission.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PermissionFlags: u32 {
        /// May only be requested through `optional_permissions`.
        const MUST_BE_OPTIONAL = 1 << 0;
        /// Granted implicitly by the loader; never accepted from a manifest.
        const INTERNAL = 1 << 1;
        /// Grants arbitrary native code execution.
        const IMPLIES_FULL_ACCESS = 1 << 2;
        /// Grants access to every URL.
        const IMPLIES_FULL_URL_ACCESS = 1 << 3;
        /// Takes a parameter list in dictionary form.
        const ACCEPTS_PARAMETERS = 1 << 4;
    }
}

/// A known API permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiPermission {
    Alarms,
    AppCurrentWindowInternal,
    AppRuntime,
    AppWindow,
    Background,
    Bookmarks,
    BrowsingData,
    ClipboardRead,
    ClipboardWrite,
    ContentSettings,
    ContextMenus,
    Cookies,
    Debugger,
    Downloads,
    Experimental,
    FileSystem,
    Geolocation,
    History,
    Idle,
    Management,
    Notifications,
    PageCapture,
    Plugin,
    Privacy,
    Proxy,
    Socket,
    Storage,
    SystemIndicator,
    Tabs,
    TopSites,
    Tts,
    TtsEngine,
    UnlimitedStorage,
    WebConnectable,
    WebNavigation,
    WebRequest,
    WebRequestBlocking,
}

/// Metadata for one permission.
#[derive(Debug, Clone, Copy)]
pub struct PermissionInfo {
    pub permission: ApiPermission,
    pub name: &'static str,
    pub flags: PermissionFlags,
    pub message_id: Option<PermissionMessageId>,
}

impl PermissionInfo {
    const fn new(
        permission: ApiPermission,
        name: &'static str,
        flags: PermissionFlags,
        message_id: Option<PermissionMessageId>,
    ) -> Self {
        Self {
            permission,
            name,
            flags,
            message_id,
        }
    }

    pub fn must_be_optional(&self) -> bool {
        self.flags.contains(PermissionFlags::MUST_BE_OPTIONAL)
    }

    pub fn is_internal(&self) -> bool {
        self.flags.contains(PermissionFlags::INTERNAL)
    }

    pub fn implies_full_access(&self) -> bool {
        self.flags.contains(PermissionFlags::IMPLIES_FULL_ACCESS)
    }

    pub fn implies_full_url_access(&self) -> bool {
        self.flags.contains(PermissionFlags::IMPLIES_FULL_URL_ACCESS)
    }

    pub fn accepts_parameters(&self) -> bool {
        self.flags.contains(PermissionFlags::ACCEPTS_PARAMETERS)
    }
}

const NONE: PermissionFlags = PermissionFlags::empty();

static PERMISSIONS: &[PermissionInfo] = {
    use ApiPermission as P;
    use PermissionFlags as F;
    use PermissionMessageId as M;
    &[
        PermissionInfo::new(P::Alarms, "alarms", NONE, None),
        PermissionInfo::new(P::AppCurrentWindowInternal, "app.currentWindowInternal", NONE, None),
        PermissionInfo::new(P::AppRuntime, "app.runtime", NONE, None),
        PermissionInfo::new(P::AppWindow, "app.window", NONE, None),
        PermissionInfo::new(P::Background, "background", NONE, None),
        PermissionInfo::new(P::Bookmarks, "bookmarks", NONE, Some(M::Bookmarks)),
        PermissionInfo::new(P::BrowsingData, "browsingData", NONE, None),
        PermissionInfo::new(P::ClipboardRead, "clipboardRead", F::MUST_BE_OPTIONAL, Some(M::Clipboard)),
        PermissionInfo::new(P::ClipboardWrite, "clipboardWrite", NONE, None),
        PermissionInfo::new(P::ContentSettings, "contentSettings", NONE, Some(M::ContentSettings)),
        PermissionInfo::new(P::ContextMenus, "contextMenus", NONE, None),
        PermissionInfo::new(P::Cookies, "cookies", NONE, None),
        PermissionInfo::new(P::Debugger, "debugger", F::IMPLIES_FULL_URL_ACCESS, Some(M::Debugger)),
        PermissionInfo::new(P::Downloads, "downloads", NONE, Some(M::Downloads)),
        PermissionInfo::new(P::Experimental, "experimental", NONE, None),
        PermissionInfo::new(P::FileSystem, "fileSystem", NONE, None),
        PermissionInfo::new(P::Geolocation, "geolocation", NONE, Some(M::Geolocation)),
        PermissionInfo::new(P::History, "history", NONE, Some(M::BrowsingHistory)),
        PermissionInfo::new(P::Idle, "idle", NONE, None),
        PermissionInfo::new(P::Management, "management", NONE, Some(M::Management)),
        PermissionInfo::new(P::Notifications, "notifications", NONE, None),
        PermissionInfo::new(P::PageCapture, "pageCapture", F::IMPLIES_FULL_URL_ACCESS, None),
        PermissionInfo::new(
            P::Plugin,
            "plugin",
            F::INTERNAL
                .union(F::IMPLIES_FULL_ACCESS)
                .union(F::IMPLIES_FULL_URL_ACCESS),
            Some(M::FullAccess),
        ),
        PermissionInfo::new(P::Privacy, "privacy", NONE, Some(M::Privacy)),
        PermissionInfo::new(P::Proxy, "proxy", F::IMPLIES_FULL_URL_ACCESS, None),
        PermissionInfo::new(P::Socket, "socket", F::ACCEPTS_PARAMETERS, None),
        PermissionInfo::new(P::Storage, "storage", NONE, None),
        PermissionInfo::new(P::SystemIndicator, "systemIndicator", NONE, None),
        PermissionInfo::new(P::Tabs, "tabs", NONE, Some(M::Tabs)),
        PermissionInfo::new(P::TopSites, "topSites", NONE, Some(M::TopSites)),
        PermissionInfo::new(P::Tts, "tts", NONE, None),
        PermissionInfo::new(P::TtsEngine, "ttsEngine", NONE, Some(M::TtsEngine)),
        PermissionInfo::new(P::UnlimitedStorage, "unlimitedStorage", NONE, None),
        PermissionInfo::new(P::WebConnectable, "webConnectable", F::INTERNAL, None),
        PermissionInfo::new(P::WebNavigation, "webNavigation", NONE, Some(M::Tabs)),
        PermissionInfo::new(P::WebRequest, "webRequest", NONE, None),
        PermissionInfo::new(P::WebRequestBlocking, "webRequestBlocking", NONE, None),
    ]
};

/// Legacy names accepted in manifests.
static ALIASES: &[(&str, ApiPermission)] = &[
    ("unlimited_storage", ApiPermission::UnlimitedStorage),
    ("windows", ApiPermission::Tabs),
];

static BY_NAME: Lazy<HashMap<&'static str, &'static PermissionInfo>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, &'static PermissionInfo> =
        PERMISSIONS.iter().map(|info| (info.name, info)).collect();
    for (alias, permission) in ALIASES {
        map.insert(*alias, permission.info());
    }
    map
});

impl ApiPermission {
    /// Resolve a manifest name or alias.
    pub fn from_name(name: &str) -> Option<ApiPermission> {
        BY_NAME.get(name).map(|info| info.permission)
    }

    pub fn info(self) -> &'static PermissionInfo {
        // The table is declared in enum order.
        &PERMISSIONS[self as usize]
    }

    /// Canonical manifest name.
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Every known permission.
    pub fn all() -> impl Iterator<Item = ApiPermission> {
        PERMISSIONS.iter().map(|info| info.permission)
    }
}

impl fmt::Display for ApiPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ApiPermission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Socket operations that a `socket` rule can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SocketOperation {
    TcpConnect,
    TcpListen,
    UdpBind,
    UdpSendTo,
    UdpMulticastMembership,
    ResolveHost,
    ResolveProxy,
    NetworkState,
}

impl SocketOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            SocketOperation::TcpConnect => "tcp-connect",
            SocketOperation::TcpListen => "tcp-listen",
            SocketOperation::UdpBind => "udp-bind",
            SocketOperation::UdpSendTo => "udp-send-to",
            SocketOperation::UdpMulticastMembership => "udp-multicast-membership",
            SocketOperation::ResolveHost => "resolve-host",
            SocketOperation::ResolveProxy => "resolve-proxy",
            SocketOperation::NetworkState => "network-state",
        }
    }

    pub fn from_name(name: &str) -> Option<SocketOperation> {
        let op = match name {
            "tcp-connect" => SocketOperation::TcpConnect,
            "tcp-listen" => SocketOperation::TcpListen,
            "udp-bind" => SocketOperation::UdpBind,
            "udp-send-to" => SocketOperation::UdpSendTo,
            "udp-multicast-membership" => SocketOperation::UdpMulticastMembership,
            "resolve-host" => SocketOperation::ResolveHost,
            "resolve-proxy" => SocketOperation::ResolveProxy,
            "network-state" => SocketOperation::NetworkState,
            _ => return None,
        };
        Some(op)
    }

    /// Whether rules for this operation carry a host and port.
    pub fn takes_address(self) -> bool {
        !matches!(
            self,
            SocketOperation::UdpMulticastMembership
                | SocketOperation::ResolveHost
                | SocketOperation::ResolveProxy
                | SocketOperation::NetworkState
        )
    }
}

/// One `op:host:port` entry of a `socket` permission. An empty host or a
/// missing port means "any".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketRule {
    operation: SocketOperation,
    host: String,
    match_subdomains: bool,
    port: Option<u16>,
}

impl SocketRule {
    pub fn parse(rule: &str) -> Option<SocketRule> {
        let tokens: Vec<&str> = rule.split(':').collect();
        let operation = SocketOperation::from_name(tokens.first()?)?;
        let mut parsed = SocketRule {
            operation,
            host: String::new(),
            match_subdomains: true,
            port: None,
        };

        if tokens.len() == 1 {
            return Some(parsed);
        }
        if !operation.takes_address() || tokens.len() > 3 {
            return None;
        }

        let host = tokens[1].trim().to_ascii_lowercase();
        if host != "*" {
            match host.strip_prefix("*.") {
                Some(domain) => parsed.host = domain.to_string(),
                None => {
                    parsed.host = host;
                    parsed.match_subdomains = false;
                }
            }
            if parsed.host.is_empty() || parsed.host.contains('*') {
                return None;
            }
        }

        if let Some(port) = tokens.get(2) {
            let port = port.trim();
            if port != "*" {
                parsed.port = Some(port.parse::<u16>().ok().filter(|p| *p > 0)?);
            }
        }
        Some(parsed)
    }

    pub fn operation(&self) -> SocketOperation {
        self.operation
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn match_subdomains(&self) -> bool {
        self.match_subdomains
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether this rule allows `operation` against `host:port`.
    pub fn allows(&self, operation: SocketOperation, host: &str, port: u16) -> bool {
        if self.operation != operation {
            return false;
        }
        if !self.operation.takes_address() {
            return true;
        }
        if self.port.is_some_and(|p| p != port) {
            return false;
        }
        let host = host.to_ascii_lowercase();
        if self.host.is_empty() {
            return true;
        }
        if host == self.host {
            return true;
        }
        self.match_subdomains && host.ends_with(&format!(".{}", self.host))
    }
}

impl fmt::Display for SocketRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation.as_str())?;
        if !self.operation.takes_address() {
            return Ok(());
        }
        f.write_str(":")?;
        match (self.host.is_empty(), self.match_subdomains) {
            (true, _) => f.write_str("*")?,
            (false, true) => write!(f, "*.{}", self.host)?,
            (false, false) => f.write_str(&self.host)?,
        }
        match self.port {
            Some(port) => write!(f, ":{}", port),
            None => f.write_str(":*"),
        }
    }
}

/// A concrete operation to check against a permission's parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck<'a> {
    Socket {
        operation: SocketOperation,
        host: &'a str,
        port: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_enum_order() {
        for (index, info) in PERMISSIONS.iter().enumerate() {
            assert_eq!(info.permission as usize, index, "{}", info.name);
            assert_eq!(info.permission.info().name, info.name);
        }
    }

    #[test]
    fn test_lookup_and_aliases() {
        assert_eq!(ApiPermission::from_name("tabs"), Some(ApiPermission::Tabs));
        assert_eq!(
            ApiPermission::from_name("unlimited_storage"),
            Some(ApiPermission::UnlimitedStorage)
        );
        assert_eq!(ApiPermission::from_name("windows"), Some(ApiPermission::Tabs));
        assert_eq!(ApiPermission::from_name("Tabs"), None);
        assert_eq!(ApiPermission::from_name("nonexistent"), None);
        assert_eq!(ApiPermission::UnlimitedStorage.name(), "unlimitedStorage");
    }

    #[test]
    fn test_flags() {
        assert!(ApiPermission::Plugin.info().is_internal());
        assert!(ApiPermission::Plugin.info().implies_full_access());
        assert!(ApiPermission::WebConnectable.info().is_internal());
        assert!(ApiPermission::ClipboardRead.info().must_be_optional());
        assert!(ApiPermission::Debugger.info().implies_full_url_access());
        assert!(ApiPermission::Socket.info().accepts_parameters());
        assert!(!ApiPermission::Tabs.info().accepts_parameters());
    }

    #[test]
    fn test_socket_rule_parse() {
        let rule = SocketRule::parse("tcp-connect:*.example.com:80").unwrap();
        assert_eq!(rule.operation(), SocketOperation::TcpConnect);
        assert_eq!(rule.host(), "example.com");
        assert!(rule.match_subdomains());
        assert_eq!(rule.port(), Some(80));
        assert_eq!(rule.to_string(), "tcp-connect:*.example.com:80");

        assert_eq!(SocketRule::parse("udp-bind").unwrap().to_string(), "udp-bind:*:*");
        assert_eq!(SocketRule::parse("resolve-host").unwrap().to_string(), "resolve-host");
        assert!(SocketRule::parse("resolve-host:foo").is_none());
        assert!(SocketRule::parse("tcp-connect:a:b:c").is_none());
        assert!(SocketRule::parse("tcp-connect:foo:99999").is_none());
        assert!(SocketRule::parse("tcp-connect:f*o:80").is_none());
        assert!(SocketRule::parse("teleport:foo:80").is_none());
    }

    #[test]
    fn test_socket_rule_allows() {
        let rule = SocketRule::parse("tcp-connect:*.example.com:80").unwrap();
        assert!(rule.allows(SocketOperation::TcpConnect, "www.example.com", 80));
        assert!(rule.allows(SocketOperation::TcpConnect, "example.com", 80));
        assert!(!rule.allows(SocketOperation::TcpConnect, "badexample.com", 80));
        assert!(!rule.allows(SocketOperation::TcpConnect, "www.example.com", 81));
        assert!(!rule.allows(SocketOperation::TcpListen, "www.example.com", 80));

        let exact = SocketRule::parse("udp-send-to:Host.Local:*").unwrap();
        assert!(exact.allows(SocketOperation::UdpSendTo, "host.local", 5353));
        assert!(!exact.allows(SocketOperation::UdpSendTo, "a.host.local", 5353));

        let any = SocketRule::parse("tcp-connect").unwrap();
        assert!(any.allows(SocketOperation::TcpConnect, "anything", 1));
    }
}
