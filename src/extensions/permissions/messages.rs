//! Install-time permission warnings.

use std::fmt;

use serde::Serialize;

/// Identifies a warning. Messages sort and de-duplicate by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMessageId {
    Bookmarks,
    Geolocation,
    BrowsingHistory,
    Tabs,
    Management,
    Debugger,
    Hosts1,
    Hosts2,
    Hosts3,
    Hosts4OrMore,
    HostsAll,
    FullAccess,
    Clipboard,
    TtsEngine,
    ContentSettings,
    Privacy,
    Downloads,
    SocketAnyHost,
    SocketDomainHosts,
    SocketSpecificHosts,
    TopSites,
}

impl PermissionMessageId {
    /// Fixed text for ids that take no arguments.
    pub fn static_text(self) -> Option<&'static str> {
        use PermissionMessageId::*;
        let text = match self {
            Bookmarks => "Read and modify your bookmarks",
            Geolocation => "Detect your physical location",
            BrowsingHistory => "Read and modify your browsing history",
            Tabs => "Access your tabs and browsing activity",
            Management => "Manage your apps, extensions, and themes",
            Debugger => "Access the page debugger backend",
            HostsAll => "Read and modify all your data on all websites",
            Hosts4OrMore => "Read and modify your data on a number of websites",
            FullAccess => "Read and modify all data on your computer and the websites you visit",
            Clipboard => "Read data you copy and paste",
            TtsEngine => "Read all text spoken using synthesized speech",
            ContentSettings => {
                "Manipulate settings that specify whether websites can use features such as \
                 cookies, JavaScript, and plug-ins"
            }
            Privacy => "Manipulate privacy-related settings",
            Downloads => "Manage your downloads",
            SocketAnyHost => "Exchange data with any computer on the local network or internet",
            TopSites => "Read a list of your most frequently visited websites",
            Hosts1 | Hosts2 | Hosts3 | SocketDomainHosts | SocketSpecificHosts => return None,
        };
        Some(text)
    }
}

/// One warning shown before granting a permission set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PermissionMessage {
    id: PermissionMessageId,
    message: String,
}

impl PermissionMessage {
    pub fn new(id: PermissionMessageId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }

    /// Message for an id with fixed text.
    pub fn for_id(id: PermissionMessageId) -> Option<Self> {
        id.static_text().map(|text| Self::new(id, text))
    }

    /// Host access message for a list of display hosts.
    pub fn for_hosts(hosts: &[String]) -> Option<Self> {
        let message = match hosts {
            [] => return None,
            [a] => Self::new(
                PermissionMessageId::Hosts1,
                format!("Read and modify your data on {}", a),
            ),
            [a, b] => Self::new(
                PermissionMessageId::Hosts2,
                format!("Read and modify your data on {} and {}", a, b),
            ),
            [a, b, c] => Self::new(
                PermissionMessageId::Hosts3,
                format!("Read and modify your data on {}, {}, and {}", a, b, c),
            ),
            _ => Self::for_id(PermissionMessageId::Hosts4OrMore)?,
        };
        Some(message)
    }

    pub fn id(&self) -> PermissionMessageId {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PermissionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_host_message_arity() {
        assert!(PermissionMessage::for_hosts(&[]).is_none());
        assert_eq!(
            PermissionMessage::for_hosts(&hosts(&["a.com"])).unwrap().message(),
            "Read and modify your data on a.com"
        );
        assert_eq!(
            PermissionMessage::for_hosts(&hosts(&["a.com", "b.com"])).unwrap().id(),
            PermissionMessageId::Hosts2
        );
        assert_eq!(
            PermissionMessage::for_hosts(&hosts(&["a.com", "b.com", "c.com"]))
                .unwrap()
                .message(),
            "Read and modify your data on a.com, b.com, and c.com"
        );
        assert_eq!(
            PermissionMessage::for_hosts(&hosts(&["a", "b", "c", "d"])).unwrap().id(),
            PermissionMessageId::Hosts4OrMore
        );
    }

    #[test]
    fn test_static_texts() {
        assert!(PermissionMessage::for_id(PermissionMessageId::Tabs).is_some());
        assert!(PermissionMessage::for_id(PermissionMessageId::Hosts1).is_none());
    }
}
