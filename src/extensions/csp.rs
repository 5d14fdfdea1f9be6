//! Content security policy checks.
//!
//! Policies are only inspected, never enforced. A policy is split on `;`
//! into directives; each directive is a name followed by whitespace
//! separated source tokens.

use super::manifest::ExtensionType;

/// Policy applied to manifest v2 extensions that declare none.
pub const DEFAULT_CONTENT_SECURITY_POLICY: &str =
    "script-src 'self' chrome-extension-resource:; object-src 'self'";

/// Policy applied to platform apps that declare none.
pub const DEFAULT_PLATFORM_APP_CONTENT_SECURITY_POLICY: &str = "default-src 'self' \
     chrome-extension-resource:;connect-src *;style-src 'self' data: \
     chrome-extension-resource: 'unsafe-inline';img-src 'self' data: \
     chrome-extension-resource:;frame-src 'self' data: chrome-extension-resource:;font-src \
     'self' data: chrome-extension-resource:;media-src *;";

/// Policy applied to sandboxed pages that declare none.
pub const DEFAULT_SANDBOXED_PAGE_CONTENT_SECURITY_POLICY: &str =
    "sandbox allow-scripts allow-forms allow-popups";

const DEFAULT_SRC: &str = "default-src";
const SCRIPT_SRC: &str = "script-src";
const OBJECT_SRC: &str = "object-src";
const SANDBOX: &str = "sandbox";
const ALLOW_SAME_ORIGIN: &str = "allow-same-origin";
const ALLOW_TOP_NAVIGATION: &str = "allow-top-navigation";

const SECURE_SOURCES: &[&str] = &[
    "'self'",
    "'none'",
    "http://127.0.0.1",
    "blob:",
    "filesystem:",
    "http://localhost",
];

const SECURE_SOURCE_PREFIXES: &[&str] = &[
    "http://127.0.0.1:",
    "http://localhost:",
    "https://",
    "chrome://",
    "chrome-extension://",
    "chrome-extension-resource:",
];

/// A policy is legal when it contains none of `,`, `\r`, `\n` or `\0`.
pub fn content_security_policy_is_legal(policy: &str) -> bool {
    !policy.contains([',', '\r', '\n', '\0'])
}

/// Whether `policy` restricts both scripts and objects to secure sources,
/// either directly or through `default-src`.
pub fn content_security_policy_is_secure(policy: &str, extension_type: ExtensionType) -> bool {
    let mut script_src: Option<bool> = None;
    let mut object_src: Option<bool> = None;
    let mut default_src: Option<bool> = None;

    for (name, sources) in directives(policy) {
        let slot = match name.as_str() {
            DEFAULT_SRC => &mut default_src,
            SCRIPT_SRC => &mut script_src,
            OBJECT_SRC => &mut object_src,
            _ => continue,
        };
        // Only the first occurrence of a directive counts.
        if slot.is_none() {
            *slot = Some(sources.iter().all(|s| is_secure_source(s, extension_type)));
        }
    }

    if script_src == Some(false) || object_src == Some(false) {
        return false;
    }
    if default_src == Some(false) {
        return script_src.is_some() && object_src.is_some();
    }
    default_src.is_some() || (script_src.is_some() && object_src.is_some())
}

/// Whether `policy` sandboxes the page without granting same-origin access.
/// Platform apps additionally may not allow top navigation.
pub fn content_security_policy_is_sandboxed(
    policy: &str,
    extension_type: ExtensionType,
) -> bool {
    let mut seen_sandbox = false;
    for (name, sources) in directives(policy) {
        if name != SANDBOX {
            continue;
        }
        seen_sandbox = true;
        for token in &sources {
            let token = token.to_ascii_lowercase();
            if token == ALLOW_SAME_ORIGIN {
                return false;
            }
            if token == ALLOW_TOP_NAVIGATION && extension_type == ExtensionType::PlatformApp {
                return false;
            }
        }
    }
    seen_sandbox
}

fn directives(policy: &str) -> impl Iterator<Item = (String, Vec<&str>)> {
    policy.split(';').filter_map(|directive| {
        let mut tokens = directive.split_whitespace();
        let name = tokens.next()?.to_ascii_lowercase();
        Some((name, tokens.collect()))
    })
}

fn is_secure_source(source: &str, extension_type: ExtensionType) -> bool {
    let source = source.to_ascii_lowercase();
    if SECURE_SOURCES.contains(&source.as_str()) {
        return true;
    }
    if SECURE_SOURCE_PREFIXES.iter().any(|p| source.starts_with(p)) {
        return true;
    }
    source == "'unsafe-eval'"
        && matches!(
            extension_type,
            ExtensionType::Extension | ExtensionType::LegacyPackagedApp
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXT: ExtensionType = ExtensionType::Extension;

    #[test]
    fn test_legal() {
        assert!(content_security_policy_is_legal("default-src 'self'"));
        assert!(content_security_policy_is_legal(""));
        assert!(!content_security_policy_is_legal("a, b"));
        assert!(!content_security_policy_is_legal("a\nb"));
        assert!(!content_security_policy_is_legal("a\rb"));
        assert!(!content_security_policy_is_legal("a\0b"));
    }

    #[test]
    fn test_secure() {
        assert!(!content_security_policy_is_secure("", EXT));
        assert!(content_security_policy_is_secure("default-src 'self'", EXT));
        assert!(!content_security_policy_is_secure("script-src 'self'", EXT));
        assert!(content_security_policy_is_secure(
            "script-src 'self'; object-src 'none'",
            EXT
        ));
        assert!(!content_security_policy_is_secure("default-src *", EXT));
        assert!(content_security_policy_is_secure(
            "default-src *; script-src 'self'; object-src 'self'",
            EXT
        ));
        assert!(!content_security_policy_is_secure(
            "default-src 'self'; script-src http://evil.com",
            EXT
        ));
        assert!(content_security_policy_is_secure(
            "default-src 'self' https://cdn.example.com http://localhost:8080",
            EXT
        ));
        assert!(content_security_policy_is_secure(
            "DEFAULT-SRC 'SELF'",
            EXT
        ));
    }

    #[test]
    fn test_first_directive_wins() {
        assert!(content_security_policy_is_secure(
            "default-src 'self'; default-src *",
            EXT
        ));
        assert!(!content_security_policy_is_secure(
            "default-src *; default-src 'self'",
            EXT
        ));
    }

    #[test]
    fn test_unsafe_eval_depends_on_type() {
        let policy = "default-src 'self' 'unsafe-eval'";
        assert!(content_security_policy_is_secure(policy, ExtensionType::Extension));
        assert!(content_security_policy_is_secure(
            policy,
            ExtensionType::LegacyPackagedApp
        ));
        assert!(!content_security_policy_is_secure(policy, ExtensionType::PlatformApp));
    }

    #[test]
    fn test_defaults_are_secure() {
        assert!(content_security_policy_is_secure(DEFAULT_CONTENT_SECURITY_POLICY, EXT));
        assert!(content_security_policy_is_secure(
            DEFAULT_PLATFORM_APP_CONTENT_SECURITY_POLICY,
            ExtensionType::PlatformApp
        ));
        assert!(content_security_policy_is_legal(
            DEFAULT_PLATFORM_APP_CONTENT_SECURITY_POLICY
        ));
    }

    #[test]
    fn test_sandboxed() {
        assert!(content_security_policy_is_sandboxed(
            DEFAULT_SANDBOXED_PAGE_CONTENT_SECURITY_POLICY,
            EXT
        ));
        assert!(content_security_policy_is_sandboxed("sandbox", EXT));
        assert!(!content_security_policy_is_sandboxed("default-src 'self'", EXT));
        assert!(!content_security_policy_is_sandboxed(
            "sandbox allow-same-origin",
            EXT
        ));
        assert!(content_security_policy_is_sandboxed(
            "sandbox allow-top-navigation",
            EXT
        ));
        assert!(!content_security_policy_is_sandboxed(
            "sandbox allow-top-navigation",
            ExtensionType::PlatformApp
        ));
    }
}
