//! Extension manifest model.
//!
//! Parses and validates extension manifests into immutable [`Extension`]
//! values, and answers permission questions about them at runtime.
//!
//! # Architecture
//!
//! ```text
//! ExtensionLoader
//! ├── config: LoaderConfig (channel, host version, switches, whitelist)
//! ├── registry: RegistryDomains
//! ├── permission_features / manifest_features: FeatureProvider
//! ├── localizer: Localizer
//! └── resources: ResourceLocator
//!
//! Extension
//! ├── id, version, name, app info, content scripts, ...
//! ├── required / optional permissions: PermissionSet
//! └── active permissions + per-tab grants (behind one lock)
//! ```
//!
//! URL matching is built on [`UrlPattern`] and [`UrlPatternSet`]; every
//! host grant, content script match and web extent is one of those.

pub mod content_script;
pub mod csp;
mod error;
pub mod extension;
pub mod id;
pub mod l10n;
pub mod loader;
pub mod manifest;
pub mod pattern_set;
pub mod permissions;
pub mod registry;
pub mod resource;
pub mod url_pattern;
pub mod version;

pub use content_script::{ContentScript, RunLocation, ScriptFile};
pub use error::{
    warnings, InstallWarning, ManifestError, ManifestResult, PermissionError, PermissionResult,
};
pub use extension::{
    ActionInfo, AppInfo, BackgroundInfo, Extension, ExternallyConnectable, LaunchContainer,
    NaClModuleInfo, PluginInfo, Requirements,
};
pub use id::{derive_id, ExtensionId};
pub use l10n::{Localizer, StaticLocalizer};
pub use loader::{CreationFlags, ExtensionLoader, MANIFEST_FILENAME};
pub use manifest::{ExtensionType, Location, ManifestDocument};
pub use pattern_set::UrlPatternSet;
pub use permissions::{
    ApiPermission, ApiPermissionSet, Channel, FeatureProvider, FeatureTable, PermissionMessage,
    PermissionSet,
};
pub use registry::RegistryDomains;
pub use resource::{DefaultResourceLocator, ExtensionResource, ResourceLocator};
pub use url_pattern::{ParseError, SchemeMask, UrlPattern};
pub use version::Version;
