//! extmanifest - extension manifest parsing, validation and permissions.
//!
//! Turns a browser-extension manifest into an immutable, validated
//! [`Extension`] and answers permission questions about it.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`config`] - Loader configuration (channel, host version, switches)
//! - [`extensions`] - URL patterns, permissions, the manifest loader and
//!   the loaded [`Extension`]
//! - [`cli`] - The `extmanifest` command line
//!
//! # Example
//!
//! ```ignore
//! use extmanifest::{CreationFlags, ExtensionLoader, Location};
//!
//! let loader = ExtensionLoader::new(extmanifest::LoaderConfig::load());
//! let extension = loader.load_from_dir(path, Location::Unpacked, CreationFlags::empty())?;
//! println!("{} {}", extension.id(), extension.name());
//! ```

// Public modules
pub mod cli;
pub mod config;
pub mod extensions;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ConfigResult, LoaderConfig, ScriptingWhitelist, Switches};
pub use extensions::{
    ApiPermission, CreationFlags, Extension, ExtensionId, ExtensionLoader, ExtensionType,
    Location, ManifestError, ManifestResult, PermissionError, PermissionSet, UrlPattern,
    UrlPatternSet,
};
