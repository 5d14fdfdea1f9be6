//! Check command for `extmanifest check`.
//!
//! Loads an extension directory and prints what the loader made of it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use serde_json::{json, Value};

use crate::config::LoaderConfig;
use crate::extensions::{CreationFlags, Extension, ExtensionLoader, Location};

pub struct CheckOptions {
    pub path: String,
    pub location: Location,
    pub flags: CreationFlags,
    pub config: Option<PathBuf>,
    pub json: bool,
}

/// Load and validate an extension directory.
pub fn run_check(options: &CheckOptions) -> Result<bool> {
    let ext_dir = PathBuf::from(&options.path)
        .canonicalize()
        .context(format!("Extension directory not found: {}", options.path))?;

    let config = match &options.config {
        Some(path) => LoaderConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LoaderConfig::load(),
    };
    let loader = ExtensionLoader::new(config);

    let extension = match loader.load_from_dir(&ext_dir, options.location, options.flags) {
        Ok(extension) => extension,
        Err(e) => {
            if options.json {
                let failure = json!({"valid": false, "error": e.to_string()});
                println!("{}", serde_json::to_string_pretty(&failure)?);
            } else {
                eprintln!("{} {}", style("✗").red().bold(), e);
            }
            return Ok(false);
        }
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report(&extension))?);
    } else {
        print_report(&extension);
    }
    Ok(true)
}

/// Machine-readable summary of a loaded extension.
pub fn report(extension: &Extension) -> Value {
    let active = extension.active_permissions();
    json!({
        "valid": true,
        "id": extension.id(),
        "name": extension.name(),
        "version": extension.version_string(),
        "manifest_version": extension.manifest_version(),
        "type": extension.extension_type(),
        "location": extension.location(),
        "permissions": active.apis().names(),
        "hosts": active.explicit_hosts().to_strings(),
        "scriptable_hosts": active.scriptable_hosts().to_strings(),
        "permission_messages": extension.permission_message_strings(),
        "install_warnings": extension
            .install_warnings()
            .iter()
            .map(|w| w.message.as_str())
            .collect::<Vec<_>>(),
    })
}

fn print_report(extension: &Extension) {
    println!(
        "{} {} {}",
        style("✓").green().bold(),
        style(extension.name()).bold(),
        style(extension.version_string()).dim()
    );
    println!("  {} {}", style("id:").cyan(), extension.id());
    println!("  {} {}", style("type:").cyan(), extension.extension_type());
    println!("  {} {}", style("location:").cyan(), extension.location());

    let active = extension.active_permissions();
    let apis = active.apis().names();
    if !apis.is_empty() {
        println!("  {} {}", style("permissions:").cyan(), apis.join(", "));
    }
    let hosts = active.effective_hosts().to_strings();
    if !hosts.is_empty() {
        println!("  {} {}", style("hosts:").cyan(), hosts.join(", "));
    }

    let messages = extension.permission_message_strings();
    if !messages.is_empty() {
        println!();
        println!("{}", style("Install prompt:").cyan().bold());
        for message in messages {
            println!("  {} {}", style("•").dim(), message);
        }
    }

    let warnings = extension.install_warnings();
    if !warnings.is_empty() {
        println!();
        println!("{}", style("Warnings:").yellow().bold());
        for warning in warnings {
            println!("  {} {}", style("!").yellow(), warning);
        }
    }
}
