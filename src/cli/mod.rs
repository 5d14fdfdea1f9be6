//! CLI commands for extmanifest.
//!
//! Developer tooling: check, id, match.

pub mod check;
pub mod id;
pub mod match_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::extensions::{CreationFlags, Location};

#[derive(Parser)]
#[command(name = "extmanifest")]
#[command(about = "Validate browser extension manifests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate an extension directory
    Check {
        /// Path to extension directory (default: current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Install location to load as (internal, unpacked, component, ...)
        #[arg(long, default_value = "unpacked")]
        location: Location,

        /// Reject manifests older than version 2
        #[arg(long)]
        require_modern: bool,

        /// Require a signing key in the manifest
        #[arg(long)]
        require_key: bool,

        /// Keep file:// access requested by the manifest
        #[arg(long)]
        allow_file_access: bool,

        /// Loader config file (default: the user config)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the id an extension directory would get
    Id {
        /// Path to extension directory (default: current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Test a URL against a match pattern
    Match {
        /// Pattern such as 'https://*.example.com/*' or '<all_urls>'
        pattern: String,

        /// URL to test
        url: String,
    },
}

/// Run the CLI. Returns Ok(false) when the command ran but the input failed
/// its check; the failure has already been printed.
pub fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            path,
            location,
            require_modern,
            require_key,
            allow_file_access,
            config,
            json,
        } => {
            let mut flags = CreationFlags::empty();
            flags.set(CreationFlags::REQUIRE_MODERN_MANIFEST_VERSION, require_modern);
            flags.set(CreationFlags::REQUIRE_KEY, require_key);
            flags.set(CreationFlags::ALLOW_FILE_ACCESS, allow_file_access);
            check::run_check(&check::CheckOptions {
                path,
                location,
                flags,
                config,
                json,
            })
        }
        Commands::Id { path } => id::run_id(&path),
        Commands::Match { pattern, url } => match_cmd::run_match(&pattern, &url),
    }
}
