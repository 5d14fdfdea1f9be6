//! Match command for `extmanifest match`.

use anyhow::{Context, Result};
use console::style;
use url::Url;

use crate::extensions::{SchemeMask, UrlPattern};

/// Parse `pattern` with every scheme allowed and test `url` against it.
pub fn run_match(pattern: &str, url: &str) -> Result<bool> {
    let parsed = UrlPattern::parse(SchemeMask::ALL, pattern)
        .map_err(|e| anyhow::anyhow!("Invalid pattern '{}': {}", pattern, e))?;
    let url = Url::parse(url).context(format!("Invalid URL: {}", url))?;

    let matched = parsed.matches_url(&url);
    if matched {
        println!(
            "{} {} matches {}",
            style("✓").green().bold(),
            style(&parsed).bold(),
            url
        );
    } else {
        println!(
            "{} {} does not match {}",
            style("✗").red().bold(),
            style(&parsed).bold(),
            url
        );
    }
    Ok(matched)
}
