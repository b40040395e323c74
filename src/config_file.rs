//! Loading of the user's module bundler configuration file.
//!
//! The file is TOML. Apart from the `externals` list, which names modules the
//! framework bundle always supplies, its contents are opaque here and handed to
//! the module bundler as-is.

use crate::error::Result;
use crate::orchestrator::StartupError;
use anyhow::Context;
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "bundler.toml";

/// Parsed bundler configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundlerConfigFile {
    /// Opaque settings for the module bundler (without `externals`)
    pub table: toml::Table,
    /// Additional external module names
    pub externals: Vec<String>,
}

/// Load the bundler configuration file at `path` (single read + parse).
///
/// # Errors
///
/// - [`StartupError::Configuration`] if the file does not exist
/// - a TOML error if it is not valid TOML or `externals` is not a list of strings
pub fn load_bundler_config(path: &Path) -> Result<BundlerConfigFile> {
    if !path.is_file() {
        log::debug!("Bundler config not found at {}", path.display());
        return Err(StartupError::Configuration(format!(
            "Must specify --config or create ./{}",
            DEFAULT_CONFIG_FILE
        ))
        .into());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_bundler_config(&text)
}

/// Parses bundler configuration text.
pub fn parse_bundler_config(text: &str) -> Result<BundlerConfigFile> {
    let mut table: toml::Table = toml::from_str(text)?;

    let externals = match table.remove("externals") {
        Some(value) => {
            let names: Vec<String> = value.try_into()?;
            names
        }
        None => Vec::new(),
    };

    Ok(BundlerConfigFile { table, externals })
}
