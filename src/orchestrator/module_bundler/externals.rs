//! Discovery of module names the framework packager supplies.
//!
//! The module bundler must leave these modules as plain `require` calls so the
//! framework bundle satisfies them at runtime. How the names are discovered is
//! pluggable through [`ExternalsResolver`].

use crate::orchestrator::error::StartupError;
use crate::orchestrator::settings::Config;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// Haste module declaration in a file header.
static PROVIDES_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@providesModule\s+([A-Za-z0-9_$.\-]+)").expect("static regex is valid")
});

/// Header bytes scanned for a Haste declaration.
const HEADER_LEN: usize = 2048;

/// Computes the set of module names the framework backend will supply.
pub trait ExternalsResolver: Send + Sync {
    /// Returns the external module names for `config`.
    fn resolve_external_module_names(&self, config: &Config)
    -> Result<BTreeSet<String>, StartupError>;
}

/// Turns module names into the bundler externals map (`name -> commonjs name`).
pub fn externals_map(names: &BTreeSet<String>) -> BTreeMap<String, String> {
    names
        .iter()
        .map(|name| (name.clone(), format!("commonjs {}", name)))
        .collect()
}

/// Externals of the framework package installed in the project.
///
/// Always includes the package itself. With Haste externals enabled, every
/// module under the package directory that declares `@providesModule <Name>`
/// is added as well.
#[derive(Debug, Clone)]
pub struct FrameworkExternals {
    package_name: String,
    package_dir: PathBuf,
    extra: BTreeSet<String>,
}

impl FrameworkExternals {
    /// Resolver for `package_name` installed at `package_dir`.
    pub fn new(package_name: impl Into<String>, package_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_name: package_name.into(),
            package_dir: package_dir.into(),
            extra: BTreeSet::new(),
        }
    }

    /// Resolver for `react-native` under `<project_root>/node_modules`.
    pub fn react_native(project_root: &Path) -> Self {
        Self::new(
            "react-native",
            project_root.join("node_modules").join("react-native"),
        )
    }

    /// Adds names that are always external.
    pub fn with_extra(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.extra.extend(names);
        self
    }

    fn scan_haste_modules(&self) -> Result<BTreeSet<String>, StartupError> {
        if !self.package_dir.is_dir() {
            return Err(StartupError::Configuration(format!(
                "framework package not found at {}",
                self.package_dir.display()
            )));
        }

        let mut names = BTreeSet::new();
        let walker = WalkDir::new(&self.package_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != "__tests__");

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable path while scanning externals: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("js")
            {
                continue;
            }
            if let Some(name) = read_provided_module(entry.path()) {
                names.insert(name);
            }
        }

        log::debug!(
            "Found {} Haste modules under {}",
            names.len(),
            self.package_dir.display()
        );
        Ok(names)
    }
}

fn read_provided_module(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let header = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_LEN)]);
    PROVIDES_MODULE
        .captures(&header)
        .map(|captures| captures[1].to_string())
}

impl ExternalsResolver for FrameworkExternals {
    fn resolve_external_module_names(
        &self,
        config: &Config,
    ) -> Result<BTreeSet<String>, StartupError> {
        let mut names = BTreeSet::from([self.package_name.clone()]);
        names.extend(self.extra.iter().cloned());

        if config.haste_externals() {
            names.extend(self.scan_haste_modules()?);
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::settings::{ConfigBuilder, Platform};

    fn config(haste: bool) -> Config {
        ConfigBuilder::new()
            .entry(Platform::Ios, "index.ios")
            .haste_externals(haste)
            .build()
            .unwrap()
    }

    #[test]
    fn package_is_always_external() {
        let resolver = FrameworkExternals::new("react-native", "/nonexistent")
            .with_extra(["lodash".to_string()]);
        let names = resolver.resolve_external_module_names(&config(false)).unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["lodash", "react-native"]
        );
    }

    #[test]
    fn scans_haste_declarations() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("node_modules").join("react-native");
        std::fs::create_dir_all(pkg.join("Libraries").join("__tests__")).unwrap();
        std::fs::write(
            pkg.join("Libraries").join("AdSupport.js"),
            "/**\n * @providesModule AdSupportIOS\n */\nmodule.exports = {};\n",
        )
        .unwrap();
        std::fs::write(
            pkg.join("Libraries").join("__tests__").join("Mock.js"),
            "/** @providesModule MockModule */",
        )
        .unwrap();
        std::fs::write(pkg.join("Libraries").join("plain.js"), "module.exports = 1;").unwrap();

        let names = FrameworkExternals::react_native(tmp.path())
            .resolve_external_module_names(&config(true))
            .unwrap();

        assert!(names.contains("AdSupportIOS"));
        assert!(names.contains("react-native"));
        assert!(!names.contains("MockModule"));
        assert_eq!(externals_map(&names)["AdSupportIOS"], "commonjs AdSupportIOS");
    }

    #[test]
    fn haste_scan_requires_installed_package() {
        let resolver = FrameworkExternals::new("react-native", "/nonexistent/react-native");
        assert!(matches!(
            resolver.resolve_external_module_names(&config(true)),
            Err(StartupError::Configuration(_))
        ));
    }
}
