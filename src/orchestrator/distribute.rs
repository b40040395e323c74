//! Writes final bundles to disk through a running orchestrator.
//!
//! Used by the `bundle` command: the orchestrator composes the artifacts as it
//! would for a device, and each platform's result is saved at its bundle path.

use super::error::RequestError;
use super::settings::{Config, Platform};
use super::utils::{fs, http::Fetcher};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure while producing a distribution bundle.
#[derive(Error, Debug)]
pub enum DistributeError {
    /// The orchestrator answered with an error.
    #[error(transparent)]
    Fetch(#[from] RequestError),

    /// The artifact could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Destination
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No entry configured for a requested platform.
    #[error("platform {0} is not served")]
    NotServed(Platform),
}

/// How the bundle is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributeOptions {
    /// Production build (`dev=false&minify=true`)
    pub optimize: bool,
    /// Also write `<bundle path>.map`
    pub source_map: bool,
}

impl Default for DistributeOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            source_map: false,
        }
    }
}

impl DistributeOptions {
    /// Query string sent for `platform`.
    pub fn query(&self, platform: Platform) -> String {
        format!(
            "platform={}&dev={}&minify={}",
            platform, !self.optimize, self.optimize
        )
    }
}

/// Path of the source map written next to `bundle_path`.
pub fn source_map_path(bundle_path: &Path) -> PathBuf {
    let mut path = bundle_path.as_os_str().to_owned();
    path.push(".map");
    PathBuf::from(path)
}

/// Fetches each `(platform, path)` target from the orchestrator at `addr` and
/// writes it, creating parent directories.
///
/// Returns every file written.
///
/// # Errors
///
/// Stops at the first failed fetch or write.
pub async fn write_bundles(
    addr: SocketAddr,
    config: &Config,
    targets: &[(Platform, PathBuf)],
    options: DistributeOptions,
) -> Result<Vec<PathBuf>, DistributeError> {
    let fetcher = Fetcher::new();
    let mut written = Vec::new();

    for (platform, bundle_path) in targets {
        let entry = config
            .entry_for(*platform)
            .ok_or(DistributeError::NotServed(*platform))?;
        let query = options.query(*platform);

        let bundle = fetcher
            .fetch(&format!("http://{}/{}.bundle?{}", addr, entry, query))
            .await?;
        save(bundle_path, &bundle)?;
        log::info!("Wrote {} bundle to {}", platform, bundle_path.display());
        written.push(bundle_path.clone());

        if options.source_map {
            let map = fetcher
                .fetch(&format!("http://{}/{}.map?{}", addr, entry, query))
                .await?;
            let map_path = source_map_path(bundle_path);
            save(&map_path, &map)?;
            log::info!("Wrote {} source map to {}", platform, map_path.display());
            written.push(map_path);
        }
    }

    Ok(written)
}

fn save(path: &Path, content: &str) -> Result<(), DistributeError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write_file(path, content)
    };
    write().map_err(|source| DistributeError::Write {
        path: path.to_path_buf(),
        source,
    })
}
