//! Scratch entry files consumed by the framework packager.
//!
//! The packager compiles one small stub module per platform as its root. The
//! orchestrator owns the directory holding these stubs: it writes them before
//! the first build, refreshes them after every module bundler build, and deletes
//! them together with the directory on teardown.

use super::settings::Platform;
use super::utils::fs;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// Statement every scratch entry starts with.
pub const ENTRY_PRELUDE: &str = "global.React = require(\"react-native\");";

/// Builds the source of a scratch entry.
///
/// `required` lists framework modules the application build uses; each gets an
/// explicit `require` so the packager includes modules outside its main
/// dependency tree.
pub fn entry_source(required: &BTreeSet<String>) -> String {
    let mut source = String::from(ENTRY_PRELUDE);
    source.push('\n');
    for module in required {
        source.push_str(&format!("require({:?});\n", module));
    }
    source
}

/// Owner of the scratch entry directory.
#[derive(Debug, Clone)]
pub struct ScratchEntries {
    dir: PathBuf,
    platforms: Vec<Platform>,
}

impl ScratchEntries {
    /// Creates a manager for `dir` serving `platforms`. Nothing is written yet.
    pub fn new(dir: impl Into<PathBuf>, platforms: impl IntoIterator<Item = Platform>) -> Self {
        Self {
            dir: dir.into(),
            platforms: platforms.into_iter().collect(),
        }
    }

    /// Directory holding the entry files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry file for `platform`.
    pub fn path_for(&self, platform: Platform) -> PathBuf {
        self.dir.join(format!("{}.js", platform.scratch_entry_name()))
    }

    /// Ensures the directory exists and overwrites the entry for `platform`.
    pub fn write(&self, platform: Platform, content: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write_file(&self.path_for(platform), content)
    }

    /// Writes `content` for every served platform.
    ///
    /// Stops at the first failure. Callers must then treat the whole batch as
    /// failed; files written earlier in the batch may hold the new content.
    pub fn write_all(&self, content: &str) -> io::Result<()> {
        for platform in &self.platforms {
            self.write(*platform, content)?;
        }
        log::debug!(
            "Wrote {} scratch entries to {}",
            self.platforms.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Writes an auxiliary file next to the entries (removed by [`cleanup`](Self::cleanup)).
    pub fn write_aux(&self, file_name: &str, content: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write_file(&path, content)?;
        Ok(path)
    }

    /// Deletes every file in the directory, then the directory.
    ///
    /// Synchronous and idempotent; a missing directory counts as success.
    pub fn cleanup(&self) -> io::Result<()> {
        fs::remove_dir_and_files(&self.dir)
    }
}
