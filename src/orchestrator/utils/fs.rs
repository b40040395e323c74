//! File system utilities for scratch state.
//!
//! These helpers are synchronous on purpose: they run from `stop()` and from
//! `Drop`, where no runtime is guaranteed to drive a future to completion.

use std::{
    fs,
    io::{self, ErrorKind},
    path::Path,
};

/// Creates all of the directories of the specified path.
///
/// Succeeds if the directory already exists.
pub fn create_dir_all(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Writes `contents` to `path`, replacing whatever was there before.
pub fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    fs::write(path, contents)
}

/// Deletes every file directly inside `dir`, then `dir` itself.
///
/// A missing directory is treated as already removed. Nested directories are
/// removed recursively.
pub fn remove_dir_and_files(dir: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()), // Idempotent
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let result = if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    match fs::remove_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
