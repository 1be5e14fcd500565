//! # Execution Cache
//!
//! Runs an embedded executable as a native subprocess. The entry is copied out to a
//! cache directory under a name derived from its identity:
//!
//! ```text
//! <signature>_<basename>        signature = entry mtime in nanoseconds since the epoch
//! ```
//!
//! Staging an entry goes through these steps:
//!
//! 1. **Resolve**: stat the entry; a missing entry or a directory fails before anything
//!    touches disk.
//! 2. **Identity**: derive the cache file name from the signature and base name.
//! 3. **Probe**: if that file exists, reuse it (cache hit).
//! 4. **Evict**: remove `<other signature>_<basename>` files left by older builds, and
//!    temporary files older than an hour left by interrupted extractions. Failures are
//!    logged and ignored.
//! 5. **Extract**: copy the entry to a temporary file in the cache directory and rename
//!    it into place, so another process never runs a half-written binary.
//!
//! [`Command`] then wraps the staged path. Unless caching is requested, the staged file
//! is deleted once the process has been waited for (or when the `Command` is dropped).

mod command;

pub use command::Command;

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{base_name, normalize_path};
use crate::vfs::FileSystem;

const TEMP_PREFIX: &str = ".embedfs-";

/// Temporary files older than this belong to an extraction that never finished.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Identity signature of an entry: its mtime in nanoseconds since the Unix epoch.
pub fn signature(mod_time: SystemTime) -> String {
    match mod_time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_nanos().to_string(),
        Err(before) => format!("-{}", before.duration().as_nanos()),
    }
}

fn is_signature(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Result of staging an entry on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staged {
    /// Host path of the extracted executable.
    pub path: PathBuf,
    /// True when an existing extraction was reused.
    pub hit: bool,
}

/// The directory embedded executables are staged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCache {
    dir: PathBuf,
}

impl ExecCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ExecCache { dir: dir.into() }
    }

    /// The user cache directory, or the temp directory if there is none.
    pub fn user_default() -> Self {
        Self::new(Config::default_cache_dir())
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Extract `path` from `vfs` into the cache, reusing a previous extraction with the
    /// same identity.
    pub fn stage(&self, vfs: &FileSystem, path: &str) -> Result<Staged> {
        let key = normalize_path(path);
        let metadata = vfs.stat(&key)?;
        if metadata.is_dir() {
            return Err(Error::io(
                key.to_string(),
                io::Error::new(io::ErrorKind::InvalidInput, "cannot execute a directory"),
            ));
        }
        let name = base_name(&key);
        let file_name = format!("{}_{}", signature(metadata.modified()), name);
        let exec_path = self.dir.join(&file_name);

        if exec_path.is_file() {
            tracing::debug!(entry = %key, path = %exec_path.display(), "exec cache hit");
            return Ok(Staged { path: exec_path, hit: true });
        }

        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        self.evict_stale(name, &file_name);

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| Error::io(&self.dir, e))?
            .into_temp_path();
        vfs.copy_file(&key, &temp)?;
        if let Err(err) = temp.persist(&exec_path) {
            // Another process may have renamed its own copy into place first.
            if !exec_path.is_file() {
                return Err(Error::io(&exec_path, err.error));
            }
        }
        tracing::debug!(entry = %key, path = %exec_path.display(), "extracted executable");
        Ok(Staged { path: exec_path, hit: false })
    }

    /// Stage `path` and wrap it in a [`Command`] with `args`.
    pub fn command<I, S>(&self, vfs: &FileSystem, path: &str, args: I) -> Result<Command>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let staged = self.stage(vfs, path)?;
        let mut command = Command::new(staged.path);
        command.args(args);
        Ok(command)
    }

    /// Remove `<signature>_<name>` files other than `keep`, and orphaned temporary
    /// files. Best effort.
    fn evict_stale(&self, name: &str, keep: &str) {
        let suffix = format!("_{name}");
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(dir = %self.dir.display(), error = %err, "cannot scan exec cache");
                return;
            }
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else { continue };
            if file_name == keep {
                continue;
            }
            let stale = file_name
                .strip_suffix(suffix.as_str())
                .map(is_signature)
                .unwrap_or(false);
            if !stale && !is_orphaned_temp(file_name, &entry) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => tracing::debug!(path = %entry.path().display(), "evicted stale file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "cannot evict stale executable")
                }
            }
        }
    }
}

fn is_orphaned_temp(file_name: &str, entry: &fs::DirEntry) -> bool {
    if !file_name.starts_with(TEMP_PREFIX) {
        return false;
    }
    let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > STALE_TEMP_AGE)
        .unwrap_or(false)
}

/// Stage `path` in the user cache directory and wrap it in a [`Command`].
pub fn command<I, S>(vfs: &FileSystem, path: &str, args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    ExecCache::user_default().command(vfs, path, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn signature_is_nanoseconds() {
        let t = UNIX_EPOCH + Duration::new(1_592_104_011, 42);
        assert_eq!(signature(t), "1592104011000000042");
        assert_eq!(signature(UNIX_EPOCH), "0");
        assert_eq!(signature(UNIX_EPOCH - Duration::from_nanos(5)), "-5");
    }

    #[test]
    fn signature_recognition() {
        assert!(is_signature("1592104011000000000"));
        assert!(is_signature("-5"));
        assert!(!is_signature(""));
        assert!(!is_signature("-"));
        assert!(!is_signature("12a"));
        assert!(!is_signature("foo"));
    }
}
