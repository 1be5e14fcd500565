//! Debug passthrough: the same operations served from the host filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::base_name;

use super::Metadata;

/// Map a normalized store key onto the host below `root`, using host separators.
pub(super) fn host_path(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

fn map_err(key: &str, path: &Path, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::not_found(key)
    } else {
        Error::io(path, err)
    }
}

fn display_name(key: &str, path: &Path) -> String {
    if key.is_empty() {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string())
    } else {
        base_name(key).to_string()
    }
}

pub(super) fn stat(root: &Path, key: &str) -> Result<Metadata> {
    let path = host_path(root, key);
    let metadata = fs::metadata(&path).map_err(|e| map_err(key, &path, e))?;
    Ok(Metadata::from_host(display_name(key, &path), &metadata))
}

pub(super) fn open(root: &Path, key: &str) -> Result<(fs::File, Metadata)> {
    let path = host_path(root, key);
    let file = fs::File::open(&path).map_err(|e| map_err(key, &path, e))?;
    let metadata = file.metadata().map_err(|e| Error::io(&path, e))?;
    Ok((file, Metadata::from_host(display_name(key, &path), &metadata)))
}

pub(super) fn read_dir(root: &Path, key: &str, strict: bool) -> Result<Vec<Metadata>> {
    let mut path = host_path(root, key);
    let metadata = fs::metadata(&path).map_err(|e| map_err(key, &path, e))?;
    if !metadata.is_dir() {
        if strict {
            return Err(Error::NotADirectory { path: key.to_string() });
        }
        // Same file-lists-its-directory behaviour as the embedded store.
        path = match path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => root.to_path_buf(),
        };
    }

    let mut list = Vec::new();
    for dir_entry in fs::read_dir(&path).map_err(|e| map_err(key, &path, e))? {
        let dir_entry = dir_entry.map_err(|e| Error::io(&path, e))?;
        // A file removed between listing and stat is skipped.
        let metadata = match dir_entry.metadata() {
            Ok(md) => md,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::io(dir_entry.path(), e)),
        };
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        list.push(Metadata::from_host(name, &metadata));
    }
    list.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(list)
}
