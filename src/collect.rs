//! Build a [`Store`] from files on the host.
//!
//! This is the data half of asset generation: `embedfs pack` serializes the result as a
//! [`Manifest`](crate::manifest::Manifest).

use std::fs;
use std::io;
use std::path::{Component, Path};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::fsx;
use crate::store::{Entry, Store};

/// Walk each of `inputs` (relative to `root`, or absolute paths below it) and record
/// every directory and regular file, keyed by its `/`-separated path relative to `root`.
///
/// Directories between `root` and an input are recorded too, so the input is reachable
/// by `read_dir` from the store root. Symlinks are skipped. A missing input is
/// [`Error::NotFound`].
pub fn collect<P: AsRef<Path>>(root: &Path, inputs: &[P]) -> Result<Store> {
    let mut store = Store::new();
    for input in inputs {
        let input = root.join(input.as_ref());
        if fs::symlink_metadata(&input).is_err() {
            return Err(Error::not_found(input.display().to_string()));
        }
        record_ancestors(&mut store, root, &input)?;

        for dir_entry in WalkDir::new(&input).follow_links(false).sort_by_file_name() {
            let dir_entry = dir_entry.map_err(|e| {
                let path = e.path().unwrap_or(&input).to_path_buf();
                Error::io(path, io::Error::from(e))
            })?;
            let file_type = dir_entry.file_type();
            if file_type.is_symlink() || !(file_type.is_dir() || file_type.is_file()) {
                tracing::debug!(path = %dir_entry.path().display(), "skipping non-regular file");
                continue;
            }
            let key = store_key(root, dir_entry.path())?;
            if key.is_empty() {
                continue;
            }
            let metadata = dir_entry.metadata().map_err(|e| {
                Error::io(dir_entry.path(), io::Error::from(e))
            })?;
            store.insert(entry_for(&key, dir_entry.path(), &metadata)?);
        }
    }
    tracing::debug!(root = %root.display(), entries = store.len(), "collected files");
    Ok(store)
}

fn record_ancestors(store: &mut Store, root: &Path, input: &Path) -> Result<()> {
    let mut dirs: Vec<&Path> = input
        .ancestors()
        .skip(1)
        .take_while(|dir| dir.starts_with(root) && *dir != root)
        .collect();
    dirs.reverse();
    for dir in dirs {
        let key = store_key(root, dir)?;
        if key.is_empty() || store.contains(&key) {
            continue;
        }
        let metadata = fs::metadata(dir).map_err(|e| Error::io(dir, e))?;
        store.insert(entry_for(&key, dir, &metadata)?);
    }
    Ok(())
}

fn entry_for(key: &str, path: &Path, metadata: &fs::Metadata) -> Result<Entry> {
    let perm = fsx::permission_bits(metadata);
    let mod_time = metadata.modified().map_err(|e| Error::io(path, e))?;
    if metadata.is_dir() {
        return Ok(Entry::dir(key, perm, mod_time));
    }
    let content = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(Entry::file(key, perm, mod_time, content))
}

/// `path` relative to `root`, joined with `/`. `..` and prefixes are rejected.
fn store_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, format!("not below {}", root.display())),
        )
    })?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(Error::io(
                    path,
                    io::Error::new(io::ErrorKind::InvalidInput, "path leaves the collection root"),
                ))
            }
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::FileSystem;

    #[test]
    fn collects_tree_with_forward_slashes() -> Result<()> {
        let dir = tempfile::tempdir().map_err(|e| Error::io("tempdir", e))?;
        let root = dir.path();
        let write = |rel: &str, content: &str| -> Result<()> {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap_or(root)).map_err(|e| Error::io(&path, e))?;
            fs::write(&path, content).map_err(|e| Error::io(&path, e))
        };
        write("assets/asset1.txt", "asset1")?;
        write("assets/subdir/subdirasset1.txt", "sub")?;
        write("file.txt", "file.txt")?;

        let store = collect(root, &["assets", "file.txt"])?;
        let keys: Vec<&str> = store.iter().map(|e| e.path()).collect();
        assert_eq!(
            keys,
            ["assets", "assets/asset1.txt", "assets/subdir", "assets/subdir/subdirasset1.txt", "file.txt"]
        );
        assert!(store.get("assets/subdir")?.is_dir());

        let vfs = FileSystem::new(store);
        assert_eq!(vfs.read_file("assets/subdir/subdirasset1.txt")?, b"sub");
        Ok(())
    }

    #[test]
    fn nested_input_records_parent_directories() -> Result<()> {
        let dir = tempfile::tempdir().map_err(|e| Error::io("tempdir", e))?;
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).map_err(|e| Error::io(&nested, e))?;
        fs::write(nested.join("c.txt"), "c").map_err(|e| Error::io(&nested, e))?;

        let store = collect(dir.path(), &["a/b/c.txt"])?;
        assert!(store.get("a")?.is_dir());
        assert!(store.get("a/b")?.is_dir());
        assert_eq!(store.children("a/b").len(), 1);
        Ok(())
    }

    #[test]
    fn missing_input_is_not_found() -> Result<()> {
        let dir = tempfile::tempdir().map_err(|e| Error::io("tempdir", e))?;
        let err = collect(dir.path(), &["nope"]).err();
        assert!(matches!(err, Some(ref e) if e.is_not_found()));
        Ok(())
    }
}
