//! # Virtual Filesystem Façade
//!
//! A read-only, POSIX-flavoured API (`open`, `stat`, `read_dir`, `read_file`,
//! `copy_file`) over a [`Store`]. Every read goes through
//! [`compress::decode`](crate::compress::decode), so sizes and contents always describe
//! the decoded bytes whatever compression the store currently uses.
//!
//! With [`FsOptions::debug`] set, the store is bypassed and every call is served from
//! the host filesystem under [`FsOptions::debug_root`] (the working directory by
//! default), so asset edits show up without rebuilding. This is a development aid and
//! not a security boundary.

mod host;

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::compress::{self, Compression};
use crate::error::{Error, Result};
use crate::fsx;
use crate::store::{normalize_path, parent_of, Entry, Mode, Store};

/// Construction-time options for a [`FileSystem`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsOptions {
    /// Serve every call from the host filesystem instead of the store.
    pub debug: bool,
    /// Host directory that debug mode resolves paths against. `None` means the
    /// current working directory.
    pub debug_root: Option<PathBuf>,
    /// Make `read_dir` on a file fail with [`Error::NotADirectory`] instead of
    /// listing the file's siblings.
    pub strict_read_dir: bool,
}

impl FsOptions {
    fn host_root(&self) -> &Path {
        self.debug_root.as_deref().unwrap_or_else(|| Path::new("."))
    }
}

/// Describes one file or directory, as returned by `stat` and `read_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    name: String,
    size: u64,
    mode: Mode,
    modified: SystemTime,
}

impl Metadata {
    /// Metadata of an embedded entry. The size is the decoded length.
    ///
    /// Plain entries and entries recompressed through [`Store::compress`] carry that
    /// length. Entries stored already compressed (manifests, static data) do not, and
    /// their payload is fully decoded on every call to measure it.
    ///
    /// [`Store::compress`]: crate::store::Store::compress
    pub fn from_entry(entry: &Entry) -> Result<Self> {
        let size = match entry.decoded_len {
            Some(len) => len,
            None => compress::decode(entry)?.len() as u64,
        };
        Ok(Self::with_size(entry, size))
    }

    fn with_size(entry: &Entry, size: u64) -> Self {
        Metadata {
            name: entry.name().to_string(),
            size,
            mode: entry.mode(),
            modified: entry.mod_time(),
        }
    }

    /// Metadata of a host file, keeping only what the store can also represent.
    pub fn from_host(name: impl Into<String>, metadata: &std::fs::Metadata) -> Self {
        let perm = fsx::permission_bits(metadata);
        Metadata {
            name: name.into(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            mode: if metadata.is_dir() { Mode::dir(perm) } else { Mode::file(perm) },
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }

    /// Base name of the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of the decoded content in bytes; 0 for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }
}

enum Source<'a> {
    Embedded(Cursor<Cow<'a, [u8]>>),
    Host(std::fs::File),
}

/// An open file. Implements [`Read`] and [`Seek`] over the decoded content.
///
/// The cursor is private to the handle; independent `open` calls never share state.
pub struct File<'a> {
    fs: &'a FileSystem,
    path: String,
    metadata: Metadata,
    source: Option<Source<'a>>,
}

impl<'a> File<'a> {
    /// The path as presented to `open` (after normalization).
    pub fn name(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Same as [`FileSystem::read_dir`] on this handle's own path.
    pub fn read_dir(&self) -> Result<Vec<Metadata>> {
        self.fs.read_dir(&self.path)
    }

    /// Release the decoded buffer. Closing an already closed file is not an error.
    pub fn close(&mut self) -> Result<()> {
        self.source = None;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    fn source_mut(&mut self) -> io::Result<&mut Source<'a>> {
        let path = &self.path;
        self.source
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("read on closed file '{path}'")))
    }
}

impl Read for File<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.source_mut()? {
            Source::Embedded(cursor) => cursor.read(buf),
            Source::Host(file) => file.read(buf),
        }
    }
}

impl Seek for File<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self.source_mut()? {
            Source::Embedded(cursor) => cursor.seek(pos),
            Source::Host(file) => file.seek(pos),
        }
    }
}

impl std::fmt::Debug for File<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The read-only filesystem over an embedded [`Store`].
#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    store: Store,
    options: FsOptions,
}

impl FileSystem {
    pub fn new(store: Store) -> Self {
        Self::with_options(store, FsOptions::default())
    }

    pub fn with_options(store: Store, options: FsOptions) -> Self {
        FileSystem { store, options }
    }

    pub fn options(&self) -> &FsOptions {
        &self.options
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    /// Open `path` for reading.
    pub fn open(&self, path: &str) -> Result<File<'_>> {
        let key = normalize_path(path).into_owned();
        if self.options.debug {
            let (file, metadata) = host::open(self.options.host_root(), &key)?;
            return Ok(File {
                fs: self,
                path: key,
                metadata,
                source: Some(Source::Host(file)),
            });
        }

        let entry = self.store.get(&key)?;
        let content = compress::decode(entry)?;
        let metadata = Metadata::with_size(entry, content.len() as u64);
        Ok(File {
            fs: self,
            path: key,
            metadata,
            source: Some(Source::Embedded(Cursor::new(content))),
        })
    }

    /// Metadata of `path`.
    pub fn stat(&self, path: &str) -> Result<Metadata> {
        let key = normalize_path(path);
        if self.options.debug {
            return host::stat(self.options.host_root(), &key);
        }
        Metadata::from_entry(self.store.get(&key)?)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    /// The children of directory `path`, sorted by name. `""` and `"."` list the root.
    ///
    /// Listing a *file* lists the file's own directory (its siblings and itself). This
    /// legacy behaviour is kept on purpose; set [`FsOptions::strict_read_dir`] to get
    /// [`Error::NotADirectory`] instead.
    pub fn read_dir(&self, path: &str) -> Result<Vec<Metadata>> {
        let key = normalize_path(path);
        if self.options.debug {
            return host::read_dir(self.options.host_root(), &key, self.options.strict_read_dir);
        }

        let dir = if key.is_empty() {
            ""
        } else {
            let entry = self.store.get(&key)?;
            if entry.is_dir() {
                entry.path()
            } else if self.options.strict_read_dir {
                return Err(Error::NotADirectory { path: key.into_owned() });
            } else {
                parent_of(entry.path())
            }
        };
        self.store
            .children(dir)
            .into_iter()
            .map(Metadata::from_entry)
            .collect()
    }

    /// The whole decoded content of `path`.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.open(path)?;
        let mut content = Vec::with_capacity(file.metadata().size() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| Error::io(file.name(), e))?;
        file.close()?;
        Ok(content)
    }

    /// Copy embedded `src` to `host_path` on the real filesystem, with the entry's
    /// permission bits, and return the host file's metadata after the copy.
    ///
    /// The destination is created or truncated. If writing fails midway a truncated
    /// file may be left behind; removing it is up to the caller.
    pub fn copy_file(&self, src: &str, host_path: impl AsRef<Path>) -> Result<std::fs::Metadata> {
        let host_path = host_path.as_ref();
        let mut file = self.open(src)?;
        let metadata = file.metadata().clone();
        if metadata.is_dir() {
            return Err(Error::io(
                host_path,
                io::Error::new(io::ErrorKind::InvalidInput, format!("'{}' is a directory", file.name())),
            ));
        }
        let perm = metadata.mode().perm();
        tracing::debug!(src = file.name(), dst = %host_path.display(), "copying embedded file to host");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(perm);
        }
        let mut dst = options.open(host_path).map_err(|e| Error::io(host_path, e))?;
        io::copy(&mut file, &mut dst).map_err(|e| Error::io(host_path, e))?;
        dst.flush().map_err(|e| Error::io(host_path, e))?;
        drop(dst);
        file.close()?;

        // The create mode is filtered by the umask and ignored for existing files.
        fsx::set_unix_permissions(host_path, perm).map_err(|e| Error::io(host_path, e))?;

        let info = std::fs::metadata(host_path).map_err(|e| Error::io(host_path, e))?;
        tracing::debug!(
            dst = %host_path.display(),
            mode = %format!("{:o}", fsx::permission_bits(&info)),
            size = info.len(),
            "copy finished"
        );
        Ok(info)
    }

    /// Re-encode the whole store. Requires exclusive access, so no handle can be open.
    pub fn compress(&mut self, target: Compression) -> Result<()> {
        self.store.compress(target)
    }

    pub fn decompress(&mut self) -> Result<()> {
        self.store.decompress()
    }
}

impl From<Store> for FileSystem {
    fn from(store: Store) -> Self {
        FileSystem::new(store)
    }
}
