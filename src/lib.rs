//! # embedfs Core Library
//!
//! An embedded, read-only virtual filesystem: files and directories are baked into the
//! binary as data and served through a small POSIX-like API.
//!
//! ## Key Modules
//!
//! - [`store`]: the path-keyed entry map and path normalization.
//! - [`compress`]: per-entry payload encoding (`gzip`, `brotli`, `zstd`, `xz`) and bulk
//!   re-encoding of a store.
//! - [`vfs`]: the filesystem façade (`open`, `stat`, `read_dir`, `read_file`,
//!   `copy_file`) with an optional debug passthrough to the host.
//! - [`exec`]: runs embedded executables from a content-named on-disk cache.
//! - [`manifest`] and [`collect`]: building stores from host files and serializing them.
//!
//! ## Examples
//!
//! ```
//! use std::time::SystemTime;
//! use embedfs::{Entry, FileSystem, Store};
//!
//! let mut store = Store::new();
//! store.insert(Entry::dir("assets", 0o755, SystemTime::UNIX_EPOCH));
//! store.insert(Entry::file("assets/hello.txt", 0o644, SystemTime::UNIX_EPOCH, &b"hi"[..]));
//!
//! let fs = FileSystem::new(store);
//! assert_eq!(fs.read_file("./assets/hello.txt").unwrap(), b"hi");
//! assert_eq!(fs.read_dir("assets").unwrap().len(), 1);
//! ```

pub mod cli;
pub mod cli_runner;
pub mod collect;
pub mod compress;
pub mod config;
pub mod error;
pub mod exec;
pub mod manifest;
pub mod store;
pub mod vfs;

// Cross-platform permission helpers
pub mod fsx;

pub use compress::Compression;
pub use config::Config;
pub use error::{Error, Result};
pub use exec::{Command, ExecCache};
pub use manifest::{Manifest, Target};
pub use store::{Entry, Mode, StaticEntry, Store};
pub use vfs::{File, FileSystem, FsOptions, Metadata};
