//! Runtime configuration.
//!
//! Settings are read from the environment once, by [`Config::from_env`], and then
//! passed explicitly to the [`FileSystem`](crate::vfs::FileSystem) and the
//! [`ExecCache`](crate::exec::ExecCache). Nothing else in the crate looks at the
//! environment.
//!
//! | Variable              | Effect                                              |
//! |-----------------------|-----------------------------------------------------|
//! | `EMBEDFS_DEBUG`       | serve files from the host filesystem                |
//! | `EMBEDFS_DEBUG_ROOT`  | host directory used in debug mode (default: `.`)    |
//! | `EMBEDFS_CACHE_DIR`   | where executables are staged                        |
//! | `EMBEDFS_STRICT_DIRS` | `read_dir` on a file is an error                    |

use std::ffi::OsString;
use std::path::PathBuf;

use crate::vfs::FsOptions;

pub const ENV_DEBUG: &str = "EMBEDFS_DEBUG";
pub const ENV_DEBUG_ROOT: &str = "EMBEDFS_DEBUG_ROOT";
pub const ENV_CACHE_DIR: &str = "EMBEDFS_CACHE_DIR";
pub const ENV_STRICT_DIRS: &str = "EMBEDFS_STRICT_DIRS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Debug passthrough to the host filesystem. Off by default.
    pub debug: bool,
    pub debug_root: Option<PathBuf>,
    /// Execution cache directory; `None` selects [`Config::default_cache_dir`].
    pub cache_dir: Option<PathBuf>,
    pub strict_read_dir: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let flag = |key: &str| lookup(key).map(|v| parse_flag(&v.to_string_lossy())).unwrap_or(false);
        Config {
            debug: flag(ENV_DEBUG),
            debug_root: path(ENV_DEBUG_ROOT),
            cache_dir: path(ENV_CACHE_DIR),
            strict_read_dir: flag(ENV_STRICT_DIRS),
        }
    }

    pub fn fs_options(&self) -> FsOptions {
        FsOptions {
            debug: self.debug,
            debug_root: self.debug_root.clone(),
            strict_read_dir: self.strict_read_dir,
        }
    }

    /// The configured cache directory, or the platform default.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(Self::default_cache_dir)
    }

    /// The user cache directory (e.g. `~/.cache`), falling back to the temp directory.
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir().unwrap_or_else(std::env::temp_dir)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
