use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{self, Child, ExitStatus, Output, Stdio};

use crate::error::{Error, Result};

/// A native process command over an executable staged by
/// [`ExecCache`](super::ExecCache).
///
/// With caching off (the default) the staged file is removed after [`Command::run`],
/// [`Command::output`] or [`Command::wait`] return, or when the command is dropped.
/// With caching on, the file stays in the cache directory for later runs with the same
/// identity. Removal failures are logged and never reported to the caller.
pub struct Command {
    inner: process::Command,
    path: PathBuf,
    cache: bool,
    child: Option<Child>,
    removed: bool,
}

impl Command {
    pub(crate) fn new(path: PathBuf) -> Self {
        Command {
            inner: process::Command::new(&path),
            path,
            cache: false,
            child: None,
            removed: false,
        }
    }

    /// Host path of the staged executable.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the staged executable after the process exits.
    pub fn cache(&mut self, cache: bool) -> &mut Self {
        self.cache = cache;
        self
    }

    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.inner.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.args(args);
        self
    }

    pub fn env<K: AsRef<OsStr>, V: AsRef<OsStr>>(&mut self, key: K, val: V) -> &mut Self {
        self.inner.env(key, val);
        self
    }

    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.inner.current_dir(dir);
        self
    }

    pub fn stdin<T: Into<Stdio>>(&mut self, cfg: T) -> &mut Self {
        self.inner.stdin(cfg);
        self
    }

    pub fn stdout<T: Into<Stdio>>(&mut self, cfg: T) -> &mut Self {
        self.inner.stdout(cfg);
        self
    }

    pub fn stderr<T: Into<Stdio>>(&mut self, cfg: T) -> &mut Self {
        self.inner.stderr(cfg);
        self
    }

    /// The underlying `std::process::Command`, for settings not mirrored here.
    pub fn as_std_mut(&mut self) -> &mut process::Command {
        &mut self.inner
    }

    /// Start the process. Piped stdio is reachable through [`Command::child_mut`].
    pub fn spawn(&mut self) -> Result<&mut Child> {
        if self.child.is_some() {
            return Err(Error::io(
                &self.path,
                io::Error::new(io::ErrorKind::AlreadyExists, "process already started"),
            ));
        }
        let child = self.inner.spawn().map_err(|e| Error::io(&self.path, e))?;
        Ok(self.child.insert(child))
    }

    /// The running process, if [`Command::spawn`] was called and it has not been waited for.
    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    /// Wait for the started process to exit, then clean up the staged file.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        let mut child = self.child.take().ok_or_else(|| {
            Error::io(&self.path, io::Error::new(io::ErrorKind::NotFound, "process not started"))
        })?;
        let status = child.wait().map_err(|e| Error::io(&self.path, e));
        self.cleanup();
        status
    }

    /// Spawn the process and wait for it.
    pub fn run(&mut self) -> Result<ExitStatus> {
        self.spawn()?;
        self.wait()
    }

    /// Run the process with captured stdout and stderr.
    pub fn output(&mut self) -> Result<Output> {
        let output = self.inner.output().map_err(|e| Error::io(&self.path, e));
        self.cleanup();
        output
    }

    fn cleanup(&mut self) {
        if self.cache || self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed staged executable"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "cannot remove staged executable")
            }
        }
        self.removed = true;
    }
}

impl Drop for Command {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.inner)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("command", &self.inner)
            .field("cache", &self.cache)
            .field("running", &self.child.is_some())
            .finish()
    }
}
