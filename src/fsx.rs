//! Host filesystem helpers.
//!
//! Permission bits are the one piece of metadata that crosses between the embedded
//! store and the host: copy-out restores them, collection records them. On Unix both
//! directions use the real mode bits; elsewhere there are no POSIX bits, so restoring
//! is a no-op and recording synthesizes `0o755`/`0o644` (`0o555`/`0o444` if read-only).

use std::io;
use std::path::Path;

#[cfg(unix)]
/// Set POSIX permission bits on Unix.
pub fn set_unix_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
/// No-op on non-Unix hosts: POSIX permission bits are not preserved.
pub fn set_unix_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Permission bits of a host file, without the file-type bits.
pub fn permission_bits(metadata: &std::fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o7777
    }
    #[cfg(not(unix))]
    {
        let base = if metadata.is_dir() { 0o755 } else { 0o644 };
        if metadata.permissions().readonly() {
            base & !0o222
        } else {
            base
        }
    }
}
