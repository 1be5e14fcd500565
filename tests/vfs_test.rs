use embedfs::{Entry, Error, FileSystem, FsOptions, Store};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::tempdir;

// ---------- helpers ----------
fn mtime() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_592_104_011)
}

/// The fixture tree: a top-level file and an `assets` directory with a subdirectory.
fn fixture() -> Store {
    let t = mtime();
    [
        Entry::file("file.txt", 0o644, t, &b"file.txt"[..]),
        Entry::dir("assets", 0o755, t),
        Entry::file("assets/asset1.txt", 0o644, t, &b"asset1"[..]),
        Entry::file("assets/asset2.txt", 0o644, t, &b"asset2"[..]),
        Entry::dir("assets/subdir", 0o755, t),
        Entry::file("assets/subdir/subdirasset1.txt", 0o644, t, &b"subdirasset1"[..]),
    ]
    .into_iter()
    .collect()
}

fn names(list: &[embedfs::Metadata]) -> Vec<&str> {
    list.iter().map(|m| m.name()).collect()
}

#[test]
fn reads_top_level_file() -> Result<(), Box<dyn std::error::Error>> {
    let vfs = FileSystem::new(fixture());
    assert_eq!(vfs.read_file("file.txt")?, b"file.txt");
    Ok(())
}

#[test]
fn lists_nested_directory_sorted() -> Result<(), Box<dyn std::error::Error>> {
    let vfs = FileSystem::new(fixture());
    let list = vfs.read_dir("assets")?;
    assert_eq!(names(&list), ["asset1.txt", "asset2.txt", "subdir"]);
    assert!(list[2].is_dir());
    assert_eq!(list[0].size(), 6);
    Ok(())
}

#[test]
fn root_listing() -> Result<(), Box<dyn std::error::Error>> {
    let vfs = FileSystem::new(fixture());
    assert_eq!(names(&vfs.read_dir("")?), ["assets", "file.txt"]);
    assert_eq!(names(&vfs.read_dir(".")?), ["assets", "file.txt"]);
    Ok(())
}

#[test]
fn dot_slash_and_backslash_forms_are_equivalent() -> Result<(), Box<dyn std::error::Error>> {
    let vfs = FileSystem::new(fixture());
    let plain = vfs.read_file("assets/subdir/subdirasset1.txt")?;
    assert_eq!(vfs.read_file("./assets/subdir/subdirasset1.txt")?, plain);
    assert_eq!(vfs.read_file(".\\assets\\subdir\\subdirasset1.txt")?, plain);
    assert_eq!(vfs.stat("./assets")?.name(), "assets");
    Ok(())
}

#[test]
fn lookups_are_exact() {
    let vfs = FileSystem::new(fixture());
    for path in ["missing.txt", "FILE.TXT", "assets/", "/file.txt", "assets/../file.txt"] {
        let err = vfs.open(path).err();
        assert!(matches!(err, Some(Error::NotFound { .. })), "expected NotFound for {path}");
        assert!(!vfs.exists(path));
    }
    assert!(matches!(vfs.stat("nope"), Err(Error::NotFound { path }) if path == "nope"));
    assert!(matches!(vfs.read_dir("nope"), Err(Error::NotFound { .. })));
}

#[test]
fn stat_size_matches_read_length() -> Result<(), Box<dyn std::error::Error>> {
    let vfs = FileSystem::new(fixture());
    for path in ["file.txt", "assets/asset1.txt", "assets/subdir/subdirasset1.txt"] {
        assert_eq!(vfs.stat(path)?.size(), vfs.read_file(path)?.len() as u64);
    }
    let dir = vfs.stat("assets/subdir")?;
    assert!(dir.is_dir());
    assert_eq!(dir.size(), 0);
    assert_eq!(dir.modified(), mtime());
    Ok(())
}

#[test]
fn listing_a_file_lists_its_directory() -> Result<(), Box<dyn std::error::Error>> {
    let vfs = FileSystem::new(fixture());
    let list = vfs.read_dir("assets/asset1.txt")?;
    assert_eq!(names(&list), ["asset1.txt", "asset2.txt", "subdir"]);
    assert_eq!(names(&vfs.read_dir("file.txt")?), ["assets", "file.txt"]);

    let handle = vfs.open("assets/subdir/subdirasset1.txt")?;
    assert_eq!(names(&handle.read_dir()?), ["subdirasset1.txt"]);
    Ok(())
}

#[test]
fn strict_listing_rejects_files() -> Result<(), Box<dyn std::error::Error>> {
    let options = FsOptions { strict_read_dir: true, ..FsOptions::default() };
    let vfs = FileSystem::with_options(fixture(), options);
    assert!(matches!(
        vfs.read_dir("assets/asset1.txt"),
        Err(Error::NotADirectory { path }) if path == "assets/asset1.txt"
    ));
    assert_eq!(vfs.read_dir("assets")?.len(), 3);
    Ok(())
}

#[test]
fn handles_have_independent_cursors() -> Result<(), Box<dyn std::error::Error>> {
    let vfs = FileSystem::new(fixture());
    let mut a = vfs.open("assets/subdir/subdirasset1.txt")?;
    let mut b = vfs.open("assets/subdir/subdirasset1.txt")?;

    let mut head = [0u8; 6];
    a.read_exact(&mut head)?;
    assert_eq!(&head, b"subdir");

    b.seek(SeekFrom::End(-6))?;
    let mut tail = String::new();
    b.read_to_string(&mut tail)?;
    assert_eq!(tail, "asset1");

    let mut rest = String::new();
    a.read_to_string(&mut rest)?;
    assert_eq!(rest, "asset1");
    Ok(())
}

#[test]
fn close_is_idempotent_and_stops_reads() -> Result<(), Box<dyn std::error::Error>> {
    let vfs = FileSystem::new(fixture());
    let mut file = vfs.open("file.txt")?;
    assert_eq!(file.name(), "file.txt");
    file.close()?;
    file.close()?;
    assert!(file.is_closed());
    let mut buf = Vec::new();
    assert!(file.read_to_end(&mut buf).is_err());
    Ok(())
}

#[test]
fn copy_file_writes_content_and_mode() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = fixture();
    store.insert(Entry::file("bin/tool", 0o750, mtime(), &b"#!/bin/sh\necho hi\n"[..]));
    let vfs = FileSystem::new(store);

    let out = tempdir()?;
    let dst = out.path().join("tool");
    fs::write(&dst, "previous content that is longer than the new one")?;
    let info = vfs.copy_file("bin/tool", &dst)?;
    assert_eq!(fs::read(&dst)?, b"#!/bin/sh\necho hi\n");
    assert_eq!(info.len(), 18);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        assert_eq!(info.permissions().mode() & 0o777, 0o750);
    }

    assert!(vfs.copy_file("assets", out.path().join("x")).is_err());
    assert!(matches!(vfs.copy_file("nope", out.path().join("y")), Err(Error::NotFound { .. })));
    assert!(!out.path().join("y").exists());
    Ok(())
}

#[test]
fn debug_mode_reads_the_host() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempdir()?;
    fs::create_dir(root.path().join("assets"))?;
    fs::write(root.path().join("assets").join("live.txt"), "edited on disk")?;
    fs::write(root.path().join("assets").join("b.txt"), "b")?;

    let options = FsOptions {
        debug: true,
        debug_root: Some(root.path().to_path_buf()),
        ..FsOptions::default()
    };
    // The embedded store is ignored entirely.
    let vfs = FileSystem::with_options(fixture(), options);
    assert_eq!(vfs.read_file("./assets/live.txt")?, b"edited on disk");
    assert_eq!(vfs.stat("assets/live.txt")?.size(), 14);
    assert_eq!(names(&vfs.read_dir("assets")?), ["b.txt", "live.txt"]);
    assert_eq!(names(&vfs.read_dir("assets/b.txt")?), ["b.txt", "live.txt"]);
    assert!(matches!(vfs.open("file.txt"), Err(Error::NotFound { .. })));
    Ok(())
}
