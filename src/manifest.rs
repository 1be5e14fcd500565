//! Serialized form of a store, as produced by `embedfs pack`.
//!
//! A manifest holds one or more *variants*, each a path-keyed set of entries. Variants
//! let one document carry platform-specific files next to common ones:
//!
//! ```json
//! {
//!   "variants": {
//!     "default":      { "assets/a.txt": { "name": "a.txt", "mode": 420, ... } },
//!     "linux":        { "bin/tool":     { ... } },
//!     "linux_x86_64": { "bin/tool":     { ... } }
//!   }
//! }
//! ```
//!
//! [`Manifest::resolve`] overlays `default`, then `<arch>`, then `<os>`, then
//! `<os>_<arch>`. Later layers replace entries with the same path.

use std::collections::BTreeMap;
use std::time::SystemTime;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compress::Compression;
use crate::error::{Error, Result};
use crate::store::{normalize_path, Entry, Mode, Store};

/// Variant tag every target includes.
pub const DEFAULT_VARIANT: &str = "default";

/// One serialized entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub mode: Mode,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub mod_time: DateTime<Utc>,
    /// Scheme tag; kept as text so an unknown tag is reported by name.
    #[serde(default)]
    pub compression: String,
    /// Base64 of the (possibly compressed) payload. Absent for directories.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload: String,
}

impl ManifestEntry {
    pub fn from_entry(entry: &Entry) -> Self {
        let compression = match entry.compression() {
            Compression::None => String::new(),
            scheme => scheme.as_str().to_string(),
        };
        ManifestEntry {
            name: entry.name().to_string(),
            mode: entry.mode(),
            mod_time: DateTime::<Utc>::from(entry.mod_time()),
            compression,
            payload: STANDARD.encode(entry.raw_payload()),
        }
    }

    pub fn to_entry(&self, path: &str) -> Result<Entry> {
        let compression: Compression = self
            .compression
            .parse()
            .map_err(|err: Error| err.with_entry(path))?;
        let payload = STANDARD.decode(self.payload.as_bytes()).map_err(|source| Error::Payload {
            path: path.to_string(),
            source,
        })?;
        Ok(Entry::new(
            path,
            self.name.as_str(),
            self.mode,
            SystemTime::from(self.mod_time),
            compression,
            payload,
        ))
    }
}

/// The OS/architecture pair a manifest is resolved for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub os: String,
    pub arch: String,
}

impl Target {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Target { os: os.into(), arch: arch.into() }
    }

    /// The platform this binary was built for.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Variant tags in overlay order, most general first.
    pub fn layers(&self) -> [String; 4] {
        [
            DEFAULT_VARIANT.to_string(),
            self.arch.clone(),
            self.os.clone(),
            format!("{}_{}", self.os, self.arch),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub variants: BTreeMap<String, BTreeMap<String, ManifestEntry>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manifest with `store` as its only, `default`, variant.
    pub fn from_store(store: &Store) -> Self {
        let mut manifest = Manifest::new();
        manifest.insert_variant(DEFAULT_VARIANT, store);
        manifest
    }

    /// Add `store` under `tag`, merging into (and overriding) any entries already there.
    pub fn insert_variant(&mut self, tag: &str, store: &Store) {
        let variant = self.variants.entry(tag.to_string()).or_default();
        for entry in store.iter() {
            variant.insert(entry.path().to_string(), ManifestEntry::from_entry(entry));
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The entries of a single variant. An unknown tag is an empty store.
    pub fn variant(&self, tag: &str) -> Result<Store> {
        let mut store = Store::new();
        if let Some(entries) = self.variants.get(tag) {
            for (path, entry) in entries {
                store.insert(entry.to_entry(&normalize_path(path))?);
            }
        }
        Ok(store)
    }

    /// The store seen by `target`: every matching variant overlaid in order.
    pub fn resolve(&self, target: &Target) -> Result<Store> {
        let mut store = Store::new();
        for tag in target.layers() {
            // `<os>` and `<arch>` may coincide with `default` for odd targets.
            if tag.is_empty() {
                continue;
            }
            store.extend(self.variant(&tag)?.iter().cloned());
        }
        tracing::debug!(os = %target.os, arch = %target.arch, entries = store.len(), "resolved manifest");
        Ok(store)
    }
}

impl Store {
    /// Parse a manifest and resolve it for the current platform.
    ///
    /// Meant for `include_str!`-embedded documents.
    pub fn from_manifest_json(json: &str) -> Result<Store> {
        Manifest::from_json(json)?.resolve(&Target::current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::FileSystem;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn store_of(files: &[(&str, &'static [u8])]) -> Store {
        files
            .iter()
            .map(|(path, content)| Entry::file(path, 0o644, at(1_592_104_011), *content))
            .collect()
    }

    #[test]
    fn json_shape() -> Result<()> {
        let mut store = store_of(&[("assets/a.txt", b"hello")]);
        store.insert(Entry::dir("assets", 0o755, at(1_592_104_011)));
        let json = Manifest::from_store(&store).to_json()?;
        let value: serde_json::Value = serde_json::from_str(&json)?;

        let file = &value["variants"]["default"]["assets/a.txt"];
        assert_eq!(file["name"], "a.txt");
        assert_eq!(file["mode"], 0o644);
        assert_eq!(file["mod_time"], 1_592_104_011);
        assert_eq!(file["payload"], "aGVsbG8=");

        let dir = &value["variants"]["default"]["assets"];
        assert_eq!(dir["mode"], 2_147_484_141u64);
        assert!(dir.get("payload").is_none());
        Ok(())
    }

    #[test]
    fn reads_compressed_payloads() -> Result<()> {
        let mut store = store_of(&[("a.txt", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")]);
        if Compression::Gzip.is_available() {
            store.compress(Compression::Gzip)?;
        }
        let json = Manifest::from_store(&store).to_json()?;
        let vfs = FileSystem::new(Manifest::from_json(&json)?.variant(DEFAULT_VARIANT)?);
        assert_eq!(vfs.read_file("a.txt")?, b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        Ok(())
    }

    #[test]
    fn overlay_order() -> Result<()> {
        let mut manifest = Manifest::from_store(&store_of(&[("tool", b"generic"), ("readme", b"r")]));
        manifest.insert_variant("linux", &store_of(&[("tool", b"linux")]));
        manifest.insert_variant("x86_64", &store_of(&[("tool", b"x86_64")]));
        manifest.insert_variant("linux_x86_64", &store_of(&[("tool", b"linux-x86_64")]));
        manifest.insert_variant("windows", &store_of(&[("tool.exe", b"win")]));

        let read = |target: Target| -> Result<(Vec<u8>, bool)> {
            let vfs = FileSystem::new(manifest.resolve(&target)?);
            Ok((vfs.read_file("tool")?, vfs.exists("tool.exe")))
        };
        assert_eq!(read(Target::new("linux", "x86_64"))?, (b"linux-x86_64".to_vec(), false));
        assert_eq!(read(Target::new("linux", "aarch64"))?, (b"linux".to_vec(), false));
        assert_eq!(read(Target::new("macos", "x86_64"))?, (b"x86_64".to_vec(), false));
        assert_eq!(read(Target::new("windows", "aarch64"))?, (b"generic".to_vec(), true));

        let vfs = FileSystem::new(manifest.resolve(&Target::new("freebsd", "riscv64"))?);
        assert_eq!(vfs.read_file("readme")?, b"r");
        Ok(())
    }

    #[test]
    fn unknown_scheme_is_reported() {
        let json = r#"{"variants":{"default":{"a":{"name":"a","mode":420,"mod_time":0,"compression":"lz4","payload":""}}}}"#;
        let result = Manifest::from_json(json).and_then(|m| m.variant(DEFAULT_VARIANT));
        assert!(matches!(
            result,
            Err(Error::UnsupportedScheme { scheme, path }) if scheme == "lz4" && path == "a"
        ));
    }

    #[test]
    fn bad_base64_names_the_entry() {
        let json = r#"{"variants":{"default":{"a/b":{"name":"b","mode":420,"mod_time":0,"payload":"***"}}}}"#;
        let result = Manifest::from_json(json).and_then(|m| m.variant(DEFAULT_VARIANT));
        assert!(matches!(result, Err(Error::Payload { path, .. }) if path == "a/b"));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(Manifest::from_json("{"), Err(Error::Manifest(_))));
    }
}
