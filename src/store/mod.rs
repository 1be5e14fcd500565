//! # Entry Store
//!
//! A flat, path-keyed map of every embedded file and directory. The directory tree is
//! never materialized: a directory's children are simply the entries whose parent path
//! (the key with its last segment stripped) equals the directory's key.
//!
//! Keys are normalized on the way in (see [`normalize_path`]) so lookups are exact,
//! case-sensitive string matches.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::compress::Compression;
use crate::error::{Error, Result};

/// Normalize a lookup path: host separators become `/` and a single leading `./` is
/// stripped. `..` and symlinks are not resolved, and `"."` names the root (`""`).
///
/// Example: `".\\assets\\a.txt"` becomes `"assets/a.txt"`.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    let slashed: Cow<'_, str> = if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    };
    if slashed == "." {
        return Cow::Borrowed("");
    }
    match slashed {
        Cow::Borrowed(s) => Cow::Borrowed(s.strip_prefix("./").unwrap_or(s)),
        Cow::Owned(s) => match s.strip_prefix("./") {
            Some(rest) => Cow::Owned(rest.to_string()),
            None => Cow::Owned(s),
        },
    }
}

/// The parent key of a normalized path; `""` for top-level entries.
pub fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// The leaf component of a normalized path.
pub fn base_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Permission bits plus a directory flag, laid out the way the generator emits them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Mode(pub u32);

impl Mode {
    /// Directory flag (the top bit, as in the generator's file mode encoding).
    pub const DIR: u32 = 1 << 31;
    const PERM_MASK: u32 = 0o7777;

    pub fn file(perm: u32) -> Self {
        Mode(perm & Self::PERM_MASK)
    }

    pub fn dir(perm: u32) -> Self {
        Mode(Self::DIR | (perm & Self::PERM_MASK))
    }

    pub fn is_dir(self) -> bool {
        self.0 & Self::DIR != 0
    }

    /// Permission bits only (`rwx` for user/group/other plus setuid/setgid/sticky).
    pub fn perm(self) -> u32 {
        self.0 & Self::PERM_MASK
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mode({})", self)
    }
}

impl fmt::Display for Mode {
    /// `ls`-style rendering, e.g. `drwxr-xr-x`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() { 'd' } else { '-' };
        let mut s = String::with_capacity(10);
        s.push(kind);
        for shift in [6u32, 3, 0] {
            let bits = (self.perm() >> shift) & 0o7;
            s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        f.write_str(&s)
    }
}

/// One embedded file or directory.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) mode: Mode,
    pub(crate) mod_time: SystemTime,
    pub(crate) compression: Compression,
    pub(crate) payload: Cow<'static, [u8]>,
    /// Length of the decoded content, when known without decoding.
    pub(crate) decoded_len: Option<u64>,
}

impl Entry {
    /// A file whose payload is already encoded with `compression`.
    pub fn new(
        path: &str,
        name: impl Into<String>,
        mode: Mode,
        mod_time: SystemTime,
        compression: Compression,
        payload: impl Into<Cow<'static, [u8]>>,
    ) -> Self {
        if mode.is_dir() {
            return Entry::dir_named(path, name, mode, mod_time);
        }
        let payload = payload.into();
        let decoded_len = (compression == Compression::None).then_some(payload.len() as u64);
        Entry {
            path: normalize_path(path).into_owned(),
            name: name.into(),
            mode,
            mod_time,
            compression,
            payload,
            decoded_len,
        }
    }

    /// A plain (uncompressed) file; the name is the leaf of `path`.
    pub fn file(path: &str, perm: u32, mod_time: SystemTime, content: impl Into<Cow<'static, [u8]>>) -> Self {
        let key = normalize_path(path);
        let name = base_name(&key).to_string();
        Entry::new(&key, name, Mode::file(perm), mod_time, Compression::None, content)
    }

    /// A directory; the name is the leaf of `path`.
    pub fn dir(path: &str, perm: u32, mod_time: SystemTime) -> Self {
        let key = normalize_path(path);
        let name = base_name(&key).to_string();
        Entry::dir_named(&key, name, Mode::dir(perm), mod_time)
    }

    fn dir_named(path: &str, name: impl Into<String>, mode: Mode, mod_time: SystemTime) -> Self {
        // Directories never carry a payload or an encoding.
        Entry {
            path: normalize_path(path).into_owned(),
            name: name.into(),
            mode: Mode(mode.0 | Mode::DIR),
            mod_time,
            compression: Compression::None,
            payload: Cow::Borrowed(&[]),
            decoded_len: Some(0),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn mod_time(&self) -> SystemTime {
        self.mod_time
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// The payload exactly as stored, i.e. still encoded under [`Entry::compression`].
    pub fn raw_payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A `const`-constructible record for stores baked into the binary as static data.
#[derive(Debug, Clone, Copy)]
pub struct StaticEntry {
    pub path: &'static str,
    pub name: &'static str,
    pub mode: u32,
    /// Seconds since the Unix epoch.
    pub mod_time: u64,
    pub compression: Compression,
    pub payload: &'static [u8],
}

impl From<&StaticEntry> for Entry {
    fn from(s: &StaticEntry) -> Self {
        let mod_time = UNIX_EPOCH + Duration::from_secs(s.mod_time);
        Entry::new(s.path, s.name, Mode(s.mode), mod_time, s.compression, Cow::Borrowed(s.payload))
    }
}

/// Mapping from normalized path to [`Entry`].
#[derive(Debug, Clone, Default)]
pub struct Store {
    entries: BTreeMap<String, Entry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store over static data without copying any payload.
    pub fn from_static(entries: &'static [StaticEntry]) -> Self {
        entries.iter().map(Entry::from).collect()
    }

    /// Insert an entry, replacing any entry already stored under the same path.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    /// Exact lookup after normalization. No partial or case-insensitive matching.
    pub fn get(&self, path: &str) -> Result<&Entry> {
        let key = normalize_path(path);
        self.entries.get(key.as_ref()).ok_or_else(|| Error::not_found(key))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(normalize_path(path).as_ref())
    }

    /// Every entry whose parent is `dir`, sorted by name. An empty result does not
    /// imply `dir` exists; callers check that separately.
    pub fn children(&self, dir: &str) -> Vec<&Entry> {
        let dir = normalize_path(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        // Keys sharing the prefix are contiguous in the ordered map.
        let mut children: Vec<&Entry> = self
            .entries
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| {
                let rest = &key[prefix.len()..];
                !rest.is_empty() && !rest.contains('/')
            })
            .map(|(_, entry)| entry)
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Entry> for Store {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut store = Store::new();
        for entry in iter {
            store.insert(entry);
        }
        store
    }
}

impl Extend<Entry> for Store {
    fn extend<I: IntoIterator<Item = Entry>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}
