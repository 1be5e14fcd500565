//! # Compression Layer
//!
//! Every entry carries a [`Compression`] tag naming the encoding currently applied to
//! its payload. Reads go through [`decode`], so consumers never see which scheme is
//! active; [`Store::compress`] re-encodes the whole store in one pass.
//!
//! Each codec is gated behind a Cargo feature of the same name (all on by default).
//! A tag whose codec is compiled out fails with [`Error::UnsupportedScheme`].

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::{Entry, Store};

/// Encoding applied to an entry's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Payload holds the plain bytes.
    #[default]
    None,
    /// Gzip stream (`flate2`).
    Gzip,
    /// Brotli stream.
    Brotli,
    /// Zstandard frame.
    Zstd,
    /// XZ (LZMA2) stream.
    Xz,
}

impl Compression {
    pub const ALL: [Compression; 5] = [
        Compression::None,
        Compression::Gzip,
        Compression::Brotli,
        Compression::Zstd,
        Compression::Xz,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Brotli => "brotli",
            Compression::Zstd => "zstd",
            Compression::Xz => "xz",
        }
    }

    /// Whether this binary was built with the codec for this scheme.
    pub fn is_available(self) -> bool {
        codec(self).is_some()
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "brotli" | "br" => Ok(Compression::Brotli),
            "zstd" | "zst" => Ok(Compression::Zstd),
            "xz" | "lzma2" => Ok(Compression::Xz),
            _ => Err(Error::unsupported(s)),
        }
    }
}

/// Encode/decode pair for one scheme.
#[derive(Clone, Copy)]
struct Codec {
    encode: fn(&[u8]) -> io::Result<Vec<u8>>,
    decode: fn(&[u8]) -> io::Result<Vec<u8>>,
}

/// The codec table. `None` means the scheme was compiled out.
#[allow(unreachable_patterns)]
fn codec(scheme: Compression) -> Option<Codec> {
    match scheme {
        Compression::None => Some(Codec {
            encode: |data| Ok(data.to_vec()),
            decode: |data| Ok(data.to_vec()),
        }),
        #[cfg(feature = "gzip")]
        Compression::Gzip => Some(Codec { encode: gzip::encode, decode: gzip::decode }),
        #[cfg(feature = "brotli")]
        Compression::Brotli => Some(Codec { encode: brotli::encode, decode: brotli::decode }),
        #[cfg(feature = "zstd")]
        Compression::Zstd => Some(Codec { encode: zstd::encode, decode: zstd::decode }),
        #[cfg(feature = "xz")]
        Compression::Xz => Some(Codec { encode: xz::encode, decode: xz::decode }),
        _ => None,
    }
}

#[cfg(feature = "gzip")]
mod gzip {
    use std::io::{self, Read, Write};

    const LEVEL: u32 = 9;

    pub(super) fn encode(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(LEVEL));
        encoder.write_all(data)?;
        encoder.finish()
    }

    pub(super) fn decode(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(feature = "brotli")]
mod brotli {
    use std::io::{self, Read, Write};

    const QUALITY: u32 = 11;
    const LGWIN: u32 = 22;
    const BUFFER: usize = 4096;

    pub(super) fn encode(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            // The stream trailer is written when the writer is dropped.
            let mut writer = ::brotli::CompressorWriter::new(&mut out, BUFFER, QUALITY, LGWIN);
            writer.write_all(data)?;
            writer.flush()?;
        }
        Ok(out)
    }

    pub(super) fn decode(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        ::brotli::Decompressor::new(data, BUFFER).read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(feature = "zstd")]
mod zstd {
    use std::io;

    const LEVEL: i32 = 19;

    pub(super) fn encode(data: &[u8]) -> io::Result<Vec<u8>> {
        ::zstd::stream::encode_all(data, LEVEL)
    }

    pub(super) fn decode(data: &[u8]) -> io::Result<Vec<u8>> {
        ::zstd::stream::decode_all(data)
    }
}

#[cfg(feature = "xz")]
mod xz {
    use std::io::{self, Read, Write};

    const PRESET: u32 = 6;

    pub(super) fn encode(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), PRESET);
        encoder.write_all(data)?;
        encoder.finish()
    }

    pub(super) fn decode(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        xz2::read::XzDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Encode `data` under `scheme`. `Compression::None` returns a copy of the input.
pub fn encode(scheme: Compression, data: &[u8]) -> Result<Vec<u8>> {
    let codec = codec(scheme).ok_or_else(|| Error::unsupported(scheme))?;
    (codec.encode)(data).map_err(|source| Error::Encode {
        path: String::new(),
        scheme,
        source,
    })
}

/// Decode `data`, which claims to be encoded under `scheme`.
///
/// A malformed stream is [`Error::CorruptPayload`] without a path; [`decode`] fills in
/// the entry path.
pub fn decode_bytes(scheme: Compression, data: &[u8]) -> Result<Vec<u8>> {
    let codec = codec(scheme).ok_or_else(|| Error::unsupported(scheme))?;
    (codec.decode)(data).map_err(|source| Error::CorruptPayload {
        path: String::new(),
        scheme,
        source,
    })
}

/// The canonical (decoded) bytes of an entry. Plain payloads are borrowed, never copied.
pub fn decode(entry: &Entry) -> Result<Cow<'_, [u8]>> {
    if entry.compression == Compression::None {
        return Ok(Cow::Borrowed(entry.payload.as_ref()));
    }
    decode_bytes(entry.compression, &entry.payload)
        .map(Cow::Owned)
        .map_err(|err| err.with_entry(&entry.path))
}

/// Re-encode one entry under `target`. The entry is only updated once the new payload
/// is fully built, so a failure leaves it exactly as it was.
fn recode(entry: &mut Entry, target: Compression) -> Result<()> {
    if entry.is_dir() || entry.compression == target {
        return Ok(());
    }
    if !target.is_available() {
        return Err(Error::unsupported(target));
    }
    let (payload, decoded_len) = {
        let canonical = decode(entry)?;
        let len = canonical.len() as u64;
        match target {
            Compression::None => (canonical.into_owned(), len),
            _ => (encode(target, &canonical)?, len),
        }
    };
    entry.payload = Cow::Owned(payload);
    entry.compression = target;
    entry.decoded_len = Some(decoded_len);
    Ok(())
}

impl Store {
    /// Re-encode every file under `target`.
    ///
    /// Entries already at `target` are left untouched, and entries under a different
    /// scheme are decoded to canonical bytes first, so nothing is double-encoded.
    ///
    /// Each entry is converted atomically, but the store as a whole is not: on error
    /// the entries visited before the failing one (in path order) stay converted, the
    /// failing entry keeps its old payload, and the error names it
    /// (see [`Error::entry_path`]).
    pub fn compress(&mut self, target: Compression) -> Result<()> {
        let mut changed = 0usize;
        for entry in self.iter_mut() {
            let before = entry.compression;
            if let Err(err) = recode(entry, target) {
                let err = err.with_entry(&entry.path);
                tracing::debug!(scheme = %target, changed, error = %err, "recompression stopped");
                return Err(err);
            }
            if before != entry.compression {
                changed += 1;
            }
        }
        tracing::debug!(scheme = %target, changed, "recompressed store");
        Ok(())
    }

    /// Store every payload as plain bytes. Same as `compress(Compression::None)`.
    pub fn decompress(&mut self) -> Result<()> {
        self.compress(Compression::None)
    }
}
