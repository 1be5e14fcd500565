use std::io;
use std::path::PathBuf;

use crate::compress::Compression;

/// The primary error type for all operations in the `embedfs` crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path is absent from the store (or from the host filesystem in debug mode).
    #[error("'{path}' does not exist in the embedded filesystem")]
    NotFound { path: String },

    /// A directory listing was requested for a file while strict listing is on.
    #[error("'{path}' is not a directory")]
    NotADirectory { path: String },

    /// The payload of an entry could not be decoded with the scheme it claims.
    /// `path` is empty when raw bytes were decoded outside any entry.
    #[error("{} is not a valid {scheme} stream: {source}", payload_of(.path))]
    CorruptPayload {
        path: String,
        scheme: Compression,
        #[source]
        source: io::Error,
    },

    /// An encoder failed while re-encoding a payload.
    #[error("cannot encode {} as {scheme}: {source}", payload_of(.path))]
    Encode {
        path: String,
        scheme: Compression,
        #[source]
        source: io::Error,
    },

    /// The compression tag is unknown, or its codec was not compiled into this binary.
    /// `path` names the entry that carries or requested the tag, when there is one.
    #[error("unsupported compression scheme '{scheme}'{}", entry_suffix(.path))]
    UnsupportedScheme { scheme: String, path: String },

    /// An I/O error occurred on the host filesystem.
    /// Includes the path where the error happened.
    #[error("I/O error on path '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The manifest document could not be parsed or written.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// A manifest payload is not valid base64 text.
    #[error("payload of '{path}' is not valid base64: {source}")]
    Payload {
        path: String,
        #[source]
        source: base64::DecodeError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

fn payload_of(path: &str) -> String {
    if path.is_empty() {
        "payload".to_string()
    } else {
        format!("payload of '{path}'")
    }
}

fn entry_suffix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" for '{path}'")
    }
}

impl Error {
    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    pub(crate) fn unsupported(scheme: impl ToString) -> Self {
        Error::UnsupportedScheme { scheme: scheme.to_string(), path: String::new() }
    }

    /// Attach an entry path to payload errors that were raised without one.
    pub(crate) fn with_entry(self, entry: &str) -> Self {
        match self {
            Error::CorruptPayload { path, scheme, source } if path.is_empty() => Error::CorruptPayload {
                path: entry.to_string(),
                scheme,
                source,
            },
            Error::Encode { path, scheme, source } if path.is_empty() => Error::Encode {
                path: entry.to_string(),
                scheme,
                source,
            },
            Error::UnsupportedScheme { scheme, path } if path.is_empty() => Error::UnsupportedScheme {
                scheme,
                path: entry.to_string(),
            },
            other => other,
        }
    }

    /// The entry an error refers to, if it names one.
    pub fn entry_path(&self) -> Option<&str> {
        match self {
            Error::NotFound { path }
            | Error::NotADirectory { path }
            | Error::CorruptPayload { path, .. }
            | Error::Encode { path, .. }
            | Error::UnsupportedScheme { path, .. }
            | Error::Payload { path, .. } => Some(path.as_str()).filter(|p| !p.is_empty()),
            Error::Io { .. } | Error::Manifest(_) => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// True for `NotFound`, including host lookups that failed with `ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

// Lets `File` report the taxonomy through `std::io::Read`.
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io { source, .. } => source,
            Error::NotFound { .. } => io::Error::new(io::ErrorKind::NotFound, err),
            Error::CorruptPayload { .. } => io::Error::new(io::ErrorKind::InvalidData, err),
            Error::UnsupportedScheme { .. } => io::Error::new(io::ErrorKind::Unsupported, err),
            other => io::Error::other(other),
        }
    }
}
