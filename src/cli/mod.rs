use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::compress::Compression;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log every filesystem and cache operation to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Serve files from the host directory instead of the manifest (development aid).
    #[arg(long, global = true)]
    pub debug: bool,

    /// Host directory used by --debug. Defaults to the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub debug_root: Option<PathBuf>,

    /// Directory where embedded executables are staged. Defaults to the user cache directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Collect host files and directories into a manifest.
    #[command(alias = "p")]
    Pack {
        /// Files or directories to embed, relative to --root.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// The manifest file to write (e.g., assets.json).
        #[arg(short, long)]
        output: PathBuf,

        /// Directory that embedded paths are relative to.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Payload compression: none, gzip, brotli, zstd or xz.
        #[arg(long, default_value = "none", value_parser = parse_compression)]
        compression: Compression,

        /// Variant tag to store the files under (default, linux, linux_x86_64, ...).
        #[arg(long, default_value = crate::manifest::DEFAULT_VARIANT)]
        variant: String,

        /// Add to an existing manifest instead of replacing it.
        #[arg(long)]
        merge: bool,
    },

    /// List a directory of a manifest.
    #[command(alias = "l")]
    Ls {
        manifest: PathBuf,

        /// Directory to list. Defaults to the root.
        dir: Option<String>,
    },

    /// Write the decoded content of an embedded file to stdout.
    Cat {
        manifest: PathBuf,
        path: String,
    },

    /// Copy an embedded file to the host, keeping its permission bits.
    #[command(alias = "x")]
    Extract {
        manifest: PathBuf,
        path: String,

        /// Destination on the host. Defaults to the file's base name.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run an embedded executable and exit with its status.
    Exec {
        manifest: PathBuf,
        path: String,

        /// Keep the extracted executable for later runs.
        #[arg(long)]
        cache: bool,

        /// Arguments passed to the executable (after `--`).
        #[arg(last = true)]
        args: Vec<OsString>,
    },
}

/// Parses a compression tag for clap.
pub fn parse_compression(s: &str) -> Result<Compression, String> {
    s.parse::<Compression>().map_err(|e| e.to_string())
}

/// Parses command-line arguments using `clap`. Exits the process on `--help` or a
/// usage error.
pub fn run() -> Args {
    Args::parse()
}
