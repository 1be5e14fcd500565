//! Command implementations for the `embedfs` binary.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

use crate::cli::{self, Args, Commands};
use crate::collect;
use crate::config::Config;
use crate::exec::ExecCache;
use crate::manifest::Manifest;
use crate::store::{base_name, Store};
use crate::vfs::{FileSystem, Metadata};

/// Public entry for running the CLI.
pub fn run_cli_app() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = cli::run();
    init_logging(args.verbose);
    let config = config_for(&args);

    match &args.command {
        Commands::Pack { inputs, output, root, compression, variant, merge } => {
            let mut store = collect::collect(root, inputs)?;
            store.compress(*compression)?;

            let mut manifest = if *merge && output.exists() {
                Manifest::from_json(&read_text(output)?)?
            } else {
                Manifest::new()
            };
            manifest.insert_variant(variant, &store);
            fs::write(output, manifest.to_json()?)?;
            tracing::info!(
                entries = store.len(),
                variant = %variant,
                compression = %compression,
                output = %output.display(),
                "packed manifest"
            );
        }
        Commands::Ls { manifest, dir } => {
            let vfs = load(manifest, &config)?;
            let mut stdout = io::stdout().lock();
            for md in vfs.read_dir(dir.as_deref().unwrap_or(""))? {
                writeln!(stdout, "{}", format_listing(&md))?;
            }
        }
        Commands::Cat { manifest, path } => {
            let vfs = load(manifest, &config)?;
            let content = vfs.read_file(path)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
        Commands::Extract { manifest, path, output } => {
            let vfs = load(manifest, &config)?;
            let dst = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(base_name(&crate::store::normalize_path(path))));
            let info = vfs.copy_file(path, &dst)?;
            tracing::info!(src = %path, dst = %dst.display(), size = info.len(), "extracted");
        }
        Commands::Exec { manifest, path, cache, args: exec_args } => {
            let vfs = load(manifest, &config)?;
            let mut command = ExecCache::from_config(&config).command(&vfs, path, exec_args)?;
            command.cache(*cache);
            tracing::info!(command = %command, "running embedded executable");
            let status = command.run()?;
            return Ok(match status.code() {
                Some(code) => ExitCode::from(code.clamp(0, 255) as u8),
                None => ExitCode::FAILURE,
            });
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "embedfs=debug" } else { "embedfs=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when the runner is embedded elsewhere.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Environment settings, overridden by command-line flags.
fn config_for(args: &Args) -> Config {
    let mut config = Config::from_env();
    if args.debug {
        config.debug = true;
    }
    if let Some(root) = &args.debug_root {
        config.debug_root = Some(root.clone());
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    config
}

/// The filesystem of a manifest, resolved for this platform. In debug mode the
/// manifest is not read at all.
fn load(manifest: &Path, config: &Config) -> Result<FileSystem, Box<dyn std::error::Error>> {
    let store = if config.debug {
        tracing::debug!(root = ?config.debug_root, "debug passthrough enabled");
        Store::new()
    } else {
        Store::from_manifest_json(&read_text(manifest)?)?
    };
    Ok(FileSystem::with_options(store, config.fs_options()))
}

fn read_text(path: &Path) -> Result<String, crate::Error> {
    fs::read_to_string(path).map_err(|e| crate::Error::io(path, e))
}

fn format_listing(md: &Metadata) -> String {
    let modified: DateTime<Utc> = md.modified().into();
    format!(
        "{} {:>10} {} {}{}",
        md.mode(),
        md.size(),
        modified.format("%Y-%m-%d %H:%M"),
        md.name(),
        if md.is_dir() { "/" } else { "" }
    )
}
