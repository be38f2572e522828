//! drumset - drum machine sound bank tool
//!
//! Inspects, builds, renames and extracts `.drm` drumset containers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

mod info;
mod manifest;

use drumset::{ExportOptions, decode, encode, export_all, export_instrument_with, verify};

#[derive(Parser)]
#[command(name = "drumset")]
#[command(about = "Drumset container tool")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the contents of a container
    Info {
        /// Input .drm file
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Verify a container's checksum and structure
    Check {
        /// Input .drm file
        input: PathBuf,
    },

    /// Write the embedded audio back out as WAV files
    Extract {
        /// Input .drm file
        input: PathBuf,

        /// Output directory (default: <name>_WAVES beside the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only these MIDI ids
        #[arg(short, long)]
        instrument: Vec<u8>,
    },

    /// Build a container from a manifest file
    Build {
        /// Path to drumset.toml manifest
        #[arg(default_value = "drumset.toml")]
        manifest: PathBuf,

        /// Output .drm file (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Change the drumset name
    Rename {
        /// Input .drm file
        input: PathBuf,

        /// New drumset name
        name: String,

        /// Write to this file instead of modifying the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        // stdout is reserved for `info` output
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info { input, json } => {
            let bytes = read(&input)?;
            let drumset = decode(&bytes).with_context(|| format!("Failed to decode {:?}", input))?;
            let summary = info::DrumsetSummary::new(&drumset, verify(&bytes)?);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                summary.print();
            }
        }

        Commands::Check { input } => {
            tracing::info!("Checking {:?}", input);
            let bytes = read(&input)?;
            let check = verify(&bytes).with_context(|| format!("Failed to read {:?}", input))?;
            if !check.is_valid() {
                anyhow::bail!("Checksum mismatch in {:?}: {:?}", input, check);
            }
            let drumset = decode(&bytes).with_context(|| format!("Failed to decode {:?}", input))?;
            tracing::info!(
                "'{}' is valid: {} instruments, {:?}",
                drumset.name,
                drumset.instruments.len(),
                check
            );
        }

        Commands::Extract {
            input,
            output,
            instrument,
        } => {
            let output = output.unwrap_or_else(|| drumset::waves_dir_name(&input));
            tracing::info!("Extracting {:?} -> {:?}", input, output);
            let bytes = read(&input)?;
            let drumset = decode(&bytes).with_context(|| format!("Failed to decode {:?}", input))?;
            let options = ExportOptions {
                container_modified: fs::metadata(&input).and_then(|m| m.modified()).ok(),
            };

            let files = if instrument.is_empty() {
                export_all(&drumset, &output, &options)?
            } else {
                let mut files = Vec::new();
                for midi_id in instrument {
                    files.extend(export_instrument_with(&drumset, midi_id, &output, &options)?);
                }
                files
            };
            tracing::info!("Wrote {} files", files.len());
        }

        Commands::Build { manifest, output } => {
            tracing::info!("Building drumset from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            let base_dir = manifest.parent().unwrap_or(Path::new("."));
            config.check_sources(base_dir)?;

            let drumset = config.to_drumset(base_dir)?;
            let output = output
                .or_else(|| config.output.as_ref().map(|p| base_dir.join(p)))
                .unwrap_or_else(|| {
                    base_dir.join(format!("{}.{}", config.name, drumset::FILE_EXTENSION))
                });

            let bytes = encode(&drumset).context("Failed to encode drumset")?;
            write(&output, &bytes)?;
            tracing::info!("Build complete! {:?} ({} bytes)", output, bytes.len());
        }

        Commands::Rename {
            input,
            name,
            output,
        } => {
            let output = output.unwrap_or_else(|| input.clone());
            let crc = drumset::copy_with_new_name(&input, &output, &name)
                .with_context(|| format!("Failed to rename {:?}", input))?;
            tracing::info!("Renamed to '{}' -> {:?} (crc {:08X})", name, output, crc);
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {:?}", path))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))
}
