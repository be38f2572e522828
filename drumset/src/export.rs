//! Writing embedded PCM back out as standalone WAV files

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::ExportError;
use crate::model::{Drumset, Instrument, Velocity};
use crate::wav::wave_header;

/// Characters that never make it into a file name; runs collapse to one `_`
const UNSAFE_CHARS: &[char] = &[' ', '"', '/', '<', '|', '>', ':', '*', '_', '?'];

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Modification time of the container being exported. Existing files
    /// newer than this are only replaced when their content differs; with
    /// `None` every existing file is treated that way.
    pub container_modified: Option<SystemTime>,
}

/// `<stem>_WAVES` next to the container
pub fn waves_dir_name(container: &Path) -> PathBuf {
    let stem = container
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    container.with_file_name(format!("{stem}_WAVES"))
}

/// Collapses every run of unsafe characters into a single `_`
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if UNSAFE_CHARS.contains(&c) {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Exports one instrument with default options
pub fn export_instrument(
    drumset: &Drumset,
    midi_id: u8,
    dest: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    export_instrument_with(drumset, midi_id, dest, &ExportOptions::default())
}

/// Writes every velocity of an instrument to
/// `{dest}/{midi}-{name}/{start}-{end}/{basename}.wav`.
///
/// Files that cannot be written are logged and skipped. Blank instruments
/// export nothing.
pub fn export_instrument_with(
    drumset: &Drumset,
    midi_id: u8,
    dest: &Path,
    options: &ExportOptions,
) -> Result<Vec<PathBuf>, ExportError> {
    let instrument = drumset
        .instrument(midi_id)
        .ok_or(ExportError::UnknownInstrument(midi_id))?;
    fs::create_dir_all(dest).map_err(|source| ExportError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    let instrument_dir = dest.join(format!("{midi_id}-{}", sanitize(&instrument.name)));
    let mut written = Vec::new();
    for (index, velocity) in instrument.velocities.iter().enumerate() {
        let Some(file) = velocity_file(instrument, index, velocity) else {
            continue;
        };
        let path = instrument_dir
            .join(format!("{}-{}", velocity.start, velocity.end))
            .join(file);

        match write_velocity(&path, velocity, options) {
            Ok(true) => written.push(path),
            Ok(false) => {}
            Err(e) => tracing::warn!("Skipping {}: {e}", path.display()),
        }
    }

    tracing::info!(
        "Exported {} files for instrument {midi_id} '{}'",
        written.len(),
        instrument.name
    );
    Ok(written)
}

/// Exports every audio instrument in midi order
pub fn export_all(
    drumset: &Drumset,
    dest: &Path,
    options: &ExportOptions,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::new();
    for (midi_id, _) in drumset.audio_instruments() {
        written.extend(export_instrument_with(drumset, midi_id, dest, options)?);
    }
    Ok(written)
}

/// File name for a velocity, from its source path when known
fn velocity_file(instrument: &Instrument, index: usize, velocity: &Velocity) -> Option<String> {
    if velocity.sample.is_none() {
        return None;
    }
    let base = velocity
        .source_path()
        .and_then(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| format!("{}-{index}", instrument.name));
    Some(format!("{}.wav", sanitize(&base)))
}

/// Returns false when the velocity has no audio to write
fn write_velocity(path: &Path, velocity: &Velocity, options: &ExportOptions) -> io::Result<bool> {
    let Some(sample) = &velocity.sample else {
        return Ok(false);
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data_len = sample.bytes_per_sample() * sample.sample_count as usize;
    let data = &sample.pcm[..data_len.min(sample.pcm.len())];
    let mut contents = wave_header(
        sample.channels,
        sample.sample_rate,
        sample.bits_per_sample,
        data.len() as u32,
    )
    .to_vec();
    contents.extend_from_slice(data);

    if !is_newer_than_container(path, options) {
        fs::write(path, &contents)?;
        return Ok(true);
    }

    // Keep user edits: write beside the existing file and only replace it
    // when the content actually changed
    let mut orig = path.as_os_str().to_owned();
    orig.push(".orig");
    let orig = PathBuf::from(orig);
    fs::write(&orig, &contents)?;

    if fs::read(path)? == contents {
        tracing::debug!("{} unchanged", path.display());
        fs::remove_file(&orig)?;
    } else {
        fs::rename(&orig, path)?;
    }
    Ok(true)
}

fn is_newer_than_container(path: &Path, options: &ExportOptions) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    match options.container_modified {
        Some(container) => modified > container,
        None => true,
    }
}
