//! Container decoding

use std::path::PathBuf;

use crate::error::FormatError;
use crate::layout::{
    DEFAULT_VOLUME, EXTENSION_HEADER_OFFSET, EXTENSION_HEADER_SIZE, INSTRUMENT_RECORD_SIZE,
    INSTRUMENT_TABLE_OFFSET, INSTRUMENT_TABLE_SIZE, MAX_GLOBAL_VOLUME, MAX_INSTRUMENTS,
    MAX_VELOCITIES, MAX_VELOCITY, METADATA_HEADER_OFFSET, METADATA_HEADER_SIZE,
    SUPPORTED_BIT_DEPTHS,
};
use crate::model::{Drumset, FillChokeDelay, FormatVersion, Instrument, Sample, Velocity};
use crate::records::{
    ContainerHeader, ExtensionHeader, ExtensionVolume, InstrumentRecord, MetadataHeader,
};
use crate::stream::{BlankDescriptor, BlankSchema, Metadata};

/// Decodes a drumset container.
///
/// The returned model owns copies of every PCM payload, so it can be
/// re-encoded or exported without the original buffer.
pub fn decode(bytes: &[u8]) -> Result<Drumset, FormatError> {
    let header = ContainerHeader::from_bytes(bytes).ok_or(FormatError::NotAContainer)?;
    tracing::debug!(
        "Decoding drumset v{}.{} build {} ({} bytes)",
        header.version,
        header.revision,
        header.build,
        bytes.len()
    );

    let records = read_instrument_table(bytes)?;

    let meta_header = MetadataHeader::from_bytes(section(
        bytes,
        METADATA_HEADER_OFFSET,
        METADATA_HEADER_SIZE,
        "metadata header",
    )?)
    .ok_or(FormatError::NotAContainer)?;
    if (meta_header.offset as usize) < METADATA_HEADER_OFFSET + METADATA_HEADER_SIZE {
        return Err(FormatError::CorruptOffset {
            section: "metadata",
            offset: meta_header.offset as usize,
        });
    }

    let extension = if header.has_extensions() {
        read_extension_header(bytes)
    } else {
        None
    };

    let velocity_count = records.iter().map(|(_, r)| r.used_velocities().len()).sum();
    let metadata = Metadata::read(
        section(
            bytes,
            meta_header.offset as usize,
            meta_header.size as usize,
            "metadata",
        )?,
        BlankSchema::for_version(header.version, header.revision),
        records.len(),
        velocity_count,
        header.has_trailing_volume(),
    )?;

    let trailing_volume = metadata.trailing_volume.or_else(|| {
        // A 1.0 trailing byte may sit just past the declared stream size
        header
            .has_trailing_volume()
            .then(|| bytes.get(meta_header.end()).copied())
            .flatten()
    });
    let global_volume = resolve_global_volume(bytes, trailing_volume, extension.as_ref());

    let mut drumset = Drumset {
        name: metadata.name.clone(),
        global_volume,
        format_version: FormatVersion {
            version: header.version,
            revision: header.revision,
            build: header.build,
        },
        instruments: Default::default(),
    };

    let mut paths = metadata.source_paths.iter();
    for ((midi_id, record), name) in records.iter().zip(&metadata.instrument_names) {
        let instrument = audio_instrument(bytes, *midi_id, record, name, &mut paths)?;
        drumset.instruments.insert(*midi_id, instrument);
    }

    for blank in &metadata.blanks {
        let (midi_id, instrument) = blank_instrument(blank)?;
        if drumset.instruments.insert(midi_id, instrument).is_some() {
            return Err(FormatError::DuplicateInstrument(midi_id));
        }
    }

    tracing::debug!(
        "Decoded '{}': {} instruments, global volume {}",
        drumset.name,
        drumset.instruments.len(),
        drumset.global_volume
    );
    Ok(drumset)
}

/// Derives each velocity's upper bound from the starts that follow it.
///
/// A layer ends one below the next distinct start, or at 127 when no later
/// layer starts elsewhere. Layers sharing a start are round-robin
/// alternates and get identical bounds.
pub fn infer_velocity_bounds(starts: &[u8]) -> Vec<(u8, u8)> {
    starts
        .iter()
        .enumerate()
        .map(|(j, &lower)| {
            let upper = starts[j + 1..]
                .iter()
                .find(|&&start| start != lower)
                .map_or(MAX_VELOCITY, |&next| next.saturating_sub(1));
            (lower, upper)
        })
        .collect()
}

/// Bounds-checked view of `len` bytes at `offset`
pub(crate) fn section<'a>(
    bytes: &'a [u8],
    offset: usize,
    len: usize,
    name: &'static str,
) -> Result<&'a [u8], FormatError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(FormatError::Truncated {
            section: name,
            offset,
            needed: len,
            available: bytes.len().saturating_sub(offset),
        })
}

/// Validated `exth` header, or `None` when absent or corrupt
pub(crate) fn read_extension_header(bytes: &[u8]) -> Option<ExtensionHeader> {
    let header = bytes
        .get(EXTENSION_HEADER_OFFSET..EXTENSION_HEADER_OFFSET + EXTENSION_HEADER_SIZE)
        .and_then(ExtensionHeader::from_bytes);
    if header.is_none() {
        tracing::warn!("Extension header magic mismatch, ignoring extensions");
    }
    header
}

/// Non-empty table slots in midi order
fn read_instrument_table(bytes: &[u8]) -> Result<Vec<(u8, InstrumentRecord)>, FormatError> {
    let table = section(
        bytes,
        INSTRUMENT_TABLE_OFFSET,
        INSTRUMENT_TABLE_SIZE,
        "instrument table",
    )?;

    let mut records = Vec::new();
    for (midi_id, slot) in table.chunks_exact(INSTRUMENT_RECORD_SIZE).enumerate() {
        let midi_id = midi_id as u8;
        let Some(record) = InstrumentRecord::from_bytes(slot) else {
            continue;
        };
        if record.is_empty() {
            continue;
        }
        check_record(bytes, midi_id, &record)?;
        records.push((midi_id, record));
    }
    Ok(records)
}

fn check_record(bytes: &[u8], midi_id: u8, record: &InstrumentRecord) -> Result<(), FormatError> {
    let corrupt = |reason: String| FormatError::CorruptRecord { midi_id, reason };

    if record.velocity_count as usize > MAX_VELOCITIES {
        return Err(corrupt(format!(
            "{} velocities (max {MAX_VELOCITIES})",
            record.velocity_count
        )));
    }
    for (index, velocity) in record.used_velocities().iter().enumerate() {
        if !SUPPORTED_BIT_DEPTHS.contains(&velocity.bits_per_sample) {
            return Err(corrupt(format!(
                "velocity {index} has bit depth {}",
                velocity.bits_per_sample
            )));
        }
        if velocity.start > MAX_VELOCITY as u32 {
            return Err(corrupt(format!(
                "velocity {index} starts at {}",
                velocity.start
            )));
        }
        section(bytes, velocity.offset as usize, velocity.data_len(), "wave data")?;
    }
    Ok(())
}

fn resolve_global_volume(
    bytes: &[u8],
    trailing_volume: Option<u8>,
    extension: Option<&ExtensionHeader>,
) -> u8 {
    let stored = if let Some(volume) = trailing_volume {
        Some(volume)
    } else if let Some(extension) = extension {
        let (offset, size) = extension.volume_slot();
        let block = bytes
            .get(offset as usize..)
            .and_then(|rest| rest.get(..size as usize))
            .and_then(ExtensionVolume::from_bytes);
        if block.is_none() {
            tracing::warn!("Volume extension block missing or invalid");
        }
        block.map(|b| b.volume)
    } else {
        None
    };

    match stored {
        Some(volume) if volume <= MAX_GLOBAL_VOLUME => volume,
        Some(volume) => {
            tracing::warn!("Global volume {volume} out of range, using {DEFAULT_VOLUME}");
            DEFAULT_VOLUME
        }
        None => DEFAULT_VOLUME,
    }
}

fn audio_instrument<'a>(
    bytes: &[u8],
    midi_id: u8,
    record: &InstrumentRecord,
    name: &str,
    paths: &mut impl Iterator<Item = &'a String>,
) -> Result<Instrument, FormatError> {
    let used = record.used_velocities();
    let starts: Vec<u8> = used.iter().map(|v| v.start as u8).collect();
    let bounds = infer_velocity_bounds(&starts);

    let mut velocities = Vec::with_capacity(used.len());
    for (slot, (start, end)) in used.iter().zip(bounds) {
        let pcm = section(bytes, slot.offset as usize, slot.data_len(), "wave data")?;
        let source = paths
            .next()
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        velocities.push(Velocity {
            start,
            end,
            source,
            sample: Some(Sample {
                sample_rate: slot.sample_rate,
                bits_per_sample: slot.bits_per_sample,
                channels: slot.channels,
                sample_count: slot.sample_count,
                offset: slot.offset,
                pcm: pcm.to_vec(),
            }),
        });
    }

    let fill_choke_delay = FillChokeDelay::from_u8(record.fill_choke_delay).unwrap_or_else(|| {
        tracing::warn!(
            "Instrument {midi_id}: unknown fill choke delay {}",
            record.fill_choke_delay
        );
        FillChokeDelay::default()
    });

    Ok(Instrument {
        name: name.to_string(),
        choke_group: record.choke_group,
        polyphony: record.polyphony,
        // Files written before the volume field existed carry 0
        volume: if record.volume == 0 {
            DEFAULT_VOLUME
        } else {
            record.volume
        },
        fill_choke_group: record.fill_choke_group,
        fill_choke_delay,
        non_percussion: record.non_percussion != 0,
        velocities,
    })
}

fn blank_instrument(blank: &BlankDescriptor) -> Result<(u8, Instrument), FormatError> {
    if blank.midi_id as usize >= MAX_INSTRUMENTS {
        return Err(FormatError::InvalidMidiId(blank.midi_id));
    }
    let midi_id = blank.midi_id as u8;
    let corrupt = |reason: String| FormatError::CorruptRecord { midi_id, reason };
    let narrow_u8 = |value: u32, field: &str| {
        u8::try_from(value).map_err(|_| corrupt(format!("{field} {value} out of range")))
    };
    let narrow_u16 = |value: u32, field: &str| {
        u16::try_from(value).map_err(|_| corrupt(format!("{field} {value} out of range")))
    };

    let mut velocities = Vec::with_capacity(blank.velocities.len());
    for &(start, end) in &blank.velocities {
        if start > MAX_VELOCITY as u32 || end > MAX_VELOCITY as u32 {
            return Err(corrupt(format!("velocity range {start}-{end}")));
        }
        velocities.push(Velocity::blank(start as u8, end as u8));
    }

    let fill_choke_delay = match blank.fill_choke_delay {
        Some(value) => narrow_u8(value, "fill choke delay")
            .ok()
            .and_then(FillChokeDelay::from_u8)
            .unwrap_or_default(),
        None => FillChokeDelay::default(),
    };

    let instrument = Instrument {
        name: blank.name.clone(),
        choke_group: narrow_u16(blank.choke_group, "choke group")?,
        polyphony: narrow_u16(blank.polyphony, "polyphony")?,
        volume: narrow_u8(blank.volume.unwrap_or(DEFAULT_VOLUME as u32), "volume")?,
        fill_choke_group: narrow_u8(blank.fill_choke_group.unwrap_or(0), "fill choke group")?,
        fill_choke_delay,
        non_percussion: false,
        velocities,
    };
    Ok((midi_id, instrument))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{HEADER_SIZE, WAVE_START_OFFSET};

    #[test]
    fn test_round_robin_inference() {
        assert_eq!(
            infer_velocity_bounds(&[0, 0, 40, 40, 40, 90]),
            vec![(0, 39), (0, 39), (40, 89), (40, 89), (40, 89), (90, 127)]
        );
    }

    #[test]
    fn test_inference_single_and_empty() {
        assert_eq!(infer_velocity_bounds(&[0]), vec![(0, 127)]);
        assert!(infer_velocity_bounds(&[]).is_empty());
        assert_eq!(
            infer_velocity_bounds(&[0, 1, 2]),
            vec![(0, 0), (1, 1), (2, 127)]
        );
    }

    #[test]
    fn test_rejects_short_and_foreign_input() {
        assert_eq!(decode(&[]), Err(FormatError::NotAContainer));
        assert_eq!(decode(b"BBds"), Err(FormatError::NotAContainer));
        assert_eq!(
            decode(b"RIFF\0\0\0\0WAVEfmt "),
            Err(FormatError::NotAContainer)
        );
    }

    #[test]
    fn test_header_only_is_truncated() {
        let bytes = ContainerHeader::current(0).to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::Truncated {
                section: "instrument table",
                ..
            })
        ));
    }

    #[test]
    fn test_metadata_offset_inside_table_is_corrupt() {
        let mut bytes = vec![0u8; WAVE_START_OFFSET];
        bytes[..HEADER_SIZE].copy_from_slice(&ContainerHeader::current(0).to_bytes());
        let meta = MetadataHeader { offset: 100, size: 4 };
        bytes[METADATA_HEADER_OFFSET..METADATA_HEADER_OFFSET + 8].copy_from_slice(&meta.to_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::CorruptOffset { .. })
        ));
    }

    #[test]
    fn test_blank_descriptor_defaults() {
        let blank = BlankDescriptor {
            name: "Pad".to_string(),
            midi_id: 70,
            choke_group: 1,
            polyphony: 2,
            velocities: vec![(0, 127)],
            ..Default::default()
        };
        let (midi_id, instrument) = blank_instrument(&blank).unwrap();
        assert_eq!(midi_id, 70);
        assert_eq!(instrument.volume, DEFAULT_VOLUME);
        assert_eq!(instrument.fill_choke_delay, FillChokeDelay::Quarter);
        assert!(!instrument.has_audio());

        let out_of_range = BlankDescriptor {
            midi_id: 128,
            ..blank
        };
        assert_eq!(
            blank_instrument(&out_of_range),
            Err(FormatError::InvalidMidiId(128))
        );
    }
}
