//! Container encoding
//!
//! The encoder builds every section in memory, feeding the checksum in
//! section order (waves, table, metadata, extensions, header prefix), then
//! lays the sections out in file order:
//!
//! ```text
//! header | table | metadata header | extension header | (padding, pcm)* | metadata | volume
//! ```

use crate::crc::Crc32;
use crate::error::{EncodeError, ValidationError};
use crate::layout::{
    DEFAULT_MAX_SIZE, INITIAL_PADDING, MAX_INSTRUMENTS, MAX_VELOCITIES, PRE_WAVE_SIZE,
    SUPPORTED_BIT_DEPTHS, WAVE_ALIGNMENT, WAVE_START_OFFSET,
};
use crate::model::{Drumset, Instrument, Velocity};
use crate::records::{
    ContainerHeader, ExtensionHeader, ExtensionVolume, InstrumentRecord, MetadataHeader,
    VelocityRecord,
};
use crate::stream::{BlankDescriptor, BlankSchema, Metadata};
use crate::wav::read_wave;

static ZERO_PADDING: [u8; WAVE_ALIGNMENT] = [0u8; WAVE_ALIGNMENT];

/// Encoder settings
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Largest container accepted, in bytes
    pub max_size: usize,
    /// Build number for the header; `None` keeps the drumset's own
    pub build: Option<u16>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            build: None,
        }
    }
}

/// Encodes a drumset with default options
pub fn encode(drumset: &Drumset) -> Result<Vec<u8>, EncodeError> {
    encode_with(drumset, &EncodeOptions::default())
}

/// Validates and encodes a drumset. Nothing is returned unless every
/// section was built.
pub fn encode_with(drumset: &Drumset, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    drumset.validate()?;
    DrumsetEncoder::new(drumset, options).encode()
}

/// PCM of one audio instrument and where it lands in the file
struct InstrumentWaves {
    midi_id: u8,
    padding: usize,
    /// Absolute offset of the first PCM byte
    start: usize,
    records: Vec<VelocityRecord>,
    data: Vec<u8>,
}

impl InstrumentWaves {
    fn end(&self) -> usize {
        self.start + self.data.len()
    }
}

struct DrumsetEncoder<'a> {
    drumset: &'a Drumset,
    options: &'a EncodeOptions,
    crc: Crc32,
}

impl<'a> DrumsetEncoder<'a> {
    fn new(drumset: &'a Drumset, options: &'a EncodeOptions) -> Self {
        Self {
            drumset,
            options,
            crc: Crc32::new(),
        }
    }

    fn encode(mut self) -> Result<Vec<u8>, EncodeError> {
        let waves = self.make_wave_blob()?;
        let table = self.make_instrument_table(&waves);
        let (meta_header, metadata) = self.make_metadata(&waves)?;
        let (ext_header, ext_volume) = self.make_extensions(&meta_header)?;
        let header = self.make_header();

        let total = meta_header.end() + ext_volume.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&header);
        out.extend_from_slice(&table);
        out.extend_from_slice(&meta_header.to_bytes());
        out.extend_from_slice(&ext_header);
        debug_assert_eq!(out.len(), PRE_WAVE_SIZE);
        for instrument in &waves {
            out.extend_from_slice(&ZERO_PADDING[..instrument.padding]);
            out.extend_from_slice(&instrument.data);
        }
        out.extend_from_slice(&metadata);
        out.extend_from_slice(&ext_volume);
        debug_assert_eq!(out.len(), total);

        tracing::info!(
            "Encoded drumset '{}': {} bytes, crc {:08X}",
            self.drumset.name,
            out.len(),
            u32::from_le_bytes([header[8], header[9], header[10], header[11]])
        );
        Ok(out)
    }

    /// Packs each audio instrument's PCM on a 512-byte boundary.
    fn make_wave_blob(&mut self) -> Result<Vec<InstrumentWaves>, EncodeError> {
        let drumset = self.drumset;
        let mut waves: Vec<InstrumentWaves> = Vec::new();

        for (midi_id, instrument) in drumset.audio_instruments() {
            let (padding, start) = match waves.last() {
                None => (INITIAL_PADDING, WAVE_START_OFFSET),
                Some(previous) => {
                    let end = previous.end();
                    let start = end.next_multiple_of(WAVE_ALIGNMENT);
                    (start - end, start)
                }
            };

            let mut data = Vec::new();
            let mut records = Vec::with_capacity(instrument.velocities.len());
            for (index, velocity) in instrument.velocities.iter().enumerate() {
                let offset = self.check_offset(start + data.len())?;
                let mut record = load_velocity(midi_id, index, velocity, &mut data)?;
                record.offset = offset;
                records.push(record);
            }
            self.check_offset(start + data.len())?;

            tracing::debug!(
                "Instrument {midi_id}: {} bytes of PCM at {start} ({padding} bytes padding)",
                data.len()
            );
            self.crc.update(&ZERO_PADDING[..padding]);
            self.crc.update(&data);

            waves.push(InstrumentWaves {
                midi_id,
                padding,
                start,
                records,
                data,
            });
        }
        Ok(waves)
    }

    fn make_instrument_table(&mut self, waves: &[InstrumentWaves]) -> Vec<u8> {
        let drumset = self.drumset;
        let mut table = Vec::with_capacity(MAX_INSTRUMENTS * InstrumentRecord::SIZE);

        for midi_id in 0..MAX_INSTRUMENTS as u8 {
            let placed = waves.iter().find(|w| w.midi_id == midi_id);
            let slot = match (drumset.instrument(midi_id), placed) {
                (Some(instrument), Some(placed)) => instrument_record(instrument, placed).to_bytes(),
                _ => InstrumentRecord::BLANK,
            };
            self.crc.update(&slot);
            table.extend_from_slice(&slot);
        }
        table
    }

    fn make_metadata(
        &mut self,
        waves: &[InstrumentWaves],
    ) -> Result<(MetadataHeader, Vec<u8>), EncodeError> {
        let drumset = self.drumset;
        let metadata = Metadata {
            name: drumset.name.clone(),
            instrument_names: drumset
                .audio_instruments()
                .map(|(_, instrument)| instrument.name.clone())
                .collect(),
            source_paths: drumset
                .audio_instruments()
                .flat_map(|(_, instrument)| instrument.velocities.iter())
                .map(|velocity| {
                    velocity
                        .source_path()
                        .map(|path| path.to_string_lossy().into_owned())
                        .unwrap_or_default()
                })
                .collect(),
            blanks: drumset
                .blank_instruments()
                .map(|(midi_id, instrument)| blank_descriptor(midi_id, instrument))
                .collect(),
            trailing_volume: None,
        };
        let bytes = metadata.to_bytes(BlankSchema::Full);

        // Validation guarantees at least one audio instrument
        let offset = waves.last().map_or(WAVE_START_OFFSET, InstrumentWaves::end);
        let header = MetadataHeader {
            offset: self.check_offset(offset)?,
            size: self.check_offset(bytes.len())?,
        };
        self.crc.update(&header.to_bytes());
        self.crc.update(&bytes);
        Ok((header, bytes))
    }

    fn make_extensions(
        &mut self,
        meta_header: &MetadataHeader,
    ) -> Result<([u8; ExtensionHeader::SIZE], [u8; ExtensionVolume::SIZE]), EncodeError> {
        let volume_offset = self.check_offset(meta_header.end())?;
        self.check_offset(meta_header.end() + ExtensionVolume::SIZE)?;

        let header = ExtensionHeader::with_volume_at(volume_offset).to_bytes();
        let volume = ExtensionVolume {
            volume: self.drumset.global_volume,
        }
        .to_bytes();
        self.crc.update(&header);
        self.crc.update(&volume);
        Ok((header, volume))
    }

    fn make_header(&mut self) -> [u8; ContainerHeader::SIZE] {
        let build = self
            .options
            .build
            .unwrap_or(self.drumset.format_version.build);
        let mut header = ContainerHeader::current(build);
        self.crc.update(&header.prefix());
        header.crc = self.crc.finalize(true);
        header.to_bytes()
    }

    /// Rejects positions past the size cap or the 32-bit offset range
    fn check_offset(&self, position: usize) -> Result<u32, EncodeError> {
        let size_error = || ValidationError::TooLarge {
            size: position,
            max: self.options.max_size,
        };
        if position > self.options.max_size {
            return Err(size_error().into());
        }
        u32::try_from(position).map_err(|_| size_error().into())
    }
}

/// Appends one velocity's PCM to `data` and describes it
fn load_velocity(
    midi_id: u8,
    index: usize,
    velocity: &Velocity,
    data: &mut Vec<u8>,
) -> Result<VelocityRecord, EncodeError> {
    let (channels, sample_rate, bits_per_sample, pcm_len) = match (&velocity.sample, &velocity.source)
    {
        (Some(sample), _) => {
            data.extend_from_slice(&sample.pcm);
            (
                sample.channels,
                sample.sample_rate,
                sample.bits_per_sample,
                sample.pcm.len(),
            )
        }
        (None, Some(path)) => {
            let wave = read_wave(path)?;
            data.extend_from_slice(&wave.pcm);
            (
                wave.channels,
                wave.sample_rate,
                wave.bits_per_sample,
                wave.pcm.len(),
            )
        }
        (None, None) => return Err(EncodeError::EmptySample { midi_id, index }),
    };

    if pcm_len == 0 {
        return Err(EncodeError::EmptySample { midi_id, index });
    }
    if !SUPPORTED_BIT_DEPTHS.contains(&bits_per_sample) || channels == 0 {
        return Err(EncodeError::UnsupportedSample {
            midi_id,
            index,
            reason: format!("{bits_per_sample}-bit, {channels} channels"),
        });
    }

    Ok(VelocityRecord {
        bits_per_sample,
        channels,
        sample_rate,
        start: velocity.start as u32,
        sample_count: (pcm_len / (bits_per_sample as usize / 8)) as u32,
        offset: 0,
    })
}

fn instrument_record(instrument: &Instrument, waves: &InstrumentWaves) -> InstrumentRecord {
    let mut velocities = [VelocityRecord::default(); MAX_VELOCITIES];
    for (slot, record) in velocities.iter_mut().zip(&waves.records) {
        *slot = *record;
    }

    InstrumentRecord {
        choke_group: instrument.choke_group,
        polyphony: instrument.polyphony,
        velocity_count: waves.records.len() as u32,
        data_size: waves.data.len() as u32,
        volume: instrument.volume,
        fill_choke_group: instrument.fill_choke_group,
        fill_choke_delay: instrument.fill_choke_delay.as_u8(),
        non_percussion: instrument.non_percussion as u8,
        velocities,
    }
}

fn blank_descriptor(midi_id: u8, instrument: &Instrument) -> BlankDescriptor {
    BlankDescriptor {
        name: instrument.name.clone(),
        midi_id: midi_id as u32,
        choke_group: instrument.choke_group as u32,
        polyphony: instrument.polyphony as u32,
        volume: Some(instrument.volume as u32),
        fill_choke_group: Some(instrument.fill_choke_group as u32),
        fill_choke_delay: Some(instrument.fill_choke_delay.as_u8() as u32),
        velocities: instrument
            .velocities
            .iter()
            .map(|v| (v.start as u32, v.end as u32))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{EXTENSION_HEADER_OFFSET, HEADER_SIZE, METADATA_HEADER_OFFSET};
    use crate::model::Sample;

    fn mono16(start: u8, end: u8, len: usize) -> Velocity {
        Velocity {
            start,
            end,
            source: None,
            sample: Some(Sample::new(44100, 16, 1, vec![0x11; len])),
        }
    }

    fn kit(lengths: &[usize]) -> Drumset {
        let mut drumset = Drumset::new("Test");
        for (i, &len) in lengths.iter().enumerate() {
            let mut instrument = Instrument::new(format!("Inst {i}"));
            instrument.velocities.push(mono16(0, 127, len));
            drumset.insert(36 + i as u8, instrument);
        }
        drumset
    }

    #[test]
    fn test_fixed_area_layout() {
        let bytes = encode(&kit(&[100])).unwrap();
        assert_eq!(&bytes[0..4], b"BBds");
        assert_eq!(bytes[4..6], [1, 1]);
        assert_eq!(&bytes[EXTENSION_HEADER_OFFSET..EXTENSION_HEADER_OFFSET + 4], b"exth");
        assert!(bytes[PRE_WAVE_SIZE..WAVE_START_OFFSET].iter().all(|&b| b == 0));
        assert_eq!(bytes[WAVE_START_OFFSET], 0x11);

        let meta = MetadataHeader::from_bytes(&bytes[METADATA_HEADER_OFFSET..]).unwrap();
        assert_eq!(meta.offset as usize, WAVE_START_OFFSET + 100);
        assert_eq!(meta.end() + 8, bytes.len());
        assert_eq!(&bytes[meta.end()..meta.end() + 4], b"volg");
    }

    #[test]
    fn test_table_record_for_audio_instrument() {
        let bytes = encode(&kit(&[100])).unwrap();
        let at = HEADER_SIZE + 36 * InstrumentRecord::SIZE;
        let record = InstrumentRecord::from_bytes(&bytes[at..]).unwrap();
        assert_eq!(record.velocity_count, 1);
        assert_eq!(record.data_size, 100);
        assert_eq!(record.volume, 100);
        assert_eq!(record.velocities[0].sample_count, 50);
        assert_eq!(record.velocities[0].offset as usize, WAVE_START_OFFSET);

        let empty = InstrumentRecord::from_bytes(&bytes[HEADER_SIZE..]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_alignment_padding() {
        // 511 bytes: one byte short of the boundary
        let bytes = encode(&kit(&[511, 64])).unwrap();
        let second = HEADER_SIZE + 37 * InstrumentRecord::SIZE;
        let record = InstrumentRecord::from_bytes(&bytes[second..]).unwrap();
        assert_eq!(record.velocities[0].offset as usize, WAVE_START_OFFSET + 512);

        // Already aligned: no padding
        let bytes = encode(&kit(&[1024, 64])).unwrap();
        let record = InstrumentRecord::from_bytes(&bytes[second..]).unwrap();
        assert_eq!(record.velocities[0].offset as usize, WAVE_START_OFFSET + 1024);
    }

    #[test]
    fn test_size_cap() {
        let options = EncodeOptions {
            max_size: WAVE_START_OFFSET + 10,
            build: None,
        };
        let result = encode_with(&kit(&[100]), &options);
        assert!(matches!(
            result,
            Err(EncodeError::Validation(ValidationError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_build_number() {
        let options = EncodeOptions {
            build: Some(0x1234),
            ..Default::default()
        };
        let bytes = encode_with(&kit(&[10]), &options).unwrap();
        assert_eq!(bytes[6..8], [0x34, 0x12]);
    }

    #[test]
    fn test_missing_source_file_is_fatal() {
        let mut drumset = kit(&[10]);
        drumset.instruments.get_mut(&36).unwrap().velocities[0]
            .set_source("/nonexistent/kick.wav");
        assert!(matches!(encode(&drumset), Err(EncodeError::Io { .. })));
    }

    #[test]
    fn test_empty_drumset_is_rejected() {
        let result = encode(&Drumset::new("Empty"));
        assert!(matches!(
            result,
            Err(EncodeError::Validation(ValidationError::NoAudio))
        ));
    }
}
