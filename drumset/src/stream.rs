//! The metadata stream
//!
//! A big-endian sequential stream following the wave blob. Strings are a
//! `u32` byte length followed by UTF-16BE code units (`0xFFFFFFFF` marks a
//! null string). Field order:
//!
//! 1. drumset name
//! 2. one name per audio instrument, ascending midi id
//! 3. one source path per velocity of every audio instrument
//! 4. blank instrument count, then each blank instrument's descriptor
//! 5. 1.0 files only: a trailing global volume byte

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::FormatError;

const NULL_STRING: u32 = 0xFFFF_FFFF;

// =============================================================================
// Schema
// =============================================================================

/// Which optional blank-instrument fields a given format version carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankSchema {
    /// 0.0: name, midi id, choke group, polyphony
    Base,
    /// 0.1: adds volume
    WithVolume,
    /// 0.2 and every 1.x: adds volume, fill choke group and fill choke delay
    Full,
}

impl BlankSchema {
    pub fn for_version(version: u8, revision: u8) -> Self {
        match (version, revision) {
            (0, 0) => Self::Base,
            (0, 1) => Self::WithVolume,
            _ => Self::Full,
        }
    }

    fn has_volume(self) -> bool {
        self != Self::Base
    }

    fn has_fill_choke(self) -> bool {
        self == Self::Full
    }
}

/// A blank instrument as stored in the metadata stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlankDescriptor {
    pub name: String,
    pub midi_id: u32,
    pub choke_group: u32,
    pub polyphony: u32,
    pub volume: Option<u32>,
    pub fill_choke_group: Option<u32>,
    pub fill_choke_delay: Option<u32>,
    /// Explicit (start, end) pairs
    pub velocities: Vec<(u32, u32)>,
}

/// Parsed contents of the metadata stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub instrument_names: Vec<String>,
    pub source_paths: Vec<String>,
    pub blanks: Vec<BlankDescriptor>,
    pub trailing_volume: Option<u8>,
}

impl Metadata {
    /// Parses a stream for `audio_instruments` audio instruments and
    /// `velocity_count` velocities across them.
    pub fn read(
        bytes: &[u8],
        schema: BlankSchema,
        audio_instruments: usize,
        velocity_count: usize,
        trailing_volume: bool,
    ) -> Result<Self, FormatError> {
        let mut reader = MetadataReader::new(bytes);

        let name = reader.read_string()?;
        let instrument_names = (0..audio_instruments)
            .map(|_| reader.read_string())
            .collect::<Result<Vec<_>, _>>()?;
        let source_paths = (0..velocity_count)
            .map(|_| reader.read_string())
            .collect::<Result<Vec<_>, _>>()?;

        let blank_count = reader.read_u32()?;
        let mut blanks = Vec::new();
        for _ in 0..blank_count {
            blanks.push(reader.read_blank(schema)?);
        }

        let trailing_volume = if trailing_volume && reader.remaining() > 0 {
            Some(reader.read_u8()?)
        } else {
            None
        };

        Ok(Self {
            name,
            instrument_names,
            source_paths,
            blanks,
            trailing_volume,
        })
    }

    pub fn to_bytes(&self, schema: BlankSchema) -> Vec<u8> {
        let mut writer = MetadataWriter::new();
        writer.write_string(&self.name);
        for name in &self.instrument_names {
            writer.write_string(name);
        }
        for path in &self.source_paths {
            writer.write_string(path);
        }
        writer.write_u32(self.blanks.len() as u32);
        for blank in &self.blanks {
            writer.write_blank(blank, schema);
        }
        if let Some(volume) = self.trailing_volume {
            writer.write_u8(volume);
        }
        writer.into_bytes()
    }
}

// =============================================================================
// Reader
// =============================================================================

pub struct MetadataReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> MetadataReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    fn truncated(&self, needed: usize) -> FormatError {
        FormatError::Truncated {
            section: "metadata",
            offset: self.position(),
            needed,
            available: self.remaining(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        self.cursor.read_u8().map_err(|_| self.truncated(1))
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        let at = self.cursor.position();
        self.cursor.read_u32::<BigEndian>().map_err(|_| {
            self.cursor.set_position(at);
            self.truncated(4)
        })
    }

    /// Reads a length-prefixed UTF-16BE string; a null string reads as empty
    pub fn read_string(&mut self) -> Result<String, FormatError> {
        let len = self.read_u32()?;
        if len == NULL_STRING {
            return Ok(String::new());
        }
        let len = len as usize;
        if len % 2 != 0 {
            return Err(FormatError::InvalidString);
        }
        if len > self.remaining() {
            return Err(self.truncated(len));
        }

        let mut raw = vec![0u8; len];
        self.cursor
            .read_exact(&mut raw)
            .map_err(|_| FormatError::InvalidString)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| FormatError::InvalidString)
    }

    fn read_blank(&mut self, schema: BlankSchema) -> Result<BlankDescriptor, FormatError> {
        let name = self.read_string()?;
        let midi_id = self.read_u32()?;
        let choke_group = self.read_u32()?;
        let polyphony = self.read_u32()?;
        let volume = if schema.has_volume() {
            Some(self.read_u32()?)
        } else {
            None
        };
        let (fill_choke_group, fill_choke_delay) = if schema.has_fill_choke() {
            (Some(self.read_u32()?), Some(self.read_u32()?))
        } else {
            (None, None)
        };

        let count = self.read_u32()?;
        let mut velocities = Vec::new();
        for _ in 0..count {
            velocities.push((self.read_u32()?, self.read_u32()?));
        }

        Ok(BlankDescriptor {
            name,
            midi_id,
            choke_group,
            polyphony,
            volume,
            fill_choke_group,
            fill_choke_delay,
            velocities,
        })
    }
}

// =============================================================================
// Writer
// =============================================================================

#[derive(Debug, Default)]
pub struct MetadataWriter {
    buf: Vec<u8>,
}

impl MetadataWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_string(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.write_u32((units.len() * 2) as u32);
        for unit in units {
            self.buf.extend_from_slice(&unit.to_be_bytes());
        }
    }

    fn write_blank(&mut self, blank: &BlankDescriptor, schema: BlankSchema) {
        self.write_string(&blank.name);
        self.write_u32(blank.midi_id);
        self.write_u32(blank.choke_group);
        self.write_u32(blank.polyphony);
        if schema.has_volume() {
            self.write_u32(blank.volume.unwrap_or(0));
        }
        if schema.has_fill_choke() {
            self.write_u32(blank.fill_choke_group.unwrap_or(0));
            self.write_u32(blank.fill_choke_delay.unwrap_or(0));
        }
        self.write_u32(blank.velocities.len() as u32);
        for &(start, end) in &blank.velocities {
            self.write_u32(start);
            self.write_u32(end);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Metadata {
        Metadata {
            name: "Rock Kit".to_string(),
            instrument_names: vec!["Kick".to_string(), "Snäre".to_string()],
            source_paths: vec![
                "/samples/kick.wav".to_string(),
                "/samples/snare_soft.wav".to_string(),
                "/samples/snare_hard.wav".to_string(),
            ],
            blanks: vec![BlankDescriptor {
                name: "Placeholder".to_string(),
                midi_id: 60,
                choke_group: 2,
                polyphony: 4,
                volume: Some(80),
                fill_choke_group: Some(1),
                fill_choke_delay: Some(2),
                velocities: vec![(0, 63), (64, 127)],
            }],
            trailing_volume: None,
        }
    }

    #[test]
    fn test_string_encoding() {
        let mut writer = MetadataWriter::new();
        writer.write_string("Ab");
        assert_eq!(writer.into_bytes(), vec![0, 0, 0, 4, 0, b'A', 0, b'b']);
    }

    #[test]
    fn test_null_string_reads_empty() {
        let mut reader = MetadataReader::new(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(reader.read_string().unwrap(), "");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_odd_string_length_is_invalid() {
        let mut reader = MetadataReader::new(&[0, 0, 0, 3, 0, b'A', 0]);
        assert_eq!(reader.read_string(), Err(FormatError::InvalidString));
    }

    #[test]
    fn test_full_schema_round_trip() {
        let metadata = sample_metadata();
        let bytes = metadata.to_bytes(BlankSchema::Full);
        let parsed = Metadata::read(&bytes, BlankSchema::Full, 2, 3, false).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_legacy_schemas_skip_optional_fields() {
        let mut metadata = sample_metadata();
        metadata.blanks[0].fill_choke_group = None;
        metadata.blanks[0].fill_choke_delay = None;
        let bytes = metadata.to_bytes(BlankSchema::WithVolume);
        let parsed = Metadata::read(&bytes, BlankSchema::WithVolume, 2, 3, false).unwrap();
        assert_eq!(parsed, metadata);

        metadata.blanks[0].volume = None;
        let bytes = metadata.to_bytes(BlankSchema::Base);
        let parsed = Metadata::read(&bytes, BlankSchema::Base, 2, 3, false).unwrap();
        assert_eq!(parsed.blanks[0].volume, None);
        assert_eq!(parsed.blanks[0].velocities, vec![(0, 63), (64, 127)]);
    }

    #[test]
    fn test_trailing_volume_only_when_requested() {
        let mut metadata = sample_metadata();
        metadata.trailing_volume = Some(120);
        let bytes = metadata.to_bytes(BlankSchema::Full);

        let parsed = Metadata::read(&bytes, BlankSchema::Full, 2, 3, true).unwrap();
        assert_eq!(parsed.trailing_volume, Some(120));

        let parsed = Metadata::read(&bytes, BlankSchema::Full, 2, 3, false).unwrap();
        assert_eq!(parsed.trailing_volume, None);
    }

    #[test]
    fn test_schema_dispatch() {
        assert_eq!(BlankSchema::for_version(0, 0), BlankSchema::Base);
        assert_eq!(BlankSchema::for_version(0, 1), BlankSchema::WithVolume);
        assert_eq!(BlankSchema::for_version(0, 2), BlankSchema::Full);
        assert_eq!(BlankSchema::for_version(1, 0), BlankSchema::Full);
        assert_eq!(BlankSchema::for_version(1, 1), BlankSchema::Full);
    }

    #[test]
    fn test_truncated_stream() {
        let bytes = sample_metadata().to_bytes(BlankSchema::Full);
        let result = Metadata::read(&bytes[..bytes.len() - 3], BlankSchema::Full, 2, 3, false);
        assert!(matches!(result, Err(FormatError::Truncated { .. })));
    }
}
