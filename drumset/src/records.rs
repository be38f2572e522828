//! Fixed-width little-endian records of the container's fixed area

use byteorder::{ByteOrder, LittleEndian};

use crate::layout::{
    EXTENSION_HEADER_SIZE, EXTENSION_MAGIC, EXTENSION_SLOTS, EXTENSION_VOLUME_SIZE,
    EXTENSION_VOLUME_SLOT, FORMAT_REVISION, FORMAT_VERSION, HEADER_PREFIX_SIZE, HEADER_SIZE,
    INSTRUMENT_FIXED_SIZE, INSTRUMENT_RECORD_SIZE, MAGIC, MAX_VELOCITIES, METADATA_HEADER_SIZE,
    VELOCITY_RECORD_SIZE, VOLUME_MAGIC,
};

// =============================================================================
// Header
// =============================================================================

/// The 12-byte container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u8,
    pub revision: u8,
    pub build: u16,
    pub crc: u32,
}

impl ContainerHeader {
    pub const SIZE: usize = HEADER_SIZE;

    pub fn current(build: u16) -> Self {
        Self {
            version: FORMAT_VERSION,
            revision: FORMAT_REVISION,
            build,
            crc: 0,
        }
    }

    /// The CRC-covered part: magic, version, revision and build
    pub fn prefix(&self) -> [u8; HEADER_PREFIX_SIZE] {
        let mut out = [0u8; HEADER_PREFIX_SIZE];
        out[0..4].copy_from_slice(MAGIC);
        out[4] = self.version;
        out[5] = self.revision;
        LittleEndian::write_u16(&mut out[6..8], self.build);
        out
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..HEADER_PREFIX_SIZE].copy_from_slice(&self.prefix());
        LittleEndian::write_u32(&mut out[8..12], self.crc);
        out
    }

    /// `None` if the buffer is too short or the magic does not match
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC {
            return None;
        }
        Some(Self {
            version: bytes[4],
            revision: bytes[5],
            build: LittleEndian::read_u16(&bytes[6..8]),
            crc: LittleEndian::read_u32(&bytes[8..12]),
        })
    }

    /// Extension header present from 1.1 on
    pub fn has_extensions(&self) -> bool {
        self.version > 1 || (self.version == 1 && self.revision >= 1)
    }

    /// 1.0 files keep the global volume as a trailing metadata byte
    pub fn has_trailing_volume(&self) -> bool {
        self.version == 1 && self.revision == 0
    }
}

// =============================================================================
// Instrument table
// =============================================================================

/// One velocity sub-slot of an instrument record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VelocityRecord {
    pub bits_per_sample: u16,
    pub channels: u16,
    pub sample_rate: u32,
    /// Lower velocity bound; the upper bound is never stored
    pub start: u32,
    /// Samples across all channels
    pub sample_count: u32,
    /// Absolute file offset of the PCM
    pub offset: u32,
}

impl VelocityRecord {
    pub const SIZE: usize = VELOCITY_RECORD_SIZE;

    fn write(&self, out: &mut [u8]) {
        LittleEndian::write_u16(&mut out[0..2], self.bits_per_sample);
        LittleEndian::write_u16(&mut out[2..4], self.channels);
        LittleEndian::write_u32(&mut out[4..8], self.sample_rate);
        LittleEndian::write_u32(&mut out[8..12], self.start);
        LittleEndian::write_u32(&mut out[12..16], self.sample_count);
        // 16..24 reserved
        LittleEndian::write_u32(&mut out[24..28], self.offset);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            bits_per_sample: LittleEndian::read_u16(&bytes[0..2]),
            channels: LittleEndian::read_u16(&bytes[2..4]),
            sample_rate: LittleEndian::read_u32(&bytes[4..8]),
            start: LittleEndian::read_u32(&bytes[8..12]),
            sample_count: LittleEndian::read_u32(&bytes[12..16]),
            offset: LittleEndian::read_u32(&bytes[24..28]),
        }
    }

    /// PCM byte length: sample count times bytes per sample
    pub fn data_len(&self) -> usize {
        (self.bits_per_sample as usize / 8) * self.sample_count as usize
    }
}

/// One 468-byte instrument table slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentRecord {
    pub choke_group: u16,
    pub polyphony: u16,
    pub velocity_count: u32,
    /// Bytes from the instrument's first PCM byte to its last
    pub data_size: u32,
    pub volume: u8,
    pub fill_choke_group: u8,
    pub fill_choke_delay: u8,
    pub non_percussion: u8,
    pub velocities: [VelocityRecord; MAX_VELOCITIES],
}

impl InstrumentRecord {
    pub const SIZE: usize = INSTRUMENT_RECORD_SIZE;

    /// Template for unused table slots
    pub const BLANK: [u8; INSTRUMENT_RECORD_SIZE] = [0u8; INSTRUMENT_RECORD_SIZE];

    pub fn is_empty(&self) -> bool {
        self.velocity_count == 0
    }

    /// The first `velocity_count` sub-slots, capped at the array size
    pub fn used_velocities(&self) -> &[VelocityRecord] {
        let count = (self.velocity_count as usize).min(MAX_VELOCITIES);
        &self.velocities[..count]
    }

    pub fn to_bytes(&self) -> [u8; INSTRUMENT_RECORD_SIZE] {
        let mut out = [0u8; INSTRUMENT_RECORD_SIZE];
        LittleEndian::write_u16(&mut out[0..2], self.choke_group);
        LittleEndian::write_u16(&mut out[2..4], self.polyphony);
        LittleEndian::write_u32(&mut out[4..8], self.velocity_count);
        LittleEndian::write_u32(&mut out[8..12], self.data_size);
        out[12] = self.volume;
        out[13] = self.fill_choke_group;
        out[14] = self.fill_choke_delay;
        out[15] = self.non_percussion;
        // 16..20 reserved

        for (i, velocity) in self.velocities.iter().enumerate() {
            let at = INSTRUMENT_FIXED_SIZE + i * VELOCITY_RECORD_SIZE;
            velocity.write(&mut out[at..at + VELOCITY_RECORD_SIZE]);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < INSTRUMENT_RECORD_SIZE {
            return None;
        }

        let mut velocities = [VelocityRecord::default(); MAX_VELOCITIES];
        for (i, velocity) in velocities.iter_mut().enumerate() {
            let at = INSTRUMENT_FIXED_SIZE + i * VELOCITY_RECORD_SIZE;
            *velocity = VelocityRecord::read(&bytes[at..at + VELOCITY_RECORD_SIZE]);
        }

        Some(Self {
            choke_group: LittleEndian::read_u16(&bytes[0..2]),
            polyphony: LittleEndian::read_u16(&bytes[2..4]),
            velocity_count: LittleEndian::read_u32(&bytes[4..8]),
            data_size: LittleEndian::read_u32(&bytes[8..12]),
            volume: bytes[12],
            fill_choke_group: bytes[13],
            fill_choke_delay: bytes[14],
            non_percussion: bytes[15],
            velocities,
        })
    }
}

// =============================================================================
// Metadata and extensions
// =============================================================================

/// Location of the metadata stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataHeader {
    pub offset: u32,
    pub size: u32,
}

impl MetadataHeader {
    pub const SIZE: usize = METADATA_HEADER_SIZE;

    pub fn to_bytes(&self) -> [u8; METADATA_HEADER_SIZE] {
        let mut out = [0u8; METADATA_HEADER_SIZE];
        LittleEndian::write_u32(&mut out[0..4], self.offset);
        LittleEndian::write_u32(&mut out[4..8], self.size);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < METADATA_HEADER_SIZE {
            return None;
        }
        Some(Self {
            offset: LittleEndian::read_u32(&bytes[0..4]),
            size: LittleEndian::read_u32(&bytes[4..8]),
        })
    }

    pub fn end(&self) -> usize {
        self.offset as usize + self.size as usize
    }
}

/// `exth` header: (offset, size) descriptors of the extension blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtensionHeader {
    pub slots: [(u32, u32); EXTENSION_SLOTS],
}

impl ExtensionHeader {
    pub const SIZE: usize = EXTENSION_HEADER_SIZE;

    /// Header pointing slot 0 at a volume block stored at `volume_offset`
    pub fn with_volume_at(volume_offset: u32) -> Self {
        let mut slots = [(0, 0); EXTENSION_SLOTS];
        slots[EXTENSION_VOLUME_SLOT] = (volume_offset, EXTENSION_VOLUME_SIZE as u32);
        Self { slots }
    }

    pub fn volume_slot(&self) -> (u32, u32) {
        self.slots[EXTENSION_VOLUME_SLOT]
    }

    pub fn to_bytes(&self) -> [u8; EXTENSION_HEADER_SIZE] {
        let mut out = [0u8; EXTENSION_HEADER_SIZE];
        out[0..4].copy_from_slice(EXTENSION_MAGIC);
        for (i, (offset, size)) in self.slots.iter().enumerate() {
            let at = 4 + i * 8;
            LittleEndian::write_u32(&mut out[at..at + 4], *offset);
            LittleEndian::write_u32(&mut out[at + 4..at + 8], *size);
        }
        out
    }

    /// `None` if short or the magic does not match
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < EXTENSION_HEADER_SIZE || &bytes[0..4] != EXTENSION_MAGIC {
            return None;
        }
        let mut slots = [(0, 0); EXTENSION_SLOTS];
        for (i, slot) in slots.iter_mut().enumerate() {
            let at = 4 + i * 8;
            *slot = (
                LittleEndian::read_u32(&bytes[at..at + 4]),
                LittleEndian::read_u32(&bytes[at + 4..at + 8]),
            );
        }
        Some(Self { slots })
    }
}

/// `volg` block carrying the global volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionVolume {
    pub volume: u8,
}

impl ExtensionVolume {
    pub const SIZE: usize = EXTENSION_VOLUME_SIZE;

    pub fn to_bytes(&self) -> [u8; EXTENSION_VOLUME_SIZE] {
        let mut out = [0u8; EXTENSION_VOLUME_SIZE];
        out[0..4].copy_from_slice(VOLUME_MAGIC);
        out[7] = self.volume;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < EXTENSION_VOLUME_SIZE || &bytes[0..4] != VOLUME_MAGIC {
            return None;
        }
        Some(Self { volume: bytes[7] })
    }
}
