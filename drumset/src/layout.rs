//! On-disk layout of a drumset container
//!
//! Every value here is fixed by the pedal firmware's parser. Offsets are
//! absolute byte positions from the start of the file.
//!
//! ```text
//! 0      header            magic, version, revision, build, crc
//! 12     instrument table  128 slots x 468 bytes
//! 59916  metadata header   offset + size of the metadata stream
//! 59924  extension header  "exth" + 4 (offset, size) slots
//! 59960  padding           up to WAVE_START_OFFSET
//! 60416  wave blob         per instrument: padding to 512, raw PCM
//! ...    metadata stream   big-endian names, paths, blank instruments
//! ...    volume extension  "volg" + 3 reserved + global volume
//! ```

// =============================================================================
// Header
// =============================================================================

/// Container magic
pub const MAGIC: &[u8; 4] = b"BBds";

/// Format version written by the encoder
pub const FORMAT_VERSION: u8 = 1;

/// Format revision written by the encoder
pub const FORMAT_REVISION: u8 = 1;

/// Header size: magic(4) + version + revision + build(u16) + crc(u32)
pub const HEADER_SIZE: usize = 12;

/// Bytes of the header covered by the CRC (everything before the CRC field)
pub const HEADER_PREFIX_SIZE: usize = 8;

/// Position of the CRC field
pub const CRC_OFFSET: usize = HEADER_PREFIX_SIZE;

// =============================================================================
// Instrument table
// =============================================================================

/// Number of instrument slots, one per MIDI note
pub const MAX_INSTRUMENTS: usize = 128;

/// Velocity sub-slots per instrument
pub const MAX_VELOCITIES: usize = 16;

/// bps(u16) + channels(u16) + rate + start + samples + reserved x2 + offset
pub const VELOCITY_RECORD_SIZE: usize = 28;

/// Fixed part of an instrument slot preceding the velocity array
pub const INSTRUMENT_FIXED_SIZE: usize = 20;

pub const INSTRUMENT_RECORD_SIZE: usize =
    INSTRUMENT_FIXED_SIZE + MAX_VELOCITIES * VELOCITY_RECORD_SIZE;

pub const INSTRUMENT_TABLE_OFFSET: usize = HEADER_SIZE;

pub const INSTRUMENT_TABLE_SIZE: usize = MAX_INSTRUMENTS * INSTRUMENT_RECORD_SIZE;

// =============================================================================
// Metadata and extensions
// =============================================================================

pub const METADATA_HEADER_OFFSET: usize = INSTRUMENT_TABLE_OFFSET + INSTRUMENT_TABLE_SIZE;

/// Byte offset of the metadata size field, rewritten by in-place rename
pub const METADATA_SIZE_OFFSET: usize = METADATA_HEADER_OFFSET + 4;

pub const METADATA_HEADER_SIZE: usize = 8;

pub const EXTENSION_HEADER_OFFSET: usize = METADATA_HEADER_OFFSET + METADATA_HEADER_SIZE;

pub const EXTENSION_MAGIC: &[u8; 4] = b"exth";

/// Number of (offset, size) descriptors in the extension header
pub const EXTENSION_SLOTS: usize = 4;

pub const EXTENSION_HEADER_SIZE: usize = 4 + EXTENSION_SLOTS * 8;

/// Extension slot holding the global volume block
pub const EXTENSION_VOLUME_SLOT: usize = 0;

pub const VOLUME_MAGIC: &[u8; 4] = b"volg";

/// magic(4) + reserved(3) + volume(1)
pub const EXTENSION_VOLUME_SIZE: usize = 8;

// =============================================================================
// Wave blob
// =============================================================================

/// Everything the encoder writes before the first wave padding
pub const PRE_WAVE_SIZE: usize = EXTENSION_HEADER_OFFSET + EXTENSION_HEADER_SIZE;

/// Absolute offset of the first instrument's PCM (0xEC00)
pub const WAVE_START_OFFSET: usize = 60416;

/// Padding between the fixed sections and the first instrument's PCM
pub const INITIAL_PADDING: usize = WAVE_START_OFFSET - PRE_WAVE_SIZE;

/// Every instrument's PCM starts on this boundary
pub const WAVE_ALIGNMENT: usize = 512;

// =============================================================================
// Value ranges
// =============================================================================

pub const MAX_VELOCITY: u8 = 127;

/// Unity gain for both instrument and global volume
pub const DEFAULT_VOLUME: u8 = 100;

pub const MAX_INSTRUMENT_VOLUME: u8 = 100;

/// Global volume 159 is roughly +4 dB
pub const MAX_GLOBAL_VOLUME: u8 = 159;

/// Choke and fill choke groups (0 = none)
pub const MAX_CHOKE_GROUP: u16 = 15;

/// Largest container the pedal accepts
pub const DEFAULT_MAX_SIZE: usize = 100 * 1024 * 1024;

/// Bit depths the pedal can play
pub const SUPPORTED_BIT_DEPTHS: [u16; 3] = [8, 16, 24];

pub const FILE_EXTENSION: &str = "drm";

const _: () = assert!(INSTRUMENT_RECORD_SIZE == 468);
const _: () = assert!(METADATA_HEADER_OFFSET == 59916);
const _: () = assert!(EXTENSION_HEADER_OFFSET == 59924);
const _: () = assert!(PRE_WAVE_SIZE == 59960);
const _: () = assert!(INITIAL_PADDING == 456);
const _: () = assert!(WAVE_START_OFFSET % WAVE_ALIGNMENT == 0);
