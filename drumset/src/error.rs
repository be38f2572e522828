//! Error types for every codec operation

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The input bytes are not a usable drumset container
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Shorter than the header or wrong magic
    #[error("not a drumset container")]
    NotAContainer,

    #[error(
        "truncated {section}: {needed} bytes at offset {offset}, buffer holds {available}"
    )]
    Truncated {
        section: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{section} offset {offset} points inside the fixed header area")]
    CorruptOffset { section: &'static str, offset: usize },

    #[error("corrupt record for instrument {midi_id}: {reason}")]
    CorruptRecord { midi_id: u8, reason: String },

    #[error("instrument {0} is defined more than once")]
    DuplicateInstrument(u8),

    #[error("midi id {0} is out of range")]
    InvalidMidiId(u32),

    #[error("metadata stream holds an invalid UTF-16 string")]
    InvalidString,
}

/// A drumset model that cannot be encoded as is
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("midi id {0} is out of range (max 127)")]
    MidiIdOutOfRange(u8),

    #[error("instrument {midi_id} has {count} velocities (max 16)")]
    TooManyVelocities { midi_id: u8, count: usize },

    #[error("instrument {0} mixes velocities with and without audio")]
    MixedSources(u8),

    #[error("instrument {0}: first velocity must start at 0")]
    FirstStartNotZero(u8),

    #[error("instrument {0}: velocities are not sorted by start")]
    Unsorted(u8),

    #[error("instrument {midi_id}: velocity {index} range {start}-{end} leaves a gap or overlap")]
    VelocityRange {
        midi_id: u8,
        index: usize,
        start: u8,
        end: u8,
    },

    #[error("instrument {midi_id}: {field} {value} is out of range (max {max})")]
    FieldOutOfRange {
        midi_id: u8,
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("global volume {0} is out of range (max 159)")]
    GlobalVolumeOutOfRange(u8),

    #[error("drumset has no instrument with audio")]
    NoAudio,

    #[error("container would be {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}

/// A source WAV file the encoder cannot take PCM from
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaveError {
    #[error("not a RIFF/WAVE file")]
    NotRiff,

    #[error("missing fmt chunk")]
    MissingFormat,

    #[error("missing data chunk")]
    MissingData,

    #[error("chunk {0} runs past the end of the file")]
    TruncatedChunk(String),

    #[error("unsupported format tag 0x{0:04X} (PCM only)")]
    UnsupportedFormat(u16),

    #[error("unsupported bit depth {0} (8, 16 or 24)")]
    UnsupportedBitDepth(u16),

    #[error("invalid channel count {0}")]
    InvalidChannels(u16),

    #[error("data chunk is empty")]
    EmptyData,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unusable wave file {}: {source}", .path.display())]
    UnsupportedWave {
        path: PathBuf,
        #[source]
        source: WaveError,
    },

    #[error("instrument {midi_id}: velocity {index} has no PCM data")]
    EmptySample { midi_id: u8, index: usize },

    #[error("instrument {midi_id}: velocity {index} has unsupported format: {reason}")]
    UnsupportedSample {
        midi_id: u8,
        index: usize,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no instrument with midi id {0}")]
    UnknownInstrument(u8),

    #[error("failed to create {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("container carries an extension block that in-place rename would drop")]
    ExtensionBlockPresent,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
