//! Drumset: codec for drum machine sound bank containers
//!
//! A drumset container (`.drm`) pairs a fixed 128-slot instrument table with
//! the raw PCM of every velocity layer, followed by a big-endian metadata
//! stream (names, source paths, blank instruments) and an optional volume
//! extension. This crate turns those files into an editable [`Drumset`]
//! model and back.
//!
//! # Entry points
//!
//! - [`decode`]: bytes to model, including embedded PCM
//! - [`encode`]: model to bytes, reading source WAVs where needed
//! - [`rename`]: change the drumset name, in place when the file allows it
//! - [`export_instrument`]: write an instrument's layers back out as WAVs
//!
//! # Usage
//!
//! ```ignore
//! use drumset::{decode, encode, Instrument, Velocity};
//!
//! let bytes = std::fs::read("Rock.drm")?;
//! let mut kit = decode(&bytes)?;
//!
//! let mut clap = Instrument::new("Clap");
//! clap.velocities.push(Velocity::from_file(0, 127, "clap.wav"));
//! kit.insert(39, clap);
//!
//! std::fs::write("Rock.drm", encode(&kit)?)?;
//! ```
//!
//! # Velocity bounds
//!
//! Only the lower bound of each layer is stored for instruments with audio.
//! Upper bounds are derived on decode (see [`infer_velocity_bounds`]);
//! layers sharing a lower bound are round-robin alternates.

mod crc;
mod decode;
mod encode;
mod error;
mod export;
pub mod layout;
mod model;
mod patch;
pub mod records;
mod stream;
mod wav;

pub use crc::{Crc32, checksum};
pub use decode::{decode, infer_velocity_bounds};
pub use encode::{EncodeOptions, encode, encode_with};
pub use error::{EncodeError, ExportError, FormatError, PatchError, ValidationError, WaveError};
pub use export::{
    ExportOptions, export_all, export_instrument, export_instrument_with, sanitize,
    waves_dir_name,
};
pub use model::{
    Drumset, FillChokeDelay, FormatVersion, Instrument, Sample, Velocity, gain_db,
};
pub use patch::{
    CrcCheck, copy_with_new_name, physical_crc, read_crc, read_name, rename, rename_file,
    rename_in_place, section_crc, verify,
};
pub use stream::{BlankDescriptor, BlankSchema, Metadata, MetadataReader, MetadataWriter};
pub use wav::{WaveData, parse_wave, read_wave, wave_header};

pub use layout::{FILE_EXTENSION, MAX_INSTRUMENTS, MAX_VELOCITIES};
