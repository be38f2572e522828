//! Narrow edits on encoded containers, without a full decode
//!
//! Renaming rewrites only the name at the head of the metadata stream. The
//! checksum of a patched file is taken over the file's physical byte order
//! (header prefix, then everything after the header), which differs from the
//! encoder's section order; [`verify`] accepts either.

use std::fs;
use std::path::Path;

use crate::crc::Crc32;
use crate::decode::{decode, read_extension_header, section};
use crate::encode::encode;
use crate::error::{FormatError, PatchError};
use crate::layout::{
    CRC_OFFSET, EXTENSION_HEADER_OFFSET, HEADER_PREFIX_SIZE, HEADER_SIZE,
    INSTRUMENT_TABLE_OFFSET, INSTRUMENT_TABLE_SIZE, METADATA_HEADER_OFFSET,
    METADATA_HEADER_SIZE, METADATA_SIZE_OFFSET, PRE_WAVE_SIZE,
};
use crate::records::{ContainerHeader, ExtensionHeader, MetadataHeader};
use crate::stream::{MetadataReader, MetadataWriter};

/// Which checksum order the stored CRC matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcCheck {
    /// Written by the encoder
    SectionOrder,
    /// Written by an in-place rename
    PhysicalOrder,
    Mismatch { stored: u32, computed: u32 },
}

impl CrcCheck {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Mismatch { .. })
    }
}

fn header(bytes: &[u8]) -> Result<ContainerHeader, FormatError> {
    ContainerHeader::from_bytes(bytes).ok_or(FormatError::NotAContainer)
}

fn metadata_header(bytes: &[u8]) -> Result<MetadataHeader, FormatError> {
    let raw = section(
        bytes,
        METADATA_HEADER_OFFSET,
        METADATA_HEADER_SIZE,
        "metadata header",
    )?;
    MetadataHeader::from_bytes(raw).ok_or(FormatError::NotAContainer)
}

/// Volume extension header, if the container has one and its volume block
/// is still present. An in-place rename of a 1.1 file cuts the block off
/// while leaving the header behind.
fn extension(bytes: &[u8], header: &ContainerHeader) -> Option<ExtensionHeader> {
    if !header.has_extensions() {
        return None;
    }
    read_extension_header(bytes).filter(|ext| {
        let (offset, size) = ext.volume_slot();
        size != 0 && offset as usize + size as usize <= bytes.len()
    })
}

/// Drumset name, read straight from the metadata stream
pub fn read_name(bytes: &[u8]) -> Result<String, FormatError> {
    header(bytes)?;
    let meta = metadata_header(bytes)?;
    let stream = section(bytes, meta.offset as usize, meta.size as usize, "metadata")?;
    MetadataReader::new(stream).read_string()
}

/// CRC stored in the header
pub fn read_crc(bytes: &[u8]) -> Result<u32, FormatError> {
    Ok(header(bytes)?.crc)
}

/// Checksum over the physical byte order: header prefix, then everything
/// after the header
pub fn physical_crc(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(&bytes[..HEADER_PREFIX_SIZE.min(bytes.len())]);
    crc.update(bytes.get(HEADER_SIZE..).unwrap_or_default());
    crc.finalize(true)
}

/// Checksum replaying the encoder's section order over an encoded buffer
pub fn section_crc(bytes: &[u8]) -> Result<u32, FormatError> {
    let header = header(bytes)?;
    let meta = metadata_header(bytes)?;
    let extension = extension(bytes, &header);

    let wave_start = if extension.is_some() {
        PRE_WAVE_SIZE
    } else {
        EXTENSION_HEADER_OFFSET
    };
    let wave_len = (meta.offset as usize).checked_sub(wave_start).ok_or(
        FormatError::CorruptOffset {
            section: "metadata",
            offset: meta.offset as usize,
        },
    )?;

    let mut crc = Crc32::new();
    crc.update(section(bytes, wave_start, wave_len, "wave data")?);
    crc.update(section(
        bytes,
        INSTRUMENT_TABLE_OFFSET,
        INSTRUMENT_TABLE_SIZE,
        "instrument table",
    )?);
    crc.update(&meta.to_bytes());
    crc.update(section(
        bytes,
        meta.offset as usize,
        meta.size as usize,
        "metadata",
    )?);
    if let Some(extension) = extension {
        let (offset, size) = extension.volume_slot();
        crc.update(&extension.to_bytes());
        crc.update(section(
            bytes,
            offset as usize,
            size as usize,
            "volume extension",
        )?);
    }
    crc.update(&header.prefix());
    Ok(crc.finalize(true))
}

/// Checks the stored CRC against both checksum orders
pub fn verify(bytes: &[u8]) -> Result<CrcCheck, FormatError> {
    let stored = read_crc(bytes)?;
    let computed = section_crc(bytes);
    if computed == Ok(stored) {
        return Ok(CrcCheck::SectionOrder);
    }
    if stored == physical_crc(bytes) {
        return Ok(CrcCheck::PhysicalOrder);
    }
    Ok(CrcCheck::Mismatch {
        stored,
        computed: computed?,
    })
}

/// Replaces the drumset name in place.
///
/// The result ends at the end of the metadata stream, so a container whose
/// volume extension follows the stream is refused with
/// [`PatchError::ExtensionBlockPresent`]; use [`rename`] for those.
pub fn rename_in_place(bytes: &[u8], new_name: &str) -> Result<Vec<u8>, PatchError> {
    let header = header(bytes)?;
    if extension(bytes, &header).is_some() {
        return Err(PatchError::ExtensionBlockPresent);
    }

    let meta = metadata_header(bytes)?;
    let offset = meta.offset as usize;
    if offset < METADATA_HEADER_OFFSET + METADATA_HEADER_SIZE {
        return Err(FormatError::CorruptOffset {
            section: "metadata",
            offset,
        }
        .into());
    }
    let stream = section(bytes, offset, meta.size as usize, "metadata")?;

    let mut reader = MetadataReader::new(stream);
    let old_name = reader.read_string()?;
    let rest = &stream[reader.position()..];

    let mut writer = MetadataWriter::new();
    writer.write_string(new_name);
    let mut new_stream = writer.into_bytes();
    new_stream.extend_from_slice(rest);

    let mut out = Vec::with_capacity(offset + new_stream.len());
    out.extend_from_slice(&bytes[..offset]);
    let size = new_stream.len() as u32;
    out[METADATA_SIZE_OFFSET..METADATA_SIZE_OFFSET + 4].copy_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&new_stream);

    let crc = physical_crc(&out);
    out[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());

    tracing::debug!("Renamed '{old_name}' to '{new_name}' in place, crc {crc:08X}");
    Ok(out)
}

/// Renames a container, in place when possible, otherwise by decoding and
/// re-encoding so the volume extension survives
pub fn rename(bytes: &[u8], new_name: &str) -> Result<Vec<u8>, PatchError> {
    match rename_in_place(bytes, new_name) {
        Err(PatchError::ExtensionBlockPresent) => {
            tracing::info!("Container has extensions, re-encoding to rename");
            let mut drumset = decode(bytes)?;
            drumset.name = new_name.to_string();
            Ok(encode(&drumset)?)
        }
        other => other,
    }
}

/// Writes a renamed copy of `src` to `dst`, returning the new CRC
pub fn copy_with_new_name(src: &Path, dst: &Path, new_name: &str) -> Result<u32, PatchError> {
    let bytes = fs::read(src).map_err(|source| PatchError::Io {
        path: src.to_path_buf(),
        source,
    })?;
    let renamed = rename(&bytes, new_name)?;
    fs::write(dst, &renamed).map_err(|source| PatchError::Io {
        path: dst.to_path_buf(),
        source,
    })?;
    Ok(read_crc(&renamed)?)
}

/// Renames a container file, returning the new CRC
pub fn rename_file(path: &Path, new_name: &str) -> Result<u32, PatchError> {
    copy_with_new_name(path, path, new_name)
}
