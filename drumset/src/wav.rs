//! Minimal RIFF/WAVE handling: raw PCM extraction and canonical headers

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{EncodeError, WaveError};
use crate::layout::SUPPORTED_BIT_DEPTHS;

const FORMAT_PCM: u16 = 1;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Size of the header written by [`wave_header`]
pub const WAVE_HEADER_SIZE: usize = 44;

/// Format and raw PCM of a source WAV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveData {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub pcm: Vec<u8>,
}

/// Reads a WAV file and returns its `data` chunk untouched
pub fn read_wave(path: &Path) -> Result<WaveData, EncodeError> {
    let bytes = std::fs::read(path).map_err(|source| EncodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_wave(&bytes).map_err(|source| EncodeError::UnsupportedWave {
        path: path.to_path_buf(),
        source,
    })
}

/// Walks the RIFF chunks for `fmt ` and `data`
pub fn parse_wave(bytes: &[u8]) -> Result<WaveData, WaveError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WaveError::NotRiff);
    }

    let mut format = None;
    let mut data = None;
    let mut pos = 12;

    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = LittleEndian::read_u32(&bytes[pos + 4..pos + 8]) as usize;
        let body = pos + 8;
        let end = body.saturating_add(size);

        match id {
            b"fmt " => {
                if size < 16 || end > bytes.len() {
                    return Err(WaveError::TruncatedChunk("fmt".to_string()));
                }
                format = Some(&bytes[body..end]);
            }
            b"data" => {
                // Writers that stream audio often leave a stale size; take what is there
                let end = end.min(bytes.len());
                data = Some(&bytes[body..end]);
                break;
            }
            _ => {}
        }

        // Chunks are padded to even length
        pos = end.saturating_add(size & 1);
    }

    let format = format.ok_or(WaveError::MissingFormat)?;
    let data = data.ok_or(WaveError::MissingData)?;

    let tag = LittleEndian::read_u16(&format[0..2]);
    let channels = LittleEndian::read_u16(&format[2..4]);
    let sample_rate = LittleEndian::read_u32(&format[4..8]);
    let bits_per_sample = LittleEndian::read_u16(&format[14..16]);

    if tag != FORMAT_PCM && tag != FORMAT_EXTENSIBLE {
        return Err(WaveError::UnsupportedFormat(tag));
    }
    if !SUPPORTED_BIT_DEPTHS.contains(&bits_per_sample) {
        return Err(WaveError::UnsupportedBitDepth(bits_per_sample));
    }
    if channels == 0 {
        return Err(WaveError::InvalidChannels(channels));
    }
    if data.is_empty() {
        return Err(WaveError::EmptyData);
    }

    Ok(WaveData {
        channels,
        sample_rate,
        bits_per_sample,
        pcm: data.to_vec(),
    })
}

/// Canonical 44-byte PCM header for `data_len` bytes of audio
pub fn wave_header(
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_len: u32,
) -> [u8; WAVE_HEADER_SIZE] {
    let block_align = (bits_per_sample as u32 * channels as u32) / 8;
    let byte_rate = sample_rate.wrapping_mul(block_align);

    let mut out = [0u8; WAVE_HEADER_SIZE];
    out[0..4].copy_from_slice(b"RIFF");
    LittleEndian::write_u32(&mut out[4..8], data_len.wrapping_add(36));
    out[8..12].copy_from_slice(b"WAVE");
    out[12..16].copy_from_slice(b"fmt ");
    LittleEndian::write_u32(&mut out[16..20], 16);
    LittleEndian::write_u16(&mut out[20..22], FORMAT_PCM);
    LittleEndian::write_u16(&mut out[22..24], channels);
    LittleEndian::write_u32(&mut out[24..28], sample_rate);
    LittleEndian::write_u32(&mut out[28..32], byte_rate);
    LittleEndian::write_u16(&mut out[32..34], block_align as u16);
    LittleEndian::write_u16(&mut out[34..36], bits_per_sample);
    out[36..40].copy_from_slice(b"data");
    LittleEndian::write_u32(&mut out[40..44], data_len);
    out
}
