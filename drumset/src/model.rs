//! Editable in-memory drumset model

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::layout::{
    DEFAULT_VOLUME, FORMAT_REVISION, FORMAT_VERSION, MAX_CHOKE_GROUP, MAX_GLOBAL_VOLUME,
    MAX_INSTRUMENTS, MAX_INSTRUMENT_VOLUME, MAX_VELOCITIES, MAX_VELOCITY,
};

/// Converts a volume byte to gain in dB: 100 is unity, 0 is silence
pub fn gain_db(volume: u8) -> f32 {
    if volume == 0 {
        f32::NEG_INFINITY
    } else {
        20.0 * (volume as f32 / DEFAULT_VOLUME as f32).log10()
    }
}

/// Version triple from the container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersion {
    pub version: u8,
    pub revision: u8,
    pub build: u16,
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            revision: FORMAT_REVISION,
            build: 0,
        }
    }
}

/// Delay before a fill choke takes effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FillChokeDelay {
    #[default]
    Quarter = 0,
    Eighth = 1,
    Sixteenth = 2,
}

impl FillChokeDelay {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Quarter),
            1 => Some(Self::Eighth),
            2 => Some(Self::Sixteenth),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// PCM payload of one velocity layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    /// Samples across all channels (`pcm.len() / bytes_per_sample`)
    pub sample_count: u32,
    /// Absolute offset in the container this sample was decoded from, 0 otherwise
    pub offset: u32,
    pub pcm: Vec<u8>,
}

impl Sample {
    pub fn new(sample_rate: u32, bits_per_sample: u16, channels: u16, pcm: Vec<u8>) -> Self {
        let bytes_per_sample = (bits_per_sample as usize / 8).max(1);
        Self {
            sample_rate,
            bits_per_sample,
            channels,
            sample_count: (pcm.len() / bytes_per_sample) as u32,
            offset: 0,
            pcm,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> u32 {
        self.sample_count / self.channels.max(1) as u32
    }
}

/// One round-robin layer bound to a velocity range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Velocity {
    pub start: u8,
    pub end: u8,
    /// Where the audio came from; also what the metadata stream records
    pub source: Option<PathBuf>,
    /// Audio held in memory; takes precedence over `source` when encoding
    pub sample: Option<Sample>,
}

impl Velocity {
    /// A layer whose audio will be read from a WAV file at encode time
    pub fn from_file(start: u8, end: u8, path: impl Into<PathBuf>) -> Self {
        Self {
            start,
            end,
            source: Some(path.into()),
            sample: None,
        }
    }

    /// A layer that carries only its bounds
    pub fn blank(start: u8, end: u8) -> Self {
        Self {
            start,
            end,
            source: None,
            sample: None,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.source.is_some() || self.sample.is_some()
    }

    /// Point the layer at a new file, dropping any in-memory audio
    pub fn set_source(&mut self, path: impl Into<PathBuf>) {
        self.source = Some(path.into());
        self.sample = None;
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub name: String,
    pub choke_group: u16,
    pub polyphony: u16,
    /// 1-100; 0 only appears in files written before the field existed
    pub volume: u8,
    pub fill_choke_group: u8,
    pub fill_choke_delay: FillChokeDelay,
    pub non_percussion: bool,
    /// Physical slot order, which is also round-robin order
    pub velocities: Vec<Velocity>,
}

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            choke_group: 0,
            polyphony: 0,
            volume: DEFAULT_VOLUME,
            fill_choke_group: 0,
            fill_choke_delay: FillChokeDelay::default(),
            non_percussion: false,
            velocities: Vec::new(),
        }
    }

    /// False for blank instruments, which only live in the metadata stream
    pub fn has_audio(&self) -> bool {
        self.velocities.iter().any(Velocity::has_audio)
    }

    /// Stable sort by start, keeping round-robin order within a zone
    pub fn sort_velocities(&mut self) {
        self.velocities.sort_by_key(|v| v.start);
    }

    pub fn gain_db(&self) -> f32 {
        gain_db(self.volume)
    }

    /// Checks the invariants the encoder relies on
    pub fn validate(&self, midi_id: u8) -> Result<(), ValidationError> {
        if midi_id as usize >= MAX_INSTRUMENTS {
            return Err(ValidationError::MidiIdOutOfRange(midi_id));
        }
        if self.velocities.len() > MAX_VELOCITIES {
            return Err(ValidationError::TooManyVelocities {
                midi_id,
                count: self.velocities.len(),
            });
        }

        let check = |field: &'static str, value: u32, max: u32| {
            if value > max {
                Err(ValidationError::FieldOutOfRange {
                    midi_id,
                    field,
                    value,
                    max,
                })
            } else {
                Ok(())
            }
        };
        check("volume", self.volume as u32, MAX_INSTRUMENT_VOLUME as u32)?;
        check("choke group", self.choke_group as u32, MAX_CHOKE_GROUP as u32)?;
        check(
            "fill choke group",
            self.fill_choke_group as u32,
            MAX_CHOKE_GROUP as u32,
        )?;

        if self.velocities.is_empty() {
            return Ok(());
        }
        let with_audio = self.velocities.iter().filter(|v| v.has_audio()).count();
        if with_audio != 0 && with_audio != self.velocities.len() {
            return Err(ValidationError::MixedSources(midi_id));
        }

        self.validate_ranges(midi_id)
    }

    fn validate_ranges(&self, midi_id: u8) -> Result<(), ValidationError> {
        let velocities = &self.velocities;
        if velocities[0].start != 0 {
            return Err(ValidationError::FirstStartNotZero(midi_id));
        }
        if velocities.windows(2).any(|w| w[1].start < w[0].start) {
            return Err(ValidationError::Unsorted(midi_id));
        }

        for (index, velocity) in velocities.iter().enumerate() {
            let range_error = || ValidationError::VelocityRange {
                midi_id,
                index,
                start: velocity.start,
                end: velocity.end,
            };
            if velocity.end > MAX_VELOCITY || velocity.end < velocity.start {
                return Err(range_error());
            }

            match velocities[index + 1..].iter().find(|v| v.start != velocity.start) {
                Some(next) if velocity.end as u16 + 1 != next.start as u16 => {
                    return Err(range_error());
                }
                None if velocity.end != MAX_VELOCITY => return Err(range_error()),
                _ => {}
            }

            // Round-robin alternates must repeat the zone exactly
            if let Some(prev) = index.checked_sub(1).map(|i| &velocities[i]) {
                if prev.start == velocity.start
                    && (prev.end != velocity.end || velocity.start >= velocity.end)
                {
                    return Err(range_error());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drumset {
    pub name: String,
    /// 0-159, 100 = 0 dB
    pub global_volume: u8,
    pub format_version: FormatVersion,
    pub instruments: BTreeMap<u8, Instrument>,
}

impl Drumset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global_volume: DEFAULT_VOLUME,
            format_version: FormatVersion::default(),
            instruments: BTreeMap::new(),
        }
    }

    pub fn gain_db(&self) -> f32 {
        gain_db(self.global_volume)
    }

    pub fn instrument(&self, midi_id: u8) -> Option<&Instrument> {
        self.instruments.get(&midi_id)
    }

    pub fn instrument_mut(&mut self, midi_id: u8) -> Option<&mut Instrument> {
        self.instruments.get_mut(&midi_id)
    }

    /// Inserts an instrument, returning the one it replaced
    pub fn insert(&mut self, midi_id: u8, instrument: Instrument) -> Option<Instrument> {
        self.instruments.insert(midi_id, instrument)
    }

    pub fn remove(&mut self, midi_id: u8) -> Option<Instrument> {
        self.instruments.remove(&midi_id)
    }

    /// Instruments carrying audio, in ascending midi order
    pub fn audio_instruments(&self) -> impl Iterator<Item = (u8, &Instrument)> {
        self.instruments
            .iter()
            .filter(|(_, instrument)| instrument.has_audio())
            .map(|(&id, instrument)| (id, instrument))
    }

    /// Instruments without audio, in ascending midi order
    pub fn blank_instruments(&self) -> impl Iterator<Item = (u8, &Instrument)> {
        self.instruments
            .iter()
            .filter(|(_, instrument)| !instrument.has_audio())
            .map(|(&id, instrument)| (id, instrument))
    }

    pub fn is_id_available(&self, midi_id: u8) -> bool {
        (midi_id as usize) < MAX_INSTRUMENTS && !self.instruments.contains_key(&midi_id)
    }

    /// First free id at or after `from`, wrapping around once
    pub fn next_available_id(&self, from: u8) -> Option<u8> {
        let from = from as usize % MAX_INSTRUMENTS;
        (from..MAX_INSTRUMENTS)
            .chain(0..from)
            .map(|id| id as u8)
            .find(|&id| self.is_id_available(id))
    }

    pub fn available_ids(&self) -> Vec<u8> {
        (0..MAX_INSTRUMENTS as u8)
            .filter(|&id| self.is_id_available(id))
            .collect()
    }

    /// Moves an instrument to a free id. Returns false if `from` is empty or
    /// `to` is taken or out of range.
    pub fn move_instrument(&mut self, from: u8, to: u8) -> bool {
        if from == to {
            return self.instruments.contains_key(&from);
        }
        if !self.is_id_available(to) {
            return false;
        }
        match self.instruments.remove(&from) {
            Some(instrument) => {
                self.instruments.insert(to, instrument);
                true
            }
            None => false,
        }
    }

    /// Everything `encode` checks before writing a byte
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.global_volume > MAX_GLOBAL_VOLUME {
            return Err(ValidationError::GlobalVolumeOutOfRange(self.global_volume));
        }
        for (&midi_id, instrument) in &self.instruments {
            instrument.validate(midi_id)?;
        }
        if self.audio_instruments().next().is_none() {
            return Err(ValidationError::NoAudio);
        }
        Ok(())
    }
}
