//! Human and JSON summaries of a decoded drumset

use serde::Serialize;

use drumset::{CrcCheck, Drumset};

#[derive(Debug, Serialize)]
pub struct DrumsetSummary {
    pub name: String,
    pub version: String,
    pub global_volume: u8,
    pub gain_db: f32,
    pub crc: String,
    pub instruments: Vec<InstrumentSummary>,
}

#[derive(Debug, Serialize)]
pub struct InstrumentSummary {
    pub midi: u8,
    pub name: String,
    pub choke_group: u16,
    pub polyphony: u16,
    pub volume: u8,
    pub fill_choke_group: u8,
    pub fill_choke_delay: u8,
    pub non_percussion: bool,
    pub velocities: Vec<VelocitySummary>,
}

#[derive(Debug, Serialize)]
pub struct VelocitySummary {
    pub start: u8,
    pub end: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub sample_count: u32,
    pub frames: u32,
    /// Where the PCM sits in the container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl DrumsetSummary {
    pub fn new(drumset: &Drumset, crc: CrcCheck) -> Self {
        let version = drumset.format_version;
        let instruments = drumset
            .instruments
            .iter()
            .map(|(&midi, instrument)| InstrumentSummary {
                midi,
                name: instrument.name.clone(),
                choke_group: instrument.choke_group,
                polyphony: instrument.polyphony,
                volume: instrument.volume,
                fill_choke_group: instrument.fill_choke_group,
                fill_choke_delay: instrument.fill_choke_delay.as_u8(),
                non_percussion: instrument.non_percussion,
                velocities: instrument
                    .velocities
                    .iter()
                    .map(|v| VelocitySummary {
                        start: v.start,
                        end: v.end,
                        source: v.source_path().map(|p| p.display().to_string()),
                        format: v.sample.as_ref().map(|s| {
                            format!(
                                "{} Hz, {}-bit, {} ch",
                                s.sample_rate, s.bits_per_sample, s.channels
                            )
                        }),
                        sample_count: v.sample.as_ref().map_or(0, |s| s.sample_count),
                        frames: v.sample.as_ref().map_or(0, |s| s.frames()),
                        offset: v.sample.as_ref().map(|s| s.offset),
                    })
                    .collect(),
            })
            .collect();

        Self {
            name: drumset.name.clone(),
            version: format!("{}.{}.{}", version.version, version.revision, version.build),
            global_volume: drumset.global_volume,
            gain_db: drumset.gain_db(),
            crc: match crc {
                CrcCheck::SectionOrder => "ok".to_string(),
                CrcCheck::PhysicalOrder => "ok (patched)".to_string(),
                CrcCheck::Mismatch { stored, computed } => {
                    format!("mismatch: stored {stored:08X}, computed {computed:08X}")
                }
            },
            instruments,
        }
    }

    pub fn print(&self) {
        println!("{} (format {})", self.name, self.version);
        println!("  volume {} ({:+.1} dB)", self.global_volume, self.gain_db);
        println!("  crc {}", self.crc);
        for instrument in &self.instruments {
            println!(
                "  {:3} {:<20} choke {} poly {} vol {}{}",
                instrument.midi,
                instrument.name,
                instrument.choke_group,
                instrument.polyphony,
                instrument.volume,
                if instrument.non_percussion {
                    " non-percussion"
                } else {
                    ""
                }
            );
            for v in &instrument.velocities {
                match (&v.format, v.offset) {
                    (Some(format), Some(offset)) => println!(
                        "      {:3}-{:<3} {format}, {} frames @ {offset}",
                        v.start, v.end, v.frames
                    ),
                    _ => println!("      {:3}-{:<3} blank", v.start, v.end),
                }
            }
        }
    }
}
