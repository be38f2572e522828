//! Drumset manifest parsing
//!
//! A `drumset.toml` describes a kit in terms of source WAVs:
//!
//! ```toml
//! name = "Rock Kit"
//! volume = 110
//!
//! [[instruments]]
//! midi = 38
//! name = "Snare"
//! choke_group = 1
//!
//! [[instruments.velocities]]
//! start = 0
//! end = 63
//! file = "snare_soft.wav"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use drumset::{Drumset, FillChokeDelay, Instrument, Velocity};

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// Output container (overridable on the command line)
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub instruments: Vec<InstrumentEntry>,
}

fn default_volume() -> u8 {
    100
}

#[derive(Debug, Deserialize)]
pub struct InstrumentEntry {
    pub midi: u8,
    pub name: String,
    #[serde(default)]
    pub choke_group: u16,
    #[serde(default)]
    pub polyphony: u16,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub fill_choke_group: u8,
    #[serde(default)]
    pub fill_choke_delay: DelayEntry,
    #[serde(default)]
    pub non_percussion: bool,
    #[serde(default)]
    pub velocities: Vec<VelocityEntry>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayEntry {
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
}

impl From<DelayEntry> for FillChokeDelay {
    fn from(entry: DelayEntry) -> Self {
        match entry {
            DelayEntry::Quarter => FillChokeDelay::Quarter,
            DelayEntry::Eighth => FillChokeDelay::Eighth,
            DelayEntry::Sixteenth => FillChokeDelay::Sixteenth,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VelocityEntry {
    pub start: u8,
    pub end: u8,
    /// Source WAV; omitted for blank instruments
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    Ok(manifest)
}

impl Manifest {
    /// Builds the drumset model, resolving source paths against `base_dir`
    pub fn to_drumset(&self, base_dir: &Path) -> Result<Drumset> {
        let mut drumset = Drumset::new(&self.name);
        drumset.global_volume = self.volume;

        for entry in &self.instruments {
            let mut instrument = Instrument::new(&entry.name);
            instrument.choke_group = entry.choke_group;
            instrument.polyphony = entry.polyphony;
            instrument.volume = entry.volume;
            instrument.fill_choke_group = entry.fill_choke_group;
            instrument.fill_choke_delay = entry.fill_choke_delay.into();
            instrument.non_percussion = entry.non_percussion;

            for v in &entry.velocities {
                instrument.velocities.push(match &v.file {
                    Some(file) => Velocity::from_file(v.start, v.end, base_dir.join(file)),
                    None => Velocity::blank(v.start, v.end),
                });
            }
            instrument.sort_velocities();

            if drumset.insert(entry.midi, instrument).is_some() {
                anyhow::bail!("Instrument {} is defined twice", entry.midi);
            }
        }

        drumset
            .validate()
            .with_context(|| format!("Invalid drumset '{}'", self.name))?;
        Ok(drumset)
    }

    /// Checks that every referenced source exists
    pub fn check_sources(&self, base_dir: &Path) -> Result<()> {
        for entry in &self.instruments {
            for velocity in &entry.velocities {
                if let Some(file) = &velocity.file {
                    let path = base_dir.join(file);
                    if !path.exists() {
                        anyhow::bail!(
                            "Instrument {} '{}' source not found: {:?}",
                            entry.midi,
                            entry.name,
                            path
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIT: &str = r#"
name = "Test Kit"
volume = 120

[[instruments]]
midi = 42
name = "Hat"
choke_group = 1
fill_choke_delay = "eighth"
non_percussion = true

[[instruments.velocities]]
start = 0
end = 127
file = "hat.wav"

[[instruments]]
midi = 60
name = "Spare"

[[instruments.velocities]]
start = 0
end = 127
"#;

    #[test]
    fn test_parse_and_convert() {
        let manifest: Manifest = toml::from_str(KIT).unwrap();
        assert_eq!(manifest.volume, 120);
        assert_eq!(manifest.instruments.len(), 2);

        let drumset = manifest.to_drumset(Path::new("/kits")).unwrap();
        let hat = drumset.instrument(42).unwrap();
        assert_eq!(hat.volume, 100);
        assert_eq!(hat.fill_choke_delay, FillChokeDelay::Eighth);
        assert!(hat.non_percussion);
        assert_eq!(
            hat.velocities[0].source_path(),
            Some(Path::new("/kits/hat.wav"))
        );
        assert!(!drumset.instrument(60).unwrap().has_audio());
    }

    #[test]
    fn test_duplicate_instrument() {
        let manifest: Manifest = toml::from_str(
            r#"
name = "Dup"
[[instruments]]
midi = 36
name = "A"
[[instruments]]
midi = 36
name = "B"
"#,
        )
        .unwrap();
        assert!(manifest.to_drumset(Path::new(".")).is_err());
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let manifest: Manifest = toml::from_str(
            r#"
name = "Gap"
[[instruments]]
midi = 36
name = "Kick"
[[instruments.velocities]]
start = 0
end = 60
file = "a.wav"
[[instruments.velocities]]
start = 70
end = 127
file = "b.wav"
"#,
        )
        .unwrap();
        assert!(manifest.to_drumset(Path::new(".")).is_err());
    }

    #[test]
    fn test_missing_source() {
        let manifest: Manifest = toml::from_str(KIT).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(manifest.check_sources(dir.path()).is_err());
    }
}
