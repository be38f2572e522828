//! End-to-end tests for the drumset binary

use std::fs;
use std::path::Path;
use std::process::Command;

use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::tempdir;

fn write_wav(path: &Path, len: usize) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("Failed to create wav");
    for i in 0..len as i16 {
        writer.write_sample(i * 3).unwrap();
    }
    writer.finalize().unwrap();
}

fn drumset(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_drumset"))
        .args(args)
        .output()
        .expect("Failed to run drumset")
}

fn build_kit(dir: &Path) -> std::path::PathBuf {
    write_wav(&dir.join("kick.wav"), 200);
    write_wav(&dir.join("snare.wav"), 300);
    let manifest = dir.join("drumset.toml");
    fs::write(
        &manifest,
        r#"
name = "CLI Kit"
volume = 110
output = "out/cli.drm"

[[instruments]]
midi = 36
name = "Kick"

[[instruments.velocities]]
start = 0
end = 127
file = "kick.wav"

[[instruments]]
midi = 38
name = "Snare"
choke_group = 2

[[instruments.velocities]]
start = 0
end = 127
file = "snare.wav"
"#,
    )
    .unwrap();

    let out = drumset(&["build", manifest.to_str().unwrap()]);
    assert!(out.status.success(), "build failed: {:?}", out);
    dir.join("out/cli.drm")
}

#[test]
fn test_build_info_check() {
    let dir = tempdir().expect("Failed to create temp dir");
    let drm = build_kit(dir.path());
    assert!(drm.exists());

    let out = drumset(&["check", drm.to_str().unwrap()]);
    assert!(out.status.success());

    let out = drumset(&["info", drm.to_str().unwrap(), "--json"]);
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("info is JSON");
    assert_eq!(json["name"], "CLI Kit");
    assert_eq!(json["global_volume"], 110);
    assert_eq!(json["crc"], "ok");
    assert_eq!(json["instruments"][1]["midi"], 38);
    assert_eq!(json["instruments"][1]["choke_group"], 2);
    assert_eq!(json["instruments"][1]["velocities"][0]["sample_count"], 300);
    assert_eq!(json["instruments"][1]["velocities"][0]["frames"], 300);
    assert_eq!(json["instruments"][0]["velocities"][0]["offset"], 60416);
}

#[test]
fn test_rename_and_extract() {
    let dir = tempdir().expect("Failed to create temp dir");
    let drm = build_kit(dir.path());
    let renamed = dir.path().join("renamed.drm");

    let out = drumset(&[
        "rename",
        drm.to_str().unwrap(),
        "Renamed Kit",
        "-o",
        renamed.to_str().unwrap(),
    ]);
    assert!(out.status.success());
    let out = drumset(&["info", renamed.to_str().unwrap(), "--json"]);
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["name"], "Renamed Kit");
    assert_eq!(json["global_volume"], 110);

    let out = drumset(&["extract", renamed.to_str().unwrap(), "-i", "38"]);
    assert!(out.status.success());
    let wav = dir.path().join("renamed_WAVES/38-Snare/0-127/snare.wav");
    let reader = hound::WavReader::open(&wav).expect("Extracted WAV is readable");
    assert_eq!(reader.len(), 300);
    assert!(!dir.path().join("renamed_WAVES/36-Kick").exists());
}

#[test]
fn test_check_rejects_corruption() {
    let dir = tempdir().expect("Failed to create temp dir");
    let drm = build_kit(dir.path());
    let mut bytes = fs::read(&drm).unwrap();
    let last = bytes.len() - 20;
    bytes[last] ^= 0xFF;
    fs::write(&drm, bytes).unwrap();

    let out = drumset(&["check", drm.to_str().unwrap()]);
    assert!(!out.status.success());
}
