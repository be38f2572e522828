//! Integration tests for renaming and WAV export


use std::fs;
use std::time::{Duration, SystemTime};

use drumset::{
    CrcCheck, ExportOptions, PatchError, copy_with_new_name, decode, encode, export_all,
    export_instrument, export_instrument_with, read_crc, read_name, rename, rename_file,
    rename_in_place, verify,
};
use generate_test_kits::{downgrade_to_v1_0, rock_kit};
use tempfile::tempdir;

#[test]
fn test_in_place_rename_refuses_extension_block() {
    let dir = tempdir().expect("Failed to create temp dir");
    let kit = rock_kit(dir.path()).expect("Failed to generate kit");
    let bytes = encode(&kit.drumset).unwrap();

    assert!(matches!(
        rename_in_place(&bytes, "Jazz Kit"),
        Err(PatchError::ExtensionBlockPresent)
    ));
}

#[test]
fn test_rename_falls_back_to_re_encode() {
    let dir = tempdir().expect("Failed to create temp dir");
    let kit = rock_kit(dir.path()).expect("Failed to generate kit");
    let bytes = encode(&kit.drumset).unwrap();

    let renamed = rename(&bytes, "Jazz Kit").unwrap();
    assert_eq!(read_name(&renamed).unwrap(), "Jazz Kit");
    assert_eq!(verify(&renamed).unwrap(), CrcCheck::SectionOrder);

    let decoded = decode(&renamed).unwrap();
    assert_eq!(decoded.global_volume, 120);
    assert_eq!(decoded.instruments.len(), 4);
}

#[test]
fn test_in_place_rename_of_legacy_container() {
    let dir = tempdir().expect("Failed to create temp dir");
    let kit = rock_kit(dir.path()).expect("Failed to generate kit");
    let legacy = downgrade_to_v1_0(&encode(&kit.drumset).unwrap(), 90);
    let before = decode(&legacy).unwrap();

    let renamed = rename_in_place(&legacy, "A Much Longer Drumset Name").unwrap();
    assert_eq!(read_name(&renamed).unwrap(), "A Much Longer Drumset Name");
    assert_eq!(verify(&renamed).unwrap(), CrcCheck::PhysicalOrder);

    let meta_offset = u32::from_le_bytes(renamed[59916..59920].try_into().unwrap()) as usize;
    let meta_size = u32::from_le_bytes(renamed[59920..59924].try_into().unwrap()) as usize;
    assert_eq!(renamed.len(), meta_offset + meta_size);
    // "Rock Kit" is 8 UTF-16 units, the new name 26
    assert_eq!(renamed.len(), legacy.len() + (26 - 8) * 2);

    let after = decode(&renamed).unwrap();
    assert_eq!(after.name, "A Much Longer Drumset Name");
    assert_eq!(after.global_volume, 90);
    assert_eq!(after.instruments, before.instruments);

    // The top-level entry point takes the same path
    assert_eq!(rename(&legacy, "A Much Longer Drumset Name").unwrap(), renamed);
}

#[test]
fn test_file_helpers() {
    let dir = tempdir().expect("Failed to create temp dir");
    let kit = rock_kit(dir.path()).expect("Failed to generate kit");
    let src = dir.path().join("Rock.drm");
    let dst = dir.path().join("Copy.drm");
    fs::write(&src, encode(&kit.drumset).unwrap()).unwrap();

    let crc = copy_with_new_name(&src, &dst, "Copy").unwrap();
    let copied = fs::read(&dst).unwrap();
    assert_eq!(read_crc(&copied).unwrap(), crc);
    assert_eq!(read_name(&copied).unwrap(), "Copy");
    assert_eq!(read_name(&fs::read(&src).unwrap()).unwrap(), "Rock Kit");

    let crc = rename_file(&src, "Renamed").unwrap();
    let renamed = fs::read(&src).unwrap();
    assert_eq!(read_crc(&renamed).unwrap(), crc);
    assert_eq!(read_name(&renamed).unwrap(), "Renamed");

    assert!(matches!(
        rename_file(&dir.path().join("missing.drm"), "x"),
        Err(PatchError::Io { .. })
    ));
}

#[test]
fn test_export_instrument_layout_and_content() {
    let dir = tempdir().expect("Failed to create temp dir");
    let kit = rock_kit(dir.path()).expect("Failed to generate kit");
    let decoded = decode(&encode(&kit.drumset).unwrap()).unwrap();
    let out = dir.path().join("Rock_WAVES");

    let files = export_instrument(&decoded, 38, &out).unwrap();
    assert_eq!(
        files,
        vec![
            out.join("38-Snare_Drum/0-63/snare_soft.wav"),
            out.join("38-Snare_Drum/64-127/snare_hard.wav"),
        ]
    );

    let mut reader = hound::WavReader::open(&files[0]).expect("Failed to open export");
    let spec = reader.spec();
    assert_eq!((spec.channels, spec.bits_per_sample, spec.sample_rate), (2, 16, 44100));
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    assert_eq!(pcm, kit.pcm[&(38, 0)]);

    let exported = fs::read(&files[1]).unwrap();
    assert_eq!(exported.len(), 44 + 450);
    assert_eq!(&exported[44..], kit.pcm[&(38, 1)].as_slice());
    let reader = hound::WavReader::open(&files[1]).expect("Failed to open export");
    assert_eq!(reader.spec().bits_per_sample, 24);
}

#[test]
fn test_export_all_skips_blank_instruments() {
    let dir = tempdir().expect("Failed to create temp dir");
    let kit = rock_kit(dir.path()).expect("Failed to generate kit");
    let decoded = decode(&encode(&kit.drumset).unwrap()).unwrap();
    let out = dir.path().join("all");

    let files = export_all(&decoded, &out, &ExportOptions::default()).unwrap();
    assert_eq!(files.len(), 5);
    assert!(out.join("42-Hi_Hat/0-127/hh_a.wav").exists());
    assert!(out.join("42-Hi_Hat/0-127/hh_b.wav").exists());
    assert!(export_instrument(&decoded, 60, &out).unwrap().is_empty());
}

#[test]
fn test_export_keeps_newer_files_unless_changed() {
    let dir = tempdir().expect("Failed to create temp dir");
    let kit = rock_kit(dir.path()).expect("Failed to generate kit");
    let decoded = decode(&encode(&kit.drumset).unwrap()).unwrap();
    let out = dir.path().join("waves");

    let files = export_instrument(&decoded, 36, &out).unwrap();
    let path = &files[0];
    let original = fs::read(path).unwrap();
    let orig_path = path.with_extension("wav.orig");

    // Existing file newer than the container and identical: left alone
    let old_container = ExportOptions {
        container_modified: Some(SystemTime::UNIX_EPOCH),
    };
    export_instrument_with(&decoded, 36, &out, &old_container).unwrap();
    assert_eq!(fs::read(path).unwrap(), original);
    assert!(!orig_path.exists());

    // Newer but different: replaced by the container's content
    fs::write(path, b"edited").unwrap();
    export_instrument_with(&decoded, 36, &out, &old_container).unwrap();
    assert_eq!(fs::read(path).unwrap(), original);
    assert!(!orig_path.exists());

    // Older than the container: plain overwrite
    fs::write(path, b"stale").unwrap();
    let new_container = ExportOptions {
        container_modified: Some(SystemTime::now() + Duration::from_secs(3600)),
    };
    export_instrument_with(&decoded, 36, &out, &new_container).unwrap();
    assert_eq!(fs::read(path).unwrap(), original);
}
