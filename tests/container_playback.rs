//! End-to-end tests: files on disk through the registry, mixer and exporter

use std::io::Write;
use std::path::Path;

use ymf262::container::{ContainerRegistry, DroVersion, MultimediaContainer};
use ymf262::export::{export_to_wav_with_config, ExportConfig};
use ymf262::{ChipTopology, ChipVersion, Mixer, PlaybackState, PlayerConfig};

/// DRO 2.0 capture: one OPL2 voice keyed on for 250 ms, then off for 250 ms
fn dro_capture() -> Vec<u8> {
    let codemap = [0x23, 0x63, 0x83, 0xA0, 0xB0];
    let pairs: [(u8, u8); 9] = [
        (0, 0x21),
        (1, 0xF0),
        (2, 0x0F),
        (3, 0x41),
        (4, 0x32),
        (0xFE, 0xF9), // 250 ms
        (4, 0x12),
        (0xFE, 0xF9),
        (4, 0x12),
    ];
    let mut data = b"DBRAWOPL".to_vec();
    data.extend_from_slice(&2u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&(pairs.len() as u32).to_le_bytes());
    data.extend_from_slice(&500u32.to_le_bytes());
    data.extend_from_slice(&[0, 0, 0, 0xFE, 0xFF, codemap.len() as u8]);
    data.extend_from_slice(&codemap);
    for (code, value) in pairs {
        data.extend_from_slice(&[code, value]);
    }
    data
}

fn write_temp(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file
}

fn config(rate: u32) -> PlayerConfig {
    PlayerConfig {
        version: ChipVersion::Ym3812,
        sample_rate: rate,
        ..PlayerConfig::default()
    }
}

#[test]
fn test_dro_plays_through_registry() {
    let file = write_temp(".dro", &dro_capture());
    let registry = ContainerRegistry::with_defaults();

    let info = registry.song_info(file.path());
    assert_eq!(info.duration_ms, 500);

    let container = registry.open(file.path()).unwrap();
    let mut mixer = container.create_mixer(&config(10_000)).unwrap();
    assert_eq!(mixer.channel_count(), 2);
    assert_eq!(mixer.length_frames(), Some(5_000));

    mixer.play();
    let on = mixer.generate_samples(2 * 2_500);
    assert!(on.iter().any(|&s| s != 0.0));
    mixer.generate_samples(2 * 2_000);
    let tail = mixer.generate_samples(2 * 1_000);
    assert!(tail[2 * 500..].iter().all(|&s| s == 0.0));
    assert_eq!(mixer.state(), PlaybackState::Stopped);
}

#[test]
fn test_topology_override_reaches_device() {
    let file = write_temp(".dro", &dro_capture());
    let container = ContainerRegistry::with_defaults().open(file.path()).unwrap();
    let mut config = config(10_000);
    config.version = ChipVersion::Ymf262;
    config.topology = Some(ChipTopology::Opl3);
    let mut mixer = container.create_mixer(&config).unwrap();
    mixer.play();
    let samples = mixer.generate_samples(2 * 1_000);
    assert!(samples.iter().any(|&s| s != 0.0));
}

#[test]
fn test_dro_exports_to_wav() {
    let file = write_temp(".dro", &dro_capture());
    let container = ContainerRegistry::with_defaults().open(file.path()).unwrap();
    let mut mixer = container.create_mixer(&config(8_000)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("capture.wav");
    let summary = export_to_wav_with_config(mixer.as_mut(), &out, ExportConfig::stereo()).unwrap();
    assert_eq!(summary.frames, 4_000);

    let reader = hound::WavReader::open(&out).unwrap();
    assert_eq!(reader.duration(), 4_000);
}

#[test]
fn test_malformed_ogg_falls_back_to_path() {
    let registry = ContainerRegistry::with_defaults();

    let garbage = write_temp(".ogg", b"definitely not an ogg stream");
    let info = registry.song_info(garbage.path());
    assert_eq!(info.duration_ms, -1);
    assert_eq!(
        info.name,
        garbage.path().file_name().unwrap().to_string_lossy()
    );

    let missing = Path::new("/nonexistent/dir/song.oga");
    let info = registry.song_info(missing);
    assert_eq!(info.duration_ms, -1);
    assert_eq!(info.name, "song.oga");
}

#[test]
fn test_dro_versions_agree_on_disk() {
    let v2 = write_temp(".dro", &dro_capture());

    let mut v1 = b"DBRAWOPL".to_vec();
    v1.extend_from_slice(&0u16.to_le_bytes());
    v1.extend_from_slice(&1u16.to_le_bytes());
    v1.extend_from_slice(&500u32.to_le_bytes());
    let body = [
        0x23, 0x21, 0x63, 0xF0, 0x83, 0x0F, 0xA0, 0x41, 0xB0, 0x32, 0x00, 0xF9, 0xB0, 0x12, 0x00,
        0xF9, 0xB0, 0x12,
    ];
    v1.extend_from_slice(&(body.len() as u32).to_le_bytes());
    v1.extend_from_slice(&[0, 0, 0, 0]);
    v1.extend_from_slice(&body);
    let v1 = write_temp(".dro", &v1);

    let registry = ContainerRegistry::with_defaults();
    let a = registry.open(v1.path()).unwrap();
    let b = registry.open(v2.path()).unwrap();
    assert_eq!(
        a.metadata().map(|m| m.duration_ms),
        b.metadata().map(|m| m.duration_ms)
    );

    let song_a = ymf262::container::parse_dro(&std::fs::read(v1.path()).unwrap()).unwrap();
    let song_b = ymf262::container::parse_dro(&std::fs::read(v2.path()).unwrap()).unwrap();
    assert_eq!(song_a.version, DroVersion::V0_1);
    assert_eq!(song_b.version, DroVersion::V2_0);
    assert_eq!(song_a.writes, song_b.writes);
}
