//! Contract tests for every emulation device the factory can build
//!
//! These go through the public API only: factory, write paths and `read`.

use ymf262::{
    create_instance, version_names, ChipTopology, ChipVersion, EmulationDevice, RegisterWrite,
    SharedDevice,
};

const RATE: u32 = 44_100;

/// Sine carrier at full volume on channel 0 (registers relative to a bank)
const VOICE: [(u8, u8); 6] = [
    (0x23, 0x21),
    (0x43, 0x00),
    (0x63, 0xF0),
    (0x83, 0x0F),
    (0xA0, 0x41),
    (0xC0, 0x00),
];

fn peaks(buffer: &[f32]) -> (f32, f32) {
    buffer.chunks_exact(2).fold((0.0f32, 0.0f32), |(l, r), frame| {
        (l.max(frame[0].abs()), r.max(frame[1].abs()))
    })
}

fn render(device: &mut dyn EmulationDevice, frames: usize) -> Vec<f32> {
    let mut buffer = vec![0.0; frames * 2];
    device.read(&mut buffer);
    buffer
}

#[test]
fn test_factory_reports_requested_identity() {
    for version in ChipVersion::ALL {
        for topology in ChipTopology::ALL {
            for rate in [8_000, 44_100, 96_000] {
                let device = create_instance(version, rate, topology).unwrap();
                assert_eq!(device.version(), version);
                assert_eq!(device.topology(), topology);
                assert_eq!(device.sample_rate(), rate);
            }
        }
    }
}

#[test]
fn test_version_names_follow_declaration_order() {
    let names = version_names();
    assert_eq!(names.len(), ChipVersion::ALL.len());
    for (version, name) in ChipVersion::ALL.iter().zip(&names) {
        assert_eq!(version.label(), *name);
    }
    assert_eq!(names, vec!["YM3526 (OPL)", "YM3812 (OPL2)", "YMF262 (OPL3)"]);
}

#[test]
fn test_topology_value_of() {
    assert_eq!(ChipTopology::value_of(0), Some(ChipTopology::Opl2));
    assert_eq!(ChipTopology::value_of(1), Some(ChipTopology::DualOpl2));
    assert_eq!(ChipTopology::value_of(2), Some(ChipTopology::Opl3));
    assert_eq!(ChipTopology::value_of(3), None);
    assert_eq!(ChipTopology::value_of(-1), None);
}

#[test]
fn test_reset_devices_render_identically() {
    for version in ChipVersion::ALL {
        for topology in ChipTopology::ALL {
            let mut a = create_instance(version, RATE, topology).unwrap();
            let mut b = create_instance(version, RATE, topology).unwrap();
            a.write_opl2(0xB0, 0x32);
            a.reset_opl();
            b.reset_opl();
            for size in [1, 2, 7, 64, 513] {
                let mut left = vec![0.5; size];
                let mut right = vec![-0.5; size];
                a.read(&mut left);
                b.read(&mut right);
                assert_eq!(left, right, "{} {} size {}", version, topology, size);
            }
        }
    }
}

#[test]
fn test_voice_sounds_and_decays() {
    for version in ChipVersion::ALL {
        let mut device = create_instance(version, RATE, ChipTopology::Opl2).unwrap();
        for (register, value) in VOICE {
            device.write_opl2(register, value);
        }
        device.write_opl2(0xB0, 0x32);
        let (l, r) = peaks(&render(device.as_mut(), 2048));
        assert!(l > 0.05, "{} silent", version);
        assert_eq!(l, r);

        device.write_opl2(0xB0, 0x12);
        render(device.as_mut(), 4096);
        assert_eq!(peaks(&render(device.as_mut(), 256)), (0.0, 0.0));

        device.write_opl2(0xB0, 0x32);
        device.reset_opl();
        assert_eq!(peaks(&render(device.as_mut(), 256)), (0.0, 0.0));
    }
}

#[test]
fn test_dual_opl2_bank_one_is_right_only() {
    for version in ChipVersion::ALL {
        let mut device = create_instance(version, RATE, ChipTopology::DualOpl2).unwrap();
        for (register, value) in VOICE {
            device.write_dual_opl2(1, register, value);
        }
        device.write_dual_opl2(1, 0xB0, 0x32);
        let (l, r) = peaks(&render(device.as_mut(), 2048));
        assert_eq!(l, 0.0, "{} leaks to the left", version);
        assert!(r > 0.05);
    }
}

#[test]
fn test_output_stays_in_range() {
    let mut device = create_instance(ChipVersion::Ymf262, RATE, ChipTopology::Opl3).unwrap();
    device.write_opl3(1, 0x05, 0x01);
    for channel in 0..9u8 {
        let modulator = (channel / 3) * 8 + channel % 3;
        for base in 0..2u8 {
            device.write_opl3(base, 0x20 + modulator + 3, 0x21);
            device.write_opl3(base, 0x60 + modulator + 3, 0xF0);
            device.write_opl3(base, 0xA0 + channel, 0x41);
            device.write_opl3(base, 0xC0 + channel, 0x31);
            device.write_opl3(base, 0xB0 + channel, 0x32);
        }
    }
    let buffer = render(device.as_mut(), 4096);
    assert!(buffer.iter().all(|s| s.is_finite() && (-1.0..=1.0).contains(s)));
    assert!(peaks(&buffer).0 > 0.0);
}

#[test]
fn test_shared_device_batches() {
    let shared = SharedDevice::new(create_instance(ChipVersion::Ym3812, RATE, ChipTopology::Opl2).unwrap());
    let batch: Vec<RegisterWrite> = VOICE
        .iter()
        .chain(&[(0xB0, 0x32)])
        .map(|&(register, value)| RegisterWrite::Opl2 { register, value })
        .collect();
    shared.write_batch(&batch);

    let mut buffer = vec![0.0; 1024];
    shared.read(&mut buffer);
    assert!(peaks(&buffer).0 > 0.0);
}
