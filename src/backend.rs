//! Device contract shared by every OPL chip family
//!
//! This module defines the minimal operation set any concrete chip emulation
//! must implement. Identity (version, topology, sample rate) is fixed at
//! construction; all mutable synthesis state belongs to the implementation.

use crate::version::{ChipTopology, ChipVersion};

/// Common interface for OPL emulation devices
///
/// A device moves between a freshly reset state and a state accumulated from
/// register writes. [`reset_opl`](EmulationDevice::reset_opl) is the only way
/// back to the power-on state; there is no externally visible state enum.
///
/// # Example
///
/// ```
/// use ymf262::{create_instance, ChipTopology, ChipVersion, EmulationDevice};
///
/// fn key_on(device: &mut dyn EmulationDevice) {
///     device.write_opl2(0x23, 0x01); // Carrier multiple 1
///     device.write_opl2(0x63, 0xF0); // Carrier attack rate 15
///     device.write_opl2(0xA0, 0x41); // F-number low
///     device.write_opl2(0xB0, 0x32); // Key on, block 4
/// }
///
/// let mut device = create_instance(ChipVersion::Ym3812, 44_100, ChipTopology::Opl2).unwrap();
/// key_on(device.as_mut());
/// let mut frames = [0.0f32; 256];
/// device.read(&mut frames);
/// ```
pub trait EmulationDevice: Send {
    /// Emulated chip revision
    fn version(&self) -> ChipVersion;

    /// Physical chip arrangement used to route register writes
    fn topology(&self) -> ChipTopology;

    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Restore the power-on state
    ///
    /// Clears all registers, envelopes, oscillators and LFO state. May be
    /// called at any time.
    fn reset_opl(&mut self);

    /// Synthesize the next block of audio
    ///
    /// The buffer receives interleaved stereo frames (`L, R, L, R, ...`) of
    /// normalized samples in `[-1.0, 1.0]`. `buffer.len() / 2` frames are
    /// produced; a trailing odd slot is set to silence. Output depends only on
    /// the register-write history, and the call never allocates.
    fn read(&mut self, buffer: &mut [f32]);

    /// Single-chip register write
    ///
    /// # Arguments
    ///
    /// * `register` - Register address (0x00-0xFF)
    /// * `value` - Register value
    fn write_opl2(&mut self, register: u8, value: u8);

    /// Dual-chip register write
    ///
    /// # Arguments
    ///
    /// * `bank` - Physical chip receiving the write (0 or 1)
    /// * `register` - Register address (0x00-0xFF)
    /// * `value` - Register value
    fn write_dual_opl2(&mut self, bank: u8, register: u8, value: u8);

    /// Extended register-set write
    ///
    /// # Arguments
    ///
    /// * `base` - Register bank offset selector (0 = 0x000, 1 = 0x100)
    /// * `register` - Register address within the bank
    /// * `value` - Register value
    fn write_opl3(&mut self, base: u8, register: u8, value: u8);

    /// Generate `frames` stereo frames into a new buffer
    ///
    /// Allocates; prefer [`read`](EmulationDevice::read) in hot paths.
    fn generate_samples(&mut self, frames: usize) -> Vec<f32> {
        let mut samples = vec![0.0; frames * 2];
        self.read(&mut samples);
        samples
    }
}
