//! YM3526 / YM3812 device family
//!
//! One chip for the single topology, two independent chips otherwise. With
//! two chips, chip 0 feeds the left output and chip 1 the right, the way
//! dual-OPL2 sound cards were wired.

use super::to_output;
use crate::backend::EmulationDevice;
use crate::opl::OplChip;
use crate::version::{ChipTopology, ChipVersion};
use log::{debug, trace};

/// OPL / OPL2 emulation device
#[derive(Debug, Clone)]
pub struct FmOplDevice {
    version: ChipVersion,
    topology: ChipTopology,
    sample_rate: u32,
    chips: Vec<OplChip>,
}

impl FmOplDevice {
    /// Create a device in its power-on state
    ///
    /// # Arguments
    ///
    /// * `version` - `Ym3526` or `Ym3812`
    /// * `sample_rate` - Output sample rate in Hz
    /// * `topology` - `Opl2` for one chip, `DualOpl2`/`Opl3` for two
    pub fn new(version: ChipVersion, sample_rate: u32, topology: ChipTopology) -> Self {
        let chips = (0..topology.chip_count())
            .map(|_| OplChip::new(version, sample_rate))
            .collect::<Vec<_>>();
        debug!(
            "{} device: {} chip(s) at {} Hz ({})",
            version.as_str(),
            chips.len(),
            sample_rate,
            topology
        );
        Self {
            version,
            topology,
            sample_rate,
            chips,
        }
    }

    /// Number of physical chips
    pub fn chip_count(&self) -> usize {
        self.chips.len()
    }

    /// Access one chip core
    pub fn chip(&self, index: usize) -> Option<&OplChip> {
        self.chips.get(index)
    }

    fn write_chip(&mut self, index: u8, register: u8, value: u8) {
        match self.chips.get_mut(index as usize) {
            Some(chip) => chip.write(register as u16, value),
            None => trace!(
                "{}: no chip {} for write {:#04x}={:#04x}",
                self.version.as_str(),
                index,
                register,
                value
            ),
        }
    }
}

impl EmulationDevice for FmOplDevice {
    fn version(&self) -> ChipVersion {
        self.version
    }

    fn topology(&self) -> ChipTopology {
        self.topology
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn reset_opl(&mut self) {
        for chip in &mut self.chips {
            chip.reset();
        }
    }

    fn read(&mut self, buffer: &mut [f32]) {
        let mut frames = buffer.chunks_exact_mut(2);
        match self.chips.as_mut_slice() {
            [mono] => {
                for frame in &mut frames {
                    let (sample, _) = mono.next_frame();
                    let sample = to_output(sample);
                    frame[0] = sample;
                    frame[1] = sample;
                }
            }
            [left, right, ..] => {
                for frame in &mut frames {
                    frame[0] = to_output(left.next_frame().0);
                    frame[1] = to_output(right.next_frame().0);
                }
            }
            [] => {
                for frame in &mut frames {
                    frame.fill(0.0);
                }
            }
        }
        frames.into_remainder().fill(0.0);
    }

    fn write_opl2(&mut self, register: u8, value: u8) {
        self.write_chip(0, register, value);
    }

    fn write_dual_opl2(&mut self, bank: u8, register: u8, value: u8) {
        self.write_chip(bank, register, value);
    }

    fn write_opl3(&mut self, base: u8, register: u8, value: u8) {
        self.write_chip(base, register, value);
    }
}
