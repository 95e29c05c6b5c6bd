//! YMF262 device family
//!
//! A single 18-channel chip. The dual-OPL2 write path maps the second chip
//! onto the high register bank and forces each bank's channels to one
//! stereo side, which is how DOSBox plays dual-OPL2 captures on an OPL3.

use super::to_output;
use crate::backend::EmulationDevice;
use crate::opl::registers::{OPL3_ENABLE, PAN_LEFT, PAN_RIGHT};
use crate::opl::OplChip;
use crate::version::{ChipTopology, ChipVersion};
use log::{debug, trace};

const NEW_MODE_REGISTER: u16 = 0x105;

/// OPL3 emulation device
#[derive(Debug, Clone)]
pub struct Opl3Device {
    topology: ChipTopology,
    chip: OplChip,
}

impl Opl3Device {
    /// Create a device in its power-on state
    pub fn new(sample_rate: u32, topology: ChipTopology) -> Self {
        debug!("ymf262 device at {} Hz ({})", sample_rate, topology);
        let mut device = Self {
            topology,
            chip: OplChip::new(ChipVersion::Ymf262, sample_rate),
        };
        device.power_on();
        device
    }

    /// Access the chip core
    pub fn chip(&self) -> &OplChip {
        &self.chip
    }

    fn power_on(&mut self) {
        if self.topology == ChipTopology::DualOpl2 {
            self.chip.write(NEW_MODE_REGISTER, OPL3_ENABLE);
        }
    }
}

impl EmulationDevice for Opl3Device {
    fn version(&self) -> ChipVersion {
        ChipVersion::Ymf262
    }

    fn topology(&self) -> ChipTopology {
        self.topology
    }

    fn sample_rate(&self) -> u32 {
        self.chip.sample_rate()
    }

    fn reset_opl(&mut self) {
        self.chip.reset();
        self.power_on();
    }

    fn read(&mut self, buffer: &mut [f32]) {
        let mut frames = buffer.chunks_exact_mut(2);
        for frame in &mut frames {
            let (left, right) = self.chip.next_frame();
            frame[0] = to_output(left);
            frame[1] = to_output(right);
        }
        frames.into_remainder().fill(0.0);
    }

    fn write_opl2(&mut self, register: u8, value: u8) {
        self.chip.write(register as u16, value);
    }

    fn write_dual_opl2(&mut self, bank: u8, register: u8, value: u8) {
        let bank = bank & 1;
        // Timer control of the second chip would land on 0x104/0x105
        if bank == 1 && matches!(register, 0x04 | 0x05) {
            trace!("ymf262: dropping second-chip write {:#04x}={:#04x}", register, value);
            return;
        }
        let value = match register {
            0xC0..=0xC8 => (value & 0x0F) | if bank == 0 { PAN_LEFT } else { PAN_RIGHT },
            _ => value,
        };
        self.chip.write(((bank as u16) << 8) | register as u16, value);
    }

    fn write_opl3(&mut self, base: u8, register: u8, value: u8) {
        if base > 1 {
            trace!("ymf262: invalid base {} for write {:#04x}={:#04x}", base, register, value);
            return;
        }
        self.chip.write(((base as u16) << 8) | register as u16, value);
    }
}
