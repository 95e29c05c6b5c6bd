//! FM operator: phase generator, envelope and waveform lookup

use super::envelope::{EnvelopeGenerator, EnvelopeState};
use super::lfo::Lfo;
use super::registers::OperatorFlags;
use super::tables::{tables, ENV_LIMIT, FREQ_MULTIPLIER, KSL_SHIFT, WAVE_MASK, WAVE_SHIFT};

/// Key-on source: channel key bit
pub const KEY_NORMAL: u8 = 0x01;
/// Key-on source: rhythm register
pub const KEY_RHYTHM: u8 = 0x02;

/// One of the two (or four) operators of a channel
#[derive(Debug, Clone)]
pub struct Operator {
    flags: OperatorFlags,
    multiple: u8,
    key_scale_level: u8,
    total_level: u8,
    waveform: usize,
    envelope: EnvelopeGenerator,
    key: u8,

    fnum: u16,
    block: u8,
    key_scale_base: i32,

    phase: u32,
    phase_increment: u32,
    /// Native-to-output rate ratio, 16.16 fixed point
    phase_scale: u64,

    /// Wave index for the current sample
    wave_index: u32,
    /// Total attenuation for the current sample
    attenuation: i32,
}

impl Operator {
    /// Create a silent operator
    pub fn new(rate_scale: f64) -> Self {
        Self {
            flags: OperatorFlags::empty(),
            multiple: 0,
            key_scale_level: 0,
            total_level: 0,
            waveform: 0,
            envelope: EnvelopeGenerator::new(rate_scale),
            key: 0,
            fnum: 0,
            block: 0,
            key_scale_base: 0,
            phase: 0,
            phase_increment: 0,
            phase_scale: (rate_scale * 65536.0) as u64,
            wave_index: 0,
            attenuation: ENV_LIMIT,
        }
    }

    /// Registers 0x20-0x35
    pub fn write_characteristic(&mut self, value: u8) {
        self.flags = OperatorFlags::from_bits_truncate(value);
        self.multiple = value & 0x0F;
        self.envelope
            .set_sustain_hold(self.flags.contains(OperatorFlags::SUSTAIN));
        self.envelope
            .set_key_scale_rate(self.flags.contains(OperatorFlags::KEY_SCALE_RATE));
        self.phase_increment = self.increment_for(self.fnum);
    }

    /// Registers 0x40-0x55
    pub fn write_level(&mut self, value: u8) {
        self.key_scale_level = value >> 6;
        self.total_level = value & 0x3F;
    }

    /// Registers 0x60-0x75
    pub fn write_attack_decay(&mut self, value: u8) {
        self.envelope.set_attack_decay(value >> 4, value & 0x0F);
    }

    /// Registers 0x80-0x95
    pub fn write_sustain_release(&mut self, value: u8) {
        self.envelope.set_sustain_release(value >> 4, value & 0x0F);
    }

    /// Registers 0xE0-0xF5, already masked to the waveforms the chip allows
    pub fn write_waveform(&mut self, waveform: u8) {
        self.waveform = (waveform & 0x07) as usize;
    }

    /// Update pitch from the owning channel
    pub fn set_frequency(&mut self, fnum: u16, block: u8, key_code: u8) {
        self.fnum = fnum & 0x3FF;
        self.block = block & 0x07;
        let index = ((self.block as usize) << 4) | (self.fnum as usize >> 6);
        self.key_scale_base = tables().key_scale[index] as i32;
        self.envelope.set_key_code(key_code);
        self.phase_increment = self.increment_for(self.fnum);
    }

    /// Set a key-on source; the envelope restarts on the first source
    pub fn key_on(&mut self, source: u8) {
        if self.key == 0 {
            self.phase = 0;
            self.envelope.key_on();
        }
        self.key |= source;
    }

    /// Clear a key-on source; the envelope releases when none remain
    pub fn key_off(&mut self, source: u8) {
        if self.key & source == 0 {
            return;
        }
        self.key &= !source;
        if self.key == 0 {
            self.envelope.key_off();
        }
    }

    /// True when the envelope has fully released
    pub fn is_off(&self) -> bool {
        self.envelope.state() == EnvelopeState::Off
    }

    /// Wave index for the current sample, before modulation
    #[inline]
    pub fn wave_index(&self) -> u32 {
        self.wave_index
    }

    /// Step envelope and phase generator by one sample
    #[inline]
    pub fn advance(&mut self, lfo: &Lfo) {
        let mut attenuation = self.envelope.advance()
            + ((self.total_level as i32) << 2)
            + (self.key_scale_base >> KSL_SHIFT[self.key_scale_level as usize]);
        if self.flags.contains(OperatorFlags::TREMOLO) {
            attenuation += lfo.tremolo;
        }
        self.attenuation = attenuation;

        self.wave_index = self.phase >> WAVE_SHIFT;
        let increment = if self.flags.contains(OperatorFlags::VIBRATO) {
            self.increment_for(lfo.vibrato_fnum(self.fnum))
        } else {
            self.phase_increment
        };
        self.phase = self.phase.wrapping_add(increment);
    }

    /// Output for the current sample at `wave_index + modulation`
    #[inline]
    pub fn output(&self, modulation: i32) -> i32 {
        self.wave_at(self.wave_index as i32 + modulation)
    }

    /// Output for the current sample at an explicit wave index
    #[inline]
    pub fn wave_at(&self, index: i32) -> i32 {
        if self.attenuation >= ENV_LIMIT {
            return 0;
        }
        let t = tables();
        let sample = t.waves[self.waveform][index as usize & WAVE_MASK] as i32;
        (sample * t.attenuation[self.attenuation as usize] as i32) >> 16
    }

    /// Advance and produce one modulated sample
    #[inline]
    pub fn sample(&mut self, modulation: i32, lfo: &Lfo) -> i32 {
        self.advance(lfo);
        self.output(modulation)
    }

    fn increment_for(&self, fnum: u16) -> u32 {
        let base = ((fnum as u64) << self.block) * FREQ_MULTIPLIER[self.multiple as usize] as u64;
        ((base << 11).wrapping_mul(self.phase_scale) >> 16) as u32
    }
}
