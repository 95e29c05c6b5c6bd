//! One physical OPL chip: register file, 18 channels, 36 operators
//!
//! The YM3526 and YM3812 use only the low register bank (9 channels). The
//! YMF262 adds the high bank, 4-op pairs and per-channel stereo once OPL3
//! mode is enabled through register 0x105.

use super::channel::{Channel, FourOpConnection};
use super::lfo::Lfo;
use super::operator::{Operator, KEY_NORMAL, KEY_RHYTHM};
use super::registers::{
    OperatorSlot, RegisterGroup, RhythmFlags, NOTE_SELECT, OPL3_ENABLE, WAVE_SELECT_ENABLE,
};
use super::tables::OPL_RATE;
use crate::version::ChipVersion;
use log::trace;

/// Channels per register bank
pub const BANK_CHANNELS: usize = 9;
/// Channels on a YMF262
pub const MAX_CHANNELS: usize = 18;
const MAX_OPERATORS: usize = MAX_CHANNELS * 2;

/// Primary/secondary channel pairs selected by bits 0-5 of register 0x104
const FOUR_OP_PAIRS: [(usize, usize); 6] = [(0, 3), (1, 4), (2, 5), (9, 12), (10, 13), (11, 14)];

// Rhythm operators: bass drum (ch 6), hi-hat/snare (ch 7), tom/cymbal (ch 8)
const BASS_DRUM_MOD: usize = 12;
const BASS_DRUM_CAR: usize = 13;
const HI_HAT: usize = 14;
const SNARE: usize = 15;
const TOM_TOM: usize = 16;
const CYMBAL: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FourOpRole {
    None,
    Primary(usize),
    Secondary,
}

/// Single OPL chip core
#[derive(Debug, Clone)]
pub struct OplChip {
    version: ChipVersion,
    sample_rate: u32,
    registers: [u8; 512],
    channels: [Channel; MAX_CHANNELS],
    operators: [Operator; MAX_OPERATORS],
    lfo: Lfo,
    rhythm: RhythmFlags,
    wave_select: bool,
    note_select: bool,
    opl3_mode: bool,
    four_op_mask: u8,
    noise: u32,
    noise_counter: u32,
    noise_add: u32,
}

impl OplChip {
    /// Create a chip in its power-on state
    pub fn new(version: ChipVersion, sample_rate: u32) -> Self {
        let rate_scale = OPL_RATE / sample_rate.max(1) as f64;
        Self {
            version,
            sample_rate,
            registers: [0; 512],
            channels: std::array::from_fn(|_| Channel::default()),
            operators: std::array::from_fn(|_| Operator::new(rate_scale)),
            lfo: Lfo::new(sample_rate.max(1)),
            rhythm: RhythmFlags::empty(),
            wave_select: false,
            note_select: false,
            opl3_mode: false,
            four_op_mask: 0,
            noise: 1,
            noise_counter: 0,
            noise_add: (rate_scale * 65536.0) as u32,
        }
    }

    /// Emulated revision
    pub fn version(&self) -> ChipVersion {
        self.version
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Restore the power-on state
    pub fn reset(&mut self) {
        *self = Self::new(self.version, self.sample_rate);
    }

    /// True once register 0x105 bit 0 is set (YMF262 only)
    pub fn opl3_mode(&self) -> bool {
        self.opl3_mode
    }

    /// Last value written to a register (0x000-0x1FF)
    pub fn read_register(&self, address: u16) -> u8 {
        self.registers[(address & 0x1FF) as usize]
    }

    /// Write a register; bit 8 of `address` selects the high bank
    pub fn write(&mut self, address: u16, value: u8) {
        let high_bank = address & 0x100 != 0;
        if high_bank && self.version != ChipVersion::Ymf262 {
            trace!(
                "{}: ignoring high-bank write {:#05x}={:#04x}",
                self.version.as_str(),
                address,
                value
            );
            return;
        }
        self.registers[(address & 0x1FF) as usize] = value;

        let register = address as u8;
        let bank_offset = if high_bank { BANK_CHANNELS } else { 0 };

        match RegisterGroup::decode(register, high_bank) {
            RegisterGroup::Test => self.wave_select = value & WAVE_SELECT_ENABLE != 0,
            RegisterGroup::Timer | RegisterGroup::Unused => {}
            RegisterGroup::FourOpSelect => self.four_op_mask = value & 0x3F,
            RegisterGroup::NewMode => self.opl3_mode = value & OPL3_ENABLE != 0,
            RegisterGroup::NoteSelect => self.note_select = value & NOTE_SELECT != 0,
            RegisterGroup::Characteristic(slot) => {
                self.operator_mut(slot, bank_offset).write_characteristic(value)
            }
            RegisterGroup::Level(slot) => self.operator_mut(slot, bank_offset).write_level(value),
            RegisterGroup::AttackDecay(slot) => {
                self.operator_mut(slot, bank_offset).write_attack_decay(value)
            }
            RegisterGroup::SustainRelease(slot) => {
                self.operator_mut(slot, bank_offset).write_sustain_release(value)
            }
            RegisterGroup::Waveform(slot) => {
                let waveform = value & self.waveform_mask();
                self.operator_mut(slot, bank_offset).write_waveform(waveform)
            }
            RegisterGroup::FrequencyLow(ch) => {
                let ch = ch as usize + bank_offset;
                if self.four_op_role(ch) == FourOpRole::Secondary {
                    return;
                }
                if self.channels[ch].write_frequency_low(value) {
                    self.update_frequency(ch);
                }
            }
            RegisterGroup::KeyBlock(ch) => {
                let ch = ch as usize + bank_offset;
                if self.four_op_role(ch) == FourOpRole::Secondary {
                    return;
                }
                let toggled = self.channels[ch].write_key_block(value);
                self.update_frequency(ch);
                if let Some(on) = toggled {
                    self.key_channel(ch, on);
                }
            }
            RegisterGroup::Rhythm => self.write_rhythm(value),
            RegisterGroup::Connection(ch) => {
                self.channels[ch as usize + bank_offset].write_connection(value)
            }
        }
    }

    /// Render one stereo frame as raw signed sums
    pub fn next_frame(&mut self) -> (i32, i32) {
        self.lfo.advance();
        let noise = self.advance_noise();

        let opl3 = self.opl3_mode;
        let rhythm = self.rhythm.contains(RhythmFlags::RHYTHM);
        let channel_count = if opl3 { MAX_CHANNELS } else { BANK_CHANNELS };

        let (mut left, mut right) = (0i32, 0i32);
        for ch in 0..channel_count {
            if rhythm && (6..9).contains(&ch) {
                if ch == 6 {
                    let sample = self.render_rhythm(noise);
                    left += sample;
                    right += sample;
                }
                continue;
            }
            let sample = match self.four_op_role(ch) {
                FourOpRole::Secondary => continue,
                FourOpRole::Primary(secondary) => self.render_four_op(ch, secondary),
                FourOpRole::None => self.render_two_op(ch),
            };
            let (to_left, to_right) = self.channels[ch].panning(opl3);
            if to_left {
                left += sample;
            }
            if to_right {
                right += sample;
            }
        }
        (left, right)
    }

    fn operator_mut(&mut self, slot: OperatorSlot, bank_offset: usize) -> &mut Operator {
        let channel = slot.channel as usize + bank_offset;
        &mut self.operators[channel * 2 + slot.operator as usize]
    }

    fn waveform_mask(&self) -> u8 {
        match self.version {
            ChipVersion::Ym3526 => 0x00,
            ChipVersion::Ym3812 if self.wave_select => 0x03,
            ChipVersion::Ym3812 => 0x00,
            ChipVersion::Ymf262 if self.opl3_mode => 0x07,
            ChipVersion::Ymf262 if self.wave_select => 0x03,
            ChipVersion::Ymf262 => 0x00,
        }
    }

    fn four_op_role(&self, ch: usize) -> FourOpRole {
        if !self.opl3_mode {
            return FourOpRole::None;
        }
        for (bit, &(primary, secondary)) in FOUR_OP_PAIRS.iter().enumerate() {
            if self.four_op_mask & (1 << bit) == 0 {
                continue;
            }
            if ch == primary {
                return FourOpRole::Primary(secondary);
            }
            if ch == secondary {
                return FourOpRole::Secondary;
            }
        }
        FourOpRole::None
    }

    fn update_frequency(&mut self, ch: usize) {
        let fnum = self.channels[ch].fnum();
        let block = self.channels[ch].block();
        let key_code = self.channels[ch].key_code(self.note_select);
        self.operators[ch * 2].set_frequency(fnum, block, key_code);
        self.operators[ch * 2 + 1].set_frequency(fnum, block, key_code);

        if let FourOpRole::Primary(secondary) = self.four_op_role(ch) {
            let primary = self.channels[ch].clone();
            self.channels[secondary].follow(&primary);
            self.operators[secondary * 2].set_frequency(fnum, block, key_code);
            self.operators[secondary * 2 + 1].set_frequency(fnum, block, key_code);
        }
    }

    fn key_channel(&mut self, ch: usize, on: bool) {
        let mut ops = [ch * 2, ch * 2 + 1, usize::MAX, usize::MAX];
        if let FourOpRole::Primary(secondary) = self.four_op_role(ch) {
            ops[2] = secondary * 2;
            ops[3] = secondary * 2 + 1;
        }
        for op in ops.into_iter().filter(|&op| op != usize::MAX) {
            if on {
                self.operators[op].key_on(KEY_NORMAL);
            } else {
                self.operators[op].key_off(KEY_NORMAL);
            }
        }
    }

    fn write_rhythm(&mut self, value: u8) {
        let flags = RhythmFlags::from_bits_truncate(value);
        let previous = self.rhythm;
        self.rhythm = flags;
        self.lfo.deep_vibrato = flags.contains(RhythmFlags::DEEP_VIBRATO);
        self.lfo.deep_tremolo = flags.contains(RhythmFlags::DEEP_TREMOLO);

        if flags.contains(RhythmFlags::RHYTHM) {
            let keys = [
                (BASS_DRUM_MOD, RhythmFlags::BASS_DRUM),
                (BASS_DRUM_CAR, RhythmFlags::BASS_DRUM),
                (HI_HAT, RhythmFlags::HI_HAT),
                (SNARE, RhythmFlags::SNARE),
                (TOM_TOM, RhythmFlags::TOM_TOM),
                (CYMBAL, RhythmFlags::CYMBAL),
            ];
            for (op, flag) in keys {
                if flags.contains(flag) {
                    self.operators[op].key_on(KEY_RHYTHM);
                } else {
                    self.operators[op].key_off(KEY_RHYTHM);
                }
            }
        } else if previous.contains(RhythmFlags::RHYTHM) {
            for op in BASS_DRUM_MOD..=CYMBAL {
                self.operators[op].key_off(KEY_RHYTHM);
            }
        }
    }

    fn advance_noise(&mut self) -> u32 {
        self.noise_counter += self.noise_add;
        let steps = self.noise_counter >> 16;
        self.noise_counter &= 0xFFFF;
        for _ in 0..steps {
            if self.noise & 1 != 0 {
                self.noise ^= 0x80_0302;
            }
            self.noise >>= 1;
        }
        self.noise
    }

    fn render_two_op(&mut self, ch: usize) -> i32 {
        let channel = &mut self.channels[ch];
        let modulator = self.operators[ch * 2].sample(channel.feedback(), &self.lfo);
        channel.push_feedback(modulator);
        if channel.additive() {
            modulator + self.operators[ch * 2 + 1].sample(0, &self.lfo)
        } else {
            self.operators[ch * 2 + 1].sample(modulator, &self.lfo)
        }
    }

    fn render_four_op(&mut self, primary: usize, secondary: usize) -> i32 {
        let connection = FourOpConnection::from_cnt(
            self.channels[primary].additive(),
            self.channels[secondary].additive(),
        );
        let channel = &mut self.channels[primary];
        let lfo = &self.lfo;
        let ops = &mut self.operators;
        let (op1, op2, op3) = (primary * 2 + 1, secondary * 2, secondary * 2 + 1);

        let out0 = ops[primary * 2].sample(channel.feedback(), lfo);
        channel.push_feedback(out0);

        match connection {
            FourOpConnection::FmFm => {
                let next = ops[op1].sample(out0, lfo);
                let next = ops[op2].sample(next, lfo);
                ops[op3].sample(next, lfo)
            }
            FourOpConnection::AmFm => {
                let next = ops[op1].sample(0, lfo);
                let next = ops[op2].sample(next, lfo);
                out0 + ops[op3].sample(next, lfo)
            }
            FourOpConnection::FmAm => {
                let first = ops[op1].sample(out0, lfo);
                let next = ops[op2].sample(0, lfo);
                first + ops[op3].sample(next, lfo)
            }
            FourOpConnection::AmAm => {
                let next = ops[op1].sample(0, lfo);
                out0 + ops[op2].sample(next, lfo) + ops[op3].sample(0, lfo)
            }
        }
    }

    fn render_rhythm(&mut self, noise: u32) -> i32 {
        let channel = &mut self.channels[6];
        let lfo = &self.lfo;
        let ops = &mut self.operators;

        let modulator = ops[BASS_DRUM_MOD].sample(channel.feedback(), lfo);
        channel.push_feedback(modulator);
        let bass_drum = if channel.additive() {
            ops[BASS_DRUM_CAR].sample(0, lfo)
        } else {
            ops[BASS_DRUM_CAR].sample(modulator, lfo)
        };

        ops[HI_HAT].advance(lfo);
        ops[SNARE].advance(lfo);
        ops[CYMBAL].advance(lfo);
        let tom_tom = ops[TOM_TOM].sample(0, lfo);

        let c1 = ops[HI_HAT].wave_index();
        let c5 = ops[CYMBAL].wave_index();
        let phase_bit: u32 = if ((c1 & 0x88) ^ ((c1 << 5) & 0x80)) | ((c5 ^ (c5 << 2)) & 0x20) != 0
        {
            0x02
        } else {
            0x00
        };
        let noise_bit = noise & 1;

        let hi_hat_index = (phase_bit << 8) | (0x34 << (phase_bit ^ (noise_bit << 1)));
        let snare_index = (0x100 + (c1 & 0x100)) ^ (noise_bit << 8);
        let cymbal_index = (1 + phase_bit) << 8;

        let hi_hat = ops[HI_HAT].wave_at(hi_hat_index as i32);
        let snare = ops[SNARE].wave_at(snare_index as i32);
        let cymbal = ops[CYMBAL].wave_at(cymbal_index as i32);

        (bass_drum + hi_hat + snare + tom_tom + cymbal) * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 44_100;

    fn operator_offsets(ch: u16) -> (u16, u16) {
        let modulator = (ch / 3) * 8 + ch % 3;
        (modulator, modulator + 3)
    }

    /// Plain sine carrier at full volume on a bank-relative channel
    fn program_voice(chip: &mut OplChip, bank: u16, ch: u16) {
        let (_, carrier) = operator_offsets(ch);
        chip.write(bank | (0x20 + carrier), 0x21);
        chip.write(bank | (0x40 + carrier), 0x00);
        chip.write(bank | (0x60 + carrier), 0xF0);
        chip.write(bank | (0x80 + carrier), 0x0F);
        chip.write(bank | (0xA0 + ch), 0x41);
    }

    fn key(chip: &mut OplChip, bank: u16, ch: u16, on: bool) {
        chip.write(bank | (0xB0 + ch), if on { 0x32 } else { 0x12 });
    }

    fn peak(chip: &mut OplChip, frames: usize) -> (i32, i32) {
        let mut peak = (0, 0);
        for _ in 0..frames {
            let (l, r) = chip.next_frame();
            peak.0 = peak.0.max(l.abs());
            peak.1 = peak.1.max(r.abs());
        }
        peak
    }

    #[test]
    fn test_power_on_is_silent() {
        let mut chip = OplChip::new(ChipVersion::Ym3812, RATE);
        assert_eq!(peak(&mut chip, 1024), (0, 0));
    }

    #[test]
    fn test_key_on_and_off() {
        let mut chip = OplChip::new(ChipVersion::Ym3812, RATE);
        program_voice(&mut chip, 0, 0);
        key(&mut chip, 0, 0, true);
        let (l, r) = peak(&mut chip, 1024);
        assert!(l > 3000);
        assert_eq!(l, r);

        key(&mut chip, 0, 0, false);
        peak(&mut chip, 2048);
        assert_eq!(peak(&mut chip, 256), (0, 0));
    }

    #[test]
    fn test_reset_silences() {
        let mut chip = OplChip::new(ChipVersion::Ymf262, RATE);
        program_voice(&mut chip, 0, 4);
        key(&mut chip, 0, 4, true);
        assert!(peak(&mut chip, 512).0 > 0);
        chip.reset();
        assert_eq!(peak(&mut chip, 512), (0, 0));
        assert_eq!(chip.read_register(0xB4), 0);
    }

    #[test]
    fn test_high_bank_ignored_on_opl2() {
        let mut chip = OplChip::new(ChipVersion::Ym3812, RATE);
        chip.write(0x105, 0x01);
        assert!(!chip.opl3_mode());
        assert_eq!(chip.read_register(0x105), 0);
    }

    #[test]
    fn test_high_bank_needs_opl3_mode() {
        let mut chip = OplChip::new(ChipVersion::Ymf262, RATE);
        program_voice(&mut chip, 0x100, 0);
        chip.write(0x1C0, 0x30);
        key(&mut chip, 0x100, 0, true);
        assert_eq!(peak(&mut chip, 512), (0, 0));

        chip.write(0x105, 0x01);
        let (l, r) = peak(&mut chip, 512);
        assert!(l > 0 && r > 0);
    }

    #[test]
    fn test_opl3_panning() {
        let mut chip = OplChip::new(ChipVersion::Ymf262, RATE);
        chip.write(0x105, 0x01);
        program_voice(&mut chip, 0, 1);
        chip.write(0xC1, 0x20);
        key(&mut chip, 0, 1, true);
        let (l, r) = peak(&mut chip, 512);
        assert_eq!(l, 0);
        assert!(r > 0);
    }

    #[test]
    fn test_waveform_mask_by_version() {
        let mut opl = OplChip::new(ChipVersion::Ym3526, RATE);
        opl.write(0x01, 0x20);
        assert_eq!(opl.waveform_mask(), 0);

        let mut opl2 = OplChip::new(ChipVersion::Ym3812, RATE);
        assert_eq!(opl2.waveform_mask(), 0);
        opl2.write(0x01, 0x20);
        assert_eq!(opl2.waveform_mask(), 3);

        let mut opl3 = OplChip::new(ChipVersion::Ymf262, RATE);
        opl3.write(0x105, 0x01);
        assert_eq!(opl3.waveform_mask(), 7);
    }

    #[test]
    fn test_four_op_pair_keys_secondary() {
        let mut chip = OplChip::new(ChipVersion::Ymf262, RATE);
        chip.write(0x105, 0x01);
        chip.write(0x104, 0x01);
        chip.write(0xC0, 0x31); // AM-FM: op0 audible on its own
        chip.write(0xC3, 0x30);
        chip.write(0x20, 0x21);
        chip.write(0x60, 0xF0);
        chip.write(0xA0, 0x41);
        key(&mut chip, 0, 0, true);
        let (l, _) = peak(&mut chip, 512);
        assert!(l > 0);
        assert_eq!(chip.four_op_role(0), FourOpRole::Primary(3));
        assert_eq!(chip.four_op_role(3), FourOpRole::Secondary);
        // Secondary channel pitch follows the primary
        assert_eq!(chip.channels[3].fnum(), chip.channels[0].fnum());
    }

    #[test]
    fn test_rhythm_bass_drum() {
        let mut chip = OplChip::new(ChipVersion::Ym3812, RATE);
        program_voice(&mut chip, 0, 6);
        assert_eq!(peak(&mut chip, 256), (0, 0));
        chip.write(0xBD, 0x30);
        assert!(peak(&mut chip, 1024).0 > 0);
        chip.write(0xBD, 0x00);
        peak(&mut chip, 2048);
        assert_eq!(peak(&mut chip, 256), (0, 0));
    }

    #[test]
    fn test_identical_chips_render_identically() {
        let mut a = OplChip::new(ChipVersion::Ymf262, RATE);
        let mut b = OplChip::new(ChipVersion::Ymf262, RATE);
        for chip in [&mut a, &mut b] {
            chip.write(0xBD, 0x20);
            program_voice(chip, 0, 7);
            chip.write(0xBD, 0x29);
        }
        for _ in 0..2048 {
            assert_eq!(a.next_frame(), b.next_frame());
        }
    }
}
